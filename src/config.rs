//! Configuration Module
//!
//! Construction-time configuration for the memory tier, the persistent tier
//! and the registry defaults. All registry defaults can also be loaded from
//! environment variables.

use std::env;
use std::path::PathBuf;

// == Defaults ==
/// Default maximum size of the persistent tier in bytes (50 MB).
pub const DEFAULT_DISK_MAX_BYTES: u64 = 50 * 1024 * 1024;

/// Default maximum size of the memory tier in size units (1 MB when the
/// tier runs in [`SizeMode::BySize`]).
pub const DEFAULT_MEMORY_MAX_UNITS: u64 = 1024 * 1024;

/// Default on-disk schema version.
pub const DEFAULT_SCHEMA_VERSION: u32 = 1;

// == Size Mode ==
/// How the memory tier accounts for the size of an entry.
///
/// `BySize` charges each entry its approximate in-memory footprint in bytes,
/// `ByCount` charges a flat 1 so the capacity becomes a maximum entry count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeMode {
    /// Approximate byte footprint of the value
    BySize,
    /// Flat one unit per entry
    ByCount,
}

// == Memory Config ==
/// Configuration for a memory tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryConfig {
    /// Maximum occupancy in size units (bytes or entry count per `mode`)
    pub max_units: u64,
    /// Size-accounting mode
    pub mode: SizeMode,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_units: DEFAULT_MEMORY_MAX_UNITS,
            mode: SizeMode::BySize,
        }
    }
}

// == Disk Config ==
/// Configuration for a persistent tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskConfig {
    /// Directory holding the tier's records, created if absent
    pub path: PathBuf,
    /// Schema version; bumping it invalidates all prior on-disk entries
    pub schema_version: u32,
    /// Maximum total record size in bytes
    pub max_bytes: u64,
}

impl DiskConfig {
    /// Creates a disk config with the default schema version and size.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            schema_version: DEFAULT_SCHEMA_VERSION,
            max_bytes: DEFAULT_DISK_MAX_BYTES,
        }
    }
}

// == Registry Config ==
/// Default parameters applied by a [`crate::Registry`] when a caller does
/// not specify them explicitly.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Default directory for persistent tiers
    pub cache_path: PathBuf,
    /// Default on-disk schema version
    pub schema_version: u32,
    /// Default maximum persistent tier size in bytes
    pub disk_max_bytes: u64,
    /// Default maximum memory tier size in units
    pub memory_max_units: u64,
}

impl RegistryConfig {
    /// Creates a new RegistryConfig by loading values from environment
    /// variables.
    ///
    /// # Environment Variables
    /// - `TIERCACHE_PATH` - Default persistent tier directory (default: "tiercache")
    /// - `TIERCACHE_SCHEMA_VERSION` - On-disk schema version (default: 1)
    /// - `TIERCACHE_DISK_MAX_BYTES` - Persistent tier size in bytes (default: 50 MB)
    /// - `TIERCACHE_MEMORY_MAX_UNITS` - Memory tier size in units (default: 1 MB)
    pub fn from_env() -> Self {
        Self {
            cache_path: env::var("TIERCACHE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("tiercache")),
            schema_version: env::var("TIERCACHE_SCHEMA_VERSION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_SCHEMA_VERSION),
            disk_max_bytes: env::var("TIERCACHE_DISK_MAX_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_DISK_MAX_BYTES),
            memory_max_units: env::var("TIERCACHE_MEMORY_MAX_UNITS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MEMORY_MAX_UNITS),
        }
    }

    /// Creates a RegistryConfig rooted at the given path with default sizes.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            cache_path: path.into(),
            ..Self::default()
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            cache_path: PathBuf::from("tiercache"),
            schema_version: DEFAULT_SCHEMA_VERSION,
            disk_max_bytes: DEFAULT_DISK_MAX_BYTES,
            memory_max_units: DEFAULT_MEMORY_MAX_UNITS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_config_default() {
        let config = RegistryConfig::default();
        assert_eq!(config.cache_path, PathBuf::from("tiercache"));
        assert_eq!(config.schema_version, DEFAULT_SCHEMA_VERSION);
        assert_eq!(config.disk_max_bytes, DEFAULT_DISK_MAX_BYTES);
        assert_eq!(config.memory_max_units, DEFAULT_MEMORY_MAX_UNITS);
    }

    #[test]
    fn test_disk_config_new() {
        let config = DiskConfig::new("/tmp/cache");
        assert_eq!(config.path, PathBuf::from("/tmp/cache"));
        assert_eq!(config.schema_version, DEFAULT_SCHEMA_VERSION);
        assert_eq!(config.max_bytes, DEFAULT_DISK_MAX_BYTES);
    }

    #[test]
    fn test_memory_config_default() {
        let config = MemoryConfig::default();
        assert_eq!(config.max_units, DEFAULT_MEMORY_MAX_UNITS);
        assert_eq!(config.mode, SizeMode::BySize);
    }
}
