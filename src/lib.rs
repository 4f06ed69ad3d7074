//! # tiercache
//!
//! A two-tier, TTL-aware key/value cache: a bounded in-memory LRU tier in
//! front of a bounded log-structured persistent tier, composed behind one
//! typed read-through/write-through surface.
//!
//! ## Architecture
//!
//! - `cache::timed_lru` - bounded LRU container with per-entry expiry
//! - `cache::memory` - thread-safe memory tier with typed accessors
//! - `store` - durable record store with atomic two-channel commits
//! - `cache::disk` - persistent tier over the store, with optional
//!   payload encryption
//! - `cache::layered` - the two-tier composition
//! - `registry` - process-wide interning of configured instances
//!
//! ## Example
//!
//! ```no_run
//! use tiercache::{Registry, RegistryConfig};
//!
//! # fn main() -> tiercache::Result<()> {
//! let registry = Registry::new(RegistryConfig::with_path("/var/cache/app"));
//! let cache = registry.default_cache("sessions")?;
//!
//! cache.put_string("user:42", "alice", Some(std::time::Duration::from_secs(60)), None);
//! assert_eq!(cache.get_string("user:42", None).as_deref(), Some("alice"));
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod encrypt;
pub mod error;
pub mod registry;
pub mod store;

pub use cache::{
    CacheStats, CacheValue, DiskTier, Expiry, ImageData, LayeredCache, MemoryTier, TimedLru,
    MAX_KEY_LENGTH,
};
pub use config::{DiskConfig, MemoryConfig, RegistryConfig, SizeMode};
pub use encrypt::{AesGcmProvider, CipherProvider, PlainProvider};
pub use error::{CacheError, Result};
pub use registry::Registry;
