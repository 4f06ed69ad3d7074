//! Error types for the cache
//!
//! Provides unified error handling using thiserror.
//!
//! Errors surface to callers only at construction time (invalid directory,
//! unreadable store). During normal operation the tiers convert every
//! internal failure into a miss or a skipped write and log it instead.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// I/O failure in the persistent store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Value could not be encoded for storage
    #[error("Encode failed: {0}")]
    Encode(String),

    /// Stored bytes could not be decoded back into a value
    #[error("Decode failed: {0}")]
    Decode(String),

    /// Encrypt or decrypt transform failed
    #[error("Cipher error: {0}")]
    Cipher(String),

    /// Invalid construction-time configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
