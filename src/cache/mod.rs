//! Cache Module
//!
//! Everything cache-shaped lives here: expiry bookkeeping, the LRU
//! ordering primitive, the bounded timed container, the typed value model,
//! the two tiers, and the layered composition over them.

pub mod disk;
pub mod entry;
pub(crate) mod lru;
pub mod layered;
pub mod memory;
pub mod stats;
pub mod timed_lru;
pub mod value;


pub use disk::DiskTier;
pub use entry::Expiry;
pub use layered::LayeredCache;
pub use memory::MemoryTier;
pub use stats::CacheStats;
pub use timed_lru::TimedLru;
pub use value::{CacheValue, ImageData};

/// Longest accepted cache key, in bytes. Longer keys are rejected at the
/// tier boundaries rather than truncated.
pub const MAX_KEY_LENGTH: usize = 256;
