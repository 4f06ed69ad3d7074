//! Cache Statistics Module
//!
//! Hit/miss/eviction counters for the memory tier, exposed for
//! observability callers.

use serde::Serialize;

// == Cache Stats ==
/// Memory tier performance counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Successful reads served from the tier
    pub hits: u64,
    /// Reads that missed (absent, expired, or wrong value kind)
    pub misses: u64,
    /// Entries evicted to make space
    pub evictions: u64,
    /// Current number of resident entries
    pub entries: usize,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// hits / (hits + misses), or 0.0 before any read.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }
}
