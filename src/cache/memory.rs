//! Memory Tier Module
//!
//! Typed facade over the timed LRU container. Supports two size-accounting
//! modes and never blocks on I/O, so the tier lock is only ever held for
//! in-memory work.

use std::sync::Mutex;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::cache::entry::Expiry;
use crate::cache::stats::CacheStats;
use crate::cache::timed_lru::{SizeFn, TimedLru};
use crate::cache::value::{CacheValue, ImageData};
use crate::cache::MAX_KEY_LENGTH;
use crate::config::SizeMode;

// == Inner State ==
struct Inner {
    lru: TimedLru<String, CacheValue>,
    stats: CacheStats,
    mode: SizeMode,
}

// == Memory Tier ==
/// Bounded in-memory cache tier with TTL expiry and LRU eviction.
///
/// All operations are serialized by a single internal lock. Under
/// [`SizeMode::ByCount`] image values are not retained here; large decoded
/// images counted as one unit each would grow memory without bound.
pub struct MemoryTier {
    inner: Mutex<Inner>,
    max_units: u64,
}

impl MemoryTier {
    // == Constructor ==
    /// Creates a memory tier bounded at `max_units` (bytes under `BySize`,
    /// entries under `ByCount`).
    pub fn new(max_units: u64, mode: SizeMode) -> Self {
        let mut lru = TimedLru::new(max_units, size_fn_for(mode));
        lru.set_removal_hook(Box::new(|evicted, key: &String, value: &CacheValue, _new| {
            // Resource release point: the value is dropped when the caller
            // discards it; images are worth tracing because of their size
            if value.is_image() {
                debug!(key, evicted, "image buffer released from memory tier");
            }
        }));
        Self {
            inner: Mutex::new(Inner {
                lru,
                stats: CacheStats::new(),
                mode,
            }),
            max_units,
        }
    }

    // == Put ==
    /// Stores a value with an optional TTL (`None` = never expires).
    ///
    /// Invalid keys and, under `ByCount`, image values are skipped with a
    /// log instead of an error; the memory tier is best-effort by design.
    pub fn put(&self, key: &str, value: CacheValue, ttl: Option<Duration>) {
        self.put_with_expiry(key, value, Expiry::from_ttl(ttl));
    }

    /// Stores a value with an already-resolved absolute expiry. Used by the
    /// orchestrator to promote persistent records without restarting their
    /// lifetime.
    pub(crate) fn put_with_expiry(&self, key: &str, value: CacheValue, expires_at: Expiry) {
        if !valid_key(key) {
            warn!(key, "memory put skipped, invalid key");
            return;
        }
        let mut inner = self.lock();
        if value.is_image() && inner.mode == SizeMode::ByCount {
            debug!(key, "image not retained in memory under ByCount mode");
            return;
        }
        inner.lru.put_with_expiry(key.to_string(), value, expires_at);
        self.sync_entry_stats(&mut inner);
    }

    // == Get ==
    /// Returns a clone of the stored value, or None if absent, expired, or
    /// never stored.
    pub fn get(&self, key: &str) -> Option<CacheValue> {
        self.get_match(key, |value| Some(value.clone()))
    }

    /// Typed read: returns the stored text, or None on a miss or when the
    /// resident value has a different kind.
    pub fn get_text(&self, key: &str) -> Option<String> {
        self.get_match(key, |value| match value {
            CacheValue::Text(s) => Some(s.clone()),
            _ => None,
        })
    }

    /// Typed read for raw byte blobs.
    pub fn get_bytes(&self, key: &str) -> Option<Vec<u8>> {
        self.get_match(key, |value| match value {
            CacheValue::Bytes(b) => Some(b.clone()),
            _ => None,
        })
    }

    /// Typed read for structured records.
    pub fn get_record(&self, key: &str) -> Option<serde_json::Value> {
        self.get_match(key, |value| match value {
            CacheValue::Record(v) => Some(v.clone()),
            _ => None,
        })
    }

    /// Typed read for image buffers.
    pub fn get_image(&self, key: &str) -> Option<ImageData> {
        self.get_match(key, |value| match value {
            CacheValue::Image(img) => Some(img.clone()),
            _ => None,
        })
    }

    /// Typed read for generic objects, deserialized from their stored
    /// binary form. A decode failure (wrong type requested) is a miss.
    pub fn get_object<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_match(key, |value| match value {
            CacheValue::Object(bytes) => match bincode::deserialize(bytes) {
                Ok(decoded) => Some(decoded),
                Err(e) => {
                    debug!(key, error = %e, "stored object does not decode as requested type");
                    None
                }
            },
            _ => None,
        })
    }

    /// Shared typed-read path: a present, unexpired value that the matcher
    /// rejects (kind mismatch) counts as a miss.
    fn get_match<T>(&self, key: &str, matcher: impl FnOnce(&CacheValue) -> Option<T>) -> Option<T> {
        let mut inner = self.lock();
        let matched = inner.lru.get(&key.to_string()).and_then(matcher);
        if matched.is_some() {
            inner.stats.record_hit();
        } else {
            inner.stats.record_miss();
        }
        self.sync_entry_stats(&mut inner);
        matched
    }

    // == Remove ==
    /// Removes a key; no-op if absent.
    pub fn remove(&self, key: &str) {
        let mut inner = self.lock();
        inner.lru.remove(&key.to_string());
        self.sync_entry_stats(&mut inner);
    }

    // == Evict All ==
    /// Removes every entry, releasing resources exactly as natural
    /// eviction would.
    pub fn evict_all(&self) {
        let mut inner = self.lock();
        inner.lru.evict_all();
        self.sync_entry_stats(&mut inner);
    }

    // == Size Mode ==
    /// Current size-accounting mode.
    pub fn size_mode(&self) -> SizeMode {
        self.lock().mode
    }

    /// Switches the size-accounting mode, evicting all current entries
    /// first: changing the meaning of "size" invalidates their accounting.
    pub fn set_size_mode(&self, mode: SizeMode) {
        let mut inner = self.lock();
        if inner.mode == mode {
            return;
        }
        inner.mode = mode;
        inner.lru.set_size_fn(size_fn_for(mode));
        self.sync_entry_stats(&mut inner);
    }

    // == Size ==
    /// Occupied size in accounting units.
    pub fn occupied(&self) -> u64 {
        self.lock().lru.occupied()
    }

    /// Maximum size in accounting units.
    pub fn capacity(&self) -> u64 {
        self.max_units
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.lock().lru.len()
    }

    /// Returns true if the tier holds no entries.
    pub fn is_empty(&self) -> bool {
        self.lock().lru.is_empty()
    }

    // == Stats ==
    /// Snapshot of the tier's performance counters.
    pub fn stats(&self) -> CacheStats {
        self.lock().stats.clone()
    }

    fn sync_entry_stats(&self, inner: &mut Inner) {
        inner.stats.entries = inner.lru.len();
        inner.stats.evictions = inner.lru.evictions();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for MemoryTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTier")
            .field("max_units", &self.max_units)
            .finish()
    }
}

/// Size function for the given accounting mode.
fn size_fn_for(mode: SizeMode) -> SizeFn<String, CacheValue> {
    match mode {
        SizeMode::BySize => Box::new(|_, value| value.size_units()),
        SizeMode::ByCount => Box::new(|_, _| 1),
    }
}

/// Keys must be non-empty and within the length limit.
fn valid_key(key: &str) -> bool {
    !key.is_empty() && key.len() <= MAX_KEY_LENGTH
}
