//! Timed LRU Container Module
//!
//! Generic bounded map ordered by recency of use, with an absolute expiry
//! deadline attached to every entry. This is the storage engine behind the
//! memory tier.
//!
//! The container itself is not synchronized; the owning tier serializes all
//! access through a single lock. The removal hook therefore runs while that
//! lock is held and must be fast and non-blocking.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use crate::cache::entry::Expiry;
use crate::cache::lru::LruTracker;

/// Computes an entry's size in the tier's accounting units. Called once at
/// insertion time; an entry's size never changes while it is resident.
pub type SizeFn<K, V> = Box<dyn Fn(&K, &V) -> u64 + Send>;

/// Runs once whenever an entry leaves the container.
///
/// Arguments: `(evicted, key, old_value, new_value)`. `evicted` is true for
/// removals that free space (capacity eviction and `evict_all`), false for
/// explicit removal and replacement. `new_value` is the replacing value when
/// the removal was caused by a `put`.
pub type RemovalHook<K, V> = Box<dyn Fn(bool, &K, &V, Option<&V>) + Send>;

// == Timed Entry ==
/// A resident value with its lifetime and size bookkeeping.
#[derive(Debug)]
struct TimedEntry<V> {
    value: V,
    expires_at: Expiry,
    size_units: u64,
}

// == Timed LRU ==
/// Bounded recency-ordered map with per-entry expiry.
pub struct TimedLru<K, V> {
    /// Key-value storage with lifetime metadata
    entries: HashMap<K, TimedEntry<V>>,
    /// Recency-of-use tracker
    lru: LruTracker<K>,
    /// Sum of resident entry sizes
    occupied: u64,
    /// Maximum occupancy in size units
    max_size: u64,
    /// Size-accounting function
    size_of: SizeFn<K, V>,
    /// Resource-release hook, runs for every departing entry
    on_remove: Option<RemovalHook<K, V>>,
    /// Count of capacity evictions
    evictions: u64,
}

impl<K: Eq + Hash + Clone, V> TimedLru<K, V> {
    // == Constructor ==
    /// Creates a container bounded at `max_size` units, accounted by
    /// `size_of`.
    pub fn new(max_size: u64, size_of: SizeFn<K, V>) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            occupied: 0,
            max_size,
            size_of,
            on_remove: None,
            evictions: 0,
        }
    }

    /// Installs the removal hook invoked for every departing entry.
    pub fn set_removal_hook(&mut self, hook: RemovalHook<K, V>) {
        self.on_remove = Some(hook);
    }

    /// Replaces the size-accounting function.
    ///
    /// Changing the meaning of "size" invalidates all existing accounting,
    /// so every resident entry is evicted first.
    pub fn set_size_fn(&mut self, size_of: SizeFn<K, V>) {
        self.evict_all();
        self.size_of = size_of;
    }

    // == Put ==
    /// Inserts or replaces an entry, resolving `ttl` against the current
    /// time (`None` = never expires). Returns the replaced value, if any.
    ///
    /// If the new total exceeds the capacity, least-recently-used entries
    /// other than the one just inserted are evicted until it fits. A single
    /// entry larger than the whole capacity is kept and occupies the
    /// container alone.
    pub fn put(&mut self, key: K, value: V, ttl: Option<Duration>) -> Option<V> {
        self.put_with_expiry(key, value, Expiry::from_ttl(ttl))
    }

    /// Inserts or replaces an entry with an already-resolved deadline. Used
    /// when promoting a persisted record so its absolute expiry carries over.
    pub fn put_with_expiry(&mut self, key: K, value: V, expires_at: Expiry) -> Option<V> {
        let size_units = (self.size_of)(&key, &value);

        // Replacement: release the old value first
        let previous = match self.entries.remove(&key) {
            Some(old) => {
                self.occupied -= old.size_units;
                if let Some(hook) = &self.on_remove {
                    hook(false, &key, &old.value, Some(&value));
                }
                Some(old.value)
            }
            None => None,
        };

        self.entries.insert(
            key.clone(),
            TimedEntry {
                value,
                expires_at,
                size_units,
            },
        );
        self.occupied += size_units;
        self.lru.touch(&key);

        self.trim(&key);
        previous
    }

    // == Get ==
    /// Returns the value for `key` if present and not expired, refreshing
    /// its recency. A lazily-discovered expired entry is removed as a side
    /// effect and reported as absent.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let expired = match self.entries.get(key) {
            None => return None,
            Some(entry) => entry.expires_at.is_expired(),
        };

        if expired {
            self.remove(key);
            return None;
        }

        self.lru.touch(key);
        self.entries.get(key).map(|entry| &entry.value)
    }

    // == Remove ==
    /// Removes an entry and its lifetime bookkeeping; no-op if absent.
    /// Returns the removed value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let entry = self.entries.remove(key)?;
        self.occupied -= entry.size_units;
        self.lru.remove(key);
        if let Some(hook) = &self.on_remove {
            hook(false, key, &entry.value, None);
        }
        Some(entry.value)
    }

    // == Evict All ==
    /// Removes every entry, running the removal hook for each one exactly
    /// as capacity eviction would.
    pub fn evict_all(&mut self) {
        if let Some(hook) = &self.on_remove {
            for (key, entry) in self.entries.iter() {
                hook(true, key, &entry.value, None);
            }
        }
        self.entries.clear();
        self.lru.clear();
        self.occupied = 0;
    }

    // == Trim ==
    /// Evicts least-recently-used entries until occupancy fits the
    /// capacity, never evicting `protect` (the entry just inserted).
    fn trim(&mut self, protect: &K) {
        while self.occupied > self.max_size {
            let victim = match self.lru.peek_oldest() {
                Some(oldest) if oldest != protect => oldest.clone(),
                _ => break,
            };
            if let Some(entry) = self.entries.remove(&victim) {
                self.occupied -= entry.size_units;
                self.evictions += 1;
                if let Some(hook) = &self.on_remove {
                    hook(true, &victim, &entry.value, None);
                }
            }
            self.lru.remove(&victim);
        }
    }

    // == Accessors ==
    /// Sum of resident entry sizes in accounting units.
    pub fn occupied(&self) -> u64 {
        self.occupied
    }

    /// Maximum occupancy in accounting units.
    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Total capacity evictions since construction.
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    /// Returns true if no entries are resident.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> std::fmt::Debug for TimedLru<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimedLru")
            .field("len", &self.entries.len())
            .field("occupied", &self.occupied)
            .field("max_size", &self.max_size)
            .finish()
    }
}
