//! Layered Cache Module
//!
//! Composes the memory and persistent tiers behind one typed surface with
//! read-through and write-through semantics:
//!
//! - read: memory hit returns immediately; a memory miss falls through to
//!   disk and, on a hit, repopulates memory with the record's remaining
//!   lifetime before returning
//! - write: both tiers, independently; a failed disk write degrades
//!   silently while the memory copy stays valid for this process
//!
//! Per-call `encrypt` overrides the cache-wide default; the optional key
//! hint is forwarded to the cipher provider on every transform.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::cache::disk::DiskTier;
use crate::cache::memory::MemoryTier;
use crate::cache::stats::CacheStats;
use crate::cache::value::{CacheValue, ImageData};
use crate::config::SizeMode;

// == Layered Cache ==
/// Two-tier cache: fast bounded memory in front of a larger bounded
/// persistent store.
pub struct LayeredCache {
    memory: Arc<MemoryTier>,
    disk: Arc<DiskTier>,
    /// Applied when a call passes `encrypt = None`
    default_encrypt: bool,
    /// Key hint forwarded to the cipher provider
    key_hint: Option<String>,
}

impl LayeredCache {
    // == Constructor ==
    /// Composes a cache over already-constructed tiers. Tiers are shared;
    /// use a [`crate::Registry`] to avoid two stores over one directory.
    pub fn new(
        memory: Arc<MemoryTier>,
        disk: Arc<DiskTier>,
        default_encrypt: bool,
        key_hint: Option<String>,
    ) -> Self {
        Self {
            memory,
            disk,
            default_encrypt,
            key_hint,
        }
    }

    fn resolve_encrypt(&self, encrypt: Option<bool>) -> bool {
        encrypt.unwrap_or(self.default_encrypt)
    }

    fn hint(&self) -> Option<&str> {
        self.key_hint.as_deref()
    }

    // == String ==
    /// Reads a string value through both tiers.
    pub fn get_string(&self, key: &str, encrypt: Option<bool>) -> Option<String> {
        if let Some(value) = self.memory.get_text(key) {
            return Some(value);
        }
        let decrypt = self.resolve_encrypt(encrypt);
        let (payload, expiry) = self.disk.get_raw(key, decrypt, self.hint())?;
        match String::from_utf8(payload) {
            Ok(text) => {
                self.memory
                    .put_with_expiry(key, CacheValue::Text(text.clone()), expiry);
                Some(text)
            }
            Err(e) => {
                warn!(key, error = %e, "persisted payload is not valid UTF-8");
                None
            }
        }
    }

    /// Writes a string value through both tiers.
    pub fn put_string(&self, key: &str, value: &str, ttl: Option<Duration>, encrypt: Option<bool>) {
        self.memory
            .put(key, CacheValue::Text(value.to_string()), ttl);
        self.disk
            .put_string(key, value, ttl, self.resolve_encrypt(encrypt), self.hint());
    }

    // == Bytes ==
    /// Reads a raw byte blob through both tiers.
    pub fn get_bytes(&self, key: &str, encrypt: Option<bool>) -> Option<Vec<u8>> {
        if let Some(value) = self.memory.get_bytes(key) {
            return Some(value);
        }
        let decrypt = self.resolve_encrypt(encrypt);
        let (payload, expiry) = self.disk.get_raw(key, decrypt, self.hint())?;
        self.memory
            .put_with_expiry(key, CacheValue::Bytes(payload.clone()), expiry);
        Some(payload)
    }

    /// Writes a raw byte blob through both tiers.
    pub fn put_bytes(&self, key: &str, value: &[u8], ttl: Option<Duration>, encrypt: Option<bool>) {
        self.memory.put(key, CacheValue::Bytes(value.to_vec()), ttl);
        self.disk
            .put_bytes(key, value, ttl, self.resolve_encrypt(encrypt), self.hint());
    }

    // == Record ==
    /// Reads a structured record through both tiers.
    pub fn get_record(&self, key: &str, encrypt: Option<bool>) -> Option<serde_json::Value> {
        if let Some(value) = self.memory.get_record(key) {
            return Some(value);
        }
        let decrypt = self.resolve_encrypt(encrypt);
        let (payload, expiry) = self.disk.get_raw(key, decrypt, self.hint())?;
        match serde_json::from_slice::<serde_json::Value>(&payload) {
            Ok(record) => {
                self.memory
                    .put_with_expiry(key, CacheValue::Record(record.clone()), expiry);
                Some(record)
            }
            Err(e) => {
                warn!(key, error = %e, "persisted payload is not a valid record");
                None
            }
        }
    }

    /// Writes a structured record through both tiers.
    pub fn put_record(
        &self,
        key: &str,
        record: &serde_json::Value,
        ttl: Option<Duration>,
        encrypt: Option<bool>,
    ) {
        self.memory.put(key, CacheValue::Record(record.clone()), ttl);
        self.disk
            .put_record(key, record, ttl, self.resolve_encrypt(encrypt), self.hint());
    }

    // == Image ==
    /// Reads an image through both tiers.
    ///
    /// Under `ByCount` accounting the memory tier does not hold images; any
    /// stale memory slot for the key is dropped and the read is served from
    /// disk without promotion.
    pub fn get_image(&self, key: &str, encrypt: Option<bool>) -> Option<ImageData> {
        let promote = self.memory.size_mode() == SizeMode::BySize;
        if promote {
            if let Some(image) = self.memory.get_image(key) {
                return Some(image);
            }
        } else {
            self.memory.remove(key);
        }

        let decrypt = self.resolve_encrypt(encrypt);
        let (payload, expiry) = self.disk.get_raw(key, decrypt, self.hint())?;
        match ImageData::decode(&payload) {
            Ok(image) => {
                if promote {
                    self.memory
                        .put_with_expiry(key, CacheValue::Image(image.clone()), expiry);
                }
                Some(image)
            }
            Err(e) => {
                warn!(key, error = %e, "persisted payload is not a canonical bitmap");
                None
            }
        }
    }

    /// Writes an image through both tiers; the memory tier itself skips the
    /// copy under `ByCount` accounting.
    pub fn put_image(
        &self,
        key: &str,
        image: &ImageData,
        ttl: Option<Duration>,
        encrypt: Option<bool>,
    ) {
        self.memory.put(key, CacheValue::Image(image.clone()), ttl);
        self.disk
            .put_image(key, image, ttl, self.resolve_encrypt(encrypt), self.hint());
    }

    // == Object ==
    /// Reads a generic serialized object through both tiers. A wrong
    /// requested type reads as a miss.
    pub fn get_object<T: DeserializeOwned>(&self, key: &str, encrypt: Option<bool>) -> Option<T> {
        if let Some(value) = self.memory.get_object(key) {
            return Some(value);
        }
        let decrypt = self.resolve_encrypt(encrypt);
        let (payload, expiry) = self.disk.get_raw(key, decrypt, self.hint())?;
        match bincode::deserialize::<T>(&payload) {
            Ok(decoded) => {
                self.memory
                    .put_with_expiry(key, CacheValue::Object(payload), expiry);
                Some(decoded)
            }
            Err(e) => {
                warn!(key, error = %e, "persisted object does not decode as requested type");
                None
            }
        }
    }

    /// Writes a generic object through both tiers, serialized once.
    pub fn put_object<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
        encrypt: Option<bool>,
    ) {
        let payload = match bincode::serialize(value) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(key, error = %e, "object encode failed, write skipped");
                return;
            }
        };
        self.memory.put(key, CacheValue::Object(payload.clone()), ttl);
        self.disk
            .put_bytes(key, &payload, ttl, self.resolve_encrypt(encrypt), self.hint());
    }

    // == Remove ==
    /// Removes a key from both tiers.
    pub fn remove(&self, key: &str) {
        self.remove_from_memory(key);
        self.remove_from_disk(key);
    }

    /// Removes a key from the memory tier only.
    pub fn remove_from_memory(&self, key: &str) {
        self.memory.remove(key);
    }

    /// Removes a key from the persistent tier only.
    pub fn remove_from_disk(&self, key: &str) {
        self.disk.remove(key);
    }

    // == Evict ==
    /// Clears both tiers.
    pub fn evict_all(&self) {
        self.evict_memory_all();
        self.evict_disk_all();
    }

    /// Clears the memory tier only.
    pub fn evict_memory_all(&self) {
        self.memory.evict_all();
    }

    /// Clears the persistent tier only.
    pub fn evict_disk_all(&self) {
        self.disk.evict_all();
    }

    // == Size ==
    /// Occupied memory tier size in accounting units.
    pub fn memory_size(&self) -> u64 {
        self.memory.occupied()
    }

    /// Occupied persistent tier size in bytes.
    pub fn disk_size(&self) -> u64 {
        self.disk.occupied_bytes()
    }

    /// Memory tier capacity in accounting units.
    pub fn memory_max_size(&self) -> u64 {
        self.memory.capacity()
    }

    /// Persistent tier capacity in bytes.
    pub fn disk_max_size(&self) -> u64 {
        self.disk.capacity_bytes()
    }

    // == Stats ==
    /// Memory tier performance counters.
    pub fn memory_stats(&self) -> CacheStats {
        self.memory.stats()
    }

    // == Tiers ==
    /// The composed memory tier.
    pub fn memory(&self) -> &Arc<MemoryTier> {
        &self.memory
    }

    /// The composed persistent tier.
    pub fn disk(&self) -> &Arc<DiskTier> {
        &self.disk
    }
}

impl std::fmt::Debug for LayeredCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayeredCache")
            .field("memory", &self.memory)
            .field("disk", &self.disk)
            .field("default_encrypt", &self.default_encrypt)
            .finish()
    }
}
