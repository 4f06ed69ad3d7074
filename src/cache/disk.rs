//! Persistent Tier Module
//!
//! Wraps the record store with per-entry lifetime metadata and optional
//! stream encryption. Each logical key maps to one record with two
//! channels: channel 0 holds the (possibly encrypted) payload, channel 1
//! the expiry deadline as plaintext decimal text.
//!
//! Failure policy: reads degrade to a miss, writes abort the edit and keep
//! the prior record; neither lets a store or cipher error escape the tier.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::cache::entry::Expiry;
use crate::cache::value::ImageData;
use crate::cache::MAX_KEY_LENGTH;
use crate::config::DiskConfig;
use crate::encrypt::CipherProvider;
use crate::error::Result;
use crate::store::FsStore;

/// Record channel holding the payload bytes.
const PAYLOAD_CHANNEL: usize = 0;
/// Record channel holding the expiry deadline text.
const EXPIRY_CHANNEL: usize = 1;
/// Channels per record.
const CHANNEL_COUNT: usize = 2;

// == Disk Tier ==
/// Bounded persistent cache tier with TTL metadata and encryption at rest.
pub struct DiskTier {
    store: Arc<FsStore>,
    cipher: Option<Arc<dyn CipherProvider>>,
}

impl DiskTier {
    // == Open ==
    /// Opens the tier's store, creating the directory if absent. A bumped
    /// `schema_version` invalidates all prior on-disk entries.
    ///
    /// Without a cipher provider, encryption requests are ignored and
    /// payloads are stored as raw bytes.
    pub fn open(config: &DiskConfig, cipher: Option<Arc<dyn CipherProvider>>) -> Result<Self> {
        let store = FsStore::open(
            &config.path,
            config.schema_version,
            CHANNEL_COUNT,
            config.max_bytes,
        )?;
        Ok(Self {
            store: Arc::new(store),
            cipher,
        })
    }

    // == Raw Get ==
    /// Looks up the payload and its expiry for a logical key.
    ///
    /// An expired record is removed and reported absent. Decode and cipher
    /// failures read as a miss (fail closed), never as an error.
    pub(crate) fn get_raw(
        &self,
        key: &str,
        decrypt: bool,
        hint: Option<&str>,
    ) -> Option<(Vec<u8>, Expiry)> {
        if !valid_key(key) {
            warn!(key, "disk get skipped, invalid key");
            return None;
        }

        let digest = digest(key);
        let snapshot = self.store.get(&digest)?;

        let expiry_text = String::from_utf8_lossy(snapshot.channel(EXPIRY_CHANNEL)).into_owned();
        let Some(expiry) = Expiry::parse_channel_text(&expiry_text) else {
            warn!(key, "corrupt expiry metadata, dropping record");
            self.store.remove(&digest);
            return None;
        };

        if expiry.is_expired() {
            debug!(key, "record expired, removing");
            self.store.remove(&digest);
            return None;
        }

        let payload = snapshot.channel(PAYLOAD_CHANNEL).to_vec();
        let payload = match (&self.cipher, decrypt) {
            (Some(cipher), true) => match cipher.decrypt(hint, &payload) {
                Ok(plaintext) => plaintext,
                Err(e) => {
                    warn!(key, error = %e, "decrypt failed, treating as miss");
                    return None;
                }
            },
            _ => payload,
        };

        Some((payload, expiry))
    }

    // == Get Bytes ==
    /// Raw byte read; all typed reads funnel through here.
    pub fn get_bytes(&self, key: &str, decrypt: bool, hint: Option<&str>) -> Option<Vec<u8>> {
        self.get_raw(key, decrypt, hint).map(|(payload, _)| payload)
    }

    // == Put Bytes ==
    /// Writes payload and expiry together; all typed writes funnel through
    /// here. On any failure the edit aborts, leaving the prior record (if
    /// any) intact.
    pub fn put_bytes(
        &self,
        key: &str,
        payload: &[u8],
        ttl: Option<Duration>,
        encrypt: bool,
        hint: Option<&str>,
    ) {
        if !valid_key(key) {
            warn!(key, "disk put skipped, invalid key");
            return;
        }

        let digest = digest(key);
        let Some(mut editor) = self.store.edit(&digest) else {
            warn!(key, "disk put skipped, concurrent edit in progress");
            return;
        };

        let stored = match (&self.cipher, encrypt) {
            (Some(cipher), true) => match cipher.encrypt(hint, payload) {
                Ok(ciphertext) => ciphertext,
                Err(e) => {
                    warn!(key, error = %e, "encrypt failed, aborting write");
                    editor.abort();
                    return;
                }
            },
            _ => payload.to_vec(),
        };

        let expiry = Expiry::from_ttl(ttl);
        if editor.set(PAYLOAD_CHANNEL, stored).is_err()
            || editor
                .set(EXPIRY_CHANNEL, expiry.as_channel_text().into_bytes())
                .is_err()
        {
            editor.abort();
            return;
        }
        if let Err(e) = editor.commit() {
            warn!(key, error = %e, "disk write failed, prior record kept");
        }
    }

    // == Typed Helpers ==
    /// Reads a UTF-8 string value.
    pub fn get_string(&self, key: &str, decrypt: bool, hint: Option<&str>) -> Option<String> {
        let payload = self.get_bytes(key, decrypt, hint)?;
        match String::from_utf8(payload) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(key, error = %e, "stored payload is not valid UTF-8");
                None
            }
        }
    }

    /// Writes a UTF-8 string value.
    pub fn put_string(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
        encrypt: bool,
        hint: Option<&str>,
    ) {
        self.put_bytes(key, value.as_bytes(), ttl, encrypt, hint);
    }

    /// Reads a structured record from its textual interchange form.
    pub fn get_record(
        &self,
        key: &str,
        decrypt: bool,
        hint: Option<&str>,
    ) -> Option<serde_json::Value> {
        let payload = self.get_bytes(key, decrypt, hint)?;
        match serde_json::from_slice(&payload) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(key, error = %e, "stored payload is not a valid record");
                None
            }
        }
    }

    /// Writes a structured record in its textual interchange form.
    pub fn put_record(
        &self,
        key: &str,
        record: &serde_json::Value,
        ttl: Option<Duration>,
        encrypt: bool,
        hint: Option<&str>,
    ) {
        match serde_json::to_vec(record) {
            Ok(payload) => self.put_bytes(key, &payload, ttl, encrypt, hint),
            Err(e) => warn!(key, error = %e, "record encode failed, write skipped"),
        }
    }

    /// Reads an image from its canonical bitmap encoding.
    pub fn get_image(&self, key: &str, decrypt: bool, hint: Option<&str>) -> Option<ImageData> {
        let payload = self.get_bytes(key, decrypt, hint)?;
        match ImageData::decode(&payload) {
            Ok(image) => Some(image),
            Err(e) => {
                warn!(key, error = %e, "stored payload is not a canonical bitmap");
                None
            }
        }
    }

    /// Writes an image in its canonical bitmap encoding.
    pub fn put_image(
        &self,
        key: &str,
        image: &ImageData,
        ttl: Option<Duration>,
        encrypt: bool,
        hint: Option<&str>,
    ) {
        self.put_bytes(key, &image.encode(), ttl, encrypt, hint);
    }

    /// Reads a generic object from its binary object form. A decode failure
    /// (including a wrong requested type) is a miss.
    pub fn get_object<T: DeserializeOwned>(
        &self,
        key: &str,
        decrypt: bool,
        hint: Option<&str>,
    ) -> Option<T> {
        let payload = self.get_bytes(key, decrypt, hint)?;
        match bincode::deserialize(&payload) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                debug!(key, error = %e, "stored object does not decode as requested type");
                None
            }
        }
    }

    /// Writes a generic object in its binary object form.
    pub fn put_object<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
        encrypt: bool,
        hint: Option<&str>,
    ) {
        match bincode::serialize(value) {
            Ok(payload) => self.put_bytes(key, &payload, ttl, encrypt, hint),
            Err(e) => warn!(key, error = %e, "object encode failed, write skipped"),
        }
    }

    // == Remove ==
    /// Removes the record for a logical key; no-op if absent.
    pub fn remove(&self, key: &str) {
        if !valid_key(key) {
            return;
        }
        self.store.remove(&digest(key));
    }

    // == Evict All ==
    /// Wipes every record in the tier.
    pub fn evict_all(&self) {
        if let Err(e) = self.store.wipe() {
            warn!(error = %e, "disk wipe failed");
        }
    }

    // == Size ==
    /// Occupied bytes across all committed records.
    pub fn occupied_bytes(&self) -> u64 {
        self.store.total_bytes()
    }

    /// Configured size bound in bytes.
    pub fn capacity_bytes(&self) -> u64 {
        self.store.max_bytes()
    }
}

impl std::fmt::Debug for DiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskTier")
            .field("max_bytes", &self.store.max_bytes())
            .field("encrypted", &self.cipher.is_some())
            .finish()
    }
}

/// Stable digest of a logical key, used as the store's physical key. The
/// store restricts physical key charset and length; a hex SHA-256 always
/// fits.
fn digest(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// Keys must be non-empty and within the length limit.
fn valid_key(key: &str) -> bool {
    !key.is_empty() && key.len() <= MAX_KEY_LENGTH
}
