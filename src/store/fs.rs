//! File-backed record store.
//!
//! One file per record (`<key>.rec`) framing all channels as
//! length-prefixed segments, plus a `generation` file recording the schema
//! version. Commits stage the whole record to a temp file and publish it
//! with a single atomic rename, so a reader can never observe a
//! half-written record or channels from two different commits. Reads happen
//! outside the store lock; only index mutation is serialized. Per-key edit
//! exclusivity is tracked separately so two editors can never race on the
//! same record.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use tracing::{debug, warn};

use crate::cache::lru::LruTracker;
use crate::error::{CacheError, Result};

/// Name of the file recording the on-disk schema generation.
const GENERATION_FILE: &str = "generation";
/// Suffix of committed record files.
const RECORD_SUFFIX: &str = ".rec";
/// Suffix of staged record files.
const TMP_SUFFIX: &str = "tmp";

// == Snapshot ==
/// Read-only copy of a committed record's channels.
#[derive(Debug)]
pub struct Snapshot {
    channels: Vec<Vec<u8>>,
}

impl Snapshot {
    /// Bytes of the given channel.
    pub fn channel(&self, index: usize) -> &[u8] {
        &self.channels[index]
    }
}

// == Index State ==
#[derive(Debug)]
struct Inner {
    /// Committed record sizes by physical key
    index: HashMap<String, u64>,
    /// Recency order of committed records
    order: LruTracker<String>,
    /// Sum of committed record sizes
    total: u64,
    /// Physical keys with a live editor
    editing: HashSet<String>,
}

// == Fs Store ==
/// Directory-backed record store with atomic per-key commits and LRU
/// eviction of committed records.
#[derive(Debug)]
pub struct FsStore {
    dir: PathBuf,
    schema_version: u32,
    channel_count: usize,
    max_bytes: u64,
    inner: Mutex<Inner>,
}

impl FsStore {
    // == Open ==
    /// Opens (or creates) the store under `dir`.
    ///
    /// A `schema_version` different from the one recorded on disk wipes the
    /// prior generation. Construction failures are fatal and surface to the
    /// caller immediately.
    pub fn open(
        dir: &Path,
        schema_version: u32,
        channel_count: usize,
        max_bytes: u64,
    ) -> Result<Self> {
        if channel_count == 0 {
            return Err(CacheError::Config(
                "store needs at least one channel".to_string(),
            ));
        }
        if max_bytes == 0 {
            return Err(CacheError::Config("max_bytes must be positive".to_string()));
        }

        fs::create_dir_all(dir)?;

        let generation_path = dir.join(GENERATION_FILE);
        let on_disk: Option<u32> = fs::read_to_string(&generation_path)
            .ok()
            .and_then(|text| text.trim().parse().ok());
        if on_disk != Some(schema_version) {
            if on_disk.is_some() {
                debug!(
                    dir = %dir.display(),
                    "schema version changed, wiping prior generation"
                );
            }
            clear_dir(dir)?;
            fs::write(&generation_path, schema_version.to_string())?;
        }

        let mut store = Self {
            dir: dir.to_path_buf(),
            schema_version,
            channel_count,
            max_bytes,
            inner: Mutex::new(Inner {
                index: HashMap::new(),
                order: LruTracker::new(),
                total: 0,
                editing: HashSet::new(),
            }),
        };
        store.rebuild_index()?;
        Ok(store)
    }

    /// Scans the directory and rebuilds the index, ordering records from
    /// oldest to newest by modification time.
    fn rebuild_index(&mut self) -> Result<()> {
        let mut records: Vec<(String, u64, SystemTime)> = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(TMP_SUFFIX) {
                // Staged leftovers from an interrupted commit
                let _ = fs::remove_file(entry.path());
                continue;
            }
            let Some(key) = name.strip_suffix(RECORD_SUFFIX) else {
                continue;
            };

            let meta = entry.metadata()?;
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            records.push((key.to_string(), meta.len(), modified));
        }

        records.sort_by_key(|(_, _, modified)| *modified);

        let inner = self.inner.get_mut().unwrap_or_else(|e| e.into_inner());
        for (key, size, _) in records {
            inner.total += size;
            inner.order.touch(&key);
            inner.index.insert(key, size);
        }
        Ok(())
    }

    // == Get ==
    /// Returns a snapshot of the record's channels, or None if absent or
    /// unreadable. Refreshes the record's recency.
    pub fn get(&self, key: &str) -> Option<Snapshot> {
        {
            let mut inner = self.lock();
            if !inner.index.contains_key(key) {
                return None;
            }
            inner.order.touch(&key.to_string());
        }

        // The read runs outside the lock so reads on unrelated keys do not
        // serialize. Commits publish with one atomic rename, so this sees a
        // complete record from exactly one commit; a concurrent remove or
        // eviction turns the read into a miss.
        let bytes = match fs::read(self.record_path(key)) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key, error = %e, "record unreadable");
                return None;
            }
        };
        match decode_channels(&bytes, self.channel_count) {
            Some(channels) => Some(Snapshot { channels }),
            None => {
                warn!(key, "record framing corrupt");
                None
            }
        }
    }

    // == Edit ==
    /// Opens an exclusive edit session for `key`.
    ///
    /// Returns None while another editor is live for the same key, giving
    /// at-most-one committed writer per key at a time.
    pub fn edit(&self, key: &str) -> Option<Editor<'_>> {
        let mut inner = self.lock();
        if !inner.editing.insert(key.to_string()) {
            return None;
        }
        Some(Editor {
            store: self,
            key: key.to_string(),
            staged: vec![None; self.channel_count],
            finished: false,
        })
    }

    // == Remove ==
    /// Deletes a committed record. Returns false if the record is absent or
    /// currently being edited.
    pub fn remove(&self, key: &str) -> bool {
        let mut inner = self.lock();
        if inner.editing.contains(key) {
            warn!(key, "remove skipped, edit in progress");
            return false;
        }
        let Some(size) = inner.index.remove(key) else {
            return false;
        };
        inner.total -= size;
        inner.order.remove(&key.to_string());
        self.delete_record_file(key);
        true
    }

    // == Wipe ==
    /// Deletes every record, leaving an empty directory with the current
    /// generation marker so later commits survive a reopen.
    pub fn wipe(&self) -> Result<()> {
        let mut inner = self.lock();
        inner.index.clear();
        inner.order.clear();
        inner.total = 0;
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        fs::create_dir_all(&self.dir)?;
        fs::write(self.dir.join(GENERATION_FILE), self.schema_version.to_string())?;
        Ok(())
    }

    // == Size ==
    /// Total size of committed records in bytes.
    pub fn total_bytes(&self) -> u64 {
        self.lock().total
    }

    /// Configured size bound in bytes.
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    // == Internals ==
    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}{RECORD_SUFFIX}"))
    }

    fn tmp_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}{RECORD_SUFFIX}.{TMP_SUFFIX}"))
    }

    fn delete_record_file(&self, key: &str) {
        let _ = fs::remove_file(self.record_path(key));
    }

    /// Commits staged channels for `key`. Runs under the store lock.
    fn commit_record(&self, key: &str, staged: Vec<Vec<u8>>) -> Result<()> {
        let encoded = encode_channels(&staged);
        let new_size = encoded.len() as u64;

        let mut inner = self.lock();
        inner.editing.remove(key);

        fs::create_dir_all(&self.dir)?;

        // Stage the whole record, then publish with one atomic rename so a
        // failure or a concurrent reader can never see mixed channels
        let tmp = self.tmp_path(key);
        if let Err(e) = fs::write(&tmp, &encoded) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        fs::rename(&tmp, self.record_path(key))?;

        let old_size = inner.index.insert(key.to_string(), new_size).unwrap_or(0);
        inner.total = inner.total - old_size + new_size;
        inner.order.touch(&key.to_string());

        self.trim(&mut inner, key);
        Ok(())
    }

    /// Evicts least-recently-used committed records until the total fits,
    /// never evicting the record just committed.
    fn trim(&self, inner: &mut Inner, protect: &str) {
        while inner.total > self.max_bytes {
            let victim = match inner.order.peek_oldest() {
                Some(oldest) if oldest != protect => oldest.clone(),
                _ => break,
            };
            if let Some(size) = inner.index.remove(&victim) {
                inner.total -= size;
            }
            inner.order.remove(&victim);
            self.delete_record_file(&victim);
            debug!(key = %victim, "record evicted for space");
        }
    }

    fn release_edit(&self, key: &str) {
        self.lock().editing.remove(key);
    }
}

// == Editor ==
/// Exclusive edit session for one record.
///
/// Channels are staged in memory; nothing touches the committed record
/// until `commit`. Dropping an editor without committing releases the key.
pub struct Editor<'a> {
    store: &'a FsStore,
    key: String,
    staged: Vec<Option<Vec<u8>>>,
    finished: bool,
}

impl Editor<'_> {
    /// Stages the bytes of one channel.
    pub fn set(&mut self, channel: usize, bytes: Vec<u8>) -> Result<()> {
        let slot = self
            .staged
            .get_mut(channel)
            .ok_or_else(|| CacheError::Config(format!("invalid channel {channel}")))?;
        *slot = Some(bytes);
        Ok(())
    }

    /// Atomically commits all staged channels.
    ///
    /// Every channel must have been staged; otherwise the edit aborts and
    /// the previously committed record (if any) stays valid.
    pub fn commit(mut self) -> Result<()> {
        if self.staged.iter().any(Option::is_none) {
            let key = self.key.clone();
            self.abort_inner();
            return Err(CacheError::Encode(format!(
                "record {key} committed with unset channels"
            )));
        }
        self.finished = true;
        let staged: Vec<Vec<u8>> = self.staged.drain(..).map(|c| c.unwrap_or_default()).collect();
        self.store.commit_record(&self.key, staged)
    }

    /// Abandons the edit, leaving any prior record untouched.
    pub fn abort(mut self) {
        self.abort_inner();
    }

    fn abort_inner(&mut self) {
        if !self.finished {
            self.finished = true;
            self.store.release_edit(&self.key);
        }
    }
}

impl Drop for Editor<'_> {
    fn drop(&mut self) {
        self.abort_inner();
    }
}

/// Frames channels as length-prefixed segments: a little-endian u32 length
/// before each channel's bytes, concatenated in channel order.
fn encode_channels(channels: &[Vec<u8>]) -> Vec<u8> {
    let total: usize = channels.iter().map(|c| 4 + c.len()).sum();
    let mut out = Vec::with_capacity(total);
    for channel in channels {
        out.extend_from_slice(&(channel.len() as u32).to_le_bytes());
        out.extend_from_slice(channel);
    }
    out
}

/// Parses a framed record back into its channels; None if the framing is
/// truncated, oversized, or has the wrong channel count.
fn decode_channels(bytes: &[u8], channel_count: usize) -> Option<Vec<Vec<u8>>> {
    let mut channels = Vec::with_capacity(channel_count);
    let mut offset = 0usize;
    for _ in 0..channel_count {
        let len_bytes = bytes.get(offset..offset + 4)?;
        let mut len_buf = [0u8; 4];
        len_buf.copy_from_slice(len_bytes);
        let len = u32::from_le_bytes(len_buf) as usize;
        offset += 4;
        channels.push(bytes.get(offset..offset + len)?.to_vec());
        offset += len;
    }
    if offset != bytes.len() {
        return None;
    }
    Some(channels)
}

/// Removes every entry under `dir`, keeping the directory itself.
fn clear_dir(dir: &Path) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(entry.path())?;
        } else {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir, version: u32, max_bytes: u64) -> FsStore {
        FsStore::open(dir.path(), version, 2, max_bytes).unwrap()
    }

    fn put_record(store: &FsStore, key: &str, payload: &[u8], meta: &[u8]) {
        let mut editor = store.edit(key).expect("no concurrent edit");
        editor.set(0, payload.to_vec()).unwrap();
        editor.set(1, meta.to_vec()).unwrap();
        editor.commit().unwrap();
    }

    #[test]
    fn test_commit_and_get() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, 1, 1024);

        put_record(&store, "abc", b"payload", b"-1");

        let snapshot = store.get("abc").unwrap();
        assert_eq!(snapshot.channel(0), b"payload");
        assert_eq!(snapshot.channel(1), b"-1");
        // 8 framing bytes + 7 payload + 2 metadata
        assert_eq!(store.total_bytes(), 17);
    }

    #[test]
    fn test_get_absent() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, 1, 1024);
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn test_abort_keeps_prior_record() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, 1, 1024);

        put_record(&store, "abc", b"old", b"-1");

        let mut editor = store.edit("abc").unwrap();
        editor.set(0, b"new".to_vec()).unwrap();
        editor.abort();

        let snapshot = store.get("abc").unwrap();
        assert_eq!(snapshot.channel(0), b"old");
    }

    #[test]
    fn test_commit_with_unset_channel_fails_and_keeps_prior() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, 1, 1024);

        put_record(&store, "abc", b"old", b"-1");

        let mut editor = store.edit("abc").unwrap();
        editor.set(0, b"new".to_vec()).unwrap();
        assert!(editor.commit().is_err());

        assert_eq!(store.get("abc").unwrap().channel(0), b"old");
        // The edit lock was released
        assert!(store.edit("abc").is_some());
    }

    #[test]
    fn test_edit_is_exclusive_per_key() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, 1, 1024);

        let first = store.edit("abc").unwrap();
        assert!(store.edit("abc").is_none(), "second editor must be refused");
        assert!(store.edit("other").is_some(), "other keys are unaffected");
        drop(first);
        assert!(store.edit("abc").is_some(), "drop releases the key");
    }

    #[test]
    fn test_remove() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, 1, 1024);

        put_record(&store, "abc", b"payload", b"-1");
        assert!(store.remove("abc"));
        assert!(!store.remove("abc"));
        assert!(store.get("abc").is_none());
        assert_eq!(store.total_bytes(), 0);
    }

    #[test]
    fn test_lru_eviction_on_commit() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, 1, 50);

        put_record(&store, "a", &[1u8; 10], b"-1"); // 20 bytes framed
        put_record(&store, "b", &[2u8; 10], b"-1"); // 40 bytes total
        store.get("a"); // refresh "a" so "b" is the oldest
        put_record(&store, "c", &[3u8; 10], b"-1"); // 60 -> evict "b"

        assert!(store.get("a").is_some());
        assert!(store.get("b").is_none());
        assert!(store.get("c").is_some());
        assert!(store.total_bytes() <= 50);
    }

    #[test]
    fn test_reopen_rebuilds_index() {
        let dir = TempDir::new().unwrap();
        {
            let store = open_store(&dir, 1, 1024);
            put_record(&store, "abc", b"payload", b"42");
        }

        let reopened = open_store(&dir, 1, 1024);
        let snapshot = reopened.get("abc").unwrap();
        assert_eq!(snapshot.channel(0), b"payload");
        assert_eq!(snapshot.channel(1), b"42");
        assert_eq!(reopened.total_bytes(), 17);
    }

    #[test]
    fn test_schema_bump_wipes_prior_generation() {
        let dir = TempDir::new().unwrap();
        {
            let store = open_store(&dir, 1, 1024);
            put_record(&store, "abc", b"payload", b"-1");
        }

        let bumped = open_store(&dir, 2, 1024);
        assert!(bumped.get("abc").is_none());
        assert_eq!(bumped.total_bytes(), 0);
    }

    #[test]
    fn test_wipe_then_commit_recreates_store() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, 1, 1024);

        put_record(&store, "abc", b"payload", b"-1");
        store.wipe().unwrap();

        assert!(store.get("abc").is_none());
        assert_eq!(store.total_bytes(), 0);

        put_record(&store, "def", b"after", b"-1");
        assert_eq!(store.get("def").unwrap().channel(0), b"after");
    }

    #[test]
    fn test_open_rejects_zero_channels() {
        let dir = TempDir::new().unwrap();
        assert!(FsStore::open(dir.path(), 1, 0, 1024).is_err());
    }

    #[test]
    fn test_corrupt_record_file_reads_as_miss() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, 1, 1024);

        put_record(&store, "abc", b"payload", b"-1");
        fs::write(dir.path().join("abc.rec"), b"\xFF\xFF garbage").unwrap();

        assert!(store.get("abc").is_none());
    }

    #[test]
    fn test_readers_never_see_channels_from_two_commits() {
        use std::sync::Arc;
        use std::thread;

        let dir = TempDir::new().unwrap();
        let store = Arc::new(open_store(&dir, 1, 1024 * 1024));
        // Metadata channel states the payload length, so a snapshot mixing
        // two commits is detectable
        put_record(&store, "hot", &vec![b'x'; 1], b"1");

        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for n in 1..200usize {
                    let mut editor = match store.edit("hot") {
                        Some(editor) => editor,
                        None => continue,
                    };
                    editor.set(0, vec![b'x'; n]).unwrap();
                    editor.set(1, n.to_string().into_bytes()).unwrap();
                    editor.commit().unwrap();
                }
            })
        };

        let mut readers = Vec::new();
        for _ in 0..4 {
            let store = Arc::clone(&store);
            readers.push(thread::spawn(move || {
                for _ in 0..200 {
                    if let Some(snapshot) = store.get("hot") {
                        let stated: usize = String::from_utf8(snapshot.channel(1).to_vec())
                            .unwrap()
                            .parse()
                            .unwrap();
                        assert_eq!(
                            snapshot.channel(0).len(),
                            stated,
                            "channels must come from one commit"
                        );
                    }
                }
            }));
        }

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
