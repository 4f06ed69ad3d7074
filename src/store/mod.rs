//! Persistent Record Store Module
//!
//! Log-structured store collaborator behind the persistent tier. Records are
//! keyed by a digest string and hold a fixed number of byte channels that
//! commit atomically through an edit session:
//!
//! - `open(dir, schema_version, channel_count, max_bytes)` - schema bumps
//!   invalidate the prior on-disk generation
//! - `get(key)` - snapshot of all channels, or absent
//! - `edit(key)` - exclusive editor with `set` / `commit` / `abort`
//! - `remove(key)`, `wipe()`, `total_bytes()`, `max_bytes()`
//!
//! The store LRU-evicts committed records once their total size exceeds the
//! configured bound.

mod fs;

pub use fs::{Editor, FsStore, Snapshot};
