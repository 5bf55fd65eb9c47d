//! SSTable Module
//!
//! Immutable, sorted, on-disk table segments.
//!
//! ## Files of One Segment
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ <table>-<gen>-Data.db                                   │
//! │   [disk key][record body]  ... one per key, sorted      │
//! ├─────────────────────────────────────────────────────────┤
//! │ <table>-<gen>-Index.db                                  │
//! │   [disk key][data offset: i64]  ... one per key         │
//! ├─────────────────────────────────────────────────────────┤
//! │ <table>-<gen>-Filter.db                                 │
//! │   serialized bloom filter over every disk key           │
//! └─────────────────────────────────────────────────────────┘
//! ```
//! While a segment is being written every name carries `-tmp-`; the
//! finalize step strips it (index, then filter, then data).

mod bloom;
mod descriptor;
mod format;
mod key_cache;
mod reader;
mod rename;
mod writer;

pub use bloom::BloomFilter;
pub use descriptor::{Component, Descriptor};
pub use key_cache::KeyCache;
pub use reader::{SSTableIterator, SSTableReader};
pub use rename::{recover_directory, rename_and_open, rename_to_permanent, RecoveryReport};
pub use writer::SSTableWriter;

use crate::partitioner::DecoratedKey;

/// Token marking the files of a segment that is still being written
pub const TEMPFILE_MARKER: &str = "tmp";

/// A sparse index sample: a key and the offset of its entry in the index file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPosition {
    pub key: DecoratedKey,
    pub position: u64,
}

impl KeyPosition {
    pub fn new(key: DecoratedKey, position: u64) -> Self {
        Self { key, position }
    }
}
