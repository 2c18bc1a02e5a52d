//! In-memory index over one frame file.
//!
//! An [`IndexSummary`] maps a key hash to the offset of the most recent
//! frame for that hash inside its owning file (commitlog or data file).
//! Within a single file the last append wins; the summary also preserves
//! insertion order so compaction can enumerate a file's write history.
//!
//! On disk a summary is a sequence of [`IndexEntry`] frames; a data
//! file's index-kind file is written from the summary at rotation and
//! loaded back by a full sequential scan.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;

use crate::record::RecordStatus;
use crate::stream::{self, FrameIter, StreamError};

/// Locates one record inside its owning file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct IndexEntry {
    /// Hash of the record's key.
    pub key_hash: u32,

    /// Status of the located record.
    pub status: RecordStatus,

    /// Starting offset of the record frame.
    pub offset: i64,

    /// Timestamp of the located record.
    pub timestamp: u64,
}

/// Mapping from key hash to the newest [`IndexEntry`] for that hash,
/// preserving first-insertion order for enumeration.
#[derive(Debug, Default)]
pub struct IndexSummary {
    /// Position of each hash inside `entries`.
    slots: HashMap<u32, usize>,
    /// Entries in insertion order; replaced in place on duplicate hash.
    entries: Vec<IndexEntry>,
}

impl IndexSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry, replacing any prior entry for the same hash
    /// (last-write-wins within one file).
    pub fn add(&mut self, entry: IndexEntry) {
        match self.slots.get(&entry.key_hash) {
            Some(&pos) => self.entries[pos] = entry,
            None => {
                self.slots.insert(entry.key_hash, self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    pub fn look_up(&self, key_hash: u32) -> Option<&IndexEntry> {
        self.slots.get(&key_hash).map(|&pos| &self.entries[pos])
    }

    pub fn contains(&self, key_hash: u32) -> bool {
        self.slots.contains_key(&key_hash)
    }

    pub fn count(&self) -> u64 {
        self.entries.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Writes every entry as a frame, in insertion order.
    pub fn write_to(&self, writer: &mut impl Write) -> Result<(), StreamError> {
        for entry in &self.entries {
            let frame = stream::encode_frame(entry)?;
            writer.write_all(&frame)?;
        }
        Ok(())
    }

    /// Rebuilds a summary by sequentially scanning an index file from
    /// offset 0.
    pub fn read_from(file: File) -> Result<Self, StreamError> {
        let mut summary = Self::new();
        for item in FrameIter::new(file)? {
            let (_, frame) = item?;
            summary.add(stream::decode_frame::<IndexEntry>(&frame)?);
        }
        Ok(summary)
    }
}
