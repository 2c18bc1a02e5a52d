//! Immutable sealed data files.
//!
//! A data file is the frozen remains of a rotated commitlog: a directory
//! named by its creation time in nanoseconds (19 decimal digits) holding
//! exactly a data-kind file of record frames, an index-kind file, and a
//! serialized bloom filter. Once sealed, all three are immutable until
//! compaction deletes the directory.
//!
//! Reads go through a memory map of the data file and may be issued from
//! any number of threads concurrently. A corrupted frame surfaces as
//! [`DataFileError::FileCorrupted`]; the engine logs it and falls
//! through to older files — corruption on the read path never crashes
//! the process. Errors while *opening* a data file are fatal to the
//! database open instead: the on-disk state no longer matches the
//! descriptor.

#[cfg(test)]
mod tests;

use std::io;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use thiserror::Error;

use crate::bloom::KeyFilter;
use crate::filestore::{FileKind, FileStore};
use crate::stream::{self, StreamError};
use crate::summary::{IndexEntry, IndexSummary};

/// Errors returned by data file operations.
#[derive(Debug, Error)]
pub enum DataFileError {
    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// On-disk bytes failed integrity validation.
    #[error("could not read data from {0}: file corrupted")]
    FileCorrupted(PathBuf),
}

/// True when `name` is a valid data-file directory name: exactly 19
/// decimal digits (`^[0-9]{19}$`), the creation time in nanoseconds.
pub fn is_datafile_name(name: &str) -> bool {
    name.len() == 19 && name.bytes().all(|b| b.is_ascii_digit())
}

/// An immutable `{data, index, bloomfilter}` triple.
pub struct DataFile {
    path: PathBuf,
    mmap: Mmap,
    summary: IndexSummary,
    bloom: KeyFilter,
    created_at: u64,
}

impl DataFile {
    /// Loads a sealed data file: memory-maps the data-kind file,
    /// rebuilds the summary by a full scan of the index-kind file, and
    /// deserializes the bloom filter.
    pub fn open_from_dir(path: impl Into<PathBuf>) -> Result<Self, DataFileError> {
        let path = path.into();
        let store = FileStore::open(&path)?;

        let data_file = store.open_file(FileKind::Data)?;
        if data_file.metadata()?.len() == 0 {
            return Err(DataFileError::FileCorrupted(store.path(FileKind::Data)));
        }
        // Safety: the data file is sealed and never written again while
        // this map is alive; the directory is deleted only after the
        // engine drops its handle.
        let mmap = unsafe { Mmap::map(&data_file)? };

        let summary = IndexSummary::read_from(store.open_file(FileKind::Index)?)
            .map_err(|e| Self::open_error(e, store.path(FileKind::Index)))?;

        let bloom_frame = std::fs::read(store.path(FileKind::BloomFilter))?;
        let bloom_bytes = stream::decode_frame::<Vec<u8>>(&bloom_frame)
            .map_err(|e| Self::open_error(e, store.path(FileKind::BloomFilter)))?;
        let bloom = KeyFilter::from_bytes(&bloom_bytes)
            .map_err(|_| DataFileError::FileCorrupted(store.path(FileKind::BloomFilter)))?;

        let created_at = path
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| is_datafile_name(n))
            .and_then(|n| n.parse::<u64>().ok())
            .unwrap_or(0);

        Ok(Self {
            path,
            mmap,
            summary,
            bloom,
            created_at,
        })
    }

    fn open_error(err: StreamError, path: PathBuf) -> DataFileError {
        match err {
            StreamError::Io(e) => DataFileError::Io(e),
            _ => DataFileError::FileCorrupted(path),
        }
    }

    /// Reads the record frame starting at `offset` in the data file.
    pub fn get(&self, offset: i64) -> Result<Vec<u8>, DataFileError> {
        if offset < 0 {
            return Err(DataFileError::FileCorrupted(self.data_path()));
        }
        stream::read_frame_at(&self.mmap, offset as u64)
            .map_err(|_| DataFileError::FileCorrupted(self.data_path()))
    }

    /// Bloom-filter gate: false means the key is definitely absent.
    pub fn maybe_contains(&self, key_hash: u32) -> bool {
        self.bloom.contains(key_hash)
    }

    /// Index lookup for `key_hash`.
    pub fn look_up(&self, key_hash: u32) -> Option<&IndexEntry> {
        self.summary.look_up(key_hash)
    }

    /// The index summary describing this file's records.
    pub fn summary(&self) -> &IndexSummary {
        &self.summary
    }

    /// Directory this data file lives in.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creation time in nanoseconds, parsed from the directory name.
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    fn data_path(&self) -> PathBuf {
        self.path.join(FileKind::Data.file_name())
    }
}

impl std::fmt::Debug for DataFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataFile")
            .field("path", &self.path)
            .field("records", &self.summary.count())
            .field("created_at", &self.created_at)
            .finish()
    }
}
