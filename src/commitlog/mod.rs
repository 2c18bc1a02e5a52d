//! Commitlog Module
//!
//! The single active append-only log of a database. Every insert lands
//! here first; when the log would outgrow its size bound the engine
//! seals it into an immutable data file ([`Commitlog::rotate`]) and
//! installs a fresh empty log in its place.
//!
//! # Design Overview
//!
//! The commitlog lives in a `commitlog/` subdirectory of the database
//! root and owns a single data-kind file of record frames (see
//! [`crate::stream`] for the frame format). In memory it maintains an
//! [`IndexSummary`] mapping each key hash to the offset of its newest
//! frame, built incrementally on [`Commitlog::append`] and rebuilt on
//! open by replaying every frame from offset 0.
//!
//! # Rotation
//!
//! `rotate` seals the current log into a data-file directory named by
//! the current time in nanoseconds (19 decimal digits):
//!
//! 1. the commitlog-kind file is renamed to the data kind,
//! 2. the `commitlog/` directory is renamed to the timestamp name,
//! 3. an index-kind file is written from the in-memory summary,
//! 4. a bloom filter over the summary's hashes is built and written,
//! 5. a fresh empty commitlog is installed at the original path.
//!
//! The sealed data, index, and bloom filter all exist on disk before
//! the new commitlog accepts any write. A failure before step 1
//! completes leaves the old commitlog untouched.
//!
//! # Durability
//!
//! Every append is followed by `sync_all`; rotation syncs the sealed
//! files and their directory entry before the fresh log is created.
//!
//! # Recovery
//!
//! On open, replay stops at the first corrupted or torn frame; the
//! valid prefix is kept, the tail is truncated, and a warning is
//! logged.

#[cfg(test)]
mod tests;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::bloom::{FilterError, KeyFilter};
use crate::datafile::{DataFile, DataFileError};
use crate::filestore::{FileKind, FileStore};
use crate::record::{Record, RecordStatus, now_nanos};
use crate::stream::{self, FrameIter, FrameReader, FrameWriter, StreamError};
use crate::summary::{IndexEntry, IndexSummary};

/// Name of the commitlog subdirectory under a database root.
pub const COMMITLOG_DIR: &str = "commitlog";

/// Errors returned by commitlog operations.
#[derive(Debug, Error)]
pub enum CommitlogError {
    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Frame codec failure.
    #[error("stream error: {0}")]
    Stream(#[from] StreamError),

    /// Bloom filter construction failure during rotation.
    #[error("bloom filter error: {0}")]
    Filter(#[from] FilterError),

    /// The sealed data file failed to load back during rotation.
    #[error("data file error: {0}")]
    DataFile(#[from] DataFileError),

    /// The commitlog directory sits outside any database root.
    #[error("invalid commitlog layout: {0}")]
    InvalidLayout(String),
}

impl CommitlogError {
    /// True when the error means "bytes on disk are not a valid frame".
    pub fn is_corruption(&self) -> bool {
        matches!(self, CommitlogError::Stream(e) if e.is_corruption())
    }
}

/// The active append-only log of one database.
#[derive(Debug)]
pub struct Commitlog {
    store: FileStore,
    writer: FrameWriter,
    reader: FrameReader,
    summary: IndexSummary,
}

impl Commitlog {
    /// Creates a fresh, empty commitlog under `db_root/commitlog`.
    pub fn create(db_root: &Path) -> Result<Self, CommitlogError> {
        let store = FileStore::create(db_root.join(COMMITLOG_DIR))?;
        // Truncate any stale file so a fresh database starts empty.
        store.create_file(FileKind::Commitlog)?;
        Self::with_store(store, IndexSummary::new(), 0)
    }

    /// Opens an existing commitlog and replays its frames to rebuild
    /// the in-memory summary. The valid prefix survives a torn tail;
    /// the tail itself is truncated away.
    pub fn open(db_root: &Path) -> Result<Self, CommitlogError> {
        let store = FileStore::open(db_root.join(COMMITLOG_DIR))?;
        if !store.exists(FileKind::Commitlog) {
            store.create_file(FileKind::Commitlog)?;
        }

        let mut summary = IndexSummary::new();
        let mut iter = FrameIter::new(store.open_file(FileKind::Commitlog)?)?;
        let mut replayed = 0u64;
        let valid_end;
        loop {
            match iter.next() {
                Some(Ok((offset, frame))) => {
                    let record = Record::decode(&frame)?;
                    summary.add(IndexEntry {
                        key_hash: record.key_hash(),
                        status: record.status,
                        offset: offset as i64,
                        timestamp: record.timestamp,
                    });
                    replayed += 1;
                }
                Some(Err(e)) if e.is_corruption() => {
                    valid_end = iter.offset();
                    warn!(
                        path = %store.path(FileKind::Commitlog).display(),
                        valid_end,
                        error = %e,
                        "torn or corrupted commitlog tail, truncating"
                    );
                    let file = store.append_file(FileKind::Commitlog)?;
                    file.set_len(valid_end)?;
                    file.sync_all()?;
                    break;
                }
                Some(Err(e)) => return Err(e.into()),
                None => {
                    valid_end = iter.offset();
                    break;
                }
            }
        }

        info!(
            path = %store.path(FileKind::Commitlog).display(),
            frames = replayed,
            size = valid_end,
            "commitlog loaded"
        );
        Self::with_store(store, summary, valid_end)
    }

    fn with_store(
        store: FileStore,
        summary: IndexSummary,
        size: u64,
    ) -> Result<Self, CommitlogError> {
        let writer = FrameWriter::new(store.append_file(FileKind::Commitlog)?, size);
        let reader = FrameReader::new(store.open_file(FileKind::Commitlog)?);
        Ok(Self {
            store,
            writer,
            reader,
            summary,
        })
    }

    /// Appends a record frame and indexes it, returning the frame's
    /// starting offset.
    pub fn append(
        &mut self,
        key_hash: u32,
        status: RecordStatus,
        timestamp: u64,
        frame: &[u8],
    ) -> Result<i64, CommitlogError> {
        let offset = self.writer.append(frame)?;
        self.summary.add(IndexEntry {
            key_hash,
            status,
            offset: offset as i64,
            timestamp,
        });
        Ok(offset as i64)
    }

    /// Looks up the newest frame for `key_hash`, if this log holds one.
    pub fn get(&self, key_hash: u32) -> Result<Option<Vec<u8>>, CommitlogError> {
        match self.summary.look_up(key_hash) {
            Some(entry) => Ok(Some(self.reader.read_at(entry.offset as u64)?)),
            None => Ok(None),
        }
    }

    /// Current on-disk byte length.
    pub fn size(&self) -> u64 {
        self.writer.offset()
    }

    /// Number of distinct key hashes indexed.
    pub fn count(&self) -> u64 {
        self.summary.count()
    }

    /// The in-memory index over this log's contents.
    pub fn summary(&self) -> &IndexSummary {
        &self.summary
    }

    /// Path of the underlying log file.
    pub fn path(&self) -> PathBuf {
        self.store.path(FileKind::Commitlog)
    }

    /// Flushes the log file to disk.
    pub fn sync(&self) -> Result<(), CommitlogError> {
        self.writer.sync()?;
        Ok(())
    }

    /// Seals this log into an immutable data file and installs a fresh
    /// empty commitlog in its place. Returns the sealed [`DataFile`],
    /// loaded and ready for reads.
    pub fn rotate(&mut self, bloom_fp: f64) -> Result<DataFile, CommitlogError> {
        let db_root = self
            .store
            .dir()
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| {
                CommitlogError::InvalidLayout("commitlog directory has no parent".into())
            })?;
        let sealed_name = format!("{:019}", now_nanos());
        let sealed_path = db_root.join(&sealed_name);

        self.writer.sync()?;
        self.store.rename(FileKind::Commitlog, FileKind::Data)?;
        fs::rename(self.store.dir(), &sealed_path)?;

        let sealed = FileStore::open(&sealed_path)?;

        let mut index_file = sealed.create_file(FileKind::Index)?;
        self.summary.write_to(&mut index_file)?;
        index_file.sync_all()?;

        let mut filter = KeyFilter::new(self.summary.count() as usize, bloom_fp)?;
        for entry in self.summary.entries() {
            filter.insert(entry.key_hash);
        }
        let mut bloom_file = sealed.create_file(FileKind::BloomFilter)?;
        let bloom_frame = stream::encode_frame(&filter.to_bytes())?;
        io::Write::write_all(&mut bloom_file, &bloom_frame)?;
        bloom_file.sync_all()?;
        sealed.sync_dir()?;

        let datafile = DataFile::open_from_dir(&sealed_path)?;

        info!(
            sealed = %sealed_path.display(),
            records = self.summary.count(),
            bytes = self.writer.offset(),
            "commitlog rotated into data file"
        );

        *self = Commitlog::create(&db_root)?;
        Ok(datafile)
    }
}
