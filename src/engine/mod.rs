//! # Storage Engine
//!
//! The per-database engine: funnels inserts through the append-only
//! commitlog, seals the log into immutable data files when it would
//! outgrow its bound, and answers lookups newest-first with bloom-filter
//! gating.
//!
//! ## Design Overview
//!
//! Data for one database is organised in three layers, queried
//! newest-first:
//!
//! 1. **Cache** — bounded LRU of serialized record frames, keyed by
//!    key hash. Authoritative for nothing.
//! 2. **Commitlog** — the single active append-only log, indexed by an
//!    in-memory summary.
//! 3. **Data files** — immutable sealed logs, newest to oldest, each
//!    with an index summary and a bloom filter.
//!
//! A `Removed` record is an answer, not an absence: the newest-first
//! scan returns it as-is so a fresh tombstone masks older `Active`
//! versions, and callers above interpret `Removed` as "not found".
//!
//! ## Concurrency Model
//!
//! Structural state (commitlog handle, data-file list) lives under one
//! `RwLock`. [`Database::insert`] holds the write lock for the whole
//! operation, rollover included; [`Database::get`] takes only the read
//! lock, so any number of readers proceed concurrently and observe
//! structural changes through the lock's release/acquire ordering. The
//! cache synchronizes itself and sits outside the lock.
//!
//! ## Key hashing
//!
//! Keys are hashed exactly once, at this boundary; every layer below
//! speaks the 32-bit hash only. Two keys that collide on the hash
//! resolve to the most recent write for that hash — the engine does not
//! guarantee collision-free key identity.

#[cfg(test)]
pub(crate) mod tests;

use std::fs;
use std::path::Path;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use crate::cache::Cache;
use crate::commitlog::{COMMITLOG_DIR, Commitlog};
use crate::compaction::{self, CompactionStats};
use crate::config::Descriptor;
use crate::datafile::{DataFile, DataFileError, is_datafile_name};
use crate::error::{DbError, Result};
use crate::record::{Record, RecordStatus, key_hash};

pub(crate) struct DatabaseInner {
    /// The active append-only log.
    pub(crate) commitlog: Commitlog,

    /// Sealed data files, oldest first; lookups scan from the back.
    pub(crate) datafiles: Vec<DataFile>,
}

/// Snapshot of engine counters, mainly for tests and operators.
#[derive(Debug)]
pub struct DatabaseStats {
    pub datafile_count: usize,
    pub commitlog_size: u64,
    pub commitlog_records: u64,
    pub cache_entries: usize,
}

/// A single database: one writer at a time, any number of readers.
pub struct Database {
    descriptor: Descriptor,
    cache: Cache,
    inner: RwLock<DatabaseInner>,
    compacting: AtomicBool,
}

impl Database {
    /// Creates a fresh database at the descriptor's path.
    pub fn create(descriptor: Descriptor) -> Result<Self> {
        fs::create_dir_all(&descriptor.path)?;
        let commitlog = Commitlog::create(&descriptor.path)?;
        info!(name = %descriptor.name, path = %descriptor.path.display(), "database created");
        Ok(Self {
            cache: Cache::new(descriptor.max_cache_size),
            inner: RwLock::new(DatabaseInner {
                commitlog,
                datafiles: Vec::new(),
            }),
            compacting: AtomicBool::new(false),
            descriptor,
        })
    }

    /// Opens an existing database: replays the commitlog and loads
    /// every sealed data file found under the root. A data file that
    /// fails to load aborts the open — the on-disk state no longer
    /// matches the descriptor.
    pub fn open(descriptor: Descriptor) -> Result<Self> {
        let commitlog = Commitlog::open(&descriptor.path)?;

        let mut names: Vec<u64> = Vec::new();
        for entry in fs::read_dir(&descriptor.path)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name();
            if let Some(name) = name.to_str()
                && is_datafile_name(name)
                && let Ok(stamp) = name.parse::<u64>()
            {
                names.push(stamp);
            }
        }
        // Numerical order of the directory name defines age.
        names.sort_unstable();

        let mut datafiles = Vec::with_capacity(names.len());
        for stamp in &names {
            let dir = descriptor.path.join(format!("{stamp:019}"));
            datafiles.push(DataFile::open_from_dir(&dir)?);
        }

        info!(
            name = %descriptor.name,
            datafiles = datafiles.len(),
            commitlog_records = commitlog.count(),
            "database opened"
        );
        Ok(Self {
            cache: Cache::new(descriptor.max_cache_size),
            inner: RwLock::new(DatabaseInner {
                commitlog,
                datafiles,
            }),
            compacting: AtomicBool::new(false),
            descriptor,
        })
    }

    /// Inserts a record: cache put, rollover if the commitlog would
    /// outgrow its bound, then commitlog append. Holds the write lock
    /// throughout. On failure the append either happened or it did
    /// not; the cache entry is allowed to stand (the cache is never
    /// authoritative).
    pub fn insert(&self, record: &Record) -> Result<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| DbError::Internal("engine lock poisoned".into()))?;

        let hash = record.key_hash();
        let frame = record.encode()?;
        self.cache.put(hash, frame.clone());

        Self::roll_if_needed(&mut inner, &self.descriptor, frame.len() as u64)?;
        inner
            .commitlog
            .append(hash, record.status, record.timestamp, &frame)?;
        Ok(())
    }

    /// Re-appends an already-encoded frame, preserving its original
    /// key hash, status, and timestamp. Used by the compactor to
    /// rewrite survivors; synchronized through the same write lock as
    /// [`Database::insert`].
    pub(crate) fn append_frame(
        &self,
        hash: u32,
        status: RecordStatus,
        timestamp: u64,
        frame: &[u8],
    ) -> Result<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| DbError::Internal("engine lock poisoned".into()))?;
        Self::roll_if_needed(&mut inner, &self.descriptor, frame.len() as u64)?;
        inner.commitlog.append(hash, status, timestamp, frame)?;
        Ok(())
    }

    /// Seals the commitlog when an incoming frame of `incoming` bytes
    /// would push it past `max_datalog_size`. An empty commitlog is
    /// never sealed, so a single frame larger than the bound still
    /// lands (and forces rollover on the write after it).
    fn roll_if_needed(
        inner: &mut DatabaseInner,
        descriptor: &Descriptor,
        incoming: u64,
    ) -> Result<()> {
        if inner.commitlog.count() > 0
            && inner.commitlog.size() + incoming > descriptor.max_datalog_size
        {
            let sealed = inner.commitlog.rotate(descriptor.bloom_filter_fp)?;
            inner.datafiles.push(sealed);
        }
        Ok(())
    }

    /// Looks up a key: cache, then commitlog, then data files newest
    /// to oldest with bloom gating. The first hit wins; versions are
    /// never merged across files.
    ///
    /// A `Removed` record is returned as-is — callers interpret it as
    /// absence. Corrupted frames are logged and treated as a miss for
    /// the affected file; the scan continues with older files.
    ///
    /// Keys whose 32-bit hashes collide resolve to the most recent
    /// write for the colliding hash.
    pub fn get(&self, key: &str) -> Result<Option<Record>> {
        let hash = key_hash(key);

        if let Some(frame) = self.cache.get(hash) {
            match Record::decode(&frame) {
                Ok(record) => return Ok(Some(record)),
                Err(e) => {
                    warn!(key_hash = hash, error = %e, "corrupted cache entry, consulting disk");
                }
            }
        }

        let inner = self
            .inner
            .read()
            .map_err(|_| DbError::Internal("engine lock poisoned".into()))?;

        match inner.commitlog.get(hash) {
            Ok(Some(frame)) => {
                if let Some(record) = self.decode_hit(hash, frame, "commitlog") {
                    return Ok(Some(record));
                }
            }
            Ok(None) => {}
            Err(e) if e.is_corruption() => {
                warn!(
                    path = %inner.commitlog.path().display(),
                    error = %e,
                    "corrupted commitlog read, treating as miss"
                );
            }
            Err(e) => return Err(e.into()),
        }

        for datafile in inner.datafiles.iter().rev() {
            if !datafile.maybe_contains(hash) {
                continue;
            }
            let Some(entry) = datafile.look_up(hash) else {
                continue;
            };
            match datafile.get(entry.offset) {
                Ok(frame) => {
                    if let Some(record) = self.decode_hit(hash, frame, "datafile") {
                        return Ok(Some(record));
                    }
                }
                Err(DataFileError::FileCorrupted(path)) => {
                    warn!(
                        path = %path.display(),
                        "corrupted data file read, falling through to older files"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(None)
    }

    /// Decodes a disk hit and fills the cache. A frame that fails to
    /// decode is logged and counted as a miss for its file.
    fn decode_hit(&self, hash: u32, frame: Vec<u8>, source: &str) -> Option<Record> {
        match Record::decode(&frame) {
            Ok(record) => {
                self.cache.put(hash, frame);
                Some(record)
            }
            Err(e) => {
                warn!(key_hash = hash, source, error = %e, "undecodable frame, treating as miss");
                None
            }
        }
    }

    /// Runs one round of compaction on this database. Returns `None`
    /// when a previous round is still running.
    pub fn compact(&self) -> Result<Option<CompactionStats>> {
        compaction::run(self)
    }

    /// Flushes the commitlog. The database must not be used afterwards.
    pub fn close(&self) -> Result<()> {
        let inner = self
            .inner
            .read()
            .map_err(|_| DbError::Internal("engine lock poisoned".into()))?;
        inner.commitlog.sync()?;
        info!(name = %self.descriptor.name, "database closed");
        Ok(())
    }

    /// Copies the commitlog and every sealed data file into `dest`,
    /// blocking writers for the duration so the copy is consistent.
    pub fn snapshot_to(&self, dest: &Path) -> Result<()> {
        let inner = self
            .inner
            .write()
            .map_err(|_| DbError::Internal("engine lock poisoned".into()))?;
        inner.commitlog.sync()?;

        fs::create_dir_all(dest)?;
        copy_dir(
            &self.descriptor.path.join(COMMITLOG_DIR),
            &dest.join(COMMITLOG_DIR),
        )?;
        for datafile in &inner.datafiles {
            let name = datafile
                .path()
                .file_name()
                .ok_or_else(|| DbError::Internal("data file path has no name".into()))?;
            copy_dir(datafile.path(), &dest.join(name))?;
        }
        Ok(())
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Counters snapshot.
    pub fn stats(&self) -> Result<DatabaseStats> {
        let inner = self
            .inner
            .read()
            .map_err(|_| DbError::Internal("engine lock poisoned".into()))?;
        Ok(DatabaseStats {
            datafile_count: inner.datafiles.len(),
            commitlog_size: inner.commitlog.size(),
            commitlog_records: inner.commitlog.count(),
            cache_entries: self.cache.len(),
        })
    }

    // --------------------------------------------------------------------------------------------
    // Compactor plumbing
    // --------------------------------------------------------------------------------------------

    /// Runs `f` under the read lock with a view of the structural state.
    pub(crate) fn with_inner<R>(&self, f: impl FnOnce(&DatabaseInner) -> R) -> Result<R> {
        let inner = self
            .inner
            .read()
            .map_err(|_| DbError::Internal("engine lock poisoned".into()))?;
        Ok(f(&inner))
    }

    /// Removes the data file rooted at `path` from the lookup list.
    /// Returns true if an entry was removed. The caller deletes the
    /// directory afterwards; readers that were scanning the file have
    /// finished by the time the write lock is granted.
    pub(crate) fn remove_datafile(&self, path: &Path) -> Result<bool> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| DbError::Internal("engine lock poisoned".into()))?;
        let before = inner.datafiles.len();
        inner.datafiles.retain(|df| df.path() != path);
        Ok(inner.datafiles.len() < before)
    }

    /// Claims the per-database compaction slot. Returns false when a
    /// round is already running.
    pub(crate) fn begin_compaction(&self) -> bool {
        self.compacting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Releases the compaction slot.
    pub(crate) fn end_compaction(&self) {
        self.compacting.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.descriptor.name)
            .field("path", &self.descriptor.path)
            .finish()
    }
}

/// Copies every regular file of `src` into `dst` (data-file and
/// commitlog directories are flat).
fn copy_dir(src: &Path, dst: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        if entry.path().is_file() {
            fs::copy(entry.path(), dst.join(entry.file_name()))?;
        }
    }
    Ok(())
}
