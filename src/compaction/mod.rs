//! # Compaction Module
//!
//! Reclaims space held by logically deleted records. A scheduled tick
//! (or a manual call) runs one round per database:
//!
//! 1. **Collect tombstones** — the union of all `Removed` index entries
//!    across every data file and the current commitlog, each tagged
//!    with its owning file path. Collection is serial and deterministic.
//! 2. **Rewrite survivors** — for each data file whose summary contains
//!    at least one tombstoned hash, every non-tombstoned entry's frame
//!    is re-appended to the commitlog (original key, status, and
//!    timestamp preserved; the normal rollover rule applies). Data
//!    files are processed **oldest first** to minimise duplication.
//! 3. **Discard** — the drained data file is removed from the lookup
//!    list and its directory deleted. Tombstones themselves are not
//!    rewritten; they vanish with their files.
//!
//! Rewriting a survivor makes it the newest known version of its hash,
//! which is safe: the tombstones that selected its file for rewrite
//! were themselves the newest version and are being discarded, and any
//! newer `Active` version in a younger data file still masks the
//! rewritten copy through newest-first lookup order.
//!
//! ## Failure policy
//!
//! Any error aborts the round. A data file is deleted only after every
//! one of its survivors has been durably re-appended, so an aborted
//! round loses nothing.
//!
//! ## Re-entry
//!
//! At most one round runs per database at a time, enforced with an
//! atomic flag claimed at the start of [`run`]; an overlapping tick
//! returns `None` and the next tick tries again.


use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use tracing::{debug, info, trace};

use crate::engine::Database;
use crate::error::Result;
use crate::record::RecordStatus;
use crate::summary::IndexEntry;

/// A tombstone found during collection, tagged with the file that
/// holds it.
#[derive(Debug, Clone)]
struct TombstoneMark {
    path: PathBuf,
    entry: IndexEntry,
}

/// Outcome of one compaction round.
#[derive(Debug, Clone)]
pub struct CompactionStats {
    /// Distinct tombstoned key hashes observed.
    pub tombstones: usize,
    /// Data files drained and deleted.
    pub datafiles_removed: usize,
    /// Live records rewritten into the commitlog.
    pub records_rewritten: usize,
    pub duration_ms: u64,
}

/// Runs one compaction round for `db`. Returns `None` when a previous
/// round is still running.
pub fn run(db: &Database) -> Result<Option<CompactionStats>> {
    if !db.begin_compaction() {
        debug!(db = db.name(), "compaction already running, skipping");
        return Ok(None);
    }
    let guard = SlotGuard(db);
    let stats = run_round(db)?;
    drop(guard);
    Ok(Some(stats))
}

/// Releases the per-database compaction slot on every exit path.
struct SlotGuard<'a>(&'a Database);

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.0.end_compaction();
    }
}

fn run_round(db: &Database) -> Result<CompactionStats> {
    let started = Instant::now();
    info!(db = db.name(), "compaction started");

    // Phase 1: tombstone collection, before anything is deleted.
    let (hashes, marks, candidates) = db.with_inner(|inner| {
        let mut hashes: HashSet<u32> = HashSet::new();
        let mut marks: Vec<TombstoneMark> = Vec::new();

        for datafile in &inner.datafiles {
            for entry in datafile.summary().entries() {
                if entry.status == RecordStatus::Removed {
                    hashes.insert(entry.key_hash);
                    marks.push(TombstoneMark {
                        path: datafile.path().to_path_buf(),
                        entry: *entry,
                    });
                }
            }
        }
        for entry in inner.commitlog.summary().entries() {
            if entry.status == RecordStatus::Removed {
                hashes.insert(entry.key_hash);
                marks.push(TombstoneMark {
                    path: inner.commitlog.path(),
                    entry: *entry,
                });
            }
        }

        // Affected data files, oldest first (list order is oldest-first).
        let candidates: Vec<PathBuf> = inner
            .datafiles
            .iter()
            .filter(|df| {
                df.summary()
                    .entries()
                    .iter()
                    .any(|e| hashes.contains(&e.key_hash))
            })
            .map(|df| df.path().to_path_buf())
            .collect();

        (hashes, marks, candidates)
    })?;

    let mut stats = CompactionStats {
        tombstones: hashes.len(),
        datafiles_removed: 0,
        records_rewritten: 0,
        duration_ms: 0,
    };

    if candidates.is_empty() {
        stats.duration_ms = started.elapsed().as_millis() as u64;
        debug!(
            db = db.name(),
            tombstones = stats.tombstones,
            "compaction found no affected data files"
        );
        return Ok(stats);
    }

    debug!(
        db = db.name(),
        tombstones = marks.len(),
        affected = candidates.len(),
        "tombstones collected"
    );
    for mark in &marks {
        trace!(
            path = %mark.path.display(),
            key_hash = mark.entry.key_hash,
            "tombstone"
        );
    }

    // Phase 2: drain and discard, one data file at a time.
    for path in candidates {
        let survivors = db.with_inner(|inner| -> Result<Vec<(IndexEntry, Vec<u8>)>> {
            let Some(datafile) = inner.datafiles.iter().find(|df| df.path() == path) else {
                return Ok(Vec::new());
            };
            let mut survivors = Vec::new();
            for entry in datafile.summary().entries() {
                if !hashes.contains(&entry.key_hash) {
                    // A drain failure aborts the round; the file is
                    // only deleted once fully drained.
                    let frame = datafile.get(entry.offset)?;
                    survivors.push((*entry, frame));
                }
            }
            Ok(survivors)
        })??;

        for (entry, frame) in &survivors {
            db.append_frame(entry.key_hash, entry.status, entry.timestamp, frame)?;
        }
        stats.records_rewritten += survivors.len();

        if db.remove_datafile(&path)? {
            fs::remove_dir_all(&path)?;
            stats.datafiles_removed += 1;
        }
    }

    stats.duration_ms = started.elapsed().as_millis() as u64;
    info!(
        db = db.name(),
        tombstones = stats.tombstones,
        removed = stats.datafiles_removed,
        rewritten = stats.records_rewritten,
        duration_ms = stats.duration_ms,
        "compaction finished"
    );
    Ok(stats)
}
