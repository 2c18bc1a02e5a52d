//! Integration tests for the public WrenDB API.
//!
//! These tests exercise the full storage stack (commitlog → data files
//! → cache → compaction) through the public `wrendb::{Manager,
//! Database, ...}` surface.
//!
//! ## Coverage areas
//! - **CRUD**: insert, get, logical delete, overwrite
//! - **Tombstones**: `Removed` records mask older versions and surface
//!   as absence at the manager layer
//! - **Rollover**: commitlog sealing into 19-digit data-file
//!   directories, size bound held after every insert
//! - **Compaction**: tombstone-affected files deleted, survivors kept
//! - **Corruption**: truncated data files degrade to misses, engine
//!   stays operational
//! - **Persistence**: answers identical across close → reopen
//! - **Concurrency**: readers against a busy writer observe
//!   prefix-consistent payloads
//!
//! ## See also
//! - `engine::tests` — internal engine-level unit tests
//! - `commitlog::tests` / `datafile::tests` — per-file unit tests

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use tempfile::TempDir;
use wrendb::datafile::is_datafile_name;
use wrendb::filestore::FileKind;
use wrendb::{Database, Descriptor, Manager, Record, RecordStatus, StoreConfig};

// ------------------------------------------------------------------------------------------------
// Helpers
// ------------------------------------------------------------------------------------------------

fn store_config(root: &Path) -> StoreConfig {
    StoreConfig {
        path: root.to_path_buf(),
        max_datalog_size: 64 * 1024,
        max_cache_size: 64 * 1024,
        bloom_filter_fp: 0.01,
        compaction_interval_secs: 3600,
        mode: "rw".to_string(),
    }
}

fn descriptor(root: &Path, max_datalog_size: u64) -> Descriptor {
    Descriptor {
        name: "itest".to_string(),
        path: root.to_path_buf(),
        max_datalog_size,
        max_cache_size: 64 * 1024,
        bloom_filter_fp: 0.01,
        compaction_interval_secs: 3600,
        mode: "rw".to_string(),
    }
}

/// Data-file directories under `root`, numerically sorted.
fn datafile_dirs(root: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = std::fs::read_dir(root)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path().is_dir() && e.file_name().to_str().is_some_and(is_datafile_name)
        })
        .map(|e| e.path())
        .collect();
    dirs.sort();
    dirs
}

// ================================================================================================
// Scenario 1 — basic insert and lookup
// ================================================================================================

/// # Scenario
/// Insert `{key="a", ACTIVE, [0x01]}`; `get("a")` returns payload
/// `[0x01]`.
#[test]
fn scenario_1_insert_then_get() {
    let tmp = TempDir::new().unwrap();
    let db = Database::create(descriptor(tmp.path(), 64 * 1024)).unwrap();

    db.insert(&Record::new("a", vec![0x01])).unwrap();

    let record = db.get("a").unwrap().expect("key must be found");
    assert_eq!(record.payload, vec![0x01]);
    assert_eq!(record.status, RecordStatus::Active);
}

// ================================================================================================
// Scenario 2 — tombstone is the authoritative answer
// ================================================================================================

/// # Scenario
/// Insert `{"b", ACTIVE, [0x02]}` then `{"b", REMOVED, []}`;
/// `get("b")` returns a record with status REMOVED.
#[test]
fn scenario_2_tombstone_masks_active_version() {
    let tmp = TempDir::new().unwrap();
    let db = Database::create(descriptor(tmp.path(), 64 * 1024)).unwrap();

    db.insert(&Record::new("b", vec![0x02])).unwrap();
    db.insert(&Record::tombstone("b")).unwrap();

    let record = db.get("b").unwrap().expect("tombstone must be returned");
    assert_eq!(record.status, RecordStatus::Removed);
    assert!(record.payload.is_empty());
}

// ================================================================================================
// Scenario 3 — rollover
// ================================================================================================

/// # Scenario
/// With `max_datalog_size` small enough to force rollover after two
/// inserts: insert "c", "d", then "e" (triggers rollover). All three
/// keys resolve, and exactly one 19-digit data-file directory exists.
#[test]
fn scenario_3_rollover_seals_one_datafile() {
    let tmp = TempDir::new().unwrap();
    // Two 80-byte-payload frames fit; the third pushes past the bound.
    let db = Database::create(descriptor(tmp.path(), 300)).unwrap();

    db.insert(&Record::new("c", vec![0x03; 80])).unwrap();
    db.insert(&Record::new("d", vec![0x04; 80])).unwrap();
    db.insert(&Record::new("e", vec![0x05; 80])).unwrap();

    assert_eq!(db.get("c").unwrap().unwrap().payload, vec![0x03; 80]);
    assert_eq!(db.get("d").unwrap().unwrap().payload, vec![0x04; 80]);
    assert_eq!(db.get("e").unwrap().unwrap().payload, vec![0x05; 80]);

    let dirs = datafile_dirs(tmp.path());
    assert_eq!(dirs.len(), 1, "expected exactly one sealed data file");
    let name = dirs[0].file_name().unwrap().to_str().unwrap();
    assert!(is_datafile_name(name), "directory name must be 19 digits");
}

// ================================================================================================
// Scenario 4 — compaction drops tombstone-affected files
// ================================================================================================

/// # Scenario
/// Force rollover containing `{"f", ACTIVE}`, then insert
/// `{"f", REMOVED}`. Before compaction `get("f")` is REMOVED; after
/// compaction the data file that held "f" is gone and the manager
/// reports "not found".
#[test]
fn scenario_4_compaction_reclaims_tombstoned_file() {
    let tmp = TempDir::new().unwrap();
    let config = StoreConfig {
        max_datalog_size: 300,
        ..store_config(tmp.path())
    };
    let manager = Manager::new(config).unwrap();
    manager.create_database(Descriptor::new("s4")).unwrap();

    manager.insert_data("s4", "f", vec![0x0F; 100]).unwrap();
    manager.insert_data("s4", "pad", vec![0; 100]).unwrap();
    // Forces rollover: "f" and "pad" are sealed.
    manager.insert_data("s4", "trigger", vec![0; 100]).unwrap();
    let db_root = tmp.path().join("s4");
    let sealed_before = datafile_dirs(&db_root);
    assert!(!sealed_before.is_empty());

    manager.delete_data("s4", "f").unwrap();

    // Before compaction: the engine returns the tombstone itself.
    let db = manager.database("s4").unwrap();
    assert_eq!(db.get("f").unwrap().unwrap().status, RecordStatus::Removed);

    let stats = manager.compact("s4").unwrap().expect("round must run");
    assert!(stats.datafiles_removed >= 1);
    assert!(!sealed_before[0].exists(), "sealed directory must be gone");

    // After compaction: absence at the manager layer, and the survivor
    // keys are still resolvable.
    assert!(manager.get_data("s4", "f").unwrap().is_none());
    assert!(manager.get_data("s4", "pad").unwrap().is_some());
    assert!(manager.get_data("s4", "trigger").unwrap().is_some());
}

// ================================================================================================
// Scenario 5 — corruption degrades to a miss
// ================================================================================================

/// # Scenario
/// Insert `{"g", ACTIVE, payload_big}`, truncate the sealed data-kind
/// file to half its length; `get("g")` is "not found" and the engine
/// keeps serving writes and reads.
#[test]
fn scenario_5_truncated_file_reads_as_miss() {
    let tmp = TempDir::new().unwrap();
    let desc = descriptor(tmp.path(), 2048);
    {
        let db = Database::create(desc.clone()).unwrap();
        db.insert(&Record::new("g", vec![0x07; 900])).unwrap();
        db.insert(&Record::new("g2", vec![0x17; 900])).unwrap();
        // Forces rollover, sealing "g" and "g2".
        db.insert(&Record::new("spill", vec![0x27; 900])).unwrap();
        db.close().unwrap();
    }
    let dirs = datafile_dirs(tmp.path());
    assert_eq!(dirs.len(), 1);

    let data_file = dirs[0].join(FileKind::Data.file_name());
    let bytes = std::fs::read(&data_file).unwrap();
    std::fs::write(&data_file, &bytes[..bytes.len() / 2]).unwrap();

    // Reopen with a cold cache: "g2" sits in the torn half.
    let db = Database::open(desc).unwrap();
    assert!(db.get("g2").unwrap().is_none(), "corruption must read as a miss");

    // Engine remains operational.
    db.insert(&Record::new("h", vec![0x08])).unwrap();
    assert_eq!(db.get("h").unwrap().unwrap().payload, vec![0x08]);
}

// ================================================================================================
// Scenario 6 — concurrent readers against a single writer
// ================================================================================================

/// # Scenario
/// Concurrent readers issue `get("x")` while one writer performs 10,000
/// inserts of "x" with distinct payloads. Every observed payload is
/// consistent with some prefix of the write sequence: sequence numbers
/// never run backwards, and the writer's last insert is visible once
/// it returns.
#[test]
fn scenario_6_readers_see_prefix_consistent_writes() {
    let tmp = TempDir::new().unwrap();
    let db = Arc::new(Database::create(descriptor(tmp.path(), 8 * 1024)).unwrap());
    let done = Arc::new(AtomicBool::new(false));

    let writer = {
        let db = Arc::clone(&db);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            for seq in 0..10_000u64 {
                db.insert(&Record::new("x", seq.to_le_bytes().to_vec()))
                    .unwrap();
            }
            done.store(true, Ordering::Release);
        })
    };

    let mut readers = Vec::new();
    for _ in 0..4 {
        let db = Arc::clone(&db);
        let done = Arc::clone(&done);
        readers.push(thread::spawn(move || {
            let mut last_seen = 0u64;
            while !done.load(Ordering::Acquire) {
                if let Some(record) = db.get("x").unwrap() {
                    let seq = u64::from_le_bytes(record.payload.as_slice().try_into().unwrap());
                    assert!(seq >= last_seen, "saw {seq} after {last_seen}");
                    last_seen = seq;
                }
            }
        }));
    }

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    let record = db.get("x").unwrap().unwrap();
    assert_eq!(
        u64::from_le_bytes(record.payload.as_slice().try_into().unwrap()),
        9_999
    );
}

// ================================================================================================
// Cross-cutting: persistence across close → open
// ================================================================================================

/// # Scenario
/// After inserts, rollovers, and a compaction, closing and reopening
/// the database returns the same answer for every key.
#[test]
fn answers_survive_close_and_reopen() {
    let tmp = TempDir::new().unwrap();
    let desc = descriptor(tmp.path(), 512);
    let mut expected = Vec::new();
    {
        let db = Database::create(desc.clone()).unwrap();
        for i in 0..40u32 {
            db.insert(&Record::new(format!("key_{i:04}"), vec![i as u8; 48]))
                .unwrap();
        }
        for i in (0..40u32).step_by(5) {
            db.insert(&Record::tombstone(format!("key_{i:04}"))).unwrap();
        }
        db.compact().unwrap().expect("compaction must run");
        for i in 0..40u32 {
            // Normalize to the user-visible answer: payload or absent.
            expected.push(
                db.get(&format!("key_{i:04}"))
                    .unwrap()
                    .filter(|r| !r.is_removed())
                    .map(|r| r.payload),
            );
        }
        db.close().unwrap();
    }

    let db = Database::open(desc).unwrap();
    for (i, before) in expected.iter().enumerate() {
        let after = db
            .get(&format!("key_{i:04}"))
            .unwrap()
            .filter(|r| !r.is_removed())
            .map(|r| r.payload);
        assert_eq!(&after, before, "key_{i:04} changed across reopen");
    }
}

/// # Scenario
/// Bloom filters never produce a false negative: every key sealed into
/// a data file is still found after reopen (cache cold, commitlog
/// empty of those keys).
#[test]
fn sealed_keys_always_resolve_after_reopen() {
    let tmp = TempDir::new().unwrap();
    let desc = descriptor(tmp.path(), 1024);
    {
        let db = Database::create(desc.clone()).unwrap();
        for i in 0..120u32 {
            db.insert(&Record::new(format!("key_{i:05}"), vec![i as u8; 64]))
                .unwrap();
        }
        db.close().unwrap();
    }

    let db = Database::open(desc).unwrap();
    assert!(datafile_dirs(tmp.path()).len() >= 2);
    for i in 0..120u32 {
        assert!(
            db.get(&format!("key_{i:05}")).unwrap().is_some(),
            "key_{i:05} lost (bloom false negative or bad offset)"
        );
    }
}
