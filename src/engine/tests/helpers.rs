use std::path::Path;

use tracing_subscriber::EnvFilter;

use crate::config::Descriptor;
use crate::engine::Database;

/// Initialize tracing subscriber controlled by `RUST_LOG` env var.
/// Safe to call multiple times — only the first call takes effect.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Descriptor with a commitlog bound large enough that nothing rolls
/// over during the test.
pub fn log_only_descriptor(path: &Path) -> Descriptor {
    init_tracing();
    Descriptor {
        name: "test".to_string(),
        path: path.to_path_buf(),
        max_datalog_size: 1024 * 1024,
        max_cache_size: 256 * 1024,
        bloom_filter_fp: 0.01,
        compaction_interval_secs: 3600,
        mode: "rw".to_string(),
    }
}

/// Descriptor with a tiny commitlog bound so rollover happens after a
/// handful of inserts.
pub fn small_log_descriptor(path: &Path, max_datalog_size: u64) -> Descriptor {
    Descriptor {
        max_datalog_size,
        ..log_only_descriptor(path)
    }
}

/// Creates a database and fills it with `count` records of the given
/// payload size, keys `"<prefix>_0000"` onwards.
pub fn filled_database(path: &Path, count: u32, payload_len: usize, prefix: &str) -> Database {
    let db = Database::create(log_only_descriptor(path)).expect("create");
    for i in 0..count {
        let record = crate::record::Record::new(
            format!("{prefix}_{i:04}"),
            vec![(i % 251) as u8; payload_len],
        );
        db.insert(&record).expect("insert");
    }
    db
}
