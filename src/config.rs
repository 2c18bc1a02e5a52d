//! Store-wide defaults and per-database descriptors.
//!
//! A [`Descriptor`] is what the manager hands the engine: identity,
//! root path, and the knobs that shape the write path (commitlog size
//! bound), the read path (cache capacity, bloom false-positive rate),
//! and compaction (interval). Fields left at their zero value are
//! filled from the global [`StoreConfig`] before the database is
//! created or opened.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Global configuration supplying per-database defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory holding every database directory and the
    /// descriptor catalog.
    pub path: PathBuf,

    /// Default commitlog rollover threshold in bytes.
    pub max_datalog_size: u64,

    /// Default cache capacity in bytes.
    pub max_cache_size: u64,

    /// Default bloom filter false-positive rate at data-file creation.
    pub bloom_filter_fp: f64,

    /// Default compaction interval in seconds.
    pub compaction_interval_secs: u64,

    /// Default mode tag (opaque to the storage core).
    pub mode: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data"),
            max_datalog_size: 64 * 1024 * 1024,
            max_cache_size: 32 * 1024 * 1024,
            bloom_filter_fp: 0.01,
            compaction_interval_secs: 3600,
            mode: "rw".to_string(),
        }
    }
}

/// Per-database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Descriptor {
    /// Identity of the database.
    pub name: String,

    /// Root directory; defaults to `<config.path>/<name>`.
    pub path: PathBuf,

    /// Commitlog rollover threshold in bytes.
    pub max_datalog_size: u64,

    /// Cache capacity in bytes.
    pub max_cache_size: u64,

    /// Bloom filter false-positive rate used at data-file creation.
    pub bloom_filter_fp: f64,

    /// Compaction schedule, as an interval in seconds.
    pub compaction_interval_secs: u64,

    /// Mode tag (opaque to the storage core).
    pub mode: String,
}

impl Descriptor {
    /// A descriptor carrying only a name; every other field is filled
    /// from the store config by [`Descriptor::fill_defaults`].
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: PathBuf::new(),
            max_datalog_size: 0,
            max_cache_size: 0,
            bloom_filter_fp: 0.0,
            compaction_interval_secs: 0,
            mode: String::new(),
        }
    }

    /// Replaces unset fields with the store defaults.
    pub fn fill_defaults(&mut self, config: &StoreConfig) {
        if self.path.as_os_str().is_empty() {
            self.path = config.path.join(&self.name);
        }
        if self.max_datalog_size == 0 {
            self.max_datalog_size = config.max_datalog_size;
        }
        if self.max_cache_size == 0 {
            self.max_cache_size = config.max_cache_size;
        }
        if self.bloom_filter_fp <= 0.0 {
            self.bloom_filter_fp = config.bloom_filter_fp;
        }
        if self.compaction_interval_secs == 0 {
            self.compaction_interval_secs = config.compaction_interval_secs;
        }
        if self.mode.trim().is_empty() {
            self.mode = config.mode.clone();
        }
    }

    /// Compaction interval as a [`Duration`].
    pub fn compaction_interval(&self) -> Duration {
        Duration::from_secs(self.compaction_interval_secs)
    }
}
