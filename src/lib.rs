//! # WrenDB
//!
//! An embeddable, persistent **key-addressed blob store**. Opaque byte
//! payloads are inserted, logically deleted, and looked up by string
//! key; there are no range scans and no secondary indexes.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                      Manager                          │
//! │   name → Database · descriptor catalog · scheduler    │
//! ├───────────────────────────────────────────────────────┤
//! │                      Database                         │
//! │  ┌─────────┐   ┌────────────┐   ┌─────────────────┐   │
//! │  │  Cache  │   │ Commitlog  │   │   Data files    │   │
//! │  │  (LRU)  │   │ (append-   │   │ (immutable,     │   │
//! │  │         │   │  only log) │   │  bloom-gated)   │   │
//! │  └─────────┘   └─────┬──────┘   └────────┬────────┘   │
//! │       ▲              │   rotate          ▲            │
//! │       └── fill       └───────────────────┘            │
//! │                                                       │
//! │  ┌─────────────────────────────────────────────────┐  │
//! │  │   Compaction (tombstone GC, survivor rewrite)   │  │
//! │  └─────────────────────────────────────────────────┘  │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`manager`] | Multi-database lifecycle, descriptor catalog, scheduled compaction |
//! | [`engine`] | Per-database write path, rollover, newest-first read path |
//! | [`commitlog`] | Append-only log with in-memory index and rotation |
//! | [`datafile`] | Immutable `{data, index, bloomfilter}` triples |
//! | [`compaction`] | Tombstone collection, survivor rewrite, file discard |
//! | [`summary`] | In-memory hash → offset index over one file |
//! | [`bloom`] | Approximate membership filter per data file |
//! | [`cache`] | Bounded LRU over serialized record frames |
//! | [`stream`] | Length-prefixed, CRC-protected frame codec |
//! | [`record`] | The persisted unit: key, status, timestamp, payload |
//! | [`filestore`] | Directory-scoped handles keyed by logical file kind |
//! | [`scheduler`] | Interval ticker driving background compaction |
//! | [`config`] | Store defaults and per-database descriptors |
//!
//! ## Key Features
//!
//! - **Append-only writes** — every insert lands in the commitlog
//!   (fsynced) and rolls into an immutable data file when the log
//!   outgrows its bound.
//! - **Newest-first reads** — cache, then commitlog, then data files
//!   newest to oldest, each gated by a bloom filter; a fresh tombstone
//!   masks every older version.
//! - **Corruption tolerance** — CRC32 on every frame; a corrupted read
//!   is logged and treated as a miss, never a crash.
//! - **Scheduled compaction** — data files touched by tombstones are
//!   drained of live records and deleted.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use wrendb::{Descriptor, Manager, StoreConfig};
//!
//! let config = StoreConfig {
//!     path: "/tmp/wrendb".into(),
//!     ..StoreConfig::default()
//! };
//! let manager = Manager::new(config).unwrap();
//!
//! manager.create_database(Descriptor::new("images")).unwrap();
//!
//! manager.insert_data("images", "cat.png", vec![0xCA; 1024]).unwrap();
//! let record = manager.get_data("images", "cat.png").unwrap();
//! assert_eq!(record.unwrap().payload.len(), 1024);
//!
//! manager.delete_data("images", "cat.png").unwrap();
//! assert!(manager.get_data("images", "cat.png").unwrap().is_none());
//!
//! manager.compact("images").unwrap();
//! manager.close().unwrap();
//! ```

pub mod bloom;
pub mod cache;
pub mod commitlog;
pub mod compaction;
pub mod config;
pub mod datafile;
pub mod engine;
pub mod error;
pub mod filestore;
pub mod manager;
pub mod record;
pub mod scheduler;
pub mod stream;
pub mod summary;

pub use config::{Descriptor, StoreConfig};
pub use engine::Database;
pub use error::{DbError, Result};
pub use manager::Manager;
pub use record::{Record, RecordStatus};
