//! # Database Manager
//!
//! Owns the mapping from database name to engine instance and brokers
//! the create/drop/open lifecycle: fills descriptor defaults from the
//! store config, creates and removes database root directories,
//! persists the descriptor catalog as JSON, and registers one scheduled
//! compaction job per database on its [`Scheduler`].
//!
//! The manager is also where tombstones become absence: `get_data` maps
//! a `Removed` record to `None`, while the engine below faithfully
//! returns the tombstone.


use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

use tracing::{error, info, warn};

use crate::compaction::CompactionStats;
use crate::config::{Descriptor, StoreConfig};
use crate::engine::Database;
use crate::error::{DbError, Result};
use crate::record::{Record, now_nanos};
use crate::scheduler::{JobHandle, Scheduler};

/// File under the store root holding the persisted descriptor list.
const CATALOG_FILE: &str = "databases.json";

/// Directory under a database root holding its snapshots. Snapshot
/// names are 19-digit timestamps too, so snapshots live outside the
/// database root's data-file namespace.
const SNAPSHOT_DIR: &str = "snapshots";

/// Multi-database manager.
pub struct Manager {
    config: StoreConfig,
    databases: RwLock<HashMap<String, Arc<Database>>>,
    jobs: Mutex<HashMap<String, JobHandle>>,
    scheduler: Scheduler,
}

impl Manager {
    /// Creates a manager rooted at `config.path` (created if absent).
    pub fn new(config: StoreConfig) -> Result<Self> {
        fs::create_dir_all(&config.path)?;
        Ok(Self {
            config,
            databases: RwLock::new(HashMap::new()),
            jobs: Mutex::new(HashMap::new()),
            scheduler: Scheduler::new(),
        })
    }

    /// Opens every database recorded in the persisted catalog. Returns
    /// the names opened. A database that fails to open aborts loading —
    /// its on-disk state is inconsistent with the descriptor.
    pub fn load_databases(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for descriptor in self.read_catalog()? {
            let name = descriptor.name.clone();
            let database = Arc::new(Database::open(descriptor).map_err(|e| {
                error!(db = %name, error = %e, "failed to open database");
                DbError::OpenDatabase(name.clone())
            })?);
            self.register_compaction(&database);
            self.databases
                .write()
                .map_err(|_| DbError::Internal("manager lock poisoned".into()))?
                .insert(name.clone(), database);
            names.push(name);
        }
        info!(databases = ?names, "databases loaded");
        Ok(names)
    }

    /// Creates a database from `descriptor`, filling unset fields from
    /// the store config.
    pub fn create_database(&self, mut descriptor: Descriptor) -> Result<()> {
        let name = descriptor.name.clone();
        if name.trim().is_empty() {
            return Err(DbError::CreateDatabase(name));
        }

        let mut databases = self
            .databases
            .write()
            .map_err(|_| DbError::Internal("manager lock poisoned".into()))?;
        if databases.contains_key(&name) {
            return Err(DbError::CreateDatabase(name));
        }

        descriptor.fill_defaults(&self.config);
        let database = Arc::new(
            Database::create(descriptor).map_err(|e| {
                error!(db = %name, error = %e, "failed to create database");
                DbError::CreateDatabase(name.clone())
            })?,
        );
        self.register_compaction(&database);
        databases.insert(name.clone(), Arc::clone(&database));
        drop(databases);

        self.persist_catalog()?;
        Ok(())
    }

    /// Drops a database: cancels its compaction job, removes it from
    /// the map, and deletes its root directory.
    pub fn drop_database(&self, name: &str) -> Result<()> {
        let database = {
            let mut databases = self
                .databases
                .write()
                .map_err(|_| DbError::Internal("manager lock poisoned".into()))?;
            databases
                .remove(name)
                .ok_or_else(|| DbError::DatabaseNotFound(name.to_string()))?
        };

        if let Ok(mut jobs) = self.jobs.lock()
            && let Some(handle) = jobs.remove(name)
        {
            handle.cancel();
        }

        database.close()?;
        fs::remove_dir_all(&database.descriptor().path).map_err(|e| {
            error!(db = name, error = %e, "failed to remove database directory");
            DbError::DropDatabase(name.to_string())
        })?;
        self.persist_catalog()?;
        info!(db = name, "database dropped");
        Ok(())
    }

    /// The engine instance registered under `name`.
    pub fn database(&self, name: &str) -> Result<Arc<Database>> {
        let databases = self
            .databases
            .read()
            .map_err(|_| DbError::Internal("manager lock poisoned".into()))?;
        databases
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::DatabaseNotFound(name.to_string()))
    }

    /// All registered database names.
    pub fn database_names(&self) -> Vec<String> {
        self.databases
            .read()
            .map(|dbs| dbs.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Inserts an `Active` record.
    pub fn insert_data(&self, db: &str, key: &str, payload: Vec<u8>) -> Result<()> {
        self.database(db)?.insert(&Record::new(key, payload))
    }

    /// Logically deletes `key` by inserting its tombstone.
    pub fn delete_data(&self, db: &str, key: &str) -> Result<()> {
        self.database(db)?.insert(&Record::tombstone(key))
    }

    /// Looks up `key`. A tombstone is interpreted as absence here; the
    /// engine below returns it as a `Removed` record.
    pub fn get_data(&self, db: &str, key: &str) -> Result<Option<Record>> {
        Ok(self
            .database(db)?
            .get(key)?
            .filter(|record| !record.is_removed()))
    }

    /// Triggers one compaction round for `db`.
    pub fn compact(&self, db: &str) -> Result<Option<CompactionStats>> {
        self.database(db)?.compact()
    }

    /// Copies the database's commitlog and sealed data files into
    /// `<db-root>/snapshots/<19-digit-nanos>/`, returning the snapshot
    /// path. Writers are blocked for the duration of the copy.
    pub fn create_snapshot(&self, db: &str) -> Result<PathBuf> {
        let database = self.database(db)?;
        let dest = database
            .descriptor()
            .path
            .join(SNAPSHOT_DIR)
            .join(format!("{:019}", now_nanos()));
        database.snapshot_to(&dest).map_err(|e| {
            error!(db, error = %e, "failed to create snapshot");
            DbError::CreateSnapshot(db.to_string())
        })?;
        info!(db, snapshot = %dest.display(), "snapshot created");
        Ok(dest)
    }

    /// Cancels every compaction job and closes every database.
    pub fn close(&self) -> Result<()> {
        self.scheduler.shutdown();
        if let Ok(mut jobs) = self.jobs.lock() {
            for (_, handle) in jobs.drain() {
                handle.cancel();
            }
        }
        let databases = self
            .databases
            .read()
            .map_err(|_| DbError::Internal("manager lock poisoned".into()))?;
        for database in databases.values() {
            database.close()?;
        }
        Ok(())
    }

    /// Registers the periodic compaction job for `database`.
    fn register_compaction(&self, database: &Arc<Database>) {
        let job_db = Arc::clone(database);
        let handle = self.scheduler.register(
            format!("compaction/{}", database.name()),
            database.descriptor().compaction_interval(),
            move || job_db.compact().map(|_| ()),
        );
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.insert(database.name().to_string(), handle);
        }
    }

    fn catalog_path(&self) -> PathBuf {
        self.config.path.join(CATALOG_FILE)
    }

    fn read_catalog(&self) -> Result<Vec<Descriptor>> {
        let path = self.catalog_path();
        if !path.is_file() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Writes the descriptor list as pretty JSON via a temp file and
    /// rename, so the catalog is never observed half-written.
    fn persist_catalog(&self) -> Result<()> {
        let databases = self
            .databases
            .read()
            .map_err(|_| DbError::Internal("manager lock poisoned".into()))?;
        let mut descriptors: Vec<Descriptor> = databases
            .values()
            .map(|db| db.descriptor().clone())
            .collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        drop(databases);

        let json = serde_json::to_string_pretty(&descriptors)?;
        let path = self.catalog_path();
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        self.scheduler.shutdown();
        if let Ok(mut jobs) = self.jobs.lock() {
            for (name, handle) in jobs.drain() {
                warn!(db = %name, "cancelling compaction job on manager drop");
                handle.cancel();
            }
        }
    }
}
