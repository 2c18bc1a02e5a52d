//! Crate-level error type.
//!
//! Each storage subsystem defines its own error enum (`StreamError`,
//! `CommitlogError`, `DataFileError`, ...) and the domain-level kinds
//! surfaced to collaborators live here. The HTTP/query layer (out of
//! scope for this crate) maps these to user-facing responses.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::bloom::FilterError;
use crate::commitlog::CommitlogError;
use crate::datafile::DataFileError;
use crate::stream::StreamError;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DbError>;

/// Domain-level errors surfaced to collaborators.
#[derive(Debug, Error)]
pub enum DbError {
    /// Could not create a database.
    #[error("could not create database `{0}`")]
    CreateDatabase(String),

    /// Could not create a database snapshot.
    #[error("could not create snapshot of database `{0}`")]
    CreateSnapshot(String),

    /// Could not drop a database.
    #[error("could not drop database `{0}`")]
    DropDatabase(String),

    /// Could not open a database from disk.
    #[error("could not open database `{0}`")]
    OpenDatabase(String),

    /// No database registered under the given name.
    #[error("database `{0}` not found")]
    DatabaseNotFound(String),

    /// On-disk data failed integrity validation.
    #[error("could not read data from {0}: file corrupted")]
    FileCorrupted(PathBuf),

    /// Underlying filesystem I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Frame codec error.
    #[error("stream error: {0}")]
    Stream(StreamError),

    /// Commitlog subsystem error.
    #[error("commitlog error: {0}")]
    Commitlog(CommitlogError),

    /// Data file subsystem error.
    #[error("data file error: {0}")]
    DataFile(DataFileError),

    /// Bloom filter subsystem error.
    #[error("bloom filter error: {0}")]
    Filter(#[from] FilterError),

    /// Descriptor catalog (de)serialization error.
    #[error("catalog error: {0}")]
    Catalog(#[from] serde_json::Error),

    /// Internal invariant violation (poisoned lock, unexpected state).
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StreamError> for DbError {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::Io(e) => DbError::Io(e),
            other => DbError::Stream(other),
        }
    }
}

impl From<CommitlogError> for DbError {
    fn from(err: CommitlogError) -> Self {
        match err {
            CommitlogError::Io(e) => DbError::Io(e),
            other => DbError::Commitlog(other),
        }
    }
}

impl From<DataFileError> for DbError {
    fn from(err: DataFileError) -> Self {
        match err {
            // The corruption kind is a first-class domain error.
            DataFileError::FileCorrupted(path) => DbError::FileCorrupted(path),
            other => DbError::DataFile(other),
        }
    }
}
