//! Directory-scoped file handles keyed by logical file kind.
//!
//! Each commitlog or data-file directory holds up to three files, one
//! per [`FileKind`]. Components never spell out file names; they ask the
//! [`FileStore`] for a kind and get back a handle or a path. Rotation
//! renames the commitlog-kind file to the data kind in place.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Logical kind of a file inside a commitlog or data-file directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// The active append-only log.
    Commitlog,
    /// Sealed record frames of a data file.
    Data,
    /// Serialized index summary entries.
    Index,
    /// Serialized bloom filter.
    BloomFilter,
}

impl FileKind {
    /// Conventional on-disk name for this kind.
    pub fn file_name(self) -> &'static str {
        match self {
            FileKind::Commitlog => "commitlog.log",
            FileKind::Data => "data.db",
            FileKind::Index => "index.db",
            FileKind::BloomFilter => "filter.bloom",
        }
    }
}

/// A set of file handles scoped to one directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Scopes a store to `dir`, creating the directory if needed.
    pub fn create(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Scopes a store to an existing directory.
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such directory: {}", dir.display()),
            ));
        }
        Ok(Self { dir })
    }

    /// Creates (truncating) a file of the given kind for writing.
    pub fn create_file(&self, kind: FileKind) -> io::Result<File> {
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(self.path(kind))
    }

    /// Opens a file of the given kind in append mode, creating it if
    /// absent. Read access is kept so the same handle can replay.
    pub fn append_file(&self, kind: FileKind) -> io::Result<File> {
        OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(self.path(kind))
    }

    /// Opens a file of the given kind read-only.
    pub fn open_file(&self, kind: FileKind) -> io::Result<File> {
        File::open(self.path(kind))
    }

    /// Renames the file of kind `from` to the name of kind `to`, within
    /// this directory.
    pub fn rename(&self, from: FileKind, to: FileKind) -> io::Result<()> {
        fs::rename(self.path(from), self.path(to))
    }

    /// On-disk byte length of the file of the given kind.
    pub fn size(&self, kind: FileKind) -> io::Result<u64> {
        Ok(fs::metadata(self.path(kind))?.len())
    }

    pub fn exists(&self, kind: FileKind) -> bool {
        self.path(kind).is_file()
    }

    /// Full path of the file of the given kind.
    pub fn path(&self, kind: FileKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    /// The directory this store is scoped to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Syncs the directory entry itself, making renames and file
    /// creations durable.
    pub fn sync_dir(&self) -> io::Result<()> {
        File::open(&self.dir)?.sync_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn create_write_open_round_trip() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::create(tmp.path().join("db")).unwrap();

        let mut f = store.create_file(FileKind::Data).unwrap();
        f.write_all(b"hello").unwrap();
        drop(f);

        assert!(store.exists(FileKind::Data));
        assert_eq!(store.size(FileKind::Data).unwrap(), 5);
        assert!(!store.exists(FileKind::Index));
    }

    #[test]
    fn rename_commitlog_to_data() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::create(tmp.path()).unwrap();

        let mut f = store.create_file(FileKind::Commitlog).unwrap();
        f.write_all(b"frames").unwrap();
        drop(f);

        store.rename(FileKind::Commitlog, FileKind::Data).unwrap();
        assert!(!store.exists(FileKind::Commitlog));
        assert_eq!(store.size(FileKind::Data).unwrap(), 6);
    }

    #[test]
    fn open_missing_directory_fails() {
        let tmp = TempDir::new().unwrap();
        assert!(FileStore::open(tmp.path().join("absent")).is_err());
    }

    #[test]
    fn append_file_preserves_contents() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::create(tmp.path()).unwrap();

        let mut f = store.append_file(FileKind::Commitlog).unwrap();
        f.write_all(b"one").unwrap();
        drop(f);
        let mut f = store.append_file(FileKind::Commitlog).unwrap();
        f.write_all(b"two").unwrap();
        drop(f);

        assert_eq!(store.size(FileKind::Commitlog).unwrap(), 6);
    }
}
