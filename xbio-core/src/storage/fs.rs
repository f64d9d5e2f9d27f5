//! Host filesystem storage backend
//!
//! Maps storage paths onto a root directory. Modification times are the
//! filesystem's, in milliseconds since the Unix epoch (0 when the platform
//! does not report one).

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use alloc::vec::Vec;

use super::{DirEntry, Storage};
use crate::errors::{StorageError, StorageResult};
use crate::time::Timestamp;

/// Directory-backed [`Storage`]
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    /// Storage rooted at `root`; the directory is created if missing
    pub fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let mut full = self.root.clone();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            full.push(part);
        }
        full
    }

    fn modified_ms(meta: &fs::Metadata) -> Timestamp {
        meta.modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as Timestamp)
            .unwrap_or(0)
    }
}

impl Storage for FsStorage {
    fn create_dir_all(&mut self, dir: &str) -> StorageResult<()> {
        fs::create_dir_all(self.resolve(dir)).map_err(|err| match err.kind() {
            ErrorKind::AlreadyExists => StorageError::NotADirectory,
            _ => err.into(),
        })
    }

    fn write(&mut self, path: &str, bytes: &[u8]) -> StorageResult<()> {
        fs::write(self.resolve(path), bytes)?;
        Ok(())
    }

    fn read_into(&self, path: &str, out: &mut Vec<u8>) -> StorageResult<()> {
        use std::io::Read;

        let full = self.resolve(path);
        if full.is_dir() {
            return Err(StorageError::Io("is a directory".into()));
        }
        let mut file = fs::File::open(full)?;
        out.clear();
        file.read_to_end(out)?;
        Ok(())
    }

    fn remove(&mut self, path: &str) -> StorageResult<()> {
        fs::remove_file(self.resolve(path))?;
        Ok(())
    }

    fn list(&self, dir: &str) -> StorageResult<Vec<DirEntry>> {
        let full = self.resolve(dir);
        if full.is_file() {
            return Err(StorageError::NotADirectory);
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(full)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: meta.is_dir(),
                modified: Self::modified_ms(&meta),
            });
        }
        Ok(entries)
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).exists()
    }
}
