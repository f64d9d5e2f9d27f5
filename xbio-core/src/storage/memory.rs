//! In-memory storage backend
//!
//! Files live in a `BTreeMap` keyed by full path. Directories are tracked
//! explicitly so listing an unknown directory fails the way a filesystem
//! would. Modification times come from a write counter, so the last write
//! always has the largest `modified`.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use super::{DirEntry, Storage};
use crate::errors::{StorageError, StorageResult};
use crate::time::Timestamp;

#[derive(Debug, Clone)]
struct MemFile {
    bytes: Vec<u8>,
    modified: Timestamp,
}

/// RAM-backed [`Storage`]
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    files: BTreeMap<String, MemFile>,
    dirs: BTreeSet<String>,
    write_seq: Timestamp,
    /// Paths whose removal is refused, for exercising failure paths
    locked: BTreeSet<String>,
    /// Refuse every write
    read_only: bool,
}

impl MemoryStorage {
    /// Empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse removal of `path` with an I/O error
    pub fn lock(&mut self, path: &str) {
        self.locked.insert(path.to_string());
    }

    /// Refuse (or allow again) every write
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Number of stored files
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Set the modification stamp of an existing file
    pub fn touch(&mut self, path: &str, modified: Timestamp) -> StorageResult<()> {
        let file = self.files.get_mut(path).ok_or(StorageError::NotFound)?;
        file.modified = modified;
        Ok(())
    }

    fn parent(path: &str) -> Option<&str> {
        path.rfind('/').map(|idx| &path[..idx])
    }
}

impl Storage for MemoryStorage {
    fn create_dir_all(&mut self, dir: &str) -> StorageResult<()> {
        let dir = dir.trim_end_matches('/');
        if self.files.contains_key(dir) {
            return Err(StorageError::NotADirectory);
        }
        let mut prefix = String::new();
        for part in dir.split('/').filter(|p| !p.is_empty()) {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(part);
            self.dirs.insert(prefix.clone());
        }
        Ok(())
    }

    fn write(&mut self, path: &str, bytes: &[u8]) -> StorageResult<()> {
        if self.read_only {
            return Err(StorageError::Io("read-only".to_string()));
        }
        if let Some(parent) = Self::parent(path) {
            if !self.dirs.contains(parent) {
                return Err(StorageError::NotFound);
            }
        }
        self.write_seq += 1;
        self.files.insert(
            path.to_string(),
            MemFile {
                bytes: bytes.to_vec(),
                modified: self.write_seq,
            },
        );
        Ok(())
    }

    fn read_into(&self, path: &str, out: &mut Vec<u8>) -> StorageResult<()> {
        let file = self.files.get(path).ok_or(StorageError::NotFound)?;
        out.clear();
        out.extend_from_slice(&file.bytes);
        Ok(())
    }

    fn remove(&mut self, path: &str) -> StorageResult<()> {
        if self.locked.contains(path) {
            return Err(StorageError::Io("locked".to_string()));
        }
        self.files
            .remove(path)
            .map(|_| ())
            .ok_or(StorageError::NotFound)
    }

    fn list(&self, dir: &str) -> StorageResult<Vec<DirEntry>> {
        let dir = dir.trim_end_matches('/');
        if !self.dirs.contains(dir) {
            return Err(if self.files.contains_key(dir) {
                StorageError::NotADirectory
            } else {
                StorageError::NotFound
            });
        }

        let mut entries: Vec<DirEntry> = self
            .files
            .iter()
            .filter(|(path, _)| Self::parent(path) == Some(dir))
            .map(|(path, file)| DirEntry {
                name: path[dir.len() + 1..].to_string(),
                is_dir: false,
                modified: file.modified,
            })
            .collect();

        entries.extend(
            self.dirs
                .iter()
                .filter(|d| Self::parent(d) == Some(dir))
                .map(|d| DirEntry {
                    name: d[dir.len() + 1..].to_string(),
                    is_dir: true,
                    modified: 0,
                }),
        );
        Ok(entries)
    }

    fn exists(&self, path: &str) -> bool {
        let path = path.trim_end_matches('/');
        self.files.contains_key(path) || self.dirs.contains(path)
    }
}
