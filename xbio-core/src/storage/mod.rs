//! Durable storage primitive
//!
//! The session store and the phase-config loader reach flash only through
//! [`Storage`]. Paths are `/`-separated and relative to the backend root,
//! e.g. `sessions/2024-05-01T10-00-00Z_cycle_0001.json`.
//!
//! ## Backends
//!
//! - [`MemoryStorage`]: in-RAM map, for tests and hosts without a disk
//! - [`FsStorage`]: a directory on the host filesystem (requires `std`)

use alloc::string::String;
use alloc::vec::Vec;

use crate::errors::StorageResult;
use crate::time::Timestamp;

pub mod memory;

#[cfg(feature = "std")]
pub mod fs;

pub use memory::MemoryStorage;

#[cfg(feature = "std")]
pub use fs::FsStorage;

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Bare entry name, no directory prefix
    pub name: String,
    /// Entry is a directory
    pub is_dir: bool,
    /// Last modification, in backend-specific monotonic units
    pub modified: Timestamp,
}

/// File read/write primitive
pub trait Storage {
    /// Create `dir` and any missing parents; existing directories are fine
    fn create_dir_all(&mut self, dir: &str) -> StorageResult<()>;

    /// Replace the contents of `path` with `bytes`
    fn write(&mut self, path: &str, bytes: &[u8]) -> StorageResult<()>;

    /// Read `path` into `out`, replacing its contents
    ///
    /// Reuses the capacity `out` already has.
    fn read_into(&self, path: &str, out: &mut Vec<u8>) -> StorageResult<()>;

    /// Remove the file at `path`
    fn remove(&mut self, path: &str) -> StorageResult<()>;

    /// Entries directly inside `dir`
    fn list(&self, dir: &str) -> StorageResult<Vec<DirEntry>>;

    /// Whether a file or directory exists at `path`
    fn exists(&self, path: &str) -> bool;

    /// Read `path` into a fresh vector
    fn read(&self, path: &str) -> StorageResult<Vec<u8>> {
        let mut out = Vec::new();
        self.read_into(path, &mut out)?;
        Ok(out)
    }
}

impl<S: Storage + ?Sized> Storage for &mut S {
    fn create_dir_all(&mut self, dir: &str) -> StorageResult<()> {
        (**self).create_dir_all(dir)
    }

    fn write(&mut self, path: &str, bytes: &[u8]) -> StorageResult<()> {
        (**self).write(path, bytes)
    }

    fn read_into(&self, path: &str, out: &mut Vec<u8>) -> StorageResult<()> {
        (**self).read_into(path, out)
    }

    fn remove(&mut self, path: &str) -> StorageResult<()> {
        (**self).remove(path)
    }

    fn list(&self, dir: &str) -> StorageResult<Vec<DirEntry>> {
        (**self).list(dir)
    }

    fn exists(&self, path: &str) -> bool {
        (**self).exists(path)
    }
}

/// `dir/name`
pub fn join(dir: &str, name: &str) -> String {
    let mut path = String::with_capacity(dir.len() + 1 + name.len());
    path.push_str(dir.trim_end_matches('/'));
    path.push('/');
    path.push_str(name);
    path
}
