//! Error Types for Storage, Sessions and Sync Transfers
//!
//! ## Error Categories
//!
//! ### Backend
//! - [`StorageError`]: the file read/write primitive failed (missing path,
//!   not a directory, I/O)
//!
//! ### Persistence
//! - [`StoreError`]: a session could not be built, written, read or removed
//!
//! ### Transfer
//! - [`TransferError`]: a sync command was refused or a transfer failed.
//!   Every variant maps to the short message carried by the error sentinel
//!   (see [`TransferError::client_message`]).
//!
//! ### Framing
//! - [`FrameError`]: a chunk frame could not be built, or a received frame
//!   sequence does not reassemble
//!
//! ### Configuration
//! - [`ConfigError`]: runtime configuration could not be parsed or is out of
//!   range
//!
//! Acquisition failures are not errors in this sense: the state machine
//! records a numeric code in the device context and moves to `Error`
//! (codes live in [`crate::constants::protocol`]).
//!
//! Sample buffer overflow has no error type at all. Appends past capacity
//! are dropped.

use alloc::string::String;

use thiserror_no_std::Error;

use crate::session::SessionName;

/// Result type for storage backend operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Failures reported by a [`crate::storage::Storage`] backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Path does not exist
    #[error("path not found")]
    NotFound,

    /// Path exists but is not a directory
    #[error("not a directory")]
    NotADirectory,

    /// Any other backend failure, with the backend's description
    #[error("storage I/O failed: {0}")]
    Io(String),
}

#[cfg(feature = "std")]
impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound,
            _ => Self::Io(alloc::format!("{}", err)),
        }
    }
}

/// Failures of the session store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Save requested with no buffered samples
    #[error("no samples to save")]
    EmptyBuffer,

    /// Filename is empty, too long, or escapes the sessions directory
    #[error("invalid session name")]
    InvalidName,

    /// No session with that name
    #[error("session not found: {0}")]
    NotFound(SessionName),

    /// Session file exists but holds no bytes
    #[error("session file is empty: {0}")]
    EmptyFile(SessionName),

    /// Session document could not be encoded or decoded
    #[error("session document malformed: {0}")]
    Serialization(String),

    /// One or more files survived a delete-all pass
    #[error("{failed} session file(s) could not be deleted")]
    PartialDelete {
        /// Number of files that could not be removed
        failed: usize,
    },

    /// Backend failure
    #[error("storage failure: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for StoreError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(alloc::format!("{}", err))
    }
}

/// Failures of the sync transfer engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// A transfer is in progress; the command was ignored
    #[error("transfer in progress")]
    Busy,

    /// Opcode is not one of the sync commands
    #[error("unknown sync opcode 0x{0:02X}")]
    UnknownCommand(u8),

    /// Command needs a filename payload and none was given
    #[error("no filename provided")]
    MissingFilename,

    /// Filename payload is not a valid session name
    #[error("invalid filename")]
    InvalidFilename,

    /// Send-latest found no stored sessions
    #[error("no sessions stored")]
    NoSessions,

    /// Session could not be read
    #[error("session load failed")]
    LoadFailed,

    /// Session file holds no bytes
    #[error("session file is empty")]
    EmptyFile,

    /// Session needs more chunks than the 16-bit header can carry
    #[error("session needs {chunks} chunks")]
    TooLarge {
        /// Chunks the session would need
        chunks: usize,
    },

    /// A chunk could not be handed to the transport
    #[error("chunk {index} not sent: {frame}")]
    SendFailed {
        /// Chunk that failed
        index: u16,
        /// Framing failure
        frame: FrameError,
    },

    /// Single-session delete failed
    #[error("delete failed")]
    DeleteFailed,

    /// Delete-all left at least one file behind
    #[error("delete all failed")]
    DeleteAllFailed,
}

impl TransferError {
    /// Short message carried in the error sentinel
    pub const fn client_message(&self) -> &'static str {
        match self {
            Self::Busy => "Busy",
            Self::UnknownCommand(_) => "Unknown cmd",
            Self::MissingFilename => "No filename",
            Self::InvalidFilename => "Invalid filename",
            Self::NoSessions => "No sessions",
            Self::LoadFailed => "Load failed",
            Self::EmptyFile => "Empty file",
            Self::TooLarge { .. } => "Session too large",
            Self::SendFailed { .. } => "Send failed",
            Self::DeleteFailed => "Delete failed",
            Self::DeleteAllFailed => "Delete all failed",
        }
    }
}

/// Chunk frame encoding and reassembly failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Payload exceeds the largest chunk the framing accepts
    #[error("chunk payload of {len} bytes exceeds frame capacity")]
    PayloadTooLarge {
        /// Offending payload length
        len: usize,
    },

    /// Frame shorter than its 4-byte header
    #[error("frame truncated ({len} bytes)")]
    Truncated {
        /// Bytes received
        len: usize,
    },

    /// Chunk index differs from the next expected one
    #[error("chunk {got} received, expected {expected}")]
    OutOfOrder {
        /// Next index the assembler was waiting for
        expected: u16,
        /// Index carried by the frame
        got: u16,
    },

    /// Total-chunk count changed mid-transfer
    #[error("total changed from {expected} to {got}")]
    TotalMismatch {
        /// Total announced by the first chunk
        expected: u16,
        /// Total carried by the frame
        got: u16,
    },

    /// Completion sentinel arrived before every chunk did
    #[error("transfer completed after {received} of {total} chunks")]
    Incomplete {
        /// Chunks received
        received: u16,
        /// Chunks announced
        total: u16,
    },

    /// Device reported a sync error
    #[error("device reported: {0}")]
    Remote(String),
}

/// Runtime configuration failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Configuration document could not be parsed
    #[error("config parse failed: {0}")]
    Parse(String),

    /// A field is outside its permitted range
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// What is wrong with it
        reason: &'static str,
    },
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(alloc::format!("{}", err))
    }
}
