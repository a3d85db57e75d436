//! # Storage Error Types
//!
//! Errors raised by one store operation. The manager recovers all of them at
//! the boundary of that operation.

use strata_persist::PersistError;
use thiserror::Error;

/// Errors that can occur while reading or writing persisted stores.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Disk or medium failure.
    #[error("i/o error on {path}: {reason}")]
    Io {
        /// File involved.
        path: String,
        /// OS error text.
        reason: String,
    },

    /// Bytes were present but could not be decoded.
    #[error("corrupt {what}: {reason}")]
    Corrupt {
        /// Which store or file.
        what: String,
        /// What was wrong.
        reason: String,
    },

    /// Value model failure.
    #[error(transparent)]
    Persist(#[from] PersistError),

    /// A store or archive too large for its length fields.
    #[error("too large: {0}")]
    TooLarge(String),

    /// A player id that cannot be used as a file name.
    #[error("invalid store key: {0}")]
    InvalidKey(String),

    /// Unusable storage configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The world manifest could not be read or written.
    #[error("manifest error: {0}")]
    Manifest(String),
}

impl StorageError {
    /// Wraps an I/O error with the path it happened on.
    pub(crate) fn io(path: &std::path::Path, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
