//! # Persist Error Types
//!
//! Everything that can go wrong while turning bytes into a value tree.

use thiserror::Error;

/// Errors raised by the codec and the registry's typed helpers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistError {
    /// Bytes were present but do not form a valid frame or value tree.
    #[error("malformed data: {0}")]
    Malformed(String),

    /// Frame checksum does not match its contents.
    #[error("checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        /// Checksum read from the frame.
        stored: u32,
        /// Checksum computed over the frame body.
        computed: u32,
    },

    /// Frame was written by a newer format version.
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u8),

    /// A string, buffer or collection is too long for a frame.
    #[error("{0} exceeds the frame size limit")]
    TooLarge(String),

    /// Value tree nests deeper than the decoder allows.
    #[error("nesting deeper than {0} levels")]
    TooDeep(usize),

    /// No factory in the registry accepts the type.
    #[error("no type handler for {0}")]
    Unsupported(&'static str),

    /// A handler returned nothing for well-formed input of the wrong shape.
    #[error("value of type {0} could not be deserialized")]
    Rejected(&'static str),
}

/// Result type for persist operations.
pub type PersistResult<T> = Result<T, PersistError>;
