//! Session error types.

use strata_storage::StorageError;
use strata_world::WorldError;
use thiserror::Error;

/// Errors raised while opening a world session or reading its config.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Streaming could not start.
    #[error(transparent)]
    World(#[from] WorldError),

    /// Storage could not be opened.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The configuration file is missing or malformed.
    #[error("config error: {0}")]
    Config(String),
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
