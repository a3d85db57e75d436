//! # World Error Types
//!
//! Errors raised while producing or streaming chunks.

use thiserror::Error;

use crate::coord::ChunkCoord;

/// Errors that can occur in the world subsystem.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorldError {
    /// The chunk producer could not build a chunk.
    #[error("generation failed at {coord}: {reason}")]
    GenerationFailed {
        /// Requested coordinate.
        coord: ChunkCoord,
        /// Producer's explanation.
        reason: String,
    },

    /// Persisted chunk data could not be turned back into a chunk.
    #[error("corrupt chunk data at {coord}: {reason}")]
    CorruptChunk {
        /// Coordinate of the stored chunk.
        coord: ChunkCoord,
        /// What was wrong.
        reason: String,
    },

    /// Streaming configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A worker thread could not be started.
    #[error("failed to spawn worker: {0}")]
    WorkerSpawn(String),
}

/// Result type for world operations.
pub type WorldResult<T> = Result<T, WorldError>;
