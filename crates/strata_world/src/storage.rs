//! # Chunk Storage Seam
//!
//! Workers ask the far-store for a chunk before generating it, and the
//! streamer hands evicted chunks back. The on-disk implementation lives in
//! `strata_storage`; this module only carries the trait and two in-process
//! stand-ins.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::chunk::Chunk;
use crate::coord::ChunkCoord;

/// Far-store access used by the streamer.
///
/// Both methods are called from worker threads and the tick thread
/// concurrently. Failures are the implementation's to log; a failed load
/// falls back to generation.
pub trait ChunkStorage: Send + Sync {
    /// Returns the stored chunk at `coord`, if any.
    fn load_chunk(&self, coord: ChunkCoord) -> Option<Chunk>;

    /// Keeps an evicted chunk.
    fn store_chunk(&self, chunk: Chunk);
}

/// Stores nothing. Every chunk is generated.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullStorage;

impl ChunkStorage for NullStorage {
    fn load_chunk(&self, _coord: ChunkCoord) -> Option<Chunk> {
        None
    }

    fn store_chunk(&self, _chunk: Chunk) {}
}

/// Keeps evicted chunks in memory.
#[derive(Debug, Default)]
pub struct MemoryChunkStorage {
    chunks: Mutex<HashMap<ChunkCoord, Chunk>>,
}

impl MemoryChunkStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.lock().len()
    }

    /// True when nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.lock().is_empty()
    }

    /// True if a chunk is stored at `coord`.
    #[must_use]
    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.chunks.lock().contains_key(&coord)
    }
}

impl ChunkStorage for MemoryChunkStorage {
    fn load_chunk(&self, coord: ChunkCoord) -> Option<Chunk> {
        self.chunks.lock().get(&coord).cloned()
    }

    fn store_chunk(&self, chunk: Chunk) {
        self.chunks.lock().insert(chunk.coord(), chunk);
    }
}
