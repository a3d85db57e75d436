//! # Chunk Producers
//!
//! The world generator lives outside this crate. Workers hand it a
//! coordinate and get a filled chunk back, or an error that is logged and
//! counted.

use crate::chunk::{Block, Chunk, CHUNK_SIZE, MAX_LIGHT};
use crate::coord::ChunkCoord;
use crate::error::WorldResult;

/// Produces chunk contents on a worker thread.
pub trait ChunkProducer: Send + Sync {
    /// Builds the chunk at `coord`.
    ///
    /// # Errors
    ///
    /// Any error is reported as a failed generation; the coordinate is
    /// retried the next time a region asks for it.
    fn generate(&self, coord: ChunkCoord) -> WorldResult<Chunk>;
}

impl<F> ChunkProducer for F
where
    F: Fn(ChunkCoord) -> WorldResult<Chunk> + Send + Sync,
{
    fn generate(&self, coord: ChunkCoord) -> WorldResult<Chunk> {
        self(coord)
    }
}

/// Flat terrain: solid below `ground_level` (world block Y), air above,
/// full sunlight in the air.
#[derive(Clone, Copy, Debug)]
pub struct FlatChunkProducer {
    /// First air layer, in world blocks.
    pub ground_level: i32,
    /// Fill block.
    pub block: Block,
}

impl Default for FlatChunkProducer {
    fn default() -> Self {
        Self {
            ground_level: 0,
            block: Block::STONE,
        }
    }
}

impl ChunkProducer for FlatChunkProducer {
    #[allow(clippy::cast_possible_wrap)]
    fn generate(&self, coord: ChunkCoord) -> WorldResult<Chunk> {
        let mut chunk = Chunk::new(coord);
        let (_, base_y, _) = coord.origin();
        for y in 0..CHUNK_SIZE {
            let solid = base_y + (y as i32) < self.ground_level;
            for z in 0..CHUNK_SIZE {
                for x in 0..CHUNK_SIZE {
                    if solid {
                        chunk.set_block(x, y, z, self.block);
                    } else {
                        chunk.set_sunlight(x, y, z, MAX_LIGHT);
                    }
                }
            }
        }
        chunk.mark_clean();
        Ok(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorldError;

    #[test]
    fn test_flat_producer_splits_at_ground() {
        let producer = FlatChunkProducer {
            ground_level: 8,
            block: Block::DIRT,
        };
        let chunk = producer.generate(ChunkCoord::ORIGIN).unwrap();
        assert_eq!(chunk.get_block(3, 7, 3), Block::DIRT);
        assert_eq!(chunk.get_block(3, 8, 3), Block::AIR);
        assert_eq!(chunk.sunlight(3, 8, 3), MAX_LIGHT);
        assert!(!chunk.is_dirty());

        let above = producer.generate(ChunkCoord::new(0, 1, 0)).unwrap();
        assert_eq!(above.solid_count(), 0);
    }

    #[test]
    fn test_closure_producer() {
        let producer = |coord: ChunkCoord| -> WorldResult<Chunk> {
            if coord.x < 0 {
                Err(WorldError::GenerationFailed {
                    coord,
                    reason: "west is unmapped".into(),
                })
            } else {
                Ok(Chunk::new(coord))
            }
        };
        assert!(producer.generate(ChunkCoord::new(1, 0, 0)).is_ok());
        assert!(producer.generate(ChunkCoord::new(-1, 0, 0)).is_err());
    }
}
