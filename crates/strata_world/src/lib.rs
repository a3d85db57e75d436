//! # STRATA World
//!
//! Decides which chunks of an unbounded world must be resident, produces
//! them in the background and evicts the cold ones.
//!
//! ## Design Principles
//!
//! 1. **Relevance driven**: observers declare a region; everything else is
//!    eventually evicted
//! 2. **Neighbour complete**: a chunk is only handed out once its 3x3x1
//!    footprint is at least light-pending
//! 3. **Nearest first**: pending work is ordered by distance to the closest
//!    region center
//! 4. **Non-blocking eviction**: chunks locked for mutation are skipped
//!
//! ## Core Components
//!
//! - `ChunkCoord` / `Chunk`: chunk-space addressing and block data
//! - `ChunkProducer`: external world generator
//! - `ChunkStorage`: far-store seam consulted before generating
//! - `GenerationPipeline`: worker pool with a priority queue
//! - `ChunkStreamer`: regions, near-cache, ready fan-out, eviction
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_world::{ChunkCoord, ChunkStreamer, FlatChunkProducer, NullStorage, ObserverId, StreamingConfig};
//!
//! let streamer = ChunkStreamer::new(
//!     StreamingConfig::default(),
//!     Arc::new(FlatChunkProducer::default()),
//!     Arc::new(NullStorage),
//! )?;
//! streamer.add_region(ObserverId(1), ChunkCoord::ORIGIN, 2, observer);
//! streamer.flush_generation_queue();
//! assert!(streamer.get_chunk(ChunkCoord::ORIGIN).is_some());
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod chunk;
pub mod config;
pub mod coord;
pub mod error;
pub mod pipeline;
pub mod producer;
pub mod region;
pub mod storage;
pub mod streamer;

pub use chunk::{Block, Chunk, ChunkState, BLOCKS_PER_CHUNK, CHUNK_SIZE, MAX_LIGHT};
pub use config::StreamingConfig;
pub use coord::ChunkCoord;
pub use error::{WorldError, WorldResult};
pub use pipeline::{GenerationJob, GenerationPipeline, GenerationTask};
pub use producer::{ChunkProducer, FlatChunkProducer};
pub use region::{ChunkObserver, ObserverId, RelevanceRegion, GENERATION_MARGIN};
pub use storage::{ChunkStorage, MemoryChunkStorage, NullStorage};
pub use streamer::{ChunkRef, ChunkStreamer, StreamingStats, TickReport};
