//! # STRATA Storage
//!
//! Whole-world persistence on top of the persist registry and the chunk
//! streamer.
//!
//! ## Design Principles
//!
//! 1. **One save at a time**: [`StorageManager::begin_save`] blocks while
//!    another save runs
//! 2. **Best effort**: a store that fails to write is reported, the rest of
//!    the save continues
//! 3. **Loads never fail**: missing or corrupt stores come back empty
//! 4. **Crash safe files**: everything is written to `*.tmp` and renamed
//!
//! ## Core Components
//!
//! - [`FarStore`] / [`DiskStore`]: keyed byte storage, loose files or one
//!   chunk archive
//! - [`PlayerStore`] / [`ChunkStore`] / [`GlobalStore`]: persisted bundles
//! - [`StorageManager`]: save orchestration, staging of evicted chunks and
//!   departed players, auto-save
//! - [`WorldManifest`]: `manifest.toml` summary of the last save
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_storage::{InMemoryWorldState, StorageConfig, StorageManager};
//!
//! let storage = Arc::new(StorageManager::open(StorageConfig::default(), seed, registry)?);
//! let streamer = ChunkStreamer::new(streaming, producer, storage.clone())?;
//!
//! let report = storage.save(&streamer, &world);
//! for failure in &report.failures {
//!     println!("not saved: {failure}");
//! }
//! let store = storage.load_chunk_store(ChunkCoord::new(1, 2, 3));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod archive;
pub mod config;
pub mod error;
pub mod far_store;
pub mod manager;
pub mod manifest;
pub mod partition;
pub mod records;
pub mod save_gate;
pub mod world_state;

pub use archive::{decode_archive, encode_archive, ArchiveEntries, ChunkArchive};
pub use config::StorageConfig;
pub use error::{StorageError, StorageResult};
pub use far_store::{DiskStore, FarStore, MemoryFarStore, StoreKey};
pub use manager::{SaveFailure, SaveReport, StorageManager};
pub use manifest::{WorldManifest, FORMAT_VERSION, MANIFEST_FILE};
pub use partition::{partition, Partition};
pub use records::{chunk_of, ChunkStore, EntityId, EntityRecord, GlobalStore, PlayerStore};
pub use save_gate::{SaveGate, SaveGuard};
pub use world_state::{InMemoryWorldState, PlayerInfo, WorldState};
