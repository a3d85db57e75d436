//! # STRATA
//!
//! Chunk streaming and world persistence for voxel worlds.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          WorldSession                            │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  ┌────────────────┐   evict / load    ┌─────────────────────┐    │
//! │  │ ChunkStreamer  │──────────────────>│  StorageManager     │    │
//! │  │ (strata_world) │<──────────────────│  (strata_storage)   │    │
//! │  │                │                   │                     │    │
//! │  │ • regions      │   save snapshot   │ • staging           │    │
//! │  │ • near-cache   │──────────────────>│ • save gate         │    │
//! │  │ • worker pool  │                   │ • far-store         │    │
//! │  └────────────────┘                   └──────────┬──────────┘    │
//! │                                                  │               │
//! │                                       ┌──────────┴──────────┐    │
//! │                                       │ TypeHandlerRegistry │    │
//! │                                       │ (strata_persist)    │    │
//! │                                       └─────────────────────┘    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `config`: the world TOML file
//! - `session`: open, tick, save, load

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod session;

// Re-export the layers
pub use strata_persist as persist;
pub use strata_storage as storage;
pub use strata_world as world;

pub use config::WorldConfig;
pub use error::{SessionError, SessionResult};
pub use session::{LoadedWorld, SessionTick, WorldDescriptor, WorldSession};
