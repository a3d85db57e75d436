//! # World Session
//!
//! Owns the registry, the storage manager and the chunk streamer of one
//! world, and drives them from the game thread.
//!
//! ```text
//! tick():
//!   1. streamer.tick()      regions, ready fan-out, eviction
//!   2. storage.update()     requested or periodic save
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use strata_persist::TypeHandlerRegistry;
use strata_storage::{
    GlobalStore, InMemoryWorldState, SaveReport, StorageConfig, StorageManager, WorldManifest, WorldState,
};
use strata_world::{ChunkProducer, ChunkStorage, ChunkStreamer, TickReport};
use tracing::{debug, info};

use crate::config::WorldConfig;
use crate::error::SessionResult;

/// Where a world lives on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorldDescriptor {
    /// Directory holding all worlds.
    pub root: PathBuf,
    /// World directory name.
    pub world_name: String,
    /// Whether chunks are kept in one archive.
    pub archive_chunks: bool,
}

impl From<&StorageConfig> for WorldDescriptor {
    fn from(config: &StorageConfig) -> Self {
        Self {
            root: config.root.clone(),
            world_name: config.world_name.clone(),
            archive_chunks: config.archive_chunks,
        }
    }
}

impl WorldDescriptor {
    fn storage_config(&self) -> StorageConfig {
        StorageConfig {
            root: self.root.clone(),
            world_name: self.world_name.clone(),
            archive_chunks: self.archive_chunks,
            ..StorageConfig::default()
        }
    }
}

/// World-level state read back by [`WorldSession::load`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoadedWorld {
    /// Manifest of the last save, `None` for a new world.
    pub manifest: Option<WorldManifest>,
    /// World-scoped entities.
    pub global: GlobalStore,
}

impl LoadedWorld {
    /// Returns true if the world was never saved.
    #[must_use]
    pub const fn is_new(&self) -> bool {
        self.manifest.is_none()
    }

    /// Puts the global entities back into `world`.
    pub fn restore_into(&self, world: &InMemoryWorldState) {
        for entity in &self.global.entities {
            world.insert(entity.clone());
        }
        world.restore_next_id(self.global.next_entity_id);
    }
}

/// Result of one [`WorldSession::tick`].
#[derive(Clone, Debug, Default)]
pub struct SessionTick {
    /// What the streamer did.
    pub streaming: TickReport,
    /// The save run by this tick, if one was due.
    pub save: Option<SaveReport>,
}

/// One open world.
pub struct WorldSession {
    config: WorldConfig,
    registry: Arc<TypeHandlerRegistry>,
    storage: Arc<StorageManager>,
    streamer: ChunkStreamer,
    state: Arc<dyn WorldState>,
}

impl WorldSession {
    /// Opens the world named by `config.storage` and starts streaming.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the world
    /// directory cannot be created or the worker pool cannot start.
    pub fn open(
        config: WorldConfig,
        producer: Arc<dyn ChunkProducer>,
        state: Arc<dyn WorldState>,
    ) -> SessionResult<Self> {
        config.validate()?;
        let registry = Arc::new(TypeHandlerRegistry::new());
        let storage = Arc::new(StorageManager::open(
            config.storage.clone(),
            config.seed,
            Arc::clone(&registry),
        )?);
        let streamer = ChunkStreamer::new(
            config.streaming.clone(),
            producer,
            Arc::clone(&storage) as Arc<dyn ChunkStorage>,
        )?;
        info!(
            world = config.storage.world_name.as_str(),
            seed = config.seed,
            workers = config.streaming.worker_threads,
            "world session opened"
        );
        Ok(Self {
            config,
            registry,
            storage,
            streamer,
            state,
        })
    }

    /// Reads the manifest and global store of the world at `descriptor`.
    /// A world that does not exist yet loads as new. Nothing is created on
    /// disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the descriptor names an invalid world or the
    /// manifest exists but cannot be read.
    pub fn load(descriptor: &WorldDescriptor) -> SessionResult<LoadedWorld> {
        let storage = StorageManager::open_existing(descriptor.storage_config(), Arc::new(TypeHandlerRegistry::new()))?;
        let loaded = LoadedWorld {
            manifest: storage.load_manifest(),
            global: storage.load_global_store(),
        };
        debug!(
            world = descriptor.world_name.as_str(),
            seed = storage.seed(),
            new = loaded.is_new(),
            global_entities = loaded.global.entities.len(),
            "world loaded"
        );
        Ok(loaded)
    }

    /// Saves the whole world. Blocks while another save runs.
    pub fn save(&self) -> SaveReport {
        self.storage.save(&self.streamer, self.state.as_ref())
    }

    /// Runs one streaming pass, then a save if one is due.
    pub fn tick(&self) -> SessionTick {
        let streaming = self.streamer.tick();
        let save = self.storage.update(&self.streamer, self.state.as_ref());
        SessionTick { streaming, save }
    }

    /// Saves one last time and stops the worker pool.
    pub fn shutdown(self) -> SaveReport {
        self.streamer.flush_generation_queue();
        let report = self.save();
        info!(
            world = self.config.storage.world_name.as_str(),
            complete = report.is_complete(),
            "world session closed"
        );
        report
    }

    /// Session configuration.
    #[must_use]
    pub const fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Type handler registry shared by every store.
    #[must_use]
    pub fn registry(&self) -> &Arc<TypeHandlerRegistry> {
        &self.registry
    }

    /// Storage manager.
    #[must_use]
    pub fn storage(&self) -> &Arc<StorageManager> {
        &self.storage
    }

    /// Chunk streamer.
    #[must_use]
    pub const fn streamer(&self) -> &ChunkStreamer {
        &self.streamer
    }

    /// Runtime state saved by this session.
    #[must_use]
    pub fn state(&self) -> &Arc<dyn WorldState> {
        &self.state
    }
}
