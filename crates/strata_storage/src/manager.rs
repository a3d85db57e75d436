//! # Storage Manager
//!
//! Whole-world saves and per-store loads.
//!
//! ## Save
//!
//! 1. Wait for any running save, then hold the [`SaveGate`]
//! 2. Move staged stores (evicted chunks, departed players) to the saving set
//! 3. Snapshot the complete chunks of the streamer and the world's entities
//! 4. Partition entities across player, chunk and global stores
//! 5. Write chunk stores, player stores, the global store and the manifest
//!
//! A store that fails to encode or write is logged and listed in the
//! [`SaveReport`]; the rest of the save continues. Staged stores that failed
//! go back to staging for the next save.
//!
//! ## Load
//!
//! Loads look in staging first, then in the far-store. A missing store is
//! not an error; a corrupt one is logged and treated as missing.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use strata_persist::{Compression, TypeHandlerRegistry};
use strata_world::{Chunk, ChunkCoord, ChunkState, ChunkStorage, ChunkStreamer};
use tracing::{debug, error, info, warn};

use crate::config::StorageConfig;
use crate::error::{StorageError, StorageResult};
use crate::far_store::{DiskStore, FarStore, StoreKey};
use crate::manifest::WorldManifest;
use crate::partition::partition;
use crate::records::{decode_record, encode_record, ChunkStore, EntityRecord, GlobalStore, PlayerStore};
use crate::save_gate::{SaveGate, SaveGuard};
use crate::world_state::{PlayerInfo, WorldState};

/// One store a save could not write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaveFailure {
    /// Store or file that failed, such as `chunk (1, 2, 3)` or `manifest`.
    pub target: String,
    /// Why.
    pub error: StorageError,
}

impl fmt::Display for SaveFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.target, self.error)
    }
}

/// Outcome of one save.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SaveReport {
    /// Which save this was, counting from 1.
    pub generation: u64,
    /// Chunk stores written, loaded and staged.
    pub chunks_written: usize,
    /// Player stores written, connected and departed.
    pub players_written: usize,
    /// Whether the global store was written.
    pub global_written: bool,
    /// Stores that could not be written.
    pub failures: Vec<SaveFailure>,
    /// Wall time of the save, waiting excluded.
    pub duration: Duration,
}

impl SaveReport {
    /// Returns true if every store was written.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, target: impl fmt::Display, error: StorageError) {
        error!(store = %target, error = %error, "store not saved");
        self.failures.push(SaveFailure {
            target: target.to_string(),
            error,
        });
    }
}

/// Encoded stores waiting for the next save.
#[derive(Debug, Default)]
struct Staging {
    unsaved_chunks: HashMap<ChunkCoord, Vec<u8>>,
    saving_chunks: HashMap<ChunkCoord, Vec<u8>>,
    unsaved_players: HashMap<String, Vec<u8>>,
    saving_players: HashMap<String, Vec<u8>>,
}

/// Orchestrates world saves and store loads.
pub struct StorageManager {
    config: StorageConfig,
    seed: u64,
    registry: Arc<TypeHandlerRegistry>,
    store: Arc<dyn FarStore>,
    /// Directory for the manifest. `None` keeps it in memory.
    manifest_dir: Option<PathBuf>,
    memory_manifest: Mutex<Option<WorldManifest>>,
    compression: Compression,
    staging: Mutex<Staging>,
    gate: Arc<SaveGate>,
    save_requested: AtomicBool,
    last_save: Mutex<Instant>,
}

impl StorageManager {
    /// Opens the world directory named by `config` on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the world
    /// directory cannot be created.
    pub fn open(config: StorageConfig, seed: u64, registry: Arc<TypeHandlerRegistry>) -> StorageResult<Self> {
        config.validate()?;
        let dir = config.world_dir();
        let store = DiskStore::open(&dir, config.archive_chunks)?;
        info!(dir = %dir.display(), archive = config.archive_chunks, "world storage opened");
        let mut manager = Self::with_store(config, seed, registry, Arc::new(store));
        manager.manifest_dir = Some(dir);
        Ok(manager)
    }

    /// Attaches to the world named by `config` for reading, creating
    /// nothing on disk. The seed is taken from the world's manifest, 0 for a
    /// world never saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the manifest
    /// exists but cannot be read.
    pub fn open_existing(config: StorageConfig, registry: Arc<TypeHandlerRegistry>) -> StorageResult<Self> {
        config.validate()?;
        let dir = config.world_dir();
        let seed = WorldManifest::read(&dir)?.map_or(0, |m| m.seed);
        let store = DiskStore::attach(&dir, config.archive_chunks);
        let mut manager = Self::with_store(config, seed, registry, Arc::new(store));
        manager.manifest_dir = Some(dir);
        Ok(manager)
    }

    /// Uses `store` as the far-store. The manifest is kept in memory.
    #[must_use]
    pub fn with_store(
        config: StorageConfig,
        seed: u64,
        registry: Arc<TypeHandlerRegistry>,
        store: Arc<dyn FarStore>,
    ) -> Self {
        let compression = if config.compress {
            Compression::Lz4
        } else {
            Compression::None
        };
        Self {
            config,
            seed,
            registry,
            store,
            manifest_dir: None,
            memory_manifest: Mutex::new(None),
            compression,
            staging: Mutex::new(Staging::default()),
            gate: Arc::new(SaveGate::new()),
            save_requested: AtomicBool::new(false),
            last_save: Mutex::new(Instant::now()),
        }
    }

    /// Storage configuration.
    #[must_use]
    pub const fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// World seed recorded in manifests.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Type handler registry used for every store.
    #[must_use]
    pub fn registry(&self) -> &Arc<TypeHandlerRegistry> {
        &self.registry
    }

    // =========================================================================
    // Loads
    // =========================================================================

    fn staged_chunk(&self, coord: ChunkCoord) -> Option<Vec<u8>> {
        let staging = self.staging.lock();
        staging
            .unsaved_chunks
            .get(&coord)
            .or_else(|| staging.saving_chunks.get(&coord))
            .cloned()
    }

    fn staged_player(&self, id: &str) -> Option<Vec<u8>> {
        let staging = self.staging.lock();
        staging
            .unsaved_players
            .get(id)
            .or_else(|| staging.saving_players.get(id))
            .cloned()
    }

    /// Reads `key`, logging and swallowing every failure.
    fn read_store(&self, key: &StoreKey) -> Option<Vec<u8>> {
        match self.store.get(key) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(key = %key, error = %e, "store unreadable");
                None
            }
        }
    }

    /// The stored player, or an empty store for a new or unreadable one.
    #[must_use]
    pub fn load_player_store(&self, id: &str) -> PlayerStore {
        let key = StoreKey::Player(id.to_owned());
        let Some(bytes) = self.staged_player(id).or_else(|| self.read_store(&key)) else {
            debug!(player = id, "no player store, starting fresh");
            return PlayerStore::new(id);
        };
        match decode_record::<PlayerStore>(&self.registry, &bytes) {
            Ok(mut store) => {
                store.player_id = id.to_owned();
                store
            }
            Err(e) => {
                warn!(player = id, error = %e, "player store corrupt, starting fresh");
                PlayerStore::new(id)
            }
        }
    }

    /// The stored chunk at `coord`, if it was ever saved.
    #[must_use]
    pub fn load_chunk_store(&self, coord: ChunkCoord) -> Option<ChunkStore> {
        let bytes = self
            .staged_chunk(coord)
            .or_else(|| self.read_store(&StoreKey::Chunk(coord)))?;
        match decode_record::<ChunkStore>(&self.registry, &bytes) {
            Ok(store) if store.coord() == coord => Some(store),
            Ok(store) => {
                warn!(coord = %coord, stored = %store.coord(), "chunk store holds another coordinate, ignored");
                None
            }
            Err(e) => {
                warn!(coord = %coord, error = %e, "chunk store corrupt, ignored");
                None
            }
        }
    }

    /// The world-scoped entities, empty for a new world.
    #[must_use]
    pub fn load_global_store(&self) -> GlobalStore {
        let Some(bytes) = self.read_store(&StoreKey::Global) else {
            return GlobalStore::default();
        };
        decode_record(&self.registry, &bytes).unwrap_or_else(|e| {
            warn!(error = %e, "global store corrupt, starting empty");
            GlobalStore::default()
        })
    }

    /// Manifest of the last save, `None` for a world never saved.
    #[must_use]
    pub fn load_manifest(&self) -> Option<WorldManifest> {
        let Some(dir) = &self.manifest_dir else {
            return self.memory_manifest.lock().clone();
        };
        WorldManifest::read(dir).unwrap_or_else(|e| {
            warn!(error = %e, "manifest unreadable");
            None
        })
    }

    // =========================================================================
    // Staging
    // =========================================================================

    /// Keeps the store of a departing player until the next save. `entities`
    /// is searched for the character and what it owns.
    pub fn deactivate_player(&self, player: &PlayerInfo, entities: Vec<EntityRecord>) {
        let Some(store) = partition(entities, std::slice::from_ref(player), &BTreeSet::new())
            .players
            .pop()
        else {
            return;
        };
        match encode_record(&self.registry, &store, self.compression) {
            Ok(bytes) => {
                debug!(player = %player.id, entities = store.entities.len(), "player staged");
                self.staging.lock().unsaved_players.insert(player.id.clone(), bytes);
            }
            Err(e) => error!(player = %player.id, error = %e, "player store not encodable, dropped"),
        }
    }

    /// Chunk stores waiting for the next save.
    #[must_use]
    pub fn staged_chunk_count(&self) -> usize {
        let staging = self.staging.lock();
        staging.unsaved_chunks.len() + staging.saving_chunks.len()
    }

    /// Player stores waiting for the next save.
    #[must_use]
    pub fn staged_player_count(&self) -> usize {
        let staging = self.staging.lock();
        staging.unsaved_players.len() + staging.saving_players.len()
    }

    // =========================================================================
    // Saving
    // =========================================================================

    /// Waits for any running save to finish, then starts one. The save
    /// lasts until the guard is passed to [`StorageManager::finish_save`] or
    /// dropped.
    #[must_use = "the save ends when the guard is dropped"]
    pub fn begin_save(&self) -> SaveGuard {
        self.gate.begin()
    }

    /// Like [`StorageManager::begin_save`], giving up after `timeout`.
    #[must_use]
    pub fn try_begin_save_for(&self, timeout: Duration) -> Option<SaveGuard> {
        self.gate.try_begin_for(timeout)
    }

    /// Ends the save started by `guard`.
    pub fn finish_save(&self, guard: SaveGuard) {
        debug!(generation = guard.generation(), "save finished by caller");
        guard.finish();
    }

    /// Returns true while a save is running.
    #[must_use]
    pub fn is_saving(&self) -> bool {
        self.gate.is_saving()
    }

    /// Asks [`StorageManager::update`] to save on its next call.
    pub fn request_save(&self) {
        self.save_requested.store(true, Ordering::Release);
    }

    /// Saves if one was requested or the auto-save interval elapsed.
    pub fn update(&self, streamer: &ChunkStreamer, world: &dyn WorldState) -> Option<SaveReport> {
        if self.is_saving() {
            return None;
        }
        let requested = self.save_requested.load(Ordering::Acquire);
        let interval = self.config.auto_save_interval_secs;
        let due = interval > 0 && self.last_save.lock().elapsed() >= Duration::from_secs(interval);
        if !requested && !due {
            return None;
        }
        if due && !requested {
            info!(interval_secs = interval, "auto-saving");
        }
        Some(self.save(streamer, world))
    }

    /// Saves the whole world: complete loaded chunks, staged chunks,
    /// connected and departed players, the global store and the manifest.
    pub fn save(&self, streamer: &ChunkStreamer, world: &dyn WorldState) -> SaveReport {
        let guard = self.begin_save();
        self.save_requested.store(false, Ordering::Release);
        let started = Instant::now();
        let mut report = SaveReport {
            generation: guard.generation(),
            ..SaveReport::default()
        };
        info!(generation = report.generation, "save started");

        let (mut staged_chunks, mut staged_players) = self.take_staging();

        let loaded: Vec<Chunk> = streamer
            .loaded_chunks()
            .into_iter()
            .filter(|c| c.state() == ChunkState::Complete)
            .collect();
        let players = world.connected_players();
        let saved: BTreeSet<ChunkCoord> = loaded.iter().map(Chunk::coord).collect();
        let mut parts = partition(world.persistent_entities(), &players, &saved);

        // Chunks
        let mut batch = Vec::with_capacity(loaded.len() + staged_chunks.len());
        for chunk in loaded {
            let coord = chunk.coord();
            staged_chunks.remove(&coord);
            let store = ChunkStore {
                chunk,
                entities: parts.chunks.remove(&coord).unwrap_or_default(),
            };
            match encode_record(&self.registry, &store, self.compression) {
                Ok(bytes) => batch.push((coord, bytes)),
                Err(e) => report.fail(StoreKey::Chunk(coord), e),
            }
        }
        let staged_coords: BTreeSet<ChunkCoord> = staged_chunks.keys().copied().collect();
        batch.extend(staged_chunks);
        let (written, failed) = self.store.put_chunks(batch);
        report.chunks_written = written;
        let mut restage_chunks = Vec::new();
        for (coord, e) in failed {
            if staged_coords.contains(&coord) {
                restage_chunks.push(coord);
            }
            report.fail(StoreKey::Chunk(coord), e);
        }

        // Players
        for store in parts.players {
            staged_players.remove(&store.player_id);
            let key = StoreKey::Player(store.player_id.clone());
            match encode_record(&self.registry, &store, self.compression)
                .and_then(|bytes| self.store.put(&key, &bytes))
            {
                Ok(()) => report.players_written += 1,
                Err(e) => report.fail(key, e),
            }
        }
        let mut restage_players = Vec::new();
        for (id, bytes) in &staged_players {
            let key = StoreKey::Player(id.clone());
            match self.store.put(&key, bytes) {
                Ok(()) => report.players_written += 1,
                Err(e) => {
                    restage_players.push(id.clone());
                    report.fail(key, e);
                }
            }
        }

        // Global
        let global = GlobalStore {
            next_entity_id: world.next_entity_id(),
            entities: parts.global,
        };
        match encode_record(&self.registry, &global, self.compression)
            .and_then(|bytes| self.store.put(&StoreKey::Global, &bytes))
        {
            Ok(()) => report.global_written = true,
            Err(e) => report.fail(StoreKey::Global, e),
        }

        self.finish_staging(&restage_chunks, &restage_players);

        let mut manifest = WorldManifest::new(self.config.world_name.clone(), self.seed);
        manifest.chunk_count = report.chunks_written;
        manifest.player_count = report.players_written;
        manifest.global_entity_count = global.entities.len();
        manifest.touch();
        if let Err(e) = self.write_manifest(&manifest) {
            report.fail("manifest", e);
        }

        *self.last_save.lock() = Instant::now();
        report.duration = started.elapsed();
        info!(
            generation = report.generation,
            chunks = report.chunks_written,
            players = report.players_written,
            failures = report.failures.len(),
            elapsed_ms = report.duration.as_millis(),
            "save finished"
        );
        guard.finish();
        report
    }

    /// Moves unsaved staging to the saving set and returns copies of it.
    fn take_staging(&self) -> (HashMap<ChunkCoord, Vec<u8>>, HashMap<String, Vec<u8>>) {
        let mut staging = self.staging.lock();
        let chunks = std::mem::take(&mut staging.unsaved_chunks);
        let players = std::mem::take(&mut staging.unsaved_players);
        staging.saving_chunks.extend(chunks);
        staging.saving_players.extend(players);
        (staging.saving_chunks.clone(), staging.saving_players.clone())
    }

    /// Clears the saving set. Failed entries go back to unsaved unless a
    /// newer copy was staged meanwhile.
    fn finish_staging(&self, failed_chunks: &[ChunkCoord], failed_players: &[String]) {
        let mut staging = self.staging.lock();
        let mut saving_chunks = std::mem::take(&mut staging.saving_chunks);
        let mut saving_players = std::mem::take(&mut staging.saving_players);
        for coord in failed_chunks {
            if let Some(bytes) = saving_chunks.remove(coord) {
                staging.unsaved_chunks.entry(*coord).or_insert(bytes);
            }
        }
        for id in failed_players {
            if let Some(bytes) = saving_players.remove(id) {
                staging.unsaved_players.entry(id.clone()).or_insert(bytes);
            }
        }
    }

    fn write_manifest(&self, manifest: &WorldManifest) -> StorageResult<()> {
        match &self.manifest_dir {
            Some(dir) => manifest.write(dir),
            None => {
                *self.memory_manifest.lock() = Some(manifest.clone());
                Ok(())
            }
        }
    }
}

impl ChunkStorage for StorageManager {
    fn load_chunk(&self, coord: ChunkCoord) -> Option<Chunk> {
        self.load_chunk_store(coord).map(|store| store.chunk)
    }

    /// Keeps an evicted chunk. It is staged in archive mode and while a save
    /// runs, otherwise written through. A running save may still hold an
    /// older snapshot of the chunk, so writing through then would let that
    /// snapshot land last. Entities already stored with the chunk are kept.
    fn store_chunk(&self, chunk: Chunk) {
        let coord = chunk.coord();
        let entities = self
            .load_chunk_store(coord)
            .map(|store| store.entities)
            .unwrap_or_default();
        let store = ChunkStore { chunk, entities };
        let bytes = match encode_record(&self.registry, &store, self.compression) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(coord = %coord, error = %e, "evicted chunk not encodable, dropped");
                return;
            }
        };
        if self.config.archive_chunks || self.is_saving() {
            debug!(coord = %coord, "evicted chunk staged");
            self.staging.lock().unsaved_chunks.insert(coord, bytes);
            return;
        }
        if let Err(e) = self.store.put(&StoreKey::Chunk(coord), &bytes) {
            error!(coord = %coord, error = %e, "evicted chunk not written, staged for next save");
            self.staging.lock().unsaved_chunks.insert(coord, bytes);
        }
    }
}

impl fmt::Debug for StorageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageManager")
            .field("world", &self.config.world_name)
            .field("archive", &self.config.archive_chunks)
            .field("saving", &self.is_saving())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::far_store::MemoryFarStore;
    use crate::world_state::InMemoryWorldState;
    use strata_world::{Block, FlatChunkProducer, NullStorage, StreamingConfig};

    fn manager(archive: bool) -> (StorageManager, Arc<MemoryFarStore>) {
        let store = Arc::new(MemoryFarStore::new());
        let config = StorageConfig {
            archive_chunks: archive,
            auto_save_interval_secs: 0,
            ..StorageConfig::default()
        };
        let manager = StorageManager::with_store(
            config,
            7,
            Arc::new(TypeHandlerRegistry::new()),
            Arc::clone(&store) as Arc<dyn FarStore>,
        );
        (manager, store)
    }

    fn empty_streamer() -> ChunkStreamer {
        ChunkStreamer::new(
            StreamingConfig::testing(),
            Arc::new(FlatChunkProducer::default()),
            Arc::new(NullStorage),
        )
        .unwrap()
    }

    fn complete_chunk(coord: ChunkCoord) -> Chunk {
        let mut chunk = Chunk::new(coord);
        chunk.set_block(0, 0, 0, Block::GRASS);
        chunk.set_state(ChunkState::Complete);
        chunk
    }

    #[test]
    fn test_missing_stores_load_empty() {
        let (manager, _) = manager(false);
        assert_eq!(manager.load_player_store("bob"), PlayerStore::new("bob"));
        assert!(manager.load_chunk_store(ChunkCoord::ORIGIN).is_none());
        assert_eq!(manager.load_global_store(), GlobalStore::default());
        assert!(manager.load_manifest().is_none());
    }

    #[test]
    fn test_corrupt_player_store_loads_empty() {
        let (manager, store) = manager(false);
        store.put(&StoreKey::Player("bob".into()), b"garbage").unwrap();
        assert_eq!(manager.load_player_store("bob"), PlayerStore::new("bob"));
    }

    #[test]
    fn test_loose_eviction_writes_through() {
        let (manager, store) = manager(false);
        let coord = ChunkCoord::new(1, 2, 3);
        manager.store_chunk(complete_chunk(coord));
        assert!(store.contains(&StoreKey::Chunk(coord)));
        assert_eq!(manager.staged_chunk_count(), 0);
        let back = manager.load_chunk(coord).unwrap();
        assert_eq!(back.get_block(0, 0, 0), Block::GRASS);
    }

    #[test]
    fn test_archive_eviction_is_staged_until_save() {
        let (manager, store) = manager(true);
        let coord = ChunkCoord::new(4, 0, 0);
        manager.store_chunk(complete_chunk(coord));

        assert_eq!(manager.staged_chunk_count(), 1);
        assert!(!store.contains(&StoreKey::Chunk(coord)));
        assert!(manager.load_chunk_store(coord).is_some());

        let report = manager.save(&empty_streamer(), &InMemoryWorldState::new());
        assert!(report.is_complete(), "{:?}", report.failures);
        assert_eq!(report.chunks_written, 1);
        assert_eq!(manager.staged_chunk_count(), 0);
        assert!(store.contains(&StoreKey::Chunk(coord)));
    }

    #[test]
    fn test_eviction_keeps_stored_entities() {
        let (manager, _) = manager(false);
        let coord = ChunkCoord::ORIGIN;
        let mut first = ChunkStore::new(complete_chunk(coord));
        first.entities.push(EntityRecord::new(3).at([1.0, 1.0, 1.0]));
        let bytes = encode_record(&manager.registry, &first, Compression::None).unwrap();
        manager.store.put(&StoreKey::Chunk(coord), &bytes).unwrap();

        manager.store_chunk(complete_chunk(coord));
        assert_eq!(manager.load_chunk_store(coord).unwrap().entities.len(), 1);
    }

    #[test]
    fn test_departed_player_saved_once() {
        let (manager, store) = manager(false);
        let player = PlayerInfo {
            id: "carol".into(),
            character: Some(1),
            location: [5.0, 6.0, 7.0],
        };
        manager.deactivate_player(&player, vec![EntityRecord::new(1), EntityRecord::new(2).owned_by(1)]);
        assert_eq!(manager.staged_player_count(), 1);
        assert_eq!(manager.load_player_store("carol").entities.len(), 2);

        let report = manager.save(&empty_streamer(), &InMemoryWorldState::new());
        assert_eq!(report.players_written, 1);
        assert_eq!(manager.staged_player_count(), 0);
        assert!(store.contains(&StoreKey::Player("carol".into())));
        assert_eq!(manager.load_player_store("carol").relevance_location, [5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_update_saves_only_on_request() {
        let (manager, _) = manager(false);
        let streamer = empty_streamer();
        let world = InMemoryWorldState::new();
        assert!(manager.update(&streamer, &world).is_none());
        manager.request_save();
        let report = manager.update(&streamer, &world).unwrap();
        assert!(report.global_written);
        assert!(manager.update(&streamer, &world).is_none());
        assert_eq!(manager.load_manifest().unwrap().seed, 7);
    }

    #[test]
    fn test_finish_save_ends_only_its_own_save() {
        let (manager, _) = manager(false);
        let guard = manager.begin_save();
        assert!(manager.is_saving());
        assert!(manager.try_begin_save_for(Duration::from_millis(10)).is_none());
        manager.finish_save(guard);
        assert!(!manager.is_saving());

        let report = manager.save(&empty_streamer(), &InMemoryWorldState::new());
        assert_eq!(report.generation, 2);
    }

    #[test]
    fn test_open_existing_reads_seed_and_creates_nothing() {
        let id = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let config = StorageConfig {
            root: std::env::temp_dir().join(format!("test_open_existing_{id}")),
            ..StorageConfig::default()
        };

        let fresh = StorageManager::open_existing(config.clone(), Arc::new(TypeHandlerRegistry::new())).unwrap();
        assert_eq!(fresh.seed(), 0);
        assert!(fresh.load_manifest().is_none());
        assert!(!config.root.exists());

        let writer = StorageManager::open(config.clone(), 99, Arc::new(TypeHandlerRegistry::new())).unwrap();
        assert!(writer.save(&empty_streamer(), &InMemoryWorldState::new()).is_complete());
        let reader = StorageManager::open_existing(config.clone(), Arc::new(TypeHandlerRegistry::new())).unwrap();
        assert_eq!(reader.seed(), 99);

        std::fs::remove_dir_all(&config.root).ok();
    }
}
