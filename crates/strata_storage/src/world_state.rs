//! The runtime's side of a save: which entities persist and who is
//! connected.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::records::{EntityId, EntityRecord};

/// A connected player.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlayerInfo {
    /// Player id, also the store file name.
    pub id: String,
    /// The player's character entity.
    pub character: Option<EntityId>,
    /// Center of the player's relevance region, world space.
    pub location: [f32; 3],
}

impl PlayerInfo {
    /// Player with no character, at the origin.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

/// Snapshot source for saves.
pub trait WorldState: Send + Sync {
    /// Every entity that should survive a restart.
    fn persistent_entities(&self) -> Vec<EntityRecord>;

    /// Players currently connected.
    fn connected_players(&self) -> Vec<PlayerInfo>;

    /// Next entity id to hand out after a reload.
    fn next_entity_id(&self) -> EntityId {
        self.persistent_entities().iter().map(|e| e.id + 1).max().unwrap_or(1)
    }
}

/// Entities and players held in maps, for tools and tests.
#[derive(Debug)]
pub struct InMemoryWorldState {
    entities: RwLock<BTreeMap<EntityId, EntityRecord>>,
    players: RwLock<BTreeMap<String, PlayerInfo>>,
    next_id: AtomicU64,
}

impl Default for InMemoryWorldState {
    fn default() -> Self {
        Self {
            entities: RwLock::new(BTreeMap::new()),
            players: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl InMemoryWorldState {
    /// Empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands out a fresh entity id.
    pub fn allocate_id(&self) -> EntityId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Adds or replaces an entity, keeping the id counter ahead of it.
    pub fn insert(&self, record: EntityRecord) {
        self.next_id.fetch_max(record.id + 1, Ordering::Relaxed);
        self.entities.write().insert(record.id, record);
    }

    /// Removes an entity.
    pub fn remove(&self, id: EntityId) -> Option<EntityRecord> {
        self.entities.write().remove(&id)
    }

    /// Entity by id.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<EntityRecord> {
        self.entities.read().get(&id).cloned()
    }

    /// Number of entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.read().len()
    }

    /// Connects a player, replacing any previous entry with the same id.
    pub fn connect(&self, player: PlayerInfo) {
        self.players.write().insert(player.id.clone(), player);
    }

    /// Disconnects a player.
    pub fn disconnect(&self, id: &str) -> Option<PlayerInfo> {
        self.players.write().remove(id)
    }

    /// Restores the id counter from a loaded global store.
    pub fn restore_next_id(&self, next: EntityId) {
        self.next_id.fetch_max(next, Ordering::Relaxed);
    }
}

impl WorldState for InMemoryWorldState {
    fn persistent_entities(&self) -> Vec<EntityRecord> {
        self.entities.read().values().cloned().collect()
    }

    fn connected_players(&self) -> Vec<PlayerInfo> {
        self.players.read().values().cloned().collect()
    }

    fn next_entity_id(&self) -> EntityId {
        self.next_id.load(Ordering::Relaxed)
    }
}
