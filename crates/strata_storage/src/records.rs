//! # Store Records
//!
//! The persisted bundles: one per player, one per saved chunk and one for
//! the world. Each carries a graph of [`EntityRecord`]s.
//!
//! Records are converted through the [`TypeHandlerRegistry`] and framed by
//! the [`codec`](strata_persist::codec), so a record field the registry
//! cannot read comes back at its default instead of failing the load.

use std::collections::BTreeMap;

use strata_persist::{codec, Compression, Persist, PersistedData, StructSchema, TypeHandlerRegistry, TypeInfo};
use strata_world::{Chunk, ChunkCoord};

use crate::error::StorageResult;

/// Identifier of a runtime entity.
pub type EntityId = u64;

/// One persisted entity.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EntityRecord {
    /// Entity id, unique within the world.
    pub id: EntityId,
    /// Owning entity, if any.
    pub owner: Option<EntityId>,
    /// World-space position, for entities that have one.
    pub position: Option<[f32; 3]>,
    /// Kept with the world regardless of where it is.
    pub always_relevant: bool,
    /// Component payloads by component name.
    pub components: BTreeMap<String, PersistedData>,
}

impl EntityRecord {
    /// Entity with no owner, position or components.
    #[must_use]
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Sets the owner.
    #[must_use]
    pub const fn owned_by(mut self, owner: EntityId) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Sets the position.
    #[must_use]
    pub const fn at(mut self, position: [f32; 3]) -> Self {
        self.position = Some(position);
        self
    }

    /// Marks the entity as always relevant.
    #[must_use]
    pub const fn always_relevant(mut self) -> Self {
        self.always_relevant = true;
        self
    }

    /// Adds a component payload.
    #[must_use]
    pub fn with_component(mut self, name: impl Into<String>, data: PersistedData) -> Self {
        self.components.insert(name.into(), data);
        self
    }

    /// Chunk containing the entity's position.
    #[must_use]
    pub fn chunk(&self) -> Option<ChunkCoord> {
        self.position.map(chunk_of)
    }
}

/// Chunk containing a world-space position.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn chunk_of(position: [f32; 3]) -> ChunkCoord {
    let [x, y, z] = position.map(|v| v.floor() as i32);
    ChunkCoord::from_block_pos(x, y, z)
}

impl Persist for EntityRecord {
    fn type_info() -> TypeInfo {
        StructSchema::builder::<Self>("EntityRecord")
            .field("id", |e| &e.id, |e, v| e.id = v)
            .field("owner", |e| &e.owner, |e, v| e.owner = v)
            .field("position", |e| &e.position, |e, v| e.position = v)
            .field("always_relevant", |e| &e.always_relevant, |e, v| e.always_relevant = v)
            .field("components", |e| &e.components, |e, v| e.components = v)
            .build()
    }
}

/// Everything saved for one player.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlayerStore {
    /// Player id.
    pub player_id: String,
    /// The player's character entity.
    pub character: Option<EntityId>,
    /// Where the player's relevance region was centered.
    pub relevance_location: [f32; 3],
    /// Character and everything it owns.
    pub entities: Vec<EntityRecord>,
}

impl PlayerStore {
    /// Empty store for a player seen for the first time.
    #[must_use]
    pub fn new(player_id: impl Into<String>) -> Self {
        Self {
            player_id: player_id.into(),
            ..Self::default()
        }
    }

    /// Chunk the player's relevance region was centered on.
    #[must_use]
    pub fn relevance_chunk(&self) -> ChunkCoord {
        chunk_of(self.relevance_location)
    }
}

impl Persist for PlayerStore {
    fn type_info() -> TypeInfo {
        StructSchema::builder::<Self>("PlayerStore")
            .field("player_id", |s| &s.player_id, |s, v| s.player_id = v)
            .field("character", |s| &s.character, |s, v| s.character = v)
            .field("relevance_location", |s| &s.relevance_location, |s, v| s.relevance_location = v)
            .field("entities", |s| &s.entities, |s, v| s.entities = v)
            .build()
    }
}

/// One saved chunk and the entities standing in it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChunkStore {
    /// Block data.
    pub chunk: Chunk,
    /// Unowned entities positioned in the chunk, with their owned subgraphs.
    pub entities: Vec<EntityRecord>,
}

impl ChunkStore {
    /// Store holding `chunk` and no entities.
    #[must_use]
    pub fn new(chunk: Chunk) -> Self {
        Self {
            chunk,
            entities: Vec::new(),
        }
    }

    /// Coordinate of the stored chunk.
    #[must_use]
    pub fn coord(&self) -> ChunkCoord {
        self.chunk.coord()
    }
}

impl Persist for ChunkStore {
    fn type_info() -> TypeInfo {
        StructSchema::builder::<Self>("ChunkStore")
            .field("chunk", |s| &s.chunk, |s, v| s.chunk = v)
            .field("entities", |s| &s.entities, |s, v| s.entities = v)
            .build()
    }
}

/// World-scoped entities.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GlobalStore {
    /// Next entity id the runtime may hand out.
    pub next_entity_id: EntityId,
    /// Entities not kept by any player or chunk.
    pub entities: Vec<EntityRecord>,
}

impl Persist for GlobalStore {
    fn type_info() -> TypeInfo {
        StructSchema::builder::<Self>("GlobalStore")
            .field("next_entity_id", |s| &s.next_entity_id, |s, v| s.next_entity_id = v)
            .field("entities", |s| &s.entities, |s, v| s.entities = v)
            .build()
    }
}

/// Serializes and frames a record.
pub(crate) fn encode_record<T: Persist>(
    registry: &TypeHandlerRegistry,
    value: &T,
    compression: Compression,
) -> StorageResult<Vec<u8>> {
    let data = registry.serialize(value)?;
    Ok(codec::encode(&data, compression)?)
}

/// Unframes and deserializes a record.
pub(crate) fn decode_record<T: Persist>(registry: &TypeHandlerRegistry, bytes: &[u8]) -> StorageResult<T> {
    let data = codec::decode(bytes)?;
    Ok(registry.deserialize(&data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_persist::PersistError;
    use strata_world::{Block, ChunkState};

    #[test]
    fn test_entity_chunk_from_position() {
        assert_eq!(EntityRecord::new(1).chunk(), None);
        let e = EntityRecord::new(1).at([17.5, -0.5, 3.0]);
        assert_eq!(e.chunk(), Some(ChunkCoord::new(1, -1, 0)));
        assert_eq!(chunk_of([16.0, 0.0, 0.0]), ChunkCoord::new(1, 0, 0));
    }

    #[test]
    fn test_chunk_store_roundtrip() {
        let registry = TypeHandlerRegistry::new();
        let mut chunk = Chunk::new(ChunkCoord::new(1, 2, 3));
        chunk.set_block(0, 0, 0, Block::DIRT);
        chunk.set_state(ChunkState::Complete);
        chunk.mark_clean();
        let mut store = ChunkStore::new(chunk);
        store.entities.push(
            EntityRecord::new(9)
                .at([20.0, 40.0, 50.0])
                .with_component("health", PersistedData::Integer(80)),
        );

        let bytes = encode_record(&registry, &store, Compression::Lz4).unwrap();
        let back: ChunkStore = decode_record(&registry, &bytes).unwrap();
        assert_eq!(back, store);
        assert_eq!(back.chunk.get_block(0, 0, 0), Block::DIRT);
    }

    #[test]
    fn test_player_store_roundtrip() {
        let registry = TypeHandlerRegistry::new();
        let store = PlayerStore {
            player_id: "alice".into(),
            character: Some(4),
            relevance_location: [1.0, 2.0, 3.0],
            entities: vec![EntityRecord::new(4), EntityRecord::new(5).owned_by(4)],
        };
        let bytes = encode_record(&registry, &store, Compression::None).unwrap();
        assert_eq!(decode_record::<PlayerStore>(&registry, &bytes).unwrap(), store);
    }

    #[test]
    fn test_missing_fields_default() {
        let registry = TypeHandlerRegistry::new();
        let mut data = PersistedData::map();
        data.insert("next_entity_id", PersistedData::Integer(77));
        let global: GlobalStore = registry.deserialize(&data).unwrap();
        assert_eq!(global.next_entity_id, 77);
        assert!(global.entities.is_empty());
    }

    #[test]
    fn test_garbage_bytes_fail_decode() {
        let registry = TypeHandlerRegistry::new();
        let err = decode_record::<GlobalStore>(&registry, b"not a frame").unwrap_err();
        assert!(matches!(
            err,
            crate::StorageError::Persist(PersistError::Malformed(_) | PersistError::ChecksumMismatch { .. })
        ));
    }
}
