//! Splits the persistent entity set of a save across the stores.
//!
//! 1. Each connected player's store gets the character and everything it
//!    transitively owns.
//! 2. An ownerless entity with a position that is not always relevant goes
//!    to the chunk containing it, with its owned subgraph, if that chunk is
//!    part of the save.
//! 3. Everything left goes to the global store.
//!
//! Every entity lands in exactly one store.

use std::collections::{BTreeMap, BTreeSet};

use strata_world::ChunkCoord;

use crate::records::{EntityId, EntityRecord, PlayerStore};
use crate::world_state::PlayerInfo;

/// Entities grouped by destination store.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Partition {
    /// One store per connected player, in player order.
    pub players: Vec<PlayerStore>,
    /// Entities per saved chunk. Chunks with no entities are absent.
    pub chunks: BTreeMap<ChunkCoord, Vec<EntityRecord>>,
    /// Everything else.
    pub global: Vec<EntityRecord>,
}

struct Graph {
    remaining: BTreeMap<EntityId, EntityRecord>,
    children: BTreeMap<EntityId, Vec<EntityId>>,
}

impl Graph {
    fn new(entities: Vec<EntityRecord>) -> Self {
        let mut children: BTreeMap<EntityId, Vec<EntityId>> = BTreeMap::new();
        for e in &entities {
            if let Some(owner) = e.owner {
                children.entry(owner).or_default().push(e.id);
            }
        }
        let remaining = entities.into_iter().map(|e| (e.id, e)).collect();
        Self { remaining, children }
    }

    /// Removes `root` and everything it owns. Ownership cycles terminate
    /// because each entity is taken once.
    fn take_subgraph(&mut self, root: EntityId) -> Vec<EntityRecord> {
        let mut taken = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(record) = self.remaining.remove(&id) else {
                continue;
            };
            if let Some(kids) = self.children.get(&id) {
                stack.extend(kids.iter().rev().copied());
            }
            taken.push(record);
        }
        taken
    }
}

/// Assigns every entity in `entities` to one store.
#[must_use]
pub fn partition(entities: Vec<EntityRecord>, players: &[PlayerInfo], saved_chunks: &BTreeSet<ChunkCoord>) -> Partition {
    let mut graph = Graph::new(entities);
    let mut out = Partition::default();

    for player in players {
        let entities = player
            .character
            .map(|c| graph.take_subgraph(c))
            .unwrap_or_default();
        out.players.push(PlayerStore {
            player_id: player.id.clone(),
            character: player.character,
            relevance_location: player.location,
            entities,
        });
    }

    let placed: Vec<(EntityId, ChunkCoord)> = graph
        .remaining
        .values()
        .filter(|e| e.owner.is_none() && !e.always_relevant)
        .filter_map(|e| e.chunk().filter(|c| saved_chunks.contains(c)).map(|c| (e.id, c)))
        .collect();
    for (id, coord) in placed {
        let subgraph = graph.take_subgraph(id);
        if !subgraph.is_empty() {
            out.chunks.entry(coord).or_default().extend(subgraph);
        }
    }

    out.global = graph.remaining.into_values().collect();
    out
}
