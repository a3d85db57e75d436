//! # Chunk System
//!
//! World data is organized into fixed-size cubic chunks for:
//! - Memory efficiency (only load what observers care about)
//! - Fast streaming (generate/discard on demand)
//! - Independent persistence
//!
//! ## Chunk Format
//!
//! Chunks are 16x16x16 blocks. Each block is a `u16` id. Alongside the
//! blocks every chunk carries a sunlight and a block-light layer (`u8` per
//! block) and any number of named `u16` extra-data layers.
//!
//! Blocks are indexed `x + y * 16 + z * 256`.
//!
//! ## Lifecycle
//!
//! ```text
//! Unloaded -> Preparing -> Generated | LoadedFromStore
//!          -> LightPropagationPending -> Complete
//! ```

use std::collections::BTreeMap;

use bytemuck::{Pod, Zeroable};
use strata_persist::{Persist, PersistEnum, StructSchema, TypeInfo};
use tracing::warn;

use crate::coord::ChunkCoord;

/// Chunk width, height and depth in blocks.
pub const CHUNK_SIZE: usize = 16;

/// Total blocks per chunk.
pub const BLOCKS_PER_CHUNK: usize = CHUNK_SIZE * CHUNK_SIZE * CHUNK_SIZE;

/// Brightest light level.
pub const MAX_LIGHT: u8 = 15;

/// A single block in the world.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct Block(pub u16);

impl Block {
    /// Air block (empty).
    pub const AIR: Self = Self(0);
    /// Grass block.
    pub const GRASS: Self = Self(1);
    /// Stone block.
    pub const STONE: Self = Self(2);
    /// Dirt block.
    pub const DIRT: Self = Self(3);
    /// Bedrock block.
    pub const BEDROCK: Self = Self(7);

    /// Block type id.
    #[inline]
    #[must_use]
    pub const fn id(self) -> u16 {
        self.0
    }

    /// Returns true if this is an air block.
    #[inline]
    #[must_use]
    pub const fn is_air(self) -> bool {
        self.0 == 0
    }
}

/// Lifecycle stage of a chunk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ChunkState {
    /// Not resident.
    #[default]
    Unloaded = 0,
    /// A worker is producing it.
    Preparing = 1,
    /// Freshly produced by the world generator.
    Generated = 2,
    /// Read back from the far-store.
    LoadedFromStore = 3,
    /// Blocks final, lighting across chunk borders not yet settled.
    LightPropagationPending = 4,
    /// Ready for external use once its footprint is also resident.
    Complete = 5,
}

impl ChunkState {
    /// Converts from u8.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Unloaded),
            1 => Some(Self::Preparing),
            2 => Some(Self::Generated),
            3 => Some(Self::LoadedFromStore),
            4 => Some(Self::LightPropagationPending),
            5 => Some(Self::Complete),
            _ => None,
        }
    }

    /// True for `LightPropagationPending` and `Complete`: the state every
    /// footprint neighbour of a ready chunk must have reached.
    #[inline]
    #[must_use]
    pub const fn is_at_least_light_pending(self) -> bool {
        matches!(self, Self::LightPropagationPending | Self::Complete)
    }
}

impl PersistEnum for ChunkState {
    const VARIANTS: &'static [(&'static str, Self)] = &[
        ("unloaded", Self::Unloaded),
        ("preparing", Self::Preparing),
        ("generated", Self::Generated),
        ("loaded_from_store", Self::LoadedFromStore),
        ("light_propagation_pending", Self::LightPropagationPending),
        ("complete", Self::Complete),
    ];
}

impl Persist for ChunkState {
    fn type_info() -> TypeInfo {
        TypeInfo::enumeration::<Self>()
    }
}

/// A chunk of world data.
#[derive(Clone, Debug, PartialEq)]
pub struct Chunk {
    coord: ChunkCoord,
    blocks: Box<[Block]>,
    sunlight: Box<[u8]>,
    light: Box<[u8]>,
    /// Named per-block extra data, such as fluid levels.
    extra: BTreeMap<String, Box<[u16]>>,
    state: ChunkState,
    /// Modified since it was produced or loaded.
    dirty: bool,
}

impl Default for Chunk {
    fn default() -> Self {
        Self::new(ChunkCoord::ORIGIN)
    }
}

#[inline]
const fn index(x: usize, y: usize, z: usize) -> Option<usize> {
    if x < CHUNK_SIZE && y < CHUNK_SIZE && z < CHUNK_SIZE {
        Some(x + y * CHUNK_SIZE + z * CHUNK_SIZE * CHUNK_SIZE)
    } else {
        None
    }
}

impl Chunk {
    /// Creates an empty (all air, unlit) chunk.
    #[must_use]
    pub fn new(coord: ChunkCoord) -> Self {
        Self {
            coord,
            blocks: vec![Block::AIR; BLOCKS_PER_CHUNK].into_boxed_slice(),
            sunlight: vec![0; BLOCKS_PER_CHUNK].into_boxed_slice(),
            light: vec![0; BLOCKS_PER_CHUNK].into_boxed_slice(),
            extra: BTreeMap::new(),
            state: ChunkState::Unloaded,
            dirty: false,
        }
    }

    /// Chunk position in the world.
    #[inline]
    #[must_use]
    pub const fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// Lifecycle stage.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> ChunkState {
        self.state
    }

    /// Moves the chunk to another lifecycle stage.
    #[inline]
    pub fn set_state(&mut self, state: ChunkState) {
        self.state = state;
    }

    /// Returns true if a block or layer changed since the last
    /// [`Chunk::mark_clean`].
    #[inline]
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clears the dirty flag, typically after persisting.
    #[inline]
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Gets a block at local coordinates. Out of range reads return air.
    #[inline]
    #[must_use]
    pub fn get_block(&self, x: usize, y: usize, z: usize) -> Block {
        index(x, y, z).map_or(Block::AIR, |i| self.blocks[i])
    }

    /// Sets a block at local coordinates. Out of range writes are ignored.
    #[inline]
    pub fn set_block(&mut self, x: usize, y: usize, z: usize, block: Block) {
        if let Some(i) = index(x, y, z) {
            self.blocks[i] = block;
            self.dirty = true;
        }
    }

    /// Raw block buffer.
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Sunlight level at local coordinates.
    #[inline]
    #[must_use]
    pub fn sunlight(&self, x: usize, y: usize, z: usize) -> u8 {
        index(x, y, z).map_or(0, |i| self.sunlight[i])
    }

    /// Sets the sunlight level, clamped to [`MAX_LIGHT`].
    #[inline]
    pub fn set_sunlight(&mut self, x: usize, y: usize, z: usize, level: u8) {
        if let Some(i) = index(x, y, z) {
            self.sunlight[i] = level.min(MAX_LIGHT);
            self.dirty = true;
        }
    }

    /// Block-light level at local coordinates.
    #[inline]
    #[must_use]
    pub fn light(&self, x: usize, y: usize, z: usize) -> u8 {
        index(x, y, z).map_or(0, |i| self.light[i])
    }

    /// Sets the block-light level, clamped to [`MAX_LIGHT`].
    #[inline]
    pub fn set_light(&mut self, x: usize, y: usize, z: usize, level: u8) {
        if let Some(i) = index(x, y, z) {
            self.light[i] = level.min(MAX_LIGHT);
            self.dirty = true;
        }
    }

    /// Adds a zeroed extra-data layer unless one with that name exists.
    pub fn add_extra_layer(&mut self, name: &str) {
        self.extra
            .entry(name.to_owned())
            .or_insert_with(|| vec![0; BLOCKS_PER_CHUNK].into_boxed_slice());
    }

    /// Names of the extra-data layers.
    pub fn extra_layers(&self) -> impl Iterator<Item = &str> {
        self.extra.keys().map(String::as_str)
    }

    /// Extra data at local coordinates, `None` if the layer does not exist.
    #[must_use]
    pub fn extra(&self, layer: &str, x: usize, y: usize, z: usize) -> Option<u16> {
        let i = index(x, y, z)?;
        self.extra.get(layer).map(|data| data[i])
    }

    /// Sets extra data, creating the layer on first use.
    pub fn set_extra(&mut self, layer: &str, x: usize, y: usize, z: usize, value: u16) {
        if let Some(i) = index(x, y, z) {
            self.add_extra_layer(layer);
            if let Some(data) = self.extra.get_mut(layer) {
                data[i] = value;
                self.dirty = true;
            }
        }
    }

    /// Count of non-air blocks.
    #[must_use]
    pub fn solid_count(&self) -> usize {
        self.blocks.iter().filter(|b| !b.is_air()).count()
    }

    /// Returns the raw block data size in bytes (uncompressed).
    #[must_use]
    pub const fn data_size() -> usize {
        BLOCKS_PER_CHUNK * std::mem::size_of::<Block>()
    }
}

// =============================================================================
// Persisted form
// =============================================================================

/// Blocks as little-endian `u16`s.
fn encode_blocks(blocks: &[Block]) -> Box<[u8]> {
    if cfg!(target_endian = "little") {
        bytemuck::cast_slice::<Block, u8>(blocks).into()
    } else {
        blocks.iter().flat_map(|b| b.0.to_le_bytes()).collect()
    }
}

fn decode_u16s(bytes: &[u8]) -> Option<Vec<u16>> {
    if bytes.len() != BLOCKS_PER_CHUNK * 2 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect(),
    )
}

fn set_blocks(chunk: &mut Chunk, bytes: Box<[u8]>) {
    match decode_u16s(&bytes) {
        Some(ids) => chunk.blocks = ids.into_iter().map(Block).collect(),
        None => warn!(coord = %chunk.coord, len = bytes.len(), "block buffer has wrong size, chunk left empty"),
    }
}

fn set_layer(target: &mut Box<[u8]>, coord: ChunkCoord, name: &str, bytes: Box<[u8]>) {
    if bytes.len() == BLOCKS_PER_CHUNK {
        *target = bytes;
    } else {
        warn!(%coord, layer = name, len = bytes.len(), "light layer has wrong size, left dark");
    }
}

fn encode_extra(chunk: &Chunk) -> BTreeMap<String, Box<[u8]>> {
    chunk
        .extra
        .iter()
        .map(|(name, data)| {
            let bytes: Box<[u8]> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
            (name.clone(), bytes)
        })
        .collect()
}

fn set_extra_layers(chunk: &mut Chunk, layers: BTreeMap<String, Box<[u8]>>) {
    for (name, bytes) in layers {
        match decode_u16s(&bytes) {
            Some(values) => {
                chunk.extra.insert(name, values.into_boxed_slice());
            }
            None => warn!(coord = %chunk.coord, layer = name.as_str(), "extra layer has wrong size, dropped"),
        }
    }
}

impl Persist for Chunk {
    fn type_info() -> TypeInfo {
        StructSchema::builder::<Self>("Chunk")
            .field("coord", |c| &c.coord, |c, v| c.coord = v)
            .field("state", |c| &c.state, |c, v| c.state = v)
            .computed("blocks", |c| encode_blocks(&c.blocks), set_blocks)
            .computed(
                "sunlight",
                |c| c.sunlight.clone(),
                |c, v| set_layer(&mut c.sunlight, c.coord, "sunlight", v),
            )
            .computed(
                "light",
                |c| c.light.clone(),
                |c, v| set_layer(&mut c.light, c.coord, "light", v),
            )
            .computed("extra", encode_extra, set_extra_layers)
            .build()
    }
}
