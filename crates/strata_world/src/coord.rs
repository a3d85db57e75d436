//! # Chunk Coordinates
//!
//! Chunk-space addressing. One unit is one chunk, [`CHUNK_SIZE`] blocks.

use std::fmt;
use std::str::FromStr;

use strata_persist::{Persist, StructSchema, TypeInfo};

use crate::chunk::CHUNK_SIZE;

/// Identifies a chunk in the world grid.
///
/// Ordered lexicographically by `x`, then `y`, then `z`, so iteration over a
/// set of coordinates is deterministic.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    /// X coordinate (in chunks, not blocks).
    pub x: i32,
    /// Y coordinate (in chunks, not blocks).
    pub y: i32,
    /// Z coordinate (in chunks, not blocks).
    pub z: i32,
}

impl ChunkCoord {
    /// The chunk containing the world origin.
    pub const ORIGIN: Self = Self::new(0, 0, 0);

    /// Creates a new chunk coordinate.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Converts world block coordinates to the containing chunk.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn from_block_pos(block_x: i32, block_y: i32, block_z: i32) -> Self {
        let size = CHUNK_SIZE as i32;
        Self {
            x: block_x.div_euclid(size),
            y: block_y.div_euclid(size),
            z: block_z.div_euclid(size),
        }
    }

    /// World block coordinates of this chunk's minimum corner.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn origin(self) -> (i32, i32, i32) {
        let size = CHUNK_SIZE as i32;
        (self.x * size, self.y * size, self.z * size)
    }

    /// The coordinate shifted by the given chunk offsets.
    #[inline]
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// Largest per-axis distance to `other`.
    #[inline]
    #[must_use]
    pub const fn chebyshev_distance(self, other: Self) -> u32 {
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        let dz = self.z.abs_diff(other.z);
        let m = if dx > dy { dx } else { dy };
        if m > dz {
            m
        } else {
            dz
        }
    }

    /// The 3x3x1 ready footprint around this chunk, itself included: every
    /// offset with `dx, dy` in `-1..=1` and `dz = 0`.
    pub fn neighbors_in_footprint(self) -> impl Iterator<Item = Self> {
        (-1..=1).flat_map(move |dy| (-1..=1).map(move |dx| self.offset(dx, dy, 0)))
    }

    /// Every coordinate within Chebyshev distance `radius`, in coordinate
    /// order.
    #[allow(clippy::cast_possible_wrap)]
    pub fn region_around(self, radius: u32) -> impl Iterator<Item = Self> {
        let r = radius as i32;
        (-r..=r).flat_map(move |dx| {
            (-r..=r).flat_map(move |dy| (-r..=r).map(move |dz| self.offset(dx, dy, dz)))
        })
    }

    /// File-name form, `x_y_z`.
    #[must_use]
    pub fn file_stem(self) -> String {
        format!("{}_{}_{}", self.x, self.y, self.z)
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

impl FromStr for ChunkCoord {
    type Err = String;

    /// Parses the [`ChunkCoord::file_stem`] form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('_').map(str::parse::<i32>);
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(Ok(x)), Some(Ok(y)), Some(Ok(z)), None) => Ok(Self::new(x, y, z)),
            _ => Err(format!("not a chunk coordinate: {s:?}")),
        }
    }
}

impl Persist for ChunkCoord {
    fn type_info() -> TypeInfo {
        StructSchema::builder::<Self>("ChunkCoord")
            .field("x", |c| &c.x, |c, v| c.x = v)
            .field("y", |c| &c.y, |c, v| c.y = v)
            .field("z", |c| &c.z, |c, v| c.z = v)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_coord_from_block() {
        assert_eq!(ChunkCoord::from_block_pos(0, 0, 0), ChunkCoord::new(0, 0, 0));
        assert_eq!(ChunkCoord::from_block_pos(15, 15, 15), ChunkCoord::new(0, 0, 0));
        assert_eq!(ChunkCoord::from_block_pos(16, 16, 16), ChunkCoord::new(1, 1, 1));
        assert_eq!(ChunkCoord::from_block_pos(-1, -1, -1), ChunkCoord::new(-1, -1, -1));
        assert_eq!(ChunkCoord::from_block_pos(-16, 0, -16), ChunkCoord::new(-1, 0, -1));
        assert_eq!(ChunkCoord::from_block_pos(-17, 0, -17), ChunkCoord::new(-2, 0, -2));
    }

    #[test]
    fn test_chebyshev_distance() {
        let a = ChunkCoord::new(0, 0, 0);
        assert_eq!(a.chebyshev_distance(ChunkCoord::new(3, -1, 2)), 3);
        assert_eq!(a.chebyshev_distance(ChunkCoord::new(-1, -5, 0)), 5);
        assert_eq!(a.chebyshev_distance(a), 0);
    }

    #[test]
    fn test_footprint_is_flat_3x3() {
        let c = ChunkCoord::new(4, 4, 4);
        let footprint: Vec<_> = c.neighbors_in_footprint().collect();
        assert_eq!(footprint.len(), 9);
        assert!(footprint.contains(&c));
        assert!(footprint.iter().all(|n| n.z == 4));
        assert!(footprint.iter().all(|n| n.chebyshev_distance(c) <= 1));
    }

    #[test]
    fn test_region_around_is_sorted_cube() {
        let region: Vec<_> = ChunkCoord::ORIGIN.region_around(1).collect();
        assert_eq!(region.len(), 27);
        let mut sorted = region.clone();
        sorted.sort();
        assert_eq!(region, sorted);
    }

    #[test]
    fn test_file_stem_roundtrip() {
        let c = ChunkCoord::new(-3, 12, 0);
        assert_eq!(c.file_stem(), "-3_12_0");
        assert_eq!(c.file_stem().parse::<ChunkCoord>(), Ok(c));
        assert!("1_2".parse::<ChunkCoord>().is_err());
        assert!("1_2_3_4".parse::<ChunkCoord>().is_err());
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        assert!(ChunkCoord::new(0, 5, 5) < ChunkCoord::new(1, 0, 0));
        assert!(ChunkCoord::new(1, 0, 9) < ChunkCoord::new(1, 1, 0));
    }
}
