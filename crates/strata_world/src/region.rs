//! # Relevance Regions
//!
//! Each observer owns one region: a center and a radius in chunks. A region
//! wants every coordinate within `radius + GENERATION_MARGIN` resident, and
//! is told about chunks within `radius` as they become ready.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::coord::ChunkCoord;

/// Extra radius generated around a region so every chunk inside it has its
/// full footprint.
pub const GENERATION_MARGIN: u32 = 1;

/// Identifies the entity that owns a region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(pub u64);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer#{}", self.0)
    }
}

/// Receives streaming events for one region.
///
/// Callbacks run on the tick thread with no streamer lock held, so they may
/// call back into the streamer.
pub trait ChunkObserver: Send + Sync {
    /// `coord` is within the region and ready for use.
    fn on_chunk_ready(&self, observer: ObserverId, coord: ChunkCoord);

    /// A chunk previously reported ready has left the near-cache.
    fn on_chunk_unloaded(&self, observer: ObserverId, coord: ChunkCoord);

    /// A chunk previously reported ready is no longer within the region
    /// because the region moved or shrank.
    fn on_chunk_irrelevant(&self, observer: ObserverId, coord: ChunkCoord) {
        let _ = (observer, coord);
    }
}

/// One observer's region.
pub struct RelevanceRegion {
    observer: ObserverId,
    center: ChunkCoord,
    radius: u32,
    /// Changed since the last streaming pass.
    dirty: bool,
    /// Coordinates already reported ready, cleared on unload.
    notified: HashSet<ChunkCoord>,
    listener: Arc<dyn ChunkObserver>,
}

impl RelevanceRegion {
    /// Creates a dirty region with nothing reported yet.
    #[must_use]
    pub fn new(
        observer: ObserverId,
        center: ChunkCoord,
        radius: u32,
        listener: Arc<dyn ChunkObserver>,
    ) -> Self {
        Self {
            observer,
            center,
            radius,
            dirty: true,
            notified: HashSet::new(),
            listener,
        }
    }

    /// Owning observer.
    #[must_use]
    pub const fn observer(&self) -> ObserverId {
        self.observer
    }

    /// Center coordinate.
    #[must_use]
    pub const fn center(&self) -> ChunkCoord {
        self.center
    }

    /// Radius in chunks.
    #[must_use]
    pub const fn radius(&self) -> u32 {
        self.radius
    }

    /// True if the region changed since the streamer last reacted to it.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn set_center(&mut self, center: ChunkCoord) {
        if self.center != center {
            self.center = center;
            self.dirty = true;
        }
    }

    pub(crate) fn set_radius(&mut self, radius: u32) {
        if self.radius != radius {
            self.radius = radius;
            self.dirty = true;
        }
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Radius including the generation margin.
    #[must_use]
    pub const fn generation_radius(&self) -> u32 {
        self.radius.saturating_add(GENERATION_MARGIN)
    }

    /// True if `coord` is close enough to be reported ready.
    #[must_use]
    pub const fn covers(&self, coord: ChunkCoord) -> bool {
        self.center.chebyshev_distance(coord) <= self.radius
    }

    /// True if the region wants `coord` resident.
    #[must_use]
    pub const fn wants(&self, coord: ChunkCoord) -> bool {
        self.center.chebyshev_distance(coord) <= self.generation_radius()
    }

    /// Every coordinate the region wants resident, in coordinate order.
    pub fn desired(&self) -> impl Iterator<Item = ChunkCoord> {
        self.center.region_around(self.generation_radius())
    }

    /// Coordinates to report ready, in coordinate order.
    pub fn covered(&self) -> impl Iterator<Item = ChunkCoord> {
        self.center.region_around(self.radius)
    }

    /// True if `coord` was reported ready and not unloaded since.
    #[must_use]
    pub fn has_notified(&self, coord: ChunkCoord) -> bool {
        self.notified.contains(&coord)
    }

    /// Records a ready report. Returns false if it was already reported.
    pub(crate) fn record_ready(&mut self, coord: ChunkCoord) -> bool {
        self.notified.insert(coord)
    }

    /// Forgets a ready report. Returns true if there was one.
    pub(crate) fn forget(&mut self, coord: ChunkCoord) -> bool {
        self.notified.remove(&coord)
    }

    /// Drops reports for coordinates the region no longer covers and
    /// returns them sorted.
    pub(crate) fn drop_uncovered(&mut self) -> Vec<ChunkCoord> {
        let (center, radius) = (self.center, self.radius);
        let mut gone: Vec<_> = self
            .notified
            .iter()
            .copied()
            .filter(|c| center.chebyshev_distance(*c) > radius)
            .collect();
        gone.sort_unstable();
        for coord in &gone {
            self.notified.remove(coord);
        }
        gone
    }

    /// Drops every ready report and returns them sorted.
    pub(crate) fn take_notified(&mut self) -> Vec<ChunkCoord> {
        let mut all: Vec<_> = self.notified.drain().collect();
        all.sort_unstable();
        all
    }

    /// Event sink.
    #[must_use]
    pub fn listener(&self) -> &Arc<dyn ChunkObserver> {
        &self.listener
    }
}

impl fmt::Debug for RelevanceRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelevanceRegion")
            .field("observer", &self.observer)
            .field("center", &self.center)
            .field("radius", &self.radius)
            .field("dirty", &self.dirty)
            .field("notified", &self.notified.len())
            .finish_non_exhaustive()
    }
}

/// All regions, ordered by observer so fan-out order is stable.
#[derive(Debug, Default)]
pub(crate) struct RegionIndex {
    regions: BTreeMap<ObserverId, RelevanceRegion>,
}

impl RegionIndex {
    pub(crate) fn insert(&mut self, region: RelevanceRegion) -> Option<RelevanceRegion> {
        self.regions.insert(region.observer(), region)
    }

    pub(crate) fn remove(&mut self, observer: ObserverId) -> Option<RelevanceRegion> {
        self.regions.remove(&observer)
    }

    pub(crate) fn get(&self, observer: ObserverId) -> Option<&RelevanceRegion> {
        self.regions.get(&observer)
    }

    pub(crate) fn get_mut(&mut self, observer: ObserverId) -> Option<&mut RelevanceRegion> {
        self.regions.get_mut(&observer)
    }

    pub(crate) fn values(&self) -> impl Iterator<Item = &RelevanceRegion> {
        self.regions.values()
    }

    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = &mut RelevanceRegion> {
        self.regions.values_mut()
    }

    pub(crate) fn len(&self) -> usize {
        self.regions.len()
    }

    /// True if some region wants `coord` resident.
    pub(crate) fn wanted(&self, coord: ChunkCoord) -> bool {
        self.regions.values().any(|r| r.wants(coord))
    }

    /// Distance from `coord` to the nearest region center, `u32::MAX` with
    /// no regions.
    pub(crate) fn priority(&self, coord: ChunkCoord) -> u32 {
        self.regions
            .values()
            .map(|r| r.center().chebyshev_distance(coord))
            .min()
            .unwrap_or(u32::MAX)
    }

    pub(crate) fn mark_all_dirty(&mut self) {
        for region in self.regions.values_mut() {
            region.mark_dirty();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Quiet;

    impl ChunkObserver for Quiet {
        fn on_chunk_ready(&self, _: ObserverId, _: ChunkCoord) {}
        fn on_chunk_unloaded(&self, _: ObserverId, _: ChunkCoord) {}
    }

    fn region(center: ChunkCoord, radius: u32) -> RelevanceRegion {
        RelevanceRegion::new(ObserverId(1), center, radius, Arc::new(Quiet))
    }

    #[test]
    fn test_desired_includes_margin() {
        let r = region(ChunkCoord::ORIGIN, 1);
        assert_eq!(r.desired().count(), 125);
        assert_eq!(r.covered().count(), 27);
        assert!(r.wants(ChunkCoord::new(2, 0, 0)));
        assert!(!r.covers(ChunkCoord::new(2, 0, 0)));
        assert!(!r.wants(ChunkCoord::new(3, 0, 0)));
    }

    #[test]
    fn test_mutation_marks_dirty_only_on_change() {
        let mut r = region(ChunkCoord::ORIGIN, 2);
        r.clear_dirty();
        r.set_radius(2);
        assert!(!r.is_dirty());
        r.set_center(ChunkCoord::new(1, 0, 0));
        assert!(r.is_dirty());
    }

    #[test]
    fn test_drop_uncovered_after_move() {
        let mut r = region(ChunkCoord::ORIGIN, 1);
        assert!(r.record_ready(ChunkCoord::new(-1, 0, 0)));
        assert!(!r.record_ready(ChunkCoord::new(-1, 0, 0)));
        assert!(r.record_ready(ChunkCoord::new(1, 0, 0)));
        r.set_center(ChunkCoord::new(2, 0, 0));
        assert_eq!(r.drop_uncovered(), vec![ChunkCoord::new(-1, 0, 0)]);
        assert!(r.has_notified(ChunkCoord::new(1, 0, 0)));
    }

    #[test]
    fn test_index_priority_is_nearest_center() {
        let mut index = RegionIndex::default();
        assert_eq!(index.priority(ChunkCoord::ORIGIN), u32::MAX);
        index.insert(region(ChunkCoord::ORIGIN, 1));
        index.insert(RelevanceRegion::new(
            ObserverId(2),
            ChunkCoord::new(10, 0, 0),
            1,
            Arc::new(Quiet),
        ));
        assert_eq!(index.priority(ChunkCoord::new(8, 0, 0)), 2);
        assert!(index.wanted(ChunkCoord::new(12, 0, 0)));
        assert!(!index.wanted(ChunkCoord::new(5, 0, 0)));
    }
}
