//! # Chunk Streamer
//!
//! Keeps the chunks observers care about resident.
//!
//! ## Threads
//!
//! Pool workers produce chunks and insert them into the near-cache. Every
//! other step (region bookkeeping, readiness promotion, notification
//! fan-out, eviction) runs on whichever thread calls [`ChunkStreamer::tick`],
//! and there should be exactly one such thread.
//!
//! ## Shared State
//!
//! | Structure | Guard | Writers |
//! |-----------|-------|---------|
//! | near-cache | `RwLock<HashMap>` | workers insert, tick removes |
//! | preparing set | `Mutex<HashSet>` | tick inserts, workers remove |
//! | region index | `Mutex` | tick thread |
//!
//! A coordinate is never both cached and preparing with the lock order
//! used here: the tick thread checks the cache while holding the preparing
//! lock, and workers insert into the cache before leaving the preparing
//! set.
//!
//! ## Readiness
//!
//! A chunk enters the cache as `Generated` or `LoadedFromStore`, becomes
//! `LightPropagationPending` when the tick thread picks it off the ready
//! queue, and `Complete` once every chunk in its 3x3x1 footprint is at
//! least `LightPropagationPending`. Only complete chunks with a settled
//! footprint are handed out.

use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{MappedMutexGuard, Mutex, MutexGuard, RwLock};
use tracing::{debug, error, info, trace};

use crate::chunk::{Chunk, ChunkState};
use crate::config::StreamingConfig;
use crate::coord::ChunkCoord;
use crate::error::{WorldError, WorldResult};
use crate::pipeline::{GenerationJob, GenerationPipeline};
use crate::producer::ChunkProducer;
use crate::region::{ChunkObserver, ObserverId, RegionIndex, RelevanceRegion};
use crate::storage::ChunkStorage;

/// How long `flush_generation_queue` sleeps between ticks while workers run.
const FLUSH_POLL: Duration = Duration::from_millis(50);

// =============================================================================
// Near-cache entries
// =============================================================================

/// One resident chunk.
///
/// The lifecycle state lives in an atomic so readiness checks never wait on
/// a chunk that is locked for mutation. It is copied into the chunk whenever
/// the chunk is handed out or stored.
struct ChunkSlot {
    chunk: Mutex<Option<Chunk>>,
    state: AtomicU8,
    /// Last time the chunk arrived or became complete, for eviction order.
    ready_seq: AtomicU64,
}

impl ChunkSlot {
    fn new(chunk: Chunk, seq: u64) -> Self {
        let state = chunk.state();
        Self {
            chunk: Mutex::new(Some(chunk)),
            state: AtomicU8::new(state as u8),
            ready_seq: AtomicU64::new(seq),
        }
    }

    fn state(&self) -> ChunkState {
        ChunkState::from_u8(self.state.load(Ordering::Acquire)).unwrap_or_default()
    }

    fn set_state(&self, state: ChunkState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Takes the chunk out unless it is locked. `None` if locked or gone.
    fn try_take(&self) -> Result<Option<Chunk>, ()> {
        let mut guard = self.chunk.try_lock().ok_or(())?;
        let state = self.state();
        self.set_state(ChunkState::Unloaded);
        Ok(guard.take().map(|mut chunk| {
            chunk.set_state(state);
            chunk
        }))
    }
}

/// Handle to a resident chunk.
///
/// The handle stays valid after eviction; [`ChunkRef::lock`] then returns
/// `None`. While a lock is held the chunk cannot be evicted.
#[derive(Clone)]
pub struct ChunkRef {
    coord: ChunkCoord,
    slot: Arc<ChunkSlot>,
}

impl ChunkRef {
    /// Chunk coordinate.
    #[must_use]
    pub const fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// Current lifecycle state, `Unloaded` once evicted.
    #[must_use]
    pub fn state(&self) -> ChunkState {
        self.slot.state()
    }

    /// Locks the chunk for reading or mutation, blocking while another
    /// thread holds it.
    #[must_use]
    pub fn lock(&self) -> Option<MappedMutexGuard<'_, Chunk>> {
        Self::map(&self.slot, self.slot.chunk.lock())
    }

    /// Locks the chunk if nobody else holds it.
    #[must_use]
    pub fn try_lock(&self) -> Option<MappedMutexGuard<'_, Chunk>> {
        Self::map(&self.slot, self.slot.chunk.try_lock()?)
    }

    /// Copy of the chunk, `None` once evicted.
    #[must_use]
    pub fn snapshot(&self) -> Option<Chunk> {
        self.lock().map(|chunk| chunk.clone())
    }

    fn map<'a>(slot: &ChunkSlot, guard: MutexGuard<'a, Option<Chunk>>) -> Option<MappedMutexGuard<'a, Chunk>> {
        let state = slot.state();
        if state == ChunkState::Unloaded {
            return None;
        }
        let mut chunk = MutexGuard::try_map(guard, Option::as_mut).ok()?;
        chunk.set_state(state);
        Some(chunk)
    }
}

impl std::fmt::Debug for ChunkRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkRef")
            .field("coord", &self.coord)
            .field("state", &self.state())
            .finish()
    }
}

// =============================================================================
// Reporting
// =============================================================================

/// What one tick did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Dirty regions re-evaluated.
    pub regions_refreshed: usize,
    /// Generation tasks submitted.
    pub requested: usize,
    /// Chunks taken off the ready queue.
    pub arrived: usize,
    /// Chunks that became complete.
    pub promoted: usize,
    /// Ready notifications delivered.
    pub notified: usize,
    /// Chunks moved to the far-store.
    pub evicted: usize,
    /// Eviction candidates skipped because they were locked.
    pub skipped_locked: usize,
}

/// Lifetime counters of a streamer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamingStats {
    /// Chunks built by the producer.
    pub generated: u64,
    /// Chunks read back from storage.
    pub loaded: u64,
    /// Chunks evicted to storage.
    pub evicted: u64,
    /// Failed productions.
    pub failed: u64,
    /// Chunks in the near-cache now.
    pub resident: usize,
    /// Coordinates being prepared now.
    pub pending: usize,
}

#[derive(Default)]
struct Counters {
    generated: AtomicU64,
    loaded: AtomicU64,
    evicted: AtomicU64,
    failed: AtomicU64,
}

/// A callback owed to one observer, delivered after the region lock is
/// released.
enum Event {
    Ready(ObserverId, ChunkCoord, Arc<dyn ChunkObserver>),
    Unloaded(ObserverId, ChunkCoord, Arc<dyn ChunkObserver>),
    Irrelevant(ObserverId, ChunkCoord, Arc<dyn ChunkObserver>),
}

fn dispatch(events: Vec<Event>) {
    for event in events {
        match event {
            Event::Ready(observer, coord, listener) => listener.on_chunk_ready(observer, coord),
            Event::Unloaded(observer, coord, listener) => listener.on_chunk_unloaded(observer, coord),
            Event::Irrelevant(observer, coord, listener) => {
                listener.on_chunk_irrelevant(observer, coord);
            }
        }
    }
}

// =============================================================================
// Worker side
// =============================================================================

/// State shared with pool workers.
struct Shared {
    cache: RwLock<HashMap<ChunkCoord, Arc<ChunkSlot>>>,
    preparing: Mutex<HashSet<ChunkCoord>>,
    producer: Arc<dyn ChunkProducer>,
    storage: Arc<dyn ChunkStorage>,
    ready_tx: Sender<ChunkCoord>,
    ready_seq: AtomicU64,
    counters: Counters,
}

impl Shared {
    fn next_seq(&self) -> u64 {
        self.ready_seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Runs on a pool thread: load or generate `coord`, then publish it.
    fn prepare(&self, coord: ChunkCoord) {
        match self.produce(coord) {
            Ok(chunk) => {
                trace!(%coord, state = ?chunk.state(), "chunk prepared");
                let slot = Arc::new(ChunkSlot::new(chunk, self.next_seq()));
                self.cache.write().insert(coord, slot);
                self.preparing.lock().remove(&coord);
                let _ = self.ready_tx.send(coord);
            }
            Err(e) => {
                error!(%coord, error = %e, "chunk production failed; coordinate stays unloaded");
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                self.preparing.lock().remove(&coord);
            }
        }
    }

    fn produce(&self, coord: ChunkCoord) -> WorldResult<Chunk> {
        let (mut chunk, state) = if let Some(chunk) = self.storage.load_chunk(coord) {
            (chunk, ChunkState::LoadedFromStore)
        } else {
            let generated = panic::catch_unwind(AssertUnwindSafe(|| self.producer.generate(coord)))
                .unwrap_or_else(|_| {
                    Err(WorldError::GenerationFailed {
                        coord,
                        reason: "producer panicked".into(),
                    })
                })?;
            (generated, ChunkState::Generated)
        };

        if chunk.coord() != coord {
            return Err(WorldError::GenerationFailed {
                coord,
                reason: format!("got chunk for {}", chunk.coord()),
            });
        }
        let counter = if state == ChunkState::LoadedFromStore {
            &self.counters.loaded
        } else {
            &self.counters.generated
        };
        counter.fetch_add(1, Ordering::Relaxed);
        chunk.set_state(state);
        Ok(chunk)
    }
}

// =============================================================================
// Streamer
// =============================================================================

/// Relevance-driven chunk streamer.
///
/// Region methods and [`ChunkStreamer::tick`] belong to the owning game
/// thread. [`ChunkStreamer::get_chunk`] and the read-only queries may be
/// called from anywhere.
pub struct ChunkStreamer {
    config: StreamingConfig,
    shared: Arc<Shared>,
    regions: Mutex<RegionIndex>,
    ready_rx: Receiver<ChunkCoord>,
    pipeline: GenerationPipeline,
}

impl ChunkStreamer {
    /// Creates a streamer and starts its worker pool.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid or a worker cannot be
    /// spawned.
    pub fn new(
        config: StreamingConfig,
        producer: Arc<dyn ChunkProducer>,
        storage: Arc<dyn ChunkStorage>,
    ) -> WorldResult<Self> {
        config.validate()?;

        let (ready_tx, ready_rx) = crossbeam_channel::unbounded();
        let shared = Arc::new(Shared {
            cache: RwLock::new(HashMap::new()),
            preparing: Mutex::new(HashSet::new()),
            producer,
            storage,
            ready_tx,
            ready_seq: AtomicU64::new(0),
            counters: Counters::default(),
        });

        let worker_shared = Arc::clone(&shared);
        let job: GenerationJob = Arc::new(move |coord| worker_shared.prepare(coord));
        let pipeline = GenerationPipeline::new(config.worker_threads, job)?;

        info!(
            budget = config.cache_budget,
            workers = config.worker_threads,
            "chunk streamer started"
        );
        Ok(Self {
            config,
            shared,
            regions: Mutex::new(RegionIndex::default()),
            ready_rx,
            pipeline,
        })
    }

    /// Streaming configuration.
    #[must_use]
    pub const fn config(&self) -> &StreamingConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Regions
    // -------------------------------------------------------------------------

    /// Registers (or replaces) the region of `observer`.
    ///
    /// Chunks already ready within the region are reported right away; the
    /// rest of the region plus its margin is requested.
    pub fn add_region(
        &self,
        observer: ObserverId,
        center: ChunkCoord,
        radius: u32,
        listener: Arc<dyn ChunkObserver>,
    ) {
        let mut events = Vec::new();
        {
            let mut regions = self.regions.lock();
            if regions
                .insert(RelevanceRegion::new(observer, center, radius, listener))
                .is_some()
            {
                debug!(%observer, "region replaced");
            }
            let requested = self.refresh_region(&mut regions, observer, &mut events);
            self.pipeline.reprioritize(|c| regions.priority(c));
            debug!(%observer, %center, radius, requested, "region added");
        }
        dispatch(events);
    }

    /// Changes the radius of `observer`'s region. Returns false if it has
    /// none. Takes effect on the next tick.
    pub fn update_region(&self, observer: ObserverId, radius: u32) -> bool {
        let mut regions = self.regions.lock();
        let Some(region) = regions.get_mut(observer) else {
            return false;
        };
        region.set_radius(radius);
        self.pipeline.reprioritize(|c| regions.priority(c));
        true
    }

    /// Moves `observer`'s region. Returns false if it has none. Takes effect
    /// on the next tick.
    pub fn move_region(&self, observer: ObserverId, center: ChunkCoord) -> bool {
        let mut regions = self.regions.lock();
        let Some(region) = regions.get_mut(observer) else {
            return false;
        };
        region.set_center(center);
        self.pipeline.reprioritize(|c| regions.priority(c));
        true
    }

    /// Drops `observer`'s region. Work it alone requested still completes
    /// and is evicted later. Returns false if it had none.
    pub fn remove_region(&self, observer: ObserverId) -> bool {
        let mut regions = self.regions.lock();
        if regions.remove(observer).is_none() {
            return false;
        }
        self.pipeline.reprioritize(|c| regions.priority(c));
        debug!(%observer, "region removed");
        true
    }

    /// Number of registered regions.
    #[must_use]
    pub fn region_count(&self) -> usize {
        self.regions.lock().len()
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Returns the chunk at `coord` if it is complete and its footprint is
    /// settled. A resident chunk that is not ready yields `None`.
    #[must_use]
    pub fn get_chunk(&self, coord: ChunkCoord) -> Option<ChunkRef> {
        let cache = self.shared.cache.read();
        let slot = cache.get(&coord)?;
        if slot.state() != ChunkState::Complete || !footprint_settled(&cache, coord) {
            return None;
        }
        Some(ChunkRef {
            coord,
            slot: Arc::clone(slot),
        })
    }

    /// Returns the resident chunk at `coord` whatever its state.
    #[must_use]
    pub fn get_resident(&self, coord: ChunkCoord) -> Option<ChunkRef> {
        self.shared.cache.read().get(&coord).map(|slot| ChunkRef {
            coord,
            slot: Arc::clone(slot),
        })
    }

    /// True if `coord` is in the near-cache.
    #[must_use]
    pub fn is_resident(&self, coord: ChunkCoord) -> bool {
        self.shared.cache.read().contains_key(&coord)
    }

    /// True if a worker is preparing `coord`.
    #[must_use]
    pub fn is_pending(&self, coord: ChunkCoord) -> bool {
        self.shared.preparing.lock().contains(&coord)
    }

    /// Number of resident chunks.
    #[must_use]
    pub fn resident_count(&self) -> usize {
        self.shared.cache.read().len()
    }

    /// Coordinates of every resident chunk, sorted.
    #[must_use]
    pub fn resident_coords(&self) -> Vec<ChunkCoord> {
        let mut coords: Vec<_> = self.shared.cache.read().keys().copied().collect();
        coords.sort_unstable();
        coords
    }

    /// Copies of every resident chunk, sorted by coordinate. Blocks briefly
    /// on chunks locked for mutation.
    #[must_use]
    pub fn loaded_chunks(&self) -> Vec<Chunk> {
        let mut slots: Vec<_> = self
            .shared
            .cache
            .read()
            .iter()
            .map(|(coord, slot)| ChunkRef {
                coord: *coord,
                slot: Arc::clone(slot),
            })
            .collect();
        slots.sort_unstable_by_key(ChunkRef::coord);
        slots.iter().filter_map(ChunkRef::snapshot).collect()
    }

    /// Lifetime counters.
    #[must_use]
    pub fn stats(&self) -> StreamingStats {
        let counters = &self.shared.counters;
        StreamingStats {
            generated: counters.generated.load(Ordering::Relaxed),
            loaded: counters.loaded.load(Ordering::Relaxed),
            evicted: counters.evicted.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
            resident: self.resident_count(),
            pending: self.shared.preparing.lock().len(),
        }
    }

    // -------------------------------------------------------------------------
    // Tick
    // -------------------------------------------------------------------------

    /// One streaming pass: refresh dirty regions, process finished chunks
    /// within the ready deadline, then evict cold chunks over budget.
    pub fn tick(&self) -> TickReport {
        let mut report = TickReport::default();
        let mut events = Vec::new();
        {
            let mut regions = self.regions.lock();
            self.refresh_dirty(&mut regions, &mut events, &mut report);
            self.drain_ready(&mut regions, &mut events, &mut report);
            self.evict(&mut regions, &mut events, &mut report);
        }
        report.notified = events
            .iter()
            .filter(|e| matches!(e, Event::Ready(..)))
            .count();
        dispatch(events);

        if report != TickReport::default() {
            debug!(?report, resident = self.resident_count(), "streaming tick");
        }
        report
    }

    /// Waits for the pool and ticks until nothing is queued, running or
    /// waiting on the ready queue.
    pub fn flush_generation_queue(&self) {
        loop {
            self.pipeline.wait_until_idle(FLUSH_POLL);
            self.tick();
            let dirty = self.regions.lock().values().any(RelevanceRegion::is_dirty);
            if !dirty && self.pipeline.is_idle() && self.ready_rx.is_empty() {
                break;
            }
        }
    }

    /// Throws away the resident copy of `coord` without persisting it and
    /// requests it again if a region still wants it. Returns false if it is
    /// not resident or is locked.
    pub fn reload_chunk(&self, coord: ChunkCoord) -> bool {
        let mut events = Vec::new();
        {
            let mut regions = self.regions.lock();
            let Some(slot) = self.shared.cache.read().get(&coord).cloned() else {
                return false;
            };
            if slot.try_take().is_err() {
                debug!(%coord, "reload skipped, chunk is locked");
                return false;
            }
            self.shared.cache.write().remove(&coord);
            unloaded(&mut regions, coord, &mut events);
            if regions.wanted(coord) {
                self.request(coord, regions.priority(coord));
            }
        }
        dispatch(events);
        true
    }

    /// Drops every resident chunk without persisting it. Regions are told
    /// and re-request what they need on the next tick.
    pub fn purge(&self) {
        let mut events = Vec::new();
        {
            let mut regions = self.regions.lock();
            let slots: Vec<_> = self.shared.cache.write().drain().collect();
            for (_, slot) in &slots {
                slot.set_state(ChunkState::Unloaded);
            }
            for region in regions.values_mut() {
                let (observer, listener) = (region.observer(), Arc::clone(region.listener()));
                for coord in region.take_notified() {
                    events.push(Event::Unloaded(observer, coord, Arc::clone(&listener)));
                }
            }
            regions.mark_all_dirty();
            info!(dropped = slots.len(), "near-cache purged");
        }
        dispatch(events);
    }

    // -------------------------------------------------------------------------
    // Tick steps
    // -------------------------------------------------------------------------

    /// Queues `coord` unless it is resident or already preparing.
    fn request(&self, coord: ChunkCoord, priority: u32) -> bool {
        let mut preparing = self.shared.preparing.lock();
        if preparing.contains(&coord) || self.shared.cache.read().contains_key(&coord) {
            return false;
        }
        preparing.insert(coord);
        drop(preparing);
        self.pipeline.submit(coord, priority);
        true
    }

    /// Requests what the region is missing and settles its notifications.
    /// Returns the number of requests.
    fn refresh_region(&self, regions: &mut RegionIndex, observer: ObserverId, events: &mut Vec<Event>) -> usize {
        let Some(region) = regions.get(observer) else {
            return 0;
        };
        let desired: Vec<_> = region.desired().collect();
        let covered: Vec<_> = region.covered().collect();

        let requested = desired
            .into_iter()
            .filter(|c| self.request(*c, regions.priority(*c)))
            .count();

        let ready: Vec<_> = {
            let cache = self.shared.cache.read();
            covered
                .into_iter()
                .filter(|c| is_ready(&cache, *c))
                .collect()
        };

        let Some(region) = regions.get_mut(observer) else {
            return requested;
        };
        let listener = Arc::clone(region.listener());
        for coord in region.drop_uncovered() {
            events.push(Event::Irrelevant(observer, coord, Arc::clone(&listener)));
        }
        for coord in ready {
            if region.record_ready(coord) {
                events.push(Event::Ready(observer, coord, Arc::clone(&listener)));
            }
        }
        region.clear_dirty();
        requested
    }

    fn refresh_dirty(&self, regions: &mut RegionIndex, events: &mut Vec<Event>, report: &mut TickReport) {
        let dirty: Vec<_> = regions
            .values()
            .filter(|r| r.is_dirty())
            .map(RelevanceRegion::observer)
            .collect();
        if dirty.is_empty() {
            return;
        }
        for observer in &dirty {
            report.requested += self.refresh_region(regions, *observer, events);
        }
        report.regions_refreshed = dirty.len();
        self.pipeline.reprioritize(|c| regions.priority(c));
    }

    fn drain_ready(&self, regions: &mut RegionIndex, events: &mut Vec<Event>, report: &mut TickReport) {
        let deadline = Instant::now() + Duration::from_millis(self.config.ready_deadline_ms);
        while report.arrived == 0 || Instant::now() < deadline {
            let Ok(coord) = self.ready_rx.try_recv() else {
                break;
            };
            report.arrived += 1;
            for promoted in self.settle(coord) {
                report.promoted += 1;
                for region in regions.values_mut() {
                    if region.covers(promoted) && region.record_ready(promoted) {
                        events.push(Event::Ready(region.observer(), promoted, Arc::clone(region.listener())));
                    }
                }
            }
        }
    }

    /// Marks an arrived chunk light-pending and promotes every chunk in its
    /// footprint whose own footprint is now settled.
    fn settle(&self, coord: ChunkCoord) -> Vec<ChunkCoord> {
        let cache = self.shared.cache.read();
        let Some(slot) = cache.get(&coord) else {
            // Evicted or purged before it was processed.
            return Vec::new();
        };
        if matches!(slot.state(), ChunkState::Generated | ChunkState::LoadedFromStore) {
            slot.set_state(ChunkState::LightPropagationPending);
        }

        let mut promoted = Vec::new();
        for neighbor in coord.neighbors_in_footprint() {
            let Some(slot) = cache.get(&neighbor) else {
                continue;
            };
            if slot.state() == ChunkState::LightPropagationPending && footprint_settled(&cache, neighbor) {
                slot.set_state(ChunkState::Complete);
                slot.ready_seq.store(self.shared.next_seq(), Ordering::Relaxed);
                promoted.push(neighbor);
            }
        }
        promoted
    }

    fn evict(&self, regions: &mut RegionIndex, events: &mut Vec<Event>, report: &mut TickReport) {
        let budget = self.config.cache_budget;
        let mut candidates: Vec<_> = {
            let cache = self.shared.cache.read();
            if cache.len() <= budget {
                return;
            }
            cache
                .iter()
                .filter(|(coord, _)| !regions.wanted(**coord))
                .map(|(coord, slot)| (slot.ready_seq.load(Ordering::Relaxed), *coord, Arc::clone(slot)))
                .collect()
        };
        candidates.sort_unstable_by_key(|(seq, coord, _)| (*seq, *coord));

        for (_, coord, slot) in candidates {
            if self.resident_count() <= budget || report.evicted >= self.config.max_unloads_per_tick {
                break;
            }
            let Ok(chunk) = slot.try_take() else {
                trace!(%coord, "eviction skipped, chunk is locked");
                report.skipped_locked += 1;
                continue;
            };
            if let Some(chunk) = chunk {
                self.shared.storage.store_chunk(chunk);
            }
            self.shared.cache.write().remove(&coord);
            self.shared.counters.evicted.fetch_add(1, Ordering::Relaxed);
            report.evicted += 1;
            unloaded(regions, coord, events);
        }
    }
}

/// Notifies regions that saw `coord` ready that it is gone.
fn unloaded(regions: &mut RegionIndex, coord: ChunkCoord, events: &mut Vec<Event>) {
    for region in regions.values_mut() {
        if region.forget(coord) {
            events.push(Event::Unloaded(region.observer(), coord, Arc::clone(region.listener())));
        }
    }
}

fn footprint_settled(cache: &HashMap<ChunkCoord, Arc<ChunkSlot>>, coord: ChunkCoord) -> bool {
    coord.neighbors_in_footprint().all(|n| {
        cache
            .get(&n)
            .is_some_and(|slot| slot.state().is_at_least_light_pending())
    })
}

fn is_ready(cache: &HashMap<ChunkCoord, Arc<ChunkSlot>>, coord: ChunkCoord) -> bool {
    cache
        .get(&coord)
        .is_some_and(|slot| slot.state() == ChunkState::Complete)
        && footprint_settled(cache, coord)
}

impl std::fmt::Debug for ChunkStreamer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkStreamer")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
