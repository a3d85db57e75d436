//! # Streaming Integration Tests
//!
//! Drives the streamer through whole region lifecycles: readiness,
//! eviction under lock, failures and re-prioritisation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use strata_world::{
    Block, Chunk, ChunkCoord, ChunkObserver, ChunkProducer, ChunkState, ChunkStorage, ChunkStreamer,
    FlatChunkProducer, MemoryChunkStorage, NullStorage, ObserverId, StreamingConfig, WorldError,
    WorldResult, GENERATION_MARGIN,
};

/// Remembers every callback.
#[derive(Default)]
struct Recorder {
    ready: Mutex<Vec<(ObserverId, ChunkCoord)>>,
    unloaded: Mutex<Vec<(ObserverId, ChunkCoord)>>,
    irrelevant: Mutex<Vec<(ObserverId, ChunkCoord)>>,
}

impl ChunkObserver for Recorder {
    fn on_chunk_ready(&self, observer: ObserverId, coord: ChunkCoord) {
        self.ready.lock().push((observer, coord));
    }

    fn on_chunk_unloaded(&self, observer: ObserverId, coord: ChunkCoord) {
        self.unloaded.lock().push((observer, coord));
    }

    fn on_chunk_irrelevant(&self, observer: ObserverId, coord: ChunkCoord) {
        self.irrelevant.lock().push((observer, coord));
    }
}

/// Flat terrain that counts how often each coordinate was produced.
#[derive(Default)]
struct CountingProducer {
    calls: Mutex<HashMap<ChunkCoord, usize>>,
}

impl ChunkProducer for CountingProducer {
    fn generate(&self, coord: ChunkCoord) -> WorldResult<Chunk> {
        *self.calls.lock().entry(coord).or_default() += 1;
        FlatChunkProducer::default().generate(coord)
    }
}

fn config(budget: usize, workers: usize) -> StreamingConfig {
    StreamingConfig {
        cache_budget: budget,
        worker_threads: workers,
        ..StreamingConfig::testing()
    }
}

/// Ticks until a pass evicts nothing.
fn settle_evictions(streamer: &ChunkStreamer) {
    while streamer.tick().evicted > 0 {}
}

#[test]
fn test_streaming_correctness_radius_two() {
    let producer = Arc::new(CountingProducer::default());
    let streamer = ChunkStreamer::new(config(4096, 2), producer.clone(), Arc::new(NullStorage)).unwrap();
    let center = ChunkCoord::new(5, -3, 7);
    let radius = 2;

    streamer.add_region(ObserverId(1), center, radius, Arc::new(Recorder::default()));
    streamer.flush_generation_queue();

    // Nothing outside radius + margin was ever requested.
    let calls = producer.calls.lock();
    let limit = radius + GENERATION_MARGIN;
    assert!(calls.keys().all(|c| c.chebyshev_distance(center) <= limit));
    assert_eq!(calls.len(), 7 * 7 * 7);

    // Ready exactly where the footprint is resident and light-pending.
    for coord in center.region_around(limit + 1) {
        let ready = streamer.get_chunk(coord).is_some();
        let footprint_inside = coord
            .neighbors_in_footprint()
            .all(|n| n.chebyshev_distance(center) <= limit);
        let in_generated = coord.chebyshev_distance(center) <= limit;
        assert_eq!(ready, in_generated && footprint_inside, "readiness of {coord}");
        if let Some(chunk) = streamer.get_chunk(coord) {
            assert_eq!(chunk.state(), ChunkState::Complete);
            for n in coord.neighbors_in_footprint() {
                let state = streamer.get_resident(n).map(|r| r.state());
                assert!(state.is_some_and(ChunkState::is_at_least_light_pending));
            }
        }
    }
}

#[test]
fn test_ready_notified_once_per_covered_chunk() {
    let streamer = ChunkStreamer::new(config(4096, 4), Arc::new(FlatChunkProducer::default()), Arc::new(NullStorage)).unwrap();
    let recorder = Arc::new(Recorder::default());
    streamer.add_region(ObserverId(7), ChunkCoord::ORIGIN, 1, recorder.clone());
    streamer.flush_generation_queue();
    streamer.tick();

    let ready = recorder.ready.lock();
    let mut coords: Vec<_> = ready.iter().map(|(_, c)| *c).collect();
    coords.sort();
    coords.dedup();
    assert_eq!(coords.len(), ready.len(), "duplicate ready notification");
    assert_eq!(coords, ChunkCoord::ORIGIN.region_around(1).collect::<Vec<_>>());
    assert!(ready.iter().all(|(o, _)| *o == ObserverId(7)));
}

#[test]
fn test_no_duplicate_generation_with_overlapping_regions() {
    let producer = Arc::new(CountingProducer::default());
    let streamer = ChunkStreamer::new(config(4096, 4), producer.clone(), Arc::new(NullStorage)).unwrap();

    for (i, x) in [0, 1, 2, 3].into_iter().enumerate() {
        streamer.add_region(ObserverId(i as u64), ChunkCoord::new(x, 0, 0), 1, Arc::new(Recorder::default()));
    }
    streamer.flush_generation_queue();

    let calls = producer.calls.lock();
    assert!(calls.values().all(|n| *n == 1), "a chunk was generated twice");
    assert_eq!(calls.len(), streamer.resident_count());
}

#[test]
fn test_locked_chunk_survives_eviction_until_unlocked() {
    let storage = Arc::new(MemoryChunkStorage::new());
    let streamer = ChunkStreamer::new(config(27, 1), Arc::new(FlatChunkProducer::default()), storage.clone()).unwrap();
    let old = ChunkCoord::ORIGIN;
    streamer.add_region(ObserverId(1), old, 0, Arc::new(Recorder::default()));
    streamer.flush_generation_queue();
    assert_eq!(streamer.resident_count(), 27);

    // Under budget: nothing is evicted.
    assert_eq!(streamer.tick().evicted, 0);

    let handle = streamer.get_chunk(old).unwrap();
    let mut guard = handle.lock().unwrap();
    guard.set_block(4, 4, 4, Block::BEDROCK);

    streamer.move_region(ObserverId(1), ChunkCoord::new(40, 0, 0));
    streamer.flush_generation_queue();
    settle_evictions(&streamer);

    assert!(streamer.is_resident(old), "locked chunk was evicted");
    assert_eq!(streamer.resident_count(), 28);
    assert_eq!(storage.len(), 26);
    assert!(!storage.contains(old));

    drop(guard);
    let report = streamer.tick();
    assert_eq!(report.evicted, 1);
    assert!(!streamer.is_resident(old));
    assert!(handle.lock().is_none());

    let stored = storage.load_chunk(old).unwrap();
    assert_eq!(stored.get_block(4, 4, 4), Block::BEDROCK);
    assert_eq!(stored.state(), ChunkState::Complete);
    assert_eq!(streamer.stats().evicted, 27);
}

#[test]
fn test_evicted_chunks_come_back_from_storage() {
    let storage = Arc::new(MemoryChunkStorage::new());
    let streamer = ChunkStreamer::new(config(27, 2), Arc::new(FlatChunkProducer::default()), storage.clone()).unwrap();
    let recorder = Arc::new(Recorder::default());
    streamer.add_region(ObserverId(1), ChunkCoord::ORIGIN, 0, recorder.clone());
    streamer.flush_generation_queue();
    streamer
        .get_chunk(ChunkCoord::ORIGIN)
        .unwrap()
        .lock()
        .unwrap()
        .set_block(0, 0, 0, Block(300));

    streamer.move_region(ObserverId(1), ChunkCoord::new(0, 40, 0));
    streamer.flush_generation_queue();
    settle_evictions(&streamer);
    assert!(!streamer.is_resident(ChunkCoord::ORIGIN));
    assert_eq!(recorder.irrelevant.lock().as_slice(), &[(ObserverId(1), ChunkCoord::ORIGIN)]);

    streamer.move_region(ObserverId(1), ChunkCoord::ORIGIN);
    streamer.flush_generation_queue();
    let chunk = streamer.get_chunk(ChunkCoord::ORIGIN).unwrap();
    assert_eq!(chunk.lock().unwrap().get_block(0, 0, 0), Block(300));
    assert!(streamer.stats().loaded >= 27);
}

#[test]
fn test_failed_generation_leaves_coordinate_unloaded() {
    let broken = ChunkCoord::new(1, 0, 0);
    let healthy = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&healthy);
    let producer = move |coord: ChunkCoord| -> WorldResult<Chunk> {
        if coord == broken && !flag.load(Ordering::SeqCst) {
            return Err(WorldError::GenerationFailed {
                coord,
                reason: "simulated fault".into(),
            });
        }
        Ok(Chunk::new(coord))
    };
    let streamer = ChunkStreamer::new(config(4096, 2), Arc::new(producer), Arc::new(NullStorage)).unwrap();
    streamer.add_region(ObserverId(1), ChunkCoord::ORIGIN, 0, Arc::new(Recorder::default()));
    streamer.flush_generation_queue();

    assert_eq!(streamer.stats().failed, 1);
    assert!(!streamer.is_resident(broken));
    assert!(!streamer.is_pending(broken));
    // The origin's footprint is incomplete, so it is not ready.
    assert!(streamer.get_chunk(ChunkCoord::ORIGIN).is_none());

    // No retry without a relevance event.
    healthy.store(true, Ordering::SeqCst);
    streamer.flush_generation_queue();
    assert!(!streamer.is_resident(broken));

    streamer.update_region(ObserverId(1), 1);
    streamer.flush_generation_queue();
    assert!(streamer.is_resident(broken));
    assert!(streamer.get_chunk(ChunkCoord::ORIGIN).is_some());
}

#[test]
fn test_panicking_producer_counts_as_failure() {
    let producer = |coord: ChunkCoord| -> WorldResult<Chunk> {
        assert!(coord.z == 0, "no terrain off the z = 0 plane");
        Ok(Chunk::new(coord))
    };
    let streamer = ChunkStreamer::new(config(4096, 1), Arc::new(producer), Arc::new(NullStorage)).unwrap();
    streamer.add_region(ObserverId(1), ChunkCoord::ORIGIN, 0, Arc::new(Recorder::default()));
    streamer.flush_generation_queue();

    assert_eq!(streamer.stats().failed, 18);
    assert_eq!(streamer.resident_count(), 9);
    assert!(streamer.get_chunk(ChunkCoord::ORIGIN).is_some());
}

#[test]
fn test_removed_region_work_still_completes() {
    let streamer = ChunkStreamer::new(config(4096, 1), Arc::new(FlatChunkProducer::default()), Arc::new(NullStorage)).unwrap();
    streamer.add_region(ObserverId(1), ChunkCoord::ORIGIN, 0, Arc::new(Recorder::default()));
    assert!(streamer.remove_region(ObserverId(1)));
    assert!(!streamer.remove_region(ObserverId(1)));
    streamer.flush_generation_queue();

    assert_eq!(streamer.resident_count(), 27);
    assert_eq!(streamer.region_count(), 0);
}

#[test]
fn test_moving_region_reprioritises_pending_work() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let gate = Arc::new(Mutex::new(()));
    let (producer_seen, producer_gate) = (Arc::clone(&seen), Arc::clone(&gate));
    let producer = move |coord: ChunkCoord| -> WorldResult<Chunk> {
        producer_seen.lock().push(coord);
        let _pass = producer_gate.lock();
        Ok(Chunk::new(coord))
    };
    let streamer = ChunkStreamer::new(config(4096, 1), Arc::new(producer), Arc::new(NullStorage)).unwrap();

    let hold = gate.lock();
    streamer.add_region(ObserverId(1), ChunkCoord::ORIGIN, 0, Arc::new(Recorder::default()));
    while seen.lock().is_empty() {
        thread::yield_now();
    }

    let target = ChunkCoord::new(20, 0, 0);
    assert!(streamer.move_region(ObserverId(1), target));
    let report = streamer.tick();
    assert_eq!(report.requested, 27);
    drop(hold);
    streamer.flush_generation_queue();

    let order = seen.lock();
    assert_eq!(order.len(), 54);
    assert_eq!(order[0], ChunkCoord::ORIGIN);
    assert!(order[1..28].iter().all(|c| c.chebyshev_distance(target) <= 1));
    assert!(order[28..].iter().all(|c| c.chebyshev_distance(ChunkCoord::ORIGIN) <= 1));
}

#[test]
fn test_loaded_chunks_snapshot_is_sorted() {
    let streamer = ChunkStreamer::new(config(4096, 2), Arc::new(FlatChunkProducer::default()), Arc::new(NullStorage)).unwrap();
    streamer.add_region(ObserverId(1), ChunkCoord::ORIGIN, 0, Arc::new(Recorder::default()));
    streamer.flush_generation_queue();

    let chunks = streamer.loaded_chunks();
    assert_eq!(chunks.len(), 27);
    assert!(chunks.windows(2).all(|w| w[0].coord() < w[1].coord()));
    let origin = chunks.iter().find(|c| c.coord() == ChunkCoord::ORIGIN).unwrap();
    assert_eq!(origin.state(), ChunkState::Complete);
}
