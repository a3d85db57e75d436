//! Benchmark for chunk store encoding and whole saves.
//!
//! Run with: cargo bench --package strata_storage --bench save_benchmark

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use strata_persist::TypeHandlerRegistry;
use strata_storage::{
    encode_archive, ArchiveEntries, ChunkStore, FarStore, InMemoryWorldState, MemoryFarStore, StorageConfig,
    StorageManager,
};
use strata_world::{
    Chunk, ChunkCoord, ChunkObserver, ChunkProducer, ChunkStreamer, FlatChunkProducer, NullStorage, ObserverId,
    StreamingConfig,
};

struct Ignore;

impl ChunkObserver for Ignore {
    fn on_chunk_ready(&self, _: ObserverId, _: ChunkCoord) {}
    fn on_chunk_unloaded(&self, _: ObserverId, _: ChunkCoord) {}
}

fn sample_chunk() -> Chunk {
    FlatChunkProducer {
        ground_level: 8,
        ..FlatChunkProducer::default()
    }
    .generate(ChunkCoord::ORIGIN)
    .unwrap_or_else(|e| panic!("generate: {e}"))
}

fn benchmark_chunk_store_encode(c: &mut Criterion) {
    let registry = TypeHandlerRegistry::new();
    let store = ChunkStore::new(sample_chunk());

    let mut group = c.benchmark_group("chunk_store");
    group.throughput(Throughput::Elements(1));
    group.bench_function("serialize_encode_lz4", |b| {
        b.iter(|| {
            let data = registry
                .serialize(black_box(&store))
                .unwrap_or_else(|e| panic!("serialize: {e}"));
            black_box(strata_persist::encode(&data, strata_persist::Compression::Lz4).unwrap())
        });
    });
    group.finish();
}

fn benchmark_archive_image(c: &mut Criterion) {
    let mut entries = ArchiveEntries::new();
    for coord in ChunkCoord::ORIGIN.region_around(3) {
        entries.insert(coord, vec![7u8; 2048]);
    }
    c.bench_function("archive_image_343_entries", |b| {
        b.iter(|| black_box(encode_archive(black_box(&entries)).unwrap()));
    });
}

fn benchmark_full_save(c: &mut Criterion) {
    let streamer = ChunkStreamer::new(
        StreamingConfig {
            cache_budget: 4096,
            ..StreamingConfig::default()
        },
        Arc::new(FlatChunkProducer::default()),
        Arc::new(NullStorage),
    )
    .unwrap_or_else(|e| panic!("streamer: {e}"));
    streamer.add_region(ObserverId(1), ChunkCoord::ORIGIN, 2, Arc::new(Ignore));
    streamer.flush_generation_queue();

    let storage = StorageManager::with_store(
        StorageConfig::default(),
        0,
        Arc::new(TypeHandlerRegistry::new()),
        Arc::new(MemoryFarStore::new()) as Arc<dyn FarStore>,
    );
    let world = InMemoryWorldState::new();

    let mut group = c.benchmark_group("save");
    group.sample_size(10);
    group.bench_function("radius_2_to_memory", |b| {
        b.iter(|| black_box(storage.save(&streamer, &world).chunks_written));
    });
    group.finish();
}

criterion_group!(
    benches,
    benchmark_chunk_store_encode,
    benchmark_archive_image,
    benchmark_full_save
);
criterion_main!(benches);
