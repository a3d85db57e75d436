//! Benchmark for value-tree encoding and handler dispatch.
//!
//! Run with: cargo bench --package strata_persist --bench codec_benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use strata_persist::{decode, encode, Compression, Persist, StructSchema, TypeHandlerRegistry, TypeInfo};

#[derive(Clone, Default)]
struct Sample {
    id: u64,
    name: String,
    position: [f32; 3],
    voxels: Vec<u16>,
}

impl Persist for Sample {
    fn type_info() -> TypeInfo {
        StructSchema::builder::<Self>("Sample")
            .field("id", |s| &s.id, |s, v| s.id = v)
            .field("name", |s| &s.name, |s, v| s.name = v)
            .field("position", |s| &s.position, |s, v| s.position = v)
            .field("voxels", |s| &s.voxels, |s, v| s.voxels = v)
            .build()
    }
}

fn sample() -> Sample {
    Sample {
        id: 42,
        name: "bench".into(),
        position: [1.0, 64.5, -3.25],
        voxels: (0..4096u16).map(|i| i % 7).collect(),
    }
}

fn benchmark_registry(c: &mut Criterion) {
    let registry = TypeHandlerRegistry::new();
    let value = sample();
    let data = registry.serialize(&value).unwrap_or_default();

    c.bench_function("registry_serialize_4096_voxels", |b| {
        b.iter(|| black_box(registry.serialize(black_box(&value))));
    });
    c.bench_function("registry_deserialize_4096_voxels", |b| {
        b.iter(|| black_box(registry.deserialize::<Sample>(black_box(&data))));
    });
}

fn benchmark_codec(c: &mut Criterion) {
    let registry = TypeHandlerRegistry::new();
    let data = registry.serialize(&sample()).unwrap_or_default();
    let plain = encode(&data, Compression::None).unwrap();
    let packed = encode(&data, Compression::Lz4).unwrap();
    println!("frame size: {} bytes plain, {} bytes lz4", plain.len(), packed.len());

    let mut group = c.benchmark_group("codec");
    group.throughput(Throughput::Bytes(plain.len() as u64));
    group.bench_function("encode_lz4", |b| {
        b.iter(|| black_box(encode(black_box(&data), Compression::Lz4).unwrap()));
    });
    group.bench_function("decode_lz4", |b| {
        b.iter(|| black_box(decode(black_box(&packed))));
    });
    group.bench_function("decode_plain", |b| {
        b.iter(|| black_box(decode(black_box(&plain))));
    });
    group.finish();
}

criterion_group!(benches, benchmark_registry, benchmark_codec);
criterion_main!(benches);
