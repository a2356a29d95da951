#![allow(missing_docs)]

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use serde::{Deserialize, Serialize};
use std::hint::black_box;
use std::io::Cursor;
use tessera::{Archive, ByteBuf, HashMap, Mode, Tessera};

#[derive(Clone, Serialize, Deserialize, Archive, Debug)]
struct BenchItem {
    id: u64,
    name: String,
    payload: Vec<u64>,
}

#[derive(Clone, Serialize, Deserialize, Archive, Debug)]
struct BenchCollection {
    data: Vec<BenchItem>,
}

fn generate_data(count: usize) -> BenchCollection {
    let items = (0..count)
        .map(|i| BenchItem {
            id: i as u64,
            name: format!("item-{i}"),
            payload: vec![i as u64; 128], // ~1KB
        })
        .collect();
    BenchCollection { data: items }
}

// --- BENCHMARKS ---

fn bench_writers(c: &mut Criterion) {
    let item_count = 100_000;
    let data = generate_data(item_count);

    println!("Writers Item count: {}", item_count);

    let mut group = c.benchmark_group("Serialization Write");
    group.throughput(Throughput::Bytes((item_count * 1056) as u64));

    // 1. Baseline: Bincode
    group.bench_function("bincode_serialize", |b| {
        let mut buffer = Vec::new();
        b.iter(|| {
            buffer.clear();
            bincode::serde::encode_into_std_write(
                black_box(&data.data),
                &mut Cursor::new(&mut buffer),
                bincode::config::standard(),
            )
            .expect("Bincode serialization failed");
        });
    });

    // 2. Tessera
    group.bench_function("tessera_serialize", |b| {
        let mut buffer = ByteBuf::new();
        b.iter(|| {
            buffer.clear();
            Tessera::write(&mut buffer, black_box(&data)).expect("Failed to serialize");
        });
    });

    // 3. Tessera with both trailers
    group.bench_function("tessera_serialize_checked", |b| {
        let builder = Tessera::builder().with_version().with_integrity();
        let mut buffer = ByteBuf::new();
        b.iter(|| {
            buffer.clear();
            builder
                .write(&mut buffer, black_box(&data))
                .expect("Failed to serialize");
        });
    });

    group.finish();
}

fn bench_readers(c: &mut Criterion) {
    let item_count = 100_000;

    println!("Readers Item count: {}", item_count);

    let data = generate_data(item_count);

    let mut bincode_buffer = Vec::new();
    bincode::serde::encode_into_std_write(
        &data.data,
        &mut bincode_buffer,
        bincode::config::standard(),
    )
    .expect("Bincode serialization failed");

    let plain = Tessera::to_bytes(&data).expect("Failed to serialize");
    let checked_mode = Mode::WITH_VERSION | Mode::WITH_INTEGRITY;
    let checked = Tessera::builder()
        .mode(checked_mode)
        .to_bytes(&data)
        .expect("Failed to serialize");
    println!("Archive size: {} bytes", plain.len());

    let mut group = c.benchmark_group("Deserialization Read");

    // 1. Bincode: full decode
    group.bench_function("bincode_read_all", |b| {
        b.iter(|| {
            let _res: Vec<BenchItem> = bincode::serde::decode_from_std_read(
                &mut Cursor::new(&bincode_buffer),
                bincode::config::standard(),
            )
            .expect("Bincode deserialization failed");
        });
    });

    // 2. Tessera: validated view
    group.bench_function("tessera_validate", |b| {
        b.iter(|| {
            let view = tessera::deserialize::<BenchCollection>(black_box(&plain), Mode::NONE)
                .expect("Failed to validate");
            black_box(view.data.len());
        });
    });

    // 3. Tessera: checksum, fingerprint and validation
    group.bench_function("tessera_validate_checked", |b| {
        b.iter(|| {
            let view = tessera::deserialize::<BenchCollection>(black_box(&checked), checked_mode)
                .expect("Failed to validate");
            black_box(view.data.len());
        });
    });

    // 4. Tessera: unchecked access, sum over every payload
    group.bench_function("tessera_unchecked_sum", |b| {
        b.iter(|| {
            // SAFETY: `plain` was produced by `Tessera::to_bytes` for this type.
            let view = unsafe { tessera::unchecked_deserialize::<BenchCollection>(&plain) };
            let sum: u64 = view.data.iter().map(|item| item.payload[0]).sum();
            black_box(sum);
        });
    });

    group.finish();
}

fn bench_map_lookup(c: &mut Criterion) {
    let map: HashMap<String, u64> = (0..100_000u64).map(|i| (format!("key-{i}"), i)).collect();
    let bytes = Tessera::to_bytes(&map).expect("Failed to serialize");
    let view = tessera::deserialize::<HashMap<String, u64>>(&bytes, Mode::NONE)
        .expect("Failed to validate");
    let probes: Vec<String> = (0..1_000).map(|i| format!("key-{}", i * 97)).collect();

    let mut group = c.benchmark_group("Map Lookup");
    group.bench_function("owned_get_1000", |b| {
        b.iter(|| {
            for probe in &probes {
                black_box(map.get(probe.as_str()));
            }
        });
    });
    group.bench_function("archived_get_1000", |b| {
        b.iter(|| {
            for probe in &probes {
                black_box(view.get(probe.as_str()));
            }
        });
    });
    group.finish();
}

criterion_group!(benches, bench_writers, bench_readers, bench_map_lookup);
criterion_main!(benches);
