//! Routing benchmarks for the overlay core

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use pastry_routing::{Key, Overlay, OverlayConfig, RoutingTable};
use std::hint::black_box;

fn create_keys(count: usize) -> Vec<Key> {
    (0..count)
        .map(|i| Key::derive(&(i as u64).to_be_bytes(), 16).unwrap())
        .collect()
}

fn benchmark_insert(c: &mut Criterion) {
    let keys = create_keys(1_000);

    c.bench_function("routing_table_insert_1000", |b| {
        b.iter(|| {
            let mut table = RoutingTable::new(16);
            for (i, key) in keys.iter().enumerate() {
                table.set(key.as_bytes(), i).unwrap();
            }
            black_box(table)
        })
    });
}

fn benchmark_lookup(c: &mut Criterion) {
    let keys = create_keys(10_000);
    let table =
        RoutingTable::with_entries(16, keys.iter().enumerate().map(|(i, k)| (k.clone(), i)))
            .unwrap();
    let target = Key::derive(b"lookup target", 16).unwrap();

    c.bench_function("routing_table_get", |b| {
        b.iter(|| black_box(table.get(black_box(keys[4_242].as_bytes()))))
    });

    c.bench_function("routing_table_nearest", |b| {
        b.iter(|| black_box(table.nearest(black_box(target.as_bytes()))))
    });
}

fn benchmark_route(c: &mut Criterion) {
    let target = Key::derive(b"route target", 16).unwrap();
    let mut group = c.benchmark_group("overlay_route");

    for size in [100usize, 1_000, 10_000] {
        let keys = create_keys(size);
        let local = Key::derive(b"local", 16).unwrap();
        let overlay = Overlay::with_peers(
            local,
            OverlayConfig::default(),
            keys.iter().enumerate().map(|(i, k)| (k.clone(), i)),
        )
        .unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(size), &overlay, |b, overlay| {
            b.iter(|| black_box(overlay.route(black_box(target.as_bytes()), 5)))
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_insert, benchmark_lookup, benchmark_route);
criterion_main!(benches);
