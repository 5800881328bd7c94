//! Synchronization benchmarks for ferrosync
//!
//! Measures full mirror runs into an empty store, no-op runs over already
//! synchronized trees and dry runs, across tree shapes and concurrency caps.

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use ferrosync_store::MemoryStore;
use ferrosync_sync::SyncOptions;
use ferrosync_tests::test_utils::{memory_pair, populate_tree, sync_memory, tree_entry_count};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

/// (depth, width, files per namespace, file size)
const TREE_SHAPES: &[(usize, usize, usize, usize)] = &[
    (1, 4, 16, 1024),
    (3, 3, 8, 4096),
    (4, 4, 4, 256),
];

fn shape_name(shape: (usize, usize, usize, usize)) -> String {
    let (depth, width, files, size) = shape;
    format!("d{}w{}f{}s{}", depth, width, files, size)
}

fn seeded_pair(shape: (usize, usize, usize, usize)) -> (Arc<MemoryStore>, Arc<MemoryStore>) {
    let (depth, width, files, size) = shape;
    let (left, right) = memory_pair();
    populate_tree(&left, "", depth, width, files, size, 1_000);
    (left, right)
}

fn bench_full_sync(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("full_sync");
    group.measurement_time(Duration::from_secs(10));

    for &shape in TREE_SHAPES {
        let (depth, width, files, _) = shape;
        group.throughput(Throughput::Elements(tree_entry_count(depth, width, files) as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(shape_name(shape)),
            &shape,
            |b, &shape| {
                let options = SyncOptions::mirror();
                b.to_async(&rt).iter_batched(
                    || seeded_pair(shape),
                    |(left, right)| {
                        let options = &options;
                        async move { black_box(sync_memory(&left, &right, options).await) }
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

fn bench_noop_sync(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("noop_sync");

    for &shape in TREE_SHAPES {
        let (left, right) = seeded_pair(shape);
        let options = SyncOptions::mirror();
        rt.block_on(sync_memory(&left, &right, &options));

        let (depth, width, files, _) = shape;
        group.throughput(Throughput::Elements(tree_entry_count(depth, width, files) as u64));
        group.bench_function(BenchmarkId::from_parameter(shape_name(shape)), |b| {
            b.to_async(&rt)
                .iter(|| async { black_box(sync_memory(&left, &right, &options).await) });
        });
    }

    group.finish();
}

fn bench_dry_run(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("dry_run");

    let shape = TREE_SHAPES[1];
    let (left, right) = seeded_pair(shape);
    let options = SyncOptions::mirror().dry_run(true);
    group.bench_function(shape_name(shape), |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(sync_memory(&left, &right, &options).await) });
    });

    group.finish();
}

fn bench_concurrency_caps(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("concurrency_caps");
    let shape = TREE_SHAPES[2];

    let configs = [
        ("serial", SyncOptions::mirror().serial(true)),
        ("default", SyncOptions::mirror()),
    ];
    for (name, options) in configs {
        group.bench_function(name, |b| {
            b.to_async(&rt).iter_batched(
                || seeded_pair(shape),
                |(left, right)| {
                    let options = &options;
                    async move { black_box(sync_memory(&left, &right, options).await) }
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_full_sync,
    bench_noop_sync,
    bench_dry_run,
    bench_concurrency_caps
);
criterion_main!(benches);
