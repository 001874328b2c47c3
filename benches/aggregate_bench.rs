//! Benchmarks for aggregation and cached reads
//!
//! Run with: `cargo bench --bench aggregate_bench`

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use awaitkit::{
    backoff_delay, channel, Aggregator, BackgroundRefreshingRef, Context, RefreshConfig,
    RefreshingRef, Resolved,
};

// =============================================================================
// Aggregator Benchmarks
// =============================================================================

fn bench_aggregate_resolved(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");
    let aggregator = Aggregator::with_defaults();

    for size in [10usize, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("resolved", size), &size, |b, &size| {
            b.iter(|| {
                let batch = (0..size).map(|i| (i, Resolved::<usize, String>::ok(i)));
                black_box(aggregator.aggregate(batch, Duration::from_secs(1)).unwrap())
            });
        });
    }

    group.finish();
}

fn bench_aggregate_completed_channels(c: &mut Criterion) {
    let aggregator = Aggregator::with_defaults();

    c.bench_function("aggregate/completed_channels_100", |b| {
        b.iter(|| {
            let batch: Vec<_> = (0..100u32)
                .map(|i| {
                    let (completer, handle) = channel::<u32, String>("bench");
                    completer.succeed(i);
                    (i, handle)
                })
                .collect();
            black_box(aggregator.aggregate(batch, Duration::from_secs(1)).unwrap())
        });
    });
}

fn bench_await_first(c: &mut Criterion) {
    let aggregator = Aggregator::with_defaults();

    c.bench_function("aggregate/await_first_100", |b| {
        b.iter(|| {
            let batch = (0..100u32).map(|i| (i, Resolved::<u32, String>::ok(i)));
            black_box(aggregator.await_first(batch, Duration::from_secs(1)).unwrap())
        });
    });
}

// =============================================================================
// Refresh Benchmarks
// =============================================================================

fn bench_refreshing_ref_hit(c: &mut Criterion) {
    let reference = RefreshingRef::with_ttl(
        "bench",
        || Ok::<_, String>(Arc::new(vec![0u8; 1024])),
        Duration::from_secs(3600),
    );
    reference.get().unwrap();

    c.bench_function("refresh/inline_cache_hit", |b| {
        b.iter(|| black_box(reference.get().unwrap()));
    });
}

fn bench_background_ref_hit(c: &mut Criterion) {
    let config = RefreshConfig::default().with_ttl(Duration::from_secs(3600));
    let reference = BackgroundRefreshingRef::new(
        "bench",
        || Ok::<_, String>(Arc::new(vec![0u8; 1024])),
        config,
        Context::new(),
    );
    reference.get().unwrap();

    c.bench_function("refresh/background_cache_hit", |b| {
        b.iter(|| black_box(reference.get().unwrap()));
    });
}

fn bench_backoff_delay(c: &mut Criterion) {
    c.bench_function("refresh/backoff_delay", |b| {
        b.iter(|| {
            for errors in 0..16 {
                black_box(backoff_delay(black_box(errors), Duration::from_secs(1), 6));
            }
        });
    });
}

criterion_group!(
    benches,
    bench_aggregate_resolved,
    bench_aggregate_completed_channels,
    bench_await_first,
    bench_refreshing_ref_hit,
    bench_background_ref_hit,
    bench_backoff_delay,
);
criterion_main!(benches);
