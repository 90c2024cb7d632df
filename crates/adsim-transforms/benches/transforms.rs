//! Benchmarks for carryover and saturation over long series.

#![allow(missing_docs)]

use adsim_transforms::{CarryoverParams, ShapeParams, carryover, saturate};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

fn series(n: usize) -> Vec<f64> {
    (0..n).map(|t| 0.5 + 0.5 * (t as f64 * 0.1).sin()).collect()
}

fn bench_carryover(c: &mut Criterion) {
    let mut group = c.benchmark_group("carryover");
    let values = series(10_000);
    for window in [4, 13, 52] {
        let geometric = CarryoverParams::geometric(0.7, window);
        let delayed = CarryoverParams::delayed(0.7, 2.0, window);
        group.bench_with_input(BenchmarkId::new("geometric", window), &geometric, |b, p| {
            b.iter(|| carryover(black_box(&values), p))
        });
        group.bench_with_input(BenchmarkId::new("delayed", window), &delayed, |b, p| {
            b.iter(|| carryover(black_box(&values), p))
        });
    }
    group.finish();
}

fn bench_saturation(c: &mut Criterion) {
    let values = series(10_000);
    let params = ShapeParams::new(0.5, 2.0, 1.0);
    c.bench_function("b_hill", |b| b.iter(|| saturate(black_box(&values), &params)));
}

criterion_group!(benches, bench_carryover, bench_saturation);
criterion_main!(benches);
