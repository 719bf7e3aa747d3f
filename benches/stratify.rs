//! Stratification benchmarks.
//!
//! - Slope averaging over many segments (the continuous hot loop)
//! - Category merging over many leaves
//! - End-to-end continuous PD with exact partitions

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::prelude::*;

use stratx::logger::StratLogger;
use stratx::stratify::{avg_slopes_at_x, avg_values_at_cat, CatEntry, CatLeafDeltas, SlopeSegment};
use stratx::testing::{synthetic_additive, ExactMatchTrainer};
use stratx::utils::sorted_unique;
use stratx::{compute_pd, Parallelism, ReferencePolicy, StratConfig, Verbosity};

// =============================================================================
// Inputs
// =============================================================================

/// Segments between random neighbours on an integer grid of `n_x` positions.
fn random_segments(n_segments: usize, n_x: usize, seed: u64) -> (Vec<f64>, Vec<SlopeSegment>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let segments = (0..n_segments)
        .map(|_| {
            let lo = rng.gen_range(0..n_x - 1);
            let hi = rng.gen_range(lo + 1..(lo + 5).min(n_x));
            SlopeSegment {
                x_lo: lo as f64,
                x_hi: hi as f64,
                slope: rng.gen_range(-1.0..1.0),
            }
        })
        .collect();
    let xs: Vec<f64> = (0..n_x).map(|i| i as f64).collect();
    (sorted_unique(&xs), segments)
}

/// Leaves holding a random subset of `n_codes` categories each.
fn random_leaves(n_leaves: usize, n_codes: usize, seed: u64) -> Vec<CatLeafDeltas> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n_leaves)
        .map(|leaf| {
            let k = rng.gen_range(2..=n_codes.min(6));
            let mut codes = rand::seq::index::sample(&mut rng, n_codes, k).into_vec();
            codes.sort_unstable();
            let entries = codes
                .iter()
                .enumerate()
                .map(|(i, &code)| CatEntry {
                    code,
                    delta: if i == 0 { 0.0 } else { rng.gen_range(-5.0..5.0) },
                    count: rng.gen_range(1..20),
                })
                .collect();
            CatLeafDeltas {
                tree: 0,
                leaf: leaf as u32,
                entries,
            }
        })
        .collect()
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_avg_slopes(c: &mut Criterion) {
    let mut group = c.benchmark_group("continuous/avg_slopes_at_x");

    for n_segments in [1_000, 10_000, 100_000] {
        let (uniq_x, segments) = random_segments(n_segments, 1_000, 42);
        group.throughput(Throughput::Elements(n_segments as u64));

        for (name, parallelism) in [("seq", Parallelism::Sequential), ("par", Parallelism::Parallel)] {
            group.bench_with_input(BenchmarkId::new(name, n_segments), &segments, |b, segments| {
                b.iter(|| black_box(avg_slopes_at_x(black_box(&uniq_x), segments, parallelism)))
            });
        }
    }

    group.finish();
}

fn bench_category_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("categorical/avg_values_at_cat");
    let logger = StratLogger::new(Verbosity::Silent);

    for n_leaves in [100, 1_000, 10_000] {
        let leaves = random_leaves(n_leaves, 50, 7);
        group.throughput(Throughput::Elements(n_leaves as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n_leaves), &leaves, |b, leaves| {
            b.iter(|| black_box(avg_values_at_cat(leaves, 50, 3, ReferencePolicy::MaxWeight, &logger)))
        });
    }

    group.finish();
}

fn bench_compute_pd(c: &mut Criterion) {
    let mut group = c.benchmark_group("e2e/compute_pd");
    group.sample_size(20);
    let config = StratConfig::builder().min_evidence(1).build().unwrap();

    for rows in [1_000, 10_000] {
        let ds = synthetic_additive(rows, 3, 0.5);
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &ds, |b, ds| {
            b.iter(|| black_box(compute_pd(ds, "x1", &config, &ExactMatchTrainer).unwrap()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_avg_slopes, bench_category_merge, bench_compute_pd);
criterion_main!(benches);
