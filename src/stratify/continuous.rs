//! Continuous stratified partial dependence.
//!
//! Within every leaf the target's distinct values are ordered and the mean
//! response per value gives a piecewise-linear local curve. Its forward
//! differences are slope segments `[x_i, x_{i+1})`. Segments from all leaves
//! are averaged per distinct target value, weak positions are blanked, and the
//! averaged slope is integrated into the curve.
//!
//! ```text
//! leaves ──► finite_differences ──► avg_slopes_at_x ──► min_evidence ──► integrate
//!            (per leaf, parallel)    (per x, parallel)                   (pdpx, pdpy)
//! ```

use crate::config::StratConfig;
use crate::data::Dataset;
use crate::error::StratError;
use crate::evidence::Evidence;
use crate::logger::StratLogger;
use crate::partition::{leaf_samples, LeafGroup, LeafOracle, PartitionTrainer};
use crate::utils::{round_decimals, run_with_threads, sorted_unique, Parallelism};

/// Leaves whose target range is below this are treated as single-valued.
const FLAT_LEAF_RANGE: f64 = 1e-8;

// =============================================================================
// Types
// =============================================================================

/// Slope of the local curve over `[x_lo, x_hi)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SlopeSegment {
    pub x_lo: f64,
    pub x_hi: f64,
    pub slope: f64,
}

impl SlopeSegment {
    #[inline]
    pub fn covers(&self, x: f64) -> bool {
        self.x_lo <= x && x < self.x_hi
    }
}

/// Slope segments contributed by one leaf.
#[derive(Clone, Debug, PartialEq)]
pub struct LeafSlopes {
    pub tree: usize,
    pub leaf: u32,
    pub segments: Vec<SlopeSegment>,
}

/// Continuous partial dependence of the response on one target column.
#[derive(Clone, Debug)]
pub struct ContinuousPd {
    /// Retained target positions, strictly increasing.
    pub pdpx: Vec<f64>,
    /// Partial dependence at each `pdpx`; the first value is 0.
    pub pdpy: Vec<f64>,
    /// Segments of every non-degenerate leaf.
    pub leaf_slopes: Vec<LeafSlopes>,
    /// Samples in leaves with a single distinct target value.
    pub ignored: usize,
    /// Every distinct (rounded) target value.
    pub uniq_x: Vec<f64>,
    /// Averaged slope at each `uniq_x`, after the evidence threshold.
    pub slope_at_x: Vec<Evidence>,
    /// Segments covering each `uniq_x`.
    pub slope_counts: Vec<usize>,
    /// Gaps between consecutive `uniq_x`.
    pub dx: Vec<f64>,
}

impl ContinuousPd {
    /// Number of retained curve points.
    pub fn n_points(&self) -> usize {
        self.pdpx.len()
    }

    /// `(x, y)` curve points.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.pdpx.iter().copied().zip(self.pdpy.iter().copied())
    }

    /// Segment count over all leaves.
    pub fn n_segments(&self) -> usize {
        self.leaf_slopes.iter().map(|l| l.segments.len()).sum()
    }
}

// =============================================================================
// Per-leaf slopes
// =============================================================================

/// Forward-difference slopes of mean `y` over the distinct values of `x`.
///
/// Returns the segments and the number of ignored samples. A leaf with a
/// single distinct `x` yields no segments and all its samples are ignored.
/// Pairs with a NaN `x` are skipped.
///
/// # Example
///
/// ```
/// use stratx::stratify::continuous::{finite_differences, SlopeSegment};
///
/// let (segments, ignored) = finite_differences(&[1.0, 3.0, 4.0], &[9.0, 8.0, 10.0]);
/// assert_eq!(ignored, 0);
/// assert_eq!(segments[0], SlopeSegment { x_lo: 1.0, x_hi: 3.0, slope: -0.5 });
/// assert_eq!(segments[1], SlopeSegment { x_lo: 3.0, x_hi: 4.0, slope: 2.0 });
/// ```
pub fn finite_differences(x: &[f64], y: &[f64]) -> (Vec<SlopeSegment>, usize) {
    debug_assert_eq!(x.len(), y.len());

    let mut pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter(|(x, _)| !x.is_nan())
        .map(|(&x, &y)| (x, y))
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    // Group ties, mean y per distinct x.
    let mut means: Vec<(f64, f64)> = Vec::new();
    let mut start = 0;
    while start < pairs.len() {
        let ux = pairs[start].0;
        let end = start + pairs[start..].iter().take_while(|p| p.0 == ux).count();
        let sum: f64 = pairs[start..end].iter().map(|p| p.1).sum();
        means.push((ux, sum / (end - start) as f64));
        start = end;
    }

    if means.len() < 2 {
        return (Vec::new(), x.len());
    }

    let segments = means
        .windows(2)
        .map(|w| {
            let (x0, y0) = w[0];
            let (x1, y1) = w[1];
            SlopeSegment {
                x_lo: x0,
                x_hi: x1,
                slope: (y1 - y0) / (x1 - x0),
            }
        })
        .collect();
    (segments, 0)
}

/// Slope segments of every leaf, plus the total ignored sample count.
///
/// `x` must already be rounded. Leaves whose target range is (nearly) zero are
/// ignored without computing differences.
pub fn collect_slopes(
    x: &[f64],
    y: &[f64],
    groups: &[LeafGroup],
    parallelism: Parallelism,
) -> (Vec<LeafSlopes>, usize) {
    let per_leaf = parallelism.maybe_par_map(groups, |group| {
        let leaf_x: Vec<f64> = group.samples.iter().map(|&i| x[i]).collect();
        let leaf_y: Vec<f64> = group.samples.iter().map(|&i| y[i]).collect();

        let (lo, hi) = leaf_x
            .iter()
            .filter(|v| !v.is_nan())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        if hi - lo < FLAT_LEAF_RANGE {
            return (None, leaf_x.len());
        }

        let (segments, ignored) = finite_differences(&leaf_x, &leaf_y);
        let slopes = (!segments.is_empty()).then(|| LeafSlopes {
            tree: group.tree,
            leaf: group.leaf,
            segments,
        });
        (slopes, ignored)
    });

    let mut ignored = 0;
    let mut leaves = Vec::with_capacity(per_leaf.len());
    for (slopes, n) in per_leaf {
        ignored += n;
        leaves.extend(slopes);
    }
    (leaves, ignored)
}

// =============================================================================
// Aggregation
// =============================================================================

/// Mean slope and covering-segment count at each `uniq_x`.
///
/// A position no segment covers is `NoEvidence`, never 0. `uniq_x` must be
/// sorted ascending. The largest value is never covered because segments are
/// half-open.
pub fn avg_slopes_at_x(
    uniq_x: &[f64],
    segments: &[SlopeSegment],
    parallelism: Parallelism,
) -> (Vec<Evidence>, Vec<usize>) {
    let mut by_lo: Vec<SlopeSegment> = segments.to_vec();
    by_lo.sort_by(|a, b| a.x_lo.total_cmp(&b.x_lo));

    let per_x = parallelism.maybe_par_map(uniq_x, |&x| {
        // Only segments starting at or before x can cover it.
        let candidates = by_lo.partition_point(|s| s.x_lo <= x);
        let mut sum = 0.0;
        let mut count = 0usize;
        for s in by_lo[..candidates].iter().filter(|s| s.covers(x)) {
            sum += s.slope;
            count += 1;
        }
        if count == 0 {
            (Evidence::NoEvidence, 0)
        } else {
            (Evidence::Measured(sum / count as f64), count)
        }
    });

    per_x.into_iter().unzip()
}

/// Blank positions supported by fewer than `min_evidence` segments.
///
/// A threshold of 0 behaves like 1.
pub fn apply_min_evidence(slopes: &mut [Evidence], counts: &[usize], min_evidence: usize) {
    let min_evidence = min_evidence.max(1);
    for (slope, &count) in slopes.iter_mut().zip(counts) {
        if count < min_evidence {
            *slope = Evidence::NoEvidence;
        }
    }
}

/// Integrated curve before it becomes a [`ContinuousPd`].
#[derive(Clone, Debug, PartialEq)]
pub struct Integrated {
    pub pdpx: Vec<f64>,
    pub pdpy: Vec<f64>,
    pub dx: Vec<f64>,
}

/// Integrate `slope_at_x` over `uniq_x`.
///
/// Missing slopes add nothing, so the running value carries forward. A
/// position is dropped when both its own slope and the previous one are
/// missing, since nothing reaches it; the first position is dropped when its
/// slope is missing.
///
/// # Example
///
/// ```
/// use stratx::evidence::Evidence::{Measured, NoEvidence};
/// use stratx::stratify::continuous::integrate;
///
/// let curve = integrate(
///     &[1.0, 2.0, 3.0, 4.0],
///     &[Measured(1.0), Measured(3.0), NoEvidence, NoEvidence],
/// );
/// assert_eq!(curve.pdpx, vec![1.0, 2.0, 3.0]);
/// assert_eq!(curve.pdpy, vec![0.0, 1.0, 4.0]);
/// ```
pub fn integrate(uniq_x: &[f64], slope_at_x: &[Evidence]) -> Integrated {
    debug_assert_eq!(uniq_x.len(), slope_at_x.len());

    let dx: Vec<f64> = uniq_x.windows(2).map(|w| w[1] - w[0]).collect();
    let mut pdpx = Vec::with_capacity(uniq_x.len());
    let mut pdpy = Vec::with_capacity(uniq_x.len());

    let mut y = 0.0;
    for (i, &x) in uniq_x.iter().enumerate() {
        if i > 0 {
            if let Evidence::Measured(slope) = slope_at_x[i - 1] {
                y += slope * dx[i - 1];
            }
        }
        let keep = if i == 0 {
            slope_at_x[0].is_measured()
        } else {
            slope_at_x[i].is_measured() || slope_at_x[i - 1].is_measured()
        };
        if keep {
            pdpx.push(x);
            pdpy.push(y);
        }
    }

    Integrated { pdpx, pdpy, dx }
}

// =============================================================================
// Entry points
// =============================================================================

/// Partial dependence from already computed leaf groups.
///
/// `x` holds the raw target values, `y` the response.
pub fn pd_from_leaves(
    column: &str,
    x: &[f64],
    y: &[f64],
    groups: &[LeafGroup],
    config: &StratConfig,
    parallelism: Parallelism,
) -> Result<ContinuousPd, StratError> {
    let logger = StratLogger::new(config.verbosity);
    let x: Vec<f64> = x.iter().map(|&v| round_decimals(v, config.decimals)).collect();

    let (leaf_slopes, ignored) = collect_slopes(&x, y, groups, parallelism);
    logger.ignored(column, ignored, x.len());

    let segments: Vec<SlopeSegment> = leaf_slopes
        .iter()
        .flat_map(|l| l.segments.iter().copied())
        .collect();

    let uniq_x = sorted_unique(&x);
    let (mut slope_at_x, slope_counts) = avg_slopes_at_x(&uniq_x, &segments, parallelism);
    apply_min_evidence(&mut slope_at_x, &slope_counts, config.min_evidence);

    let Integrated { pdpx, pdpy, dx } = integrate(&uniq_x, &slope_at_x);
    logger.curve(column, uniq_x.len(), pdpx.len());

    if pdpx.is_empty() {
        return Err(StratError::EmptyCurve {
            column: column.to_string(),
            min_evidence: config.effective_min_evidence(),
        });
    }

    Ok(ContinuousPd {
        pdpx,
        pdpy,
        leaf_slopes,
        ignored,
        uniq_x,
        slope_at_x,
        slope_counts,
        dx,
    })
}

/// Partial dependence of the response on `target` using an already trained
/// oracle over the non-target columns.
pub fn compute_pd_with_oracle<O: LeafOracle + ?Sized>(
    dataset: &Dataset,
    target: &str,
    config: &StratConfig,
    oracle: &O,
) -> Result<ContinuousPd, StratError> {
    let x = dataset
        .target(target)
        .map_err(|_| StratError::UnknownColumn(target.to_string()))?
        .to_f64();
    let features = dataset.features_excluding(target)?;
    let logger = StratLogger::new(config.verbosity);

    run_with_threads(config.thread_count(), |parallelism| -> Result<ContinuousPd, StratError> {
        let groups = leaf_samples(oracle, features.view(), parallelism)?;
        logger.partitions(target, oracle.n_trees(), groups.len());
        pd_from_leaves(target, &x, dataset.response(), &groups, config, parallelism)
    })
}

/// Partial dependence of the response on `target`.
///
/// Fits `trainer` on every column except `target`, partitions the samples by
/// leaf and stratifies within leaves.
///
/// # Errors
///
/// - [`StratError::UnknownColumn`] if `target` is not a column.
/// - [`StratError::EmptyCurve`] if no position has enough evidence.
/// - [`StratError::Partition`] if training or partitioning fails.
pub fn compute_pd<T: PartitionTrainer>(
    dataset: &Dataset,
    target: &str,
    config: &StratConfig,
    trainer: &T,
) -> Result<ContinuousPd, StratError> {
    if dataset.column(target).is_none() {
        return Err(StratError::UnknownColumn(target.to_string()));
    }
    let features = dataset.features_excluding(target)?;
    let response = dataset.response_array();
    let oracle = trainer.fit(features.view(), response.view(), &config.partition)?;
    compute_pd_with_oracle(dataset, target, config, &oracle)
}
