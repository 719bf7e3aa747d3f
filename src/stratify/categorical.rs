//! Categorical stratified partial dependence.
//!
//! Category codes carry no order, so there are no slopes. Instead every leaf
//! reports, for each category it contains, the mean response relative to the
//! leaf's smallest code. Those deltas live in per-leaf reference frames. The
//! merge below brings them into a single frame: a leaf is re-referenced on a
//! category it shares with the running vector, shifted onto the running
//! value there, and fused with a count-weighted average.
//!
//! Leaves that share no category with the running vector wait for a later
//! pass, by which time other merges may have added the missing bridge.

use std::collections::BTreeMap;

use crate::config::{ConfigError, ReferencePolicy, StratConfig, MAX_CATEGORY_CODE};
use crate::data::{Dataset, TargetColumn};
use crate::error::StratError;
use crate::evidence::{fuse, Evidence};
use crate::logger::StratLogger;
use crate::partition::{leaf_samples, LeafGroup, LeafOracle, PartitionTrainer};
use crate::utils::{run_with_threads, Parallelism};

// =============================================================================
// Per-leaf deltas
// =============================================================================

/// One category observed in a leaf.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CatEntry {
    pub code: usize,
    /// Mean response of this category minus the leaf reference mean.
    pub delta: f64,
    /// Samples of this category in the leaf.
    pub count: usize,
}

/// Category deltas of one leaf, sorted by code.
///
/// The first entry is the reference and has a delta of exactly 0.
#[derive(Clone, Debug, PartialEq)]
pub struct CatLeafDeltas {
    pub tree: usize,
    pub leaf: u32,
    pub entries: Vec<CatEntry>,
}

impl CatLeafDeltas {
    /// Reference category code.
    pub fn reference(&self) -> Option<usize> {
        self.entries.first().map(|e| e.code)
    }

    /// Total samples across all categories.
    pub fn n_samples(&self) -> usize {
        self.entries.iter().map(|e| e.count).sum()
    }

    /// Delta for `code`, if the leaf contains it.
    pub fn delta(&self, code: usize) -> Evidence {
        self.entries
            .binary_search_by_key(&code, |e| e.code)
            .map(|i| Evidence::Measured(self.entries[i].delta))
            .unwrap_or(Evidence::NoEvidence)
    }
}

/// Relative category deltas of every leaf with at least two categories.
///
/// Returns the kept leaves and the number of samples in leaves with fewer than
/// two categories.
pub fn catwise_leaves(
    codes: &[usize],
    y: &[f64],
    groups: &[LeafGroup],
    parallelism: Parallelism,
) -> (Vec<CatLeafDeltas>, usize) {
    let per_leaf = parallelism.maybe_par_map(groups, |group| {
        let mut by_code: BTreeMap<usize, (f64, usize)> = BTreeMap::new();
        for &i in &group.samples {
            let slot = by_code.entry(codes[i]).or_insert((0.0, 0));
            slot.0 += y[i];
            slot.1 += 1;
        }

        if by_code.len() < 2 {
            return Err(group.samples.len());
        }

        let means: Vec<(usize, f64, usize)> = by_code
            .into_iter()
            .map(|(code, (sum, count))| (code, sum / count as f64, count))
            .collect();
        let reference = means[0].1;

        Ok(CatLeafDeltas {
            tree: group.tree,
            leaf: group.leaf,
            entries: means
                .into_iter()
                .map(|(code, mean, count)| CatEntry {
                    code,
                    delta: mean - reference,
                    count,
                })
                .collect(),
        })
    });

    let mut ignored = 0;
    let mut leaves = Vec::with_capacity(per_leaf.len());
    for outcome in per_leaf {
        match outcome {
            Ok(leaf) => leaves.push(leaf),
            Err(n) => ignored += n,
        }
    }
    (leaves, ignored)
}

// =============================================================================
// Global vector
// =============================================================================

/// Fused relative effect per category code `0..=max_catcode`.
#[derive(Clone, Debug, PartialEq)]
pub struct GlobalCategoryVector {
    values: Vec<Evidence>,
    weights: Vec<usize>,
}

impl GlobalCategoryVector {
    pub fn new(values: Vec<Evidence>, weights: Vec<usize>) -> Self {
        debug_assert_eq!(values.len(), weights.len());
        Self { values, weights }
    }

    /// Number of category slots (`max_catcode + 1`).
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn value(&self, code: usize) -> Evidence {
        self.values.get(code).copied().unwrap_or_default()
    }

    /// Samples fused into `code`.
    #[inline]
    pub fn weight(&self, code: usize) -> usize {
        self.weights.get(code).copied().unwrap_or(0)
    }

    pub fn values(&self) -> &[Evidence] {
        &self.values
    }

    pub fn weights(&self) -> &[usize] {
        &self.weights
    }

    /// Measured `(code, value)` pairs in code order.
    pub fn measured(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.values
            .iter()
            .enumerate()
            .filter_map(|(code, v)| v.value().map(|v| (code, v)))
    }

    /// Subtract `offset` from every measured value.
    pub fn shifted_by(&self, offset: f64) -> Self {
        Self {
            values: self.values.iter().map(|v| v.map(|v| v - offset)).collect(),
            weights: self.weights.clone(),
        }
    }

    /// Shift so the lowest measured code reads 0.
    pub fn shifted_leftmost_to_zero(&self) -> Self {
        match self.measured().next() {
            Some((_, first)) => self.shifted_by(first),
            None => self.clone(),
        }
    }

    /// Shift so the smallest measured value reads 0.
    pub fn shifted_min_to_zero(&self) -> Self {
        match self.measured().map(|(_, v)| v).reduce(f64::min) {
            Some(min) => self.shifted_by(min),
            None => self.clone(),
        }
    }
}

// =============================================================================
// Reference-frame merge
// =============================================================================

/// Running category vector owned by the merge loop.
#[derive(Clone, Debug)]
pub struct RunningCategoryVector {
    values: Vec<Evidence>,
    weights: Vec<usize>,
}

impl RunningCategoryVector {
    /// Start from one leaf's deltas.
    pub fn from_leaf(leaf: &CatLeafDeltas, n_codes: usize) -> Self {
        let mut values = vec![Evidence::NoEvidence; n_codes];
        let mut weights = vec![0; n_codes];
        for e in &leaf.entries {
            values[e.code] = Evidence::Measured(e.delta);
            weights[e.code] = e.count;
        }
        Self { values, weights }
    }

    /// Category both the running vector and `leaf` have measured, chosen by
    /// `policy`. `None` when they share nothing.
    pub fn anchor(&self, leaf: &CatLeafDeltas, policy: ReferencePolicy) -> Option<usize> {
        let mut shared = leaf
            .entries
            .iter()
            .filter(|e| self.values[e.code].is_measured());

        match policy {
            ReferencePolicy::LowestCode => shared.next().map(|e| e.code),
            // Entries are in code order, so keeping the first maximum breaks
            // ties toward the lowest code.
            ReferencePolicy::MaxWeight => shared
                .fold(None, |best: Option<&CatEntry>, e| match best {
                    Some(b) if b.count >= e.count => Some(b),
                    _ => Some(e),
                })
                .map(|e| e.code),
        }
    }

    /// Re-reference `leaf` on `anchor`, shift it onto the running value there
    /// and fuse it in. Returns the applied shift.
    pub fn merge(&mut self, leaf: &CatLeafDeltas, anchor: usize) -> f64 {
        let leaf_anchor = leaf.delta(anchor).unwrap_or(0.0);
        let running_anchor = self.values[anchor].unwrap_or(0.0);
        let shift = running_anchor - leaf_anchor;

        for e in &leaf.entries {
            let adjusted = Evidence::Measured(e.delta + shift);
            let c = e.code;
            self.values[c] = fuse(self.values[c], adjusted, self.weights[c] as f64, e.count as f64);
            self.weights[c] += e.count;
        }
        shift
    }

    pub fn into_vector(self) -> GlobalCategoryVector {
        GlobalCategoryVector::new(self.values, self.weights)
    }
}

/// Result of merging all leaves into one reference frame.
#[derive(Clone, Debug)]
pub struct MergeOutcome {
    pub vector: GlobalCategoryVector,
    /// Samples of leaves still unmerged after the last pass.
    pub merge_ignored: usize,
    /// Passes over the work-list that ran.
    pub passes: usize,
    /// Leaves fused into the vector, the initial one included.
    pub leaves_merged: usize,
}

/// Merge per-leaf deltas into a single category vector with `n_codes` slots.
///
/// The first leaf seeds the running vector; the rest form a work-list visited
/// in order for at most `max_passes` passes. Stops early once the work-list is
/// empty or a pass merges nothing. Returns `None` when `leaves` is empty.
pub fn avg_values_at_cat(
    leaves: &[CatLeafDeltas],
    n_codes: usize,
    max_passes: usize,
    policy: ReferencePolicy,
    logger: &StratLogger,
) -> Option<MergeOutcome> {
    let (first, rest) = leaves.split_first()?;
    let mut running = RunningCategoryVector::from_leaf(first, n_codes);

    let mut work: Vec<usize> = (0..rest.len()).collect();
    let mut passes = 0;
    while !work.is_empty() && passes < max_passes {
        passes += 1;
        let before = work.len();
        work.retain(|&j| match running.anchor(&rest[j], policy) {
            Some(anchor) => {
                let shift = running.merge(&rest[j], anchor);
                logger.merge_leaf(j + 1, anchor, shift);
                false
            }
            None => true,
        });
        let merged = before - work.len();
        logger.merge_pass(passes, merged, work.len());
        if merged == 0 {
            break;
        }
    }

    let merge_ignored = work.iter().map(|&j| rest[j].n_samples()).sum();
    Some(MergeOutcome {
        vector: running.into_vector(),
        merge_ignored,
        passes,
        leaves_merged: leaves.len() - work.len(),
    })
}

// =============================================================================
// Entry points
// =============================================================================

/// Categorical partial dependence of the response on one target column.
#[derive(Clone, Debug)]
pub struct CategoricalPd {
    /// Distinct codes present in the data, ascending.
    pub uniq_categories: Vec<usize>,
    /// Fused relative effect per code `0..=max_catcode`.
    pub vector: GlobalCategoryVector,
    /// Deltas of every leaf with two or more categories.
    pub leaf_deltas: Vec<CatLeafDeltas>,
    /// Samples in leaves with fewer than two categories.
    pub ignored: usize,
    /// Samples in leaves the merge could not place.
    pub merge_ignored: usize,
    pub passes: usize,
    pub leaves_merged: usize,
}

/// Validate category codes and convert them to indices.
///
/// Codes must be non-negative integers no larger than [`MAX_CATEGORY_CODE`];
/// numeric columns are accepted when every value is integral.
pub fn category_codes(column: &str, target: TargetColumn<'_>) -> Result<Vec<usize>, StratError> {
    let invalid = |value: f64| StratError::InvalidCategoryCode {
        column: column.to_string(),
        value,
    };
    let out_of_range = |code: usize| StratError::CategoryOutOfRange {
        column: column.to_string(),
        code,
        max_catcode: MAX_CATEGORY_CODE,
    };
    match target {
        TargetColumn::Categorical(values) => values
            .iter()
            .map(|&v| {
                let code = usize::try_from(v).map_err(|_| invalid(v as f64))?;
                if code > MAX_CATEGORY_CODE {
                    return Err(out_of_range(code));
                }
                Ok(code)
            })
            .collect(),
        TargetColumn::Numeric(values) => values
            .iter()
            .map(|&v| {
                if !(v >= 0.0 && v.fract() == 0.0) {
                    Err(invalid(v))
                } else if v > MAX_CATEGORY_CODE as f64 {
                    Err(out_of_range(v as usize))
                } else {
                    Ok(v as usize)
                }
            })
            .collect(),
    }
}

/// Largest code the result vector covers: the configured one, or the largest
/// code in the data.
pub(crate) fn resolve_max_catcode(
    column: &str,
    codes: &[usize],
    config: &StratConfig,
) -> Result<usize, StratError> {
    let data_max = codes.iter().copied().max().unwrap_or(0);
    let max = match config.max_catcode {
        Some(max) if max > MAX_CATEGORY_CODE => {
            return Err(ConfigError::InvalidMaxCatcode(max).into());
        }
        Some(max) => max,
        None => data_max.min(MAX_CATEGORY_CODE),
    };
    if data_max > max {
        return Err(StratError::CategoryOutOfRange {
            column: column.to_string(),
            code: data_max,
            max_catcode: max,
        });
    }
    Ok(max)
}

/// Categorical PD from already computed leaf groups and validated codes.
pub fn cat_pd_from_leaves(
    column: &str,
    codes: &[usize],
    y: &[f64],
    groups: &[LeafGroup],
    config: &StratConfig,
    parallelism: Parallelism,
) -> Result<CategoricalPd, StratError> {
    let logger = StratLogger::new(config.verbosity);

    let max_catcode = resolve_max_catcode(column, codes, config)?;

    let mut uniq_categories = codes.to_vec();
    uniq_categories.sort_unstable();
    uniq_categories.dedup();

    let (leaf_deltas, ignored) = catwise_leaves(codes, y, groups, parallelism);
    logger.ignored(column, ignored, codes.len());

    let n_slots = max_catcode.checked_add(1).ok_or_else(|| StratError::CategoryOutOfRange {
        column: column.to_string(),
        code: max_catcode,
        max_catcode: MAX_CATEGORY_CODE,
    })?;
    let outcome = avg_values_at_cat(
        &leaf_deltas,
        n_slots,
        config.max_merge_passes,
        config.reference_policy,
        &logger,
    )
    .ok_or_else(|| StratError::EmptyCategories {
        column: column.to_string(),
    })?;
    logger.merge_leftover(
        column,
        leaf_deltas.len() - outcome.leaves_merged,
        outcome.merge_ignored,
    );

    Ok(CategoricalPd {
        uniq_categories,
        vector: outcome.vector,
        leaf_deltas,
        ignored,
        merge_ignored: outcome.merge_ignored,
        passes: outcome.passes,
        leaves_merged: outcome.leaves_merged,
    })
}

fn target_codes(dataset: &Dataset, target: &str) -> Result<Vec<usize>, StratError> {
    let column = dataset
        .target(target)
        .map_err(|_| StratError::UnknownColumn(target.to_string()))?;
    category_codes(target, column)
}

/// Categorical PD using an already trained oracle over the non-target columns.
pub fn compute_cat_pd_with_oracle<O: LeafOracle + ?Sized>(
    dataset: &Dataset,
    target: &str,
    config: &StratConfig,
    oracle: &O,
) -> Result<CategoricalPd, StratError> {
    let codes = target_codes(dataset, target)?;
    let features = dataset.features_excluding(target)?;
    let logger = StratLogger::new(config.verbosity);

    run_with_threads(config.thread_count(), |parallelism| -> Result<CategoricalPd, StratError> {
        let groups = leaf_samples(oracle, features.view(), parallelism)?;
        logger.partitions(target, oracle.n_trees(), groups.len());
        cat_pd_from_leaves(target, &codes, dataset.response(), &groups, config, parallelism)
    })
}

/// Categorical partial dependence of the response on `target`.
///
/// Codes are validated before the trainer runs.
///
/// # Errors
///
/// - [`StratError::InvalidCategoryCode`] for negative or fractional codes.
/// - [`StratError::CategoryOutOfRange`] if a code exceeds `config.max_catcode`
///   or [`MAX_CATEGORY_CODE`].
/// - [`StratError::Config`] if `config.max_catcode` exceeds [`MAX_CATEGORY_CODE`].
/// - [`StratError::EmptyCategories`] if no leaf holds two categories.
pub fn compute_cat_pd<T: PartitionTrainer>(
    dataset: &Dataset,
    target: &str,
    config: &StratConfig,
    trainer: &T,
) -> Result<CategoricalPd, StratError> {
    let codes = target_codes(dataset, target)?;
    resolve_max_catcode(target, &codes, config)?;
    let features = dataset.features_excluding(target)?;
    let response = dataset.response_array();
    let oracle = trainer.fit(features.view(), response.view(), &config.partition)?;
    compute_cat_pd_with_oracle(dataset, target, config, &oracle)
}
