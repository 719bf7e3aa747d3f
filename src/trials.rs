//! Resampled stratification trials.
//!
//! A single stratification depends on one partitioning of the data. Running
//! it over bootstrap or sub-sampled copies and averaging smooths out the
//! particular leaf boundaries. Trials are independent and run in parallel;
//! trial `t` draws its rows from an RNG seeded with `seed + t`, so results do
//! not depend on scheduling.

use rand::prelude::*;

use crate::config::{CategoryAlignment, PartitionParams, Resampling, StratConfig, TrialConfig};
use crate::data::Dataset;
use crate::error::StratError;
use crate::evidence::{nan_weighted_merge, Evidence, MeanAccumulator};
use crate::logger::StratLogger;
use crate::partition::{leaf_samples, LeafGroup, PartitionTrainer};
use crate::stratify::categorical::{
    cat_pd_from_leaves, category_codes, resolve_max_catcode, CategoricalPd, GlobalCategoryVector,
};
use crate::stratify::continuous::{pd_from_leaves, ContinuousPd};
use crate::utils::{run_with_threads, Parallelism};

// =============================================================================
// Results
// =============================================================================

/// Continuous partial dependence averaged over trials.
#[derive(Clone, Debug)]
pub struct PdTrials {
    /// Every x retained by at least one trial, ascending.
    pub pdpx: Vec<f64>,
    /// Mean y at each `pdpx` over the trials that retained it.
    pub pdpy: Vec<f64>,
    /// Trials retaining each `pdpx`.
    pub support: Vec<usize>,
    /// Per-trial results in trial order.
    pub trials: Vec<ContinuousPd>,
    /// Mean ignored samples per trial.
    pub ignored: f64,
}

/// Categorical partial dependence averaged over trials.
#[derive(Clone, Debug)]
pub struct CatPdTrials {
    /// Distinct codes in the full dataset.
    pub uniq_categories: Vec<usize>,
    /// Mean (aligned) value per code over the trials that measured it.
    pub values: Vec<Evidence>,
    /// Trials measuring each code.
    pub support: Vec<usize>,
    pub trials: Vec<CategoricalPd>,
    /// Mean samples per trial ignored in single-category leaves.
    pub ignored: f64,
    /// Mean samples per trial left out by the merge.
    pub merge_ignored: f64,
}

// =============================================================================
// Resampling
// =============================================================================

/// Row indices for one trial.
///
/// Subsampling keeps at least one row.
pub fn resample_rows(n_rows: usize, resampling: Resampling, rng: &mut impl Rng) -> Vec<usize> {
    if n_rows == 0 {
        return Vec::new();
    }
    match resampling {
        Resampling::Bootstrap => (0..n_rows).map(|_| rng.gen_range(0..n_rows)).collect(),
        Resampling::Subsample { fraction } => {
            let k = ((n_rows as f64 * fraction).floor() as usize).clamp(1, n_rows);
            let mut rows = rand::seq::index::sample(rng, n_rows, k).into_vec();
            rows.sort_unstable();
            rows
        }
    }
}

/// Data for trial `trial`: the full dataset when only one trial runs,
/// otherwise a resampled copy.
fn trial_dataset(dataset: &Dataset, trial: usize, trials: &TrialConfig) -> Result<Dataset, StratError> {
    if trials.n_trials == 1 {
        return Ok(dataset.clone());
    }
    let mut rng = StdRng::seed_from_u64(trials.seed.wrapping_add(trial as u64));
    let rows = resample_rows(dataset.n_rows(), trials.resampling, &mut rng);
    Ok(dataset.select_rows(&rows)?)
}

/// Fit the partition model on a trial's non-target columns and group rows.
fn trial_groups<T: PartitionTrainer>(
    sample: &Dataset,
    target: &str,
    params: PartitionParams,
    trainer: &T,
    parallelism: Parallelism,
) -> Result<Vec<LeafGroup>, StratError> {
    let features = sample.features_excluding(target)?;
    let response = sample.response_array();
    let oracle = trainer.fit(features.view(), response.view(), &params)?;
    Ok(leaf_samples(&oracle, features.view(), parallelism)?)
}

fn trial_params(config: &StratConfig, trial: usize) -> PartitionParams {
    PartitionParams {
        seed: config.partition.seed.wrapping_add(trial as u64),
        ..config.partition
    }
}

// =============================================================================
// Continuous
// =============================================================================

/// Average continuous partial dependence over resampled trials.
///
/// # Errors
///
/// [`StratError::Config`] for an invalid `trials` (for example zero trials).
/// Any trial error fails the whole call, including a trial whose curve comes
/// out empty.
pub fn run_pd_trials<T: PartitionTrainer>(
    dataset: &Dataset,
    target: &str,
    config: &StratConfig,
    trials: &TrialConfig,
    trainer: &T,
) -> Result<PdTrials, StratError> {
    trials.validate()?;
    if dataset.column(target).is_none() {
        return Err(StratError::UnknownColumn(target.to_string()));
    }
    let logger = StratLogger::new(config.verbosity);

    let results = run_with_threads(config.thread_count(), |parallelism| {
        parallelism.maybe_par_map(0..trials.n_trials, |t| -> Result<ContinuousPd, StratError> {
            let sample = trial_dataset(dataset, t, trials)?;
            logger.trial(target, t, trials.n_trials, sample.n_rows());
            let groups = trial_groups(&sample, target, trial_params(config, t), trainer, parallelism)?;
            let x = sample.target(target)?.to_f64();
            pd_from_leaves(target, &x, sample.response(), &groups, config, parallelism)
        })
    });
    let trial_pds = results.into_iter().collect::<Result<Vec<_>, _>>()?;

    let (pdpx, pdpy, support) = average_curves(&trial_pds);
    let ignored = trial_pds.iter().map(|pd| pd.ignored as f64).sum::<f64>() / trial_pds.len() as f64;

    Ok(PdTrials {
        pdpx,
        pdpy,
        support,
        trials: trial_pds,
        ignored,
    })
}

/// Mean y per x over the curves containing that x.
fn average_curves(curves: &[ContinuousPd]) -> (Vec<f64>, Vec<f64>, Vec<usize>) {
    let mut points: Vec<(f64, f64)> = curves.iter().flat_map(|pd| pd.points()).collect();
    points.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut pdpx = Vec::new();
    let mut pdpy = Vec::new();
    let mut support = Vec::new();
    for run in points.chunk_by(|a, b| a.0 == b.0) {
        let mut mean = MeanAccumulator::default();
        for &(_, y) in run {
            mean.push(Evidence::Measured(y));
        }
        pdpx.push(run[0].0);
        pdpy.push(mean.mean().unwrap_or(f64::NAN));
        support.push(mean.count());
    }
    (pdpx, pdpy, support)
}

// =============================================================================
// Categorical
// =============================================================================

/// Average categorical partial dependence over resampled trials.
///
/// Every trial uses the same `max_catcode` (the configured one, or the
/// largest code in the full dataset), so vectors line up across trials even
/// when a resample misses the largest code.
///
/// # Errors
///
/// Same as [`run_pd_trials`], plus invalid category codes, which are rejected
/// before any trial runs.
pub fn run_cat_pd_trials<T: PartitionTrainer>(
    dataset: &Dataset,
    target: &str,
    config: &StratConfig,
    trials: &TrialConfig,
    trainer: &T,
) -> Result<CatPdTrials, StratError> {
    trials.validate()?;
    let column = dataset
        .target(target)
        .map_err(|_| StratError::UnknownColumn(target.to_string()))?;
    let codes = category_codes(target, column)?;

    let max_catcode = resolve_max_catcode(target, &codes, config)?;
    let mut uniq_categories = codes;
    uniq_categories.sort_unstable();
    uniq_categories.dedup();

    let trial_config = StratConfig {
        max_catcode: Some(max_catcode),
        ..config.clone()
    };
    let logger = StratLogger::new(config.verbosity);

    let results = run_with_threads(config.thread_count(), |parallelism| {
        parallelism.maybe_par_map(0..trials.n_trials, |t| -> Result<CategoricalPd, StratError> {
            let sample = trial_dataset(dataset, t, trials)?;
            logger.trial(target, t, trials.n_trials, sample.n_rows());
            let groups = trial_groups(&sample, target, trial_params(config, t), trainer, parallelism)?;
            let codes = category_codes(target, sample.target(target)?)?;
            cat_pd_from_leaves(target, &codes, sample.response(), &groups, &trial_config, parallelism)
        })
    });
    let trial_pds = results.into_iter().collect::<Result<Vec<_>, _>>()?;

    let aligned: Vec<GlobalCategoryVector> = trial_pds
        .iter()
        .map(|pd| align(&pd.vector, trials.category_alignment))
        .collect();
    let (values, support) = average_vectors(&aligned);

    let n = trial_pds.len() as f64;
    let ignored = trial_pds.iter().map(|pd| pd.ignored as f64).sum::<f64>() / n;
    let merge_ignored = trial_pds.iter().map(|pd| pd.merge_ignored as f64).sum::<f64>() / n;

    Ok(CatPdTrials {
        uniq_categories,
        values,
        support,
        trials: trial_pds,
        ignored,
        merge_ignored,
    })
}

fn align(vector: &GlobalCategoryVector, alignment: CategoryAlignment) -> GlobalCategoryVector {
    match alignment {
        CategoryAlignment::Raw => vector.clone(),
        CategoryAlignment::LeftmostZero => vector.shifted_leftmost_to_zero(),
        CategoryAlignment::MinZero => vector.shifted_min_to_zero(),
    }
}

/// Per-code mean over the vectors measuring that code.
///
/// Folding with the running measured count as weight keeps a plain mean.
fn average_vectors(vectors: &[GlobalCategoryVector]) -> (Vec<Evidence>, Vec<usize>) {
    let n_codes = vectors.first().map(GlobalCategoryVector::len).unwrap_or(0);
    let mut values = vec![Evidence::NoEvidence; n_codes];
    let mut support = vec![0usize; n_codes];
    let ones = vec![1.0; n_codes];

    for v in vectors {
        let weights: Vec<f64> = support.iter().map(|&c| c as f64).collect();
        values = nan_weighted_merge(&values, v.values(), &weights, &ones);
        for (count, value) in support.iter_mut().zip(v.values()) {
            if value.is_measured() {
                *count += 1;
            }
        }
    }
    (values, support)
}
