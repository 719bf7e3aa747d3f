//! Stratification and trial configuration with builder pattern.
//!
//! [`StratConfig`] controls a single stratification pass; [`TrialConfig`]
//! controls how many resampled passes the trial runner performs and how their
//! results are combined. Both use `bon` builders that validate on `build()`.
//!
//! # Example
//!
//! ```
//! use stratx::config::{PartitionParams, ReferencePolicy, StratConfig, TrialConfig, Resampling};
//!
//! // All defaults
//! let config = StratConfig::builder().build().unwrap();
//! assert_eq!(config.min_evidence, 5);
//!
//! let config = StratConfig::builder()
//!     .min_evidence(2)
//!     .reference_policy(ReferencePolicy::LowestCode)
//!     .partition(PartitionParams { n_trees: 10, ..Default::default() })
//!     .build()
//!     .unwrap();
//!
//! let trials = TrialConfig::builder()
//!     .n_trials(20)
//!     .resampling(Resampling::Subsample { fraction: 0.75 })
//!     .build()
//!     .unwrap();
//! ```

use std::num::NonZeroUsize;

use bon::Builder;

use crate::logger::Verbosity;

/// Largest category code the categorical stratifier accepts.
///
/// The result vector holds one slot per code in `0..=max_catcode`.
pub const MAX_CATEGORY_CODE: usize = 1 << 24;

// =============================================================================
// ConfigError
// =============================================================================

/// Errors that can occur during configuration validation.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Rounding precision above what `f64` can represent.
    InvalidDecimals(u32),
    /// Merge pass cap must be at least 1.
    InvalidMergePasses,
    /// Partition model needs at least one tree.
    InvalidNTrees,
    /// Leaves must be allowed to hold at least one sample.
    InvalidMinSamplesLeaf,
    /// At least one trial must run.
    InvalidNTrials,
    /// Subsample fraction outside (0, 1].
    InvalidFraction(f64),
    /// `max_catcode` above [`MAX_CATEGORY_CODE`].
    InvalidMaxCatcode(usize),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidDecimals(d) => write!(f, "decimals must be at most 15, got {}", d),
            Self::InvalidMergePasses => write!(f, "max_merge_passes must be at least 1"),
            Self::InvalidNTrees => write!(f, "partition n_trees must be at least 1"),
            Self::InvalidMinSamplesLeaf => write!(f, "partition min_samples_leaf must be at least 1"),
            Self::InvalidNTrials => write!(f, "n_trials must be at least 1"),
            Self::InvalidFraction(v) => write!(f, "subsample fraction must be in (0, 1], got {}", v),
            Self::InvalidMaxCatcode(v) => {
                write!(f, "max_catcode must be at most {}, got {}", MAX_CATEGORY_CODE, v)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// =============================================================================
// Parameter groups
// =============================================================================

/// How the anchor category is chosen when a leaf is merged into the running
/// category vector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReferencePolicy {
    /// Shared category with the most samples in the leaf (ties → lowest code).
    #[default]
    MaxWeight,
    /// Lowest shared category code.
    LowestCode,
}

/// Parameters handed to the partition trainer.
///
/// stratx never interprets these itself; they are passed through so a
/// [`PartitionTrainer`](crate::partition::PartitionTrainer) can build an
/// ensemble with suitably sized leaves.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PartitionParams {
    /// Number of trees. Default: 1.
    pub n_trees: usize,
    /// Minimum samples per leaf. Default: 15.
    pub min_samples_leaf: usize,
    /// Seed for any randomness in training. Default: 0.
    pub seed: u64,
}

impl Default for PartitionParams {
    fn default() -> Self {
        Self {
            n_trees: 1,
            min_samples_leaf: 15,
            seed: 0,
        }
    }
}

/// Row resampling used for each trial.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Resampling {
    /// `n` rows drawn with replacement.
    #[default]
    Bootstrap,
    /// `floor(n * fraction)` rows drawn without replacement.
    Subsample { fraction: f64 },
}

/// Alignment applied to each trial's category vector before averaging.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CategoryAlignment {
    /// Keep the merge's own reference frame.
    #[default]
    Raw,
    /// Subtract the first measured value.
    LeftmostZero,
    /// Subtract the smallest measured value.
    MinZero,
}

// =============================================================================
// StratConfig
// =============================================================================

/// Configuration for a single stratification pass.
#[derive(Debug, Clone, Builder)]
#[builder(
    derive(Clone, Debug),
    finish_fn(vis = "", name = __build_internal)
)]
pub struct StratConfig {
    /// Minimum number of slope segments that must cover an x position for it
    /// to count as measured. Zero behaves like one. Default: 5.
    #[builder(default = 5)]
    pub min_evidence: usize,

    /// Decimal digits continuous targets are rounded to. Default: 10.
    #[builder(default = 10)]
    pub decimals: u32,

    /// Maximum passes over the category merge work-list. Default: 3.
    #[builder(default = 3)]
    pub max_merge_passes: usize,

    /// Anchor choice during category merging.
    #[builder(default)]
    pub reference_policy: ReferencePolicy,

    /// Parameters passed to the partition trainer.
    #[builder(default)]
    pub partition: PartitionParams,

    /// Largest category code the result vector covers. `None` uses the
    /// largest code in the data. At most [`MAX_CATEGORY_CODE`].
    pub max_catcode: Option<usize>,

    /// Number of threads. `None` uses all available cores.
    pub n_threads: Option<NonZeroUsize>,

    /// Verbosity level. Default: `Silent`.
    #[builder(default)]
    pub verbosity: Verbosity,
}

impl<S: strat_config_builder::IsComplete> StratConfigBuilder<S> {
    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for `decimals > 15`, `max_merge_passes == 0`, or
    /// zero partition trees / leaf size, or `max_catcode` above
    /// [`MAX_CATEGORY_CODE`].
    pub fn build(self) -> Result<StratConfig, ConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

impl Default for StratConfig {
    fn default() -> Self {
        StratConfig::builder().__build_internal()
    }
}

impl StratConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.decimals > 15 {
            return Err(ConfigError::InvalidDecimals(self.decimals));
        }
        if self.max_merge_passes == 0 {
            return Err(ConfigError::InvalidMergePasses);
        }
        if self.partition.n_trees == 0 {
            return Err(ConfigError::InvalidNTrees);
        }
        if self.partition.min_samples_leaf == 0 {
            return Err(ConfigError::InvalidMinSamplesLeaf);
        }
        if let Some(max) = self.max_catcode.filter(|&m| m > MAX_CATEGORY_CODE) {
            return Err(ConfigError::InvalidMaxCatcode(max));
        }
        Ok(())
    }

    /// Thread count for [`run_with_threads`](crate::run_with_threads): 0 = auto.
    #[inline]
    pub fn thread_count(&self) -> usize {
        self.n_threads.map(NonZeroUsize::get).unwrap_or(0)
    }

    /// Effective evidence threshold.
    #[inline]
    pub fn effective_min_evidence(&self) -> usize {
        self.min_evidence.max(1)
    }
}

// =============================================================================
// TrialConfig
// =============================================================================

/// Configuration for repeated, resampled stratification.
#[derive(Debug, Clone, Builder)]
#[builder(
    derive(Clone, Debug),
    finish_fn(vis = "", name = __build_internal)
)]
pub struct TrialConfig {
    /// Number of trials. Default: 1.
    #[builder(default = 1)]
    pub n_trials: usize,

    /// Row resampling per trial. Default: bootstrap.
    #[builder(default)]
    pub resampling: Resampling,

    /// Base seed; trial `t` uses `seed + t`. Default: 42.
    #[builder(default = 42)]
    pub seed: u64,

    /// Alignment of category vectors before averaging. Default: `Raw`.
    #[builder(default)]
    pub category_alignment: CategoryAlignment,
}

impl<S: trial_config_builder::IsComplete> TrialConfigBuilder<S> {
    /// Build and validate the configuration.
    pub fn build(self) -> Result<TrialConfig, ConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

impl Default for TrialConfig {
    fn default() -> Self {
        TrialConfig::builder().__build_internal()
    }
}

impl TrialConfig {
    /// Struct literals skip the builder, so the trial runners call this too.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.n_trials == 0 {
            return Err(ConfigError::InvalidNTrials);
        }
        if let Resampling::Subsample { fraction } = self.resampling {
            if !(fraction > 0.0 && fraction <= 1.0) {
                return Err(ConfigError::InvalidFraction(fraction));
            }
        }
        Ok(())
    }
}
