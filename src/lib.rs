//! stratx: stratified partial dependence for Rust.
//!
//! Estimates how a single variable affects a response without fitting a model
//! of the response. The data is partitioned by a tree ensemble trained on all
//! *other* variables; inside each leaf the samples are alike except for the
//! variable of interest, so local response differences can be attributed to
//! it. Local estimates are then fused into one global curve.
//!
//! # Key Types
//!
//! - [`Dataset`] - named feature columns plus a response
//! - [`StratConfig`] / [`TrialConfig`] - configuration builders
//! - [`LeafOracle`] / [`PartitionTrainer`] - the partitioning model seam
//! - [`ContinuousPd`] / [`CategoricalPd`] - stratification results
//! - [`Evidence`] - a measured value or an explicit absence of one
//!
//! # Example
//!
//! ```
//! use stratx::testing::{synthetic_additive, ExactMatchTrainer};
//! use stratx::{compute_pd, StratConfig};
//!
//! let ds = synthetic_additive(400, 1, 0.0);
//! let config = StratConfig::builder().min_evidence(1).build().unwrap();
//! let pd = compute_pd(&ds, "x1", &config, &ExactMatchTrainer).unwrap();
//!
//! // y = x1² + ..., so the partial dependence of x1 is x1².
//! for (x, y) in pd.points() {
//!     assert!((y - x * x).abs() < 1e-9);
//! }
//! ```

// Re-export approx traits for users who want to compare evidence vectors
pub use approx;

pub mod config;
pub mod data;
pub mod error;
pub mod evidence;
pub mod io;
pub mod logger;
pub mod partition;
pub mod repr;
pub mod stratify;
pub mod testing;
pub mod trials;
pub mod utils;

// =============================================================================
// Convenience Re-exports
// =============================================================================

// Configuration
pub use config::{
    CategoryAlignment, ConfigError, PartitionParams, ReferencePolicy, Resampling, StratConfig,
    TrialConfig, MAX_CATEGORY_CODE,
};

// Data and errors
pub use data::{Dataset, DatasetError, FeatureColumn};
pub use error::StratError;
pub use evidence::{nan_weighted_merge, Evidence};

// Partitioning
pub use io::ForestLoadError;
pub use partition::{leaf_samples, LeafGroup, LeafOracle, PartitionError, PartitionTrainer};
pub use repr::{Forest, Tree};

// Stratification
pub use stratify::{
    compute_cat_pd, compute_cat_pd_with_oracle, compute_pd, compute_pd_with_oracle, CategoricalPd,
    ContinuousPd, GlobalCategoryVector,
};
pub use trials::{run_cat_pd_trials, run_pd_trials, CatPdTrials, PdTrials};

// Shared utilities
pub use logger::Verbosity;
pub use utils::{run_with_threads, Parallelism};
