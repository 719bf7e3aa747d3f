//! Stratifiers.
//!
//! - [`continuous`]: slopes within leaves, integrated into a curve.
//! - [`categorical`]: category deltas within leaves, merged into one vector.

pub mod categorical;
pub mod continuous;

pub use categorical::{
    avg_values_at_cat, catwise_leaves, compute_cat_pd, compute_cat_pd_with_oracle, CatEntry,
    CatLeafDeltas, CategoricalPd, GlobalCategoryVector, MergeOutcome, RunningCategoryVector,
};
pub use continuous::{
    avg_slopes_at_x, compute_pd, compute_pd_with_oracle, finite_differences, integrate,
    ContinuousPd, LeafSlopes, SlopeSegment,
};
