//! Verbosity-gated diagnostics.
//!
//! The stratifiers report partition sizes, ignored samples and merge progress
//! through [`StratLogger`]. Events are emitted with `tracing`, so output only
//! appears when the caller installs a subscriber *and* the configured
//! [`Verbosity`] lets the event through.

use tracing::{debug, info, warn};

/// How much the stratifiers report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// Report nothing.
    #[default]
    Silent,
    /// Only conditions that likely degrade the result.
    Warning,
    /// Per-call summaries.
    Info,
    /// Per-pass and per-trial detail.
    Debug,
}

/// Structured logger for one stratification call.
#[derive(Clone, Copy, Debug)]
pub struct StratLogger {
    verbosity: Verbosity,
}

impl StratLogger {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    #[inline]
    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    #[inline]
    fn enabled(&self, level: Verbosity) -> bool {
        self.verbosity >= level
    }

    /// Partition summary after leaf grouping.
    pub fn partitions(&self, column: &str, n_trees: usize, n_leaves: usize) {
        if self.enabled(Verbosity::Info) {
            info!(column, n_trees, n_leaves, "partitioned samples excluding target");
        }
    }

    /// Samples dropped because their leaf had a single target value.
    pub fn ignored(&self, column: &str, ignored: usize, n_samples: usize) {
        if ignored > 0 && self.enabled(Verbosity::Info) {
            info!(column, ignored, n_samples, "samples ignored in degenerate leaves");
        }
    }

    /// Continuous curve summary.
    pub fn curve(&self, column: &str, n_uniq: usize, n_points: usize) {
        if self.enabled(Verbosity::Info) {
            info!(column, n_uniq, n_points, "integrated partial dependence curve");
        }
        if n_points * 2 < n_uniq && self.enabled(Verbosity::Warning) {
            warn!(
                column,
                n_uniq, n_points, "fewer than half of the distinct values survived min_evidence"
            );
        }
    }

    /// One pass of the category merge.
    pub fn merge_pass(&self, pass: usize, merged: usize, remaining: usize) {
        if self.enabled(Verbosity::Debug) {
            debug!(pass, merged, remaining, "category merge pass");
        }
    }

    /// A single leaf merged into the running category vector.
    pub fn merge_leaf(&self, leaf: usize, anchor: usize, shift: f64) {
        if self.enabled(Verbosity::Debug) {
            debug!(leaf, anchor, shift, "merged leaf deltas");
        }
    }

    /// Leaves that never shared a category with the running vector.
    pub fn merge_leftover(&self, column: &str, leaves: usize, samples: usize) {
        if leaves > 0 && self.enabled(Verbosity::Warning) {
            warn!(column, leaves, samples, "leaves could not be merged into the category vector");
        }
    }

    /// Progress through resampling trials.
    pub fn trial(&self, column: &str, trial: usize, n_trials: usize, n_rows: usize) {
        if self.enabled(Verbosity::Debug) {
            debug!(column, trial, n_trials, n_rows, "stratification trial");
        }
    }
}
