//! Top-level stratification errors.

use crate::config::ConfigError;
use crate::data::DatasetError;
use crate::partition::PartitionError;

/// Errors returned by the stratifiers and the trial runner.
///
/// Degenerate leaves, missing evidence and unmergeable leaves are not errors;
/// they surface as counts and [`Evidence::NoEvidence`](crate::Evidence)
/// entries in the results.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StratError {
    #[error("unknown target column '{0}'")]
    UnknownColumn(String),

    #[error("column '{column}': category code {value} must be a non-negative integer")]
    InvalidCategoryCode { column: String, value: f64 },

    #[error("column '{column}': category code {code} exceeds max_catcode {max_catcode}")]
    CategoryOutOfRange {
        column: String,
        code: usize,
        max_catcode: usize,
    },

    #[error("column '{column}': no x positions with enough evidence (min_evidence = {min_evidence})")]
    EmptyCurve { column: String, min_evidence: usize },

    #[error("column '{column}': no leaf holds two or more categories")]
    EmptyCategories { column: String },

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Partition(#[from] PartitionError),
}
