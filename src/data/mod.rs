//! Tabular input for stratification.
//!
//! A [`Dataset`] is a set of named [`FeatureColumn`]s plus one response vector.
//! The stratifiers pick one column as the target, hand every *other* column to
//! the partitioning model, and read the target values through [`TargetColumn`].

mod dataset;

pub use dataset::{compress_category_codes, Dataset, DatasetError, FeatureColumn, TargetColumn};
