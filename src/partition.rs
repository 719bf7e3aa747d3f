//! Leaf partitioning.
//!
//! The stratifiers never train a model themselves. They ask a
//! [`PartitionTrainer`] for a [`LeafOracle`] fit on every column except the
//! target, then bucket samples by the leaf they land in. Samples sharing a leaf
//! are (approximately) alike in all other variables, so differences in the
//! response inside a leaf are attributed to the target variable.

use std::collections::BTreeMap;

use ndarray::{Array2, ArrayView1, ArrayView2};

use crate::config::PartitionParams;
use crate::utils::Parallelism;

/// Partitioning errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PartitionError {
    #[error("partition model has no trees")]
    NoTrees,

    #[error("feature matrix has {features} rows but response has {response}")]
    RowMismatch { features: usize, response: usize },

    #[error("cannot partition an empty sample table")]
    EmptyData,

    #[error("partition training failed: {0}")]
    Training(String),
}

// =============================================================================
// Oracle and trainer seams
// =============================================================================

/// Anything that can say which leaf a sample lands in, per tree.
///
/// Leaf ids only need to be unique within one tree.
pub trait LeafOracle: Sync {
    /// Number of trees in the ensemble.
    fn n_trees(&self) -> usize;

    /// Leaf id of `sample` in tree `tree`.
    fn leaf_id(&self, sample: ArrayView1<'_, f64>, tree: usize) -> u32;
}

impl<O: LeafOracle + ?Sized> LeafOracle for &O {
    fn n_trees(&self) -> usize {
        (**self).n_trees()
    }

    fn leaf_id(&self, sample: ArrayView1<'_, f64>, tree: usize) -> u32 {
        (**self).leaf_id(sample, tree)
    }
}

/// Trains a leaf oracle on the non-target columns.
///
/// `features` is `[n_samples, n_features]`; `response` is the dataset
/// response. Implementations should honor `params` where they can.
pub trait PartitionTrainer: Sync {
    type Oracle: LeafOracle;

    fn fit(
        &self,
        features: ArrayView2<'_, f64>,
        response: ArrayView1<'_, f64>,
        params: &PartitionParams,
    ) -> Result<Self::Oracle, PartitionError>;
}

// =============================================================================
// Leaf groups
// =============================================================================

/// Sample indices sharing a leaf of one tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafGroup {
    pub tree: usize,
    pub leaf: u32,
    /// Row indices in ascending order.
    pub samples: Vec<usize>,
}

impl LeafGroup {
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Leaf id of every sample in every tree: `[n_samples, n_trees]`.
pub fn leaf_assignments<O: LeafOracle + ?Sized>(
    oracle: &O,
    features: ArrayView2<'_, f64>,
    parallelism: Parallelism,
) -> Array2<u32> {
    let n_rows = features.nrows();
    let n_trees = oracle.n_trees();

    let rows: Vec<Vec<u32>> = parallelism.maybe_par_map(0..n_rows, |r| {
        let sample = features.row(r);
        (0..n_trees).map(|t| oracle.leaf_id(sample, t)).collect()
    });

    let mut out = Array2::zeros((n_rows, n_trees));
    for (r, ids) in rows.into_iter().enumerate() {
        for (t, id) in ids.into_iter().enumerate() {
            out[[r, t]] = id;
        }
    }
    out
}

/// Group rows by `(tree, leaf)` from a precomputed `[n_samples, n_trees]`
/// assignment matrix.
///
/// Groups come out ordered by tree, then leaf id.
pub fn leaf_groups_from_assignments(assignments: ArrayView2<'_, u32>) -> Vec<LeafGroup> {
    let mut groups = Vec::new();
    for (tree, column) in assignments.columns().into_iter().enumerate() {
        let mut by_leaf: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        for (row, &leaf) in column.iter().enumerate() {
            by_leaf.entry(leaf).or_default().push(row);
        }
        groups.extend(
            by_leaf
                .into_iter()
                .map(|(leaf, samples)| LeafGroup { tree, leaf, samples }),
        );
    }
    groups
}

/// Partition samples into leaf groups, one group per non-empty `(tree, leaf)`.
///
/// # Errors
///
/// [`PartitionError::NoTrees`] if the oracle has no trees.
pub fn leaf_samples<O: LeafOracle + ?Sized>(
    oracle: &O,
    features: ArrayView2<'_, f64>,
    parallelism: Parallelism,
) -> Result<Vec<LeafGroup>, PartitionError> {
    if oracle.n_trees() == 0 {
        return Err(PartitionError::NoTrees);
    }
    let assignments = leaf_assignments(oracle, features, parallelism);
    Ok(leaf_groups_from_assignments(assignments.view()))
}
