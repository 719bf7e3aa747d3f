//! Partition trainers without an external model.

use std::collections::HashMap;

use ndarray::{ArrayView1, ArrayView2};

use crate::config::PartitionParams;
use crate::partition::{LeafOracle, PartitionError, PartitionTrainer};

fn check_shapes(features: ArrayView2<'_, f64>, response: ArrayView1<'_, f64>) -> Result<(), PartitionError> {
    if features.nrows() != response.len() {
        return Err(PartitionError::RowMismatch {
            features: features.nrows(),
            response: response.len(),
        });
    }
    if features.nrows() == 0 {
        return Err(PartitionError::EmptyData);
    }
    Ok(())
}

// =============================================================================
// Grid
// =============================================================================

/// Equal-width binning of every feature.
///
/// A leaf is one cell of the grid. Tree `t` of `n` shifts every bin edge by
/// `t / n` of a bin width, so trees disagree on boundaries the way a forest
/// would. The response and `min_samples_leaf` are ignored.
///
/// Leaf ids number the cells directly, so fitting fails when the grid has more
/// cells than a `u32` can count.
#[derive(Clone, Copy, Debug)]
pub struct GridTrainer {
    pub n_bins: usize,
}

impl Default for GridTrainer {
    fn default() -> Self {
        Self { n_bins: 4 }
    }
}

/// Oracle produced by [`GridTrainer`].
#[derive(Clone, Debug)]
pub struct GridOracle {
    mins: Vec<f64>,
    widths: Vec<f64>,
    n_bins: usize,
    n_trees: usize,
}

impl GridOracle {
    fn bin(&self, feature: usize, value: f64, tree: usize) -> u32 {
        let n = self.n_bins as u32;
        if value.is_nan() {
            return n + 1;
        }
        let width = self.widths[feature];
        if width <= 0.0 {
            return 0;
        }
        let offset = tree as f64 / self.n_trees as f64;
        let pos = (value - self.mins[feature]) / width + offset;
        (pos.max(0.0).floor() as u32).min(n)
    }
}

impl LeafOracle for GridOracle {
    fn n_trees(&self) -> usize {
        self.n_trees
    }

    fn leaf_id(&self, sample: ArrayView1<'_, f64>, tree: usize) -> u32 {
        // One digit per fitted feature in base `n_bins + 2` (bins, overflow
        // bin, NaN). Fitting checked that every id fits.
        let radix = self.n_bins as u32 + 2;
        sample
            .iter()
            .take(self.widths.len())
            .enumerate()
            .fold(0u32, |id, (f, &v)| id * radix + self.bin(f, v, tree))
    }
}

impl PartitionTrainer for GridTrainer {
    type Oracle = GridOracle;

    fn fit(
        &self,
        features: ArrayView2<'_, f64>,
        response: ArrayView1<'_, f64>,
        params: &PartitionParams,
    ) -> Result<GridOracle, PartitionError> {
        check_shapes(features, response)?;
        if self.n_bins == 0 {
            return Err(PartitionError::Training("n_bins must be at least 1".into()));
        }
        let radix = self.n_bins as u64 + 2;
        let fits = u32::try_from(features.ncols())
            .ok()
            .and_then(|n| radix.checked_pow(n))
            .is_some_and(|cells| cells <= u64::from(u32::MAX) + 1);
        if !fits {
            return Err(PartitionError::Training(format!(
                "{} bins over {} features needs more than 2^32 leaf ids",
                self.n_bins,
                features.ncols()
            )));
        }

        let mut mins = Vec::with_capacity(features.ncols());
        let mut widths = Vec::with_capacity(features.ncols());
        for column in features.columns() {
            let (lo, hi) = column
                .iter()
                .filter(|v| !v.is_nan())
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
            if lo.is_finite() && hi > lo {
                mins.push(lo);
                widths.push((hi - lo) / self.n_bins as f64);
            } else {
                mins.push(0.0);
                widths.push(0.0);
            }
        }

        Ok(GridOracle {
            mins,
            widths,
            n_bins: self.n_bins,
            n_trees: params.n_trees.max(1),
        })
    }
}

// =============================================================================
// Exact match
// =============================================================================

/// One leaf per distinct combination of feature values seen in training.
///
/// With discrete features this is the ideal stratification: every leaf holds
/// samples identical in all other variables. `params.n_trees` identical trees
/// are reported. Unseen combinations land in leaf `u32::MAX`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExactMatchTrainer;

/// Oracle produced by [`ExactMatchTrainer`].
#[derive(Clone, Debug)]
pub struct ExactMatchOracle {
    leaves: HashMap<Vec<u64>, u32>,
    n_trees: usize,
}

impl ExactMatchOracle {
    /// Number of distinct leaves.
    pub fn n_leaves(&self) -> usize {
        self.leaves.len()
    }
}

fn row_key(sample: ArrayView1<'_, f64>) -> Vec<u64> {
    // -0.0 and 0.0 share a leaf.
    sample.iter().map(|&v| (v + 0.0).to_bits()).collect()
}

impl LeafOracle for ExactMatchOracle {
    fn n_trees(&self) -> usize {
        self.n_trees
    }

    fn leaf_id(&self, sample: ArrayView1<'_, f64>, _tree: usize) -> u32 {
        self.leaves.get(&row_key(sample)).copied().unwrap_or(u32::MAX)
    }
}

impl PartitionTrainer for ExactMatchTrainer {
    type Oracle = ExactMatchOracle;

    fn fit(
        &self,
        features: ArrayView2<'_, f64>,
        response: ArrayView1<'_, f64>,
        params: &PartitionParams,
    ) -> Result<ExactMatchOracle, PartitionError> {
        check_shapes(features, response)?;

        let mut leaves = HashMap::new();
        for row in features.rows() {
            let next = leaves.len() as u32;
            leaves.entry(row_key(row)).or_insert(next);
        }
        Ok(ExactMatchOracle {
            leaves,
            n_trees: params.n_trees.max(1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};

    #[test]
    fn grid_bins_and_shifts() {
        let x = array![[0.0], [1.0], [2.0], [3.0], [4.0]];
        let y = Array1::zeros(5);
        let params = PartitionParams {
            n_trees: 2,
            ..Default::default()
        };
        let oracle = GridTrainer { n_bins: 2 }.fit(x.view(), y.view(), &params).unwrap();
        let ids: Vec<u32> = x.rows().into_iter().map(|r| oracle.leaf_id(r, 0)).collect();
        assert_eq!(ids, vec![0, 0, 1, 1, 2]);
        let shifted: Vec<u32> = x.rows().into_iter().map(|r| oracle.leaf_id(r, 1)).collect();
        assert_eq!(shifted, vec![0, 1, 1, 2, 2]);
    }

    #[test]
    fn grid_constant_column_is_one_bin() {
        let x = array![[5.0, 0.0], [5.0, 1.0]];
        let oracle = GridTrainer { n_bins: 3 }
            .fit(x.view(), Array1::zeros(2).view(), &PartitionParams::default())
            .unwrap();
        assert_eq!(oracle.bin(0, 5.0, 0), 0);
        assert_ne!(oracle.leaf_id(x.row(0), 0), oracle.leaf_id(x.row(1), 0));
    }

    #[test]
    fn grid_cells_get_distinct_ids() {
        // radix 4 over 16 features is exactly 2^32 cells.
        let mut x = ndarray::Array2::zeros((2, 16));
        x.row_mut(1).fill(1.0);
        x[[1, 0]] = 0.0;
        let y = Array1::zeros(2);
        let oracle = GridTrainer { n_bins: 2 }
            .fit(x.view(), y.view(), &PartitionParams::default())
            .unwrap();
        let mut nan_first = Array1::zeros(16);
        nan_first[0] = f64::NAN;
        assert_eq!(oracle.leaf_id(nan_first.view(), 0), 3 << 30);
        assert_ne!(oracle.leaf_id(x.row(0), 0), oracle.leaf_id(x.row(1), 0));

        // One more feature no longer fits.
        let wide = ndarray::Array2::zeros((2, 17));
        let err = GridTrainer { n_bins: 2 }
            .fit(wide.view(), y.view(), &PartitionParams::default())
            .unwrap_err();
        assert!(matches!(err, PartitionError::Training(_)));
    }

    #[test]
    fn exact_match_groups_identical_rows() {
        let x = array![[1.0, 2.0], [1.0, 2.0], [1.0, 3.0], [-0.0, 2.0], [0.0, 2.0]];
        let oracle = ExactMatchTrainer
            .fit(x.view(), Array1::zeros(5).view(), &PartitionParams::default())
            .unwrap();
        assert_eq!(oracle.n_leaves(), 3);
        assert_eq!(oracle.leaf_id(x.row(0), 0), oracle.leaf_id(x.row(1), 0));
        assert_ne!(oracle.leaf_id(x.row(0), 0), oracle.leaf_id(x.row(2), 0));
        assert_eq!(oracle.leaf_id(x.row(3), 0), oracle.leaf_id(x.row(4), 0));
        assert_eq!(oracle.leaf_id(array![9.0, 9.0].view(), 0), u32::MAX);
    }

    #[test]
    fn trainers_check_shapes() {
        let x = array![[1.0], [2.0]];
        let err = ExactMatchTrainer
            .fit(x.view(), Array1::zeros(3).view(), &PartitionParams::default())
            .unwrap_err();
        assert_eq!(err, PartitionError::RowMismatch { features: 2, response: 3 });
    }
}
