//! User-facing dataset abstraction.

use std::collections::{BTreeMap, HashSet};

use ndarray::{Array1, Array2};

/// A single named feature column.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureColumn {
    /// Numeric values (one per row).
    Numeric { name: String, values: Vec<f64> },
    /// Integer category codes (one per row).
    ///
    /// Codes carry no order. Stratification requires them to be non-negative.
    Categorical { name: String, values: Vec<i64> },
}

impl FeatureColumn {
    pub fn numeric(name: impl Into<String>, values: Vec<f64>) -> Self {
        FeatureColumn::Numeric { name: name.into(), values }
    }

    pub fn categorical(name: impl Into<String>, values: Vec<i64>) -> Self {
        FeatureColumn::Categorical { name: name.into(), values }
    }

    /// Column name.
    pub fn name(&self) -> &str {
        match self {
            FeatureColumn::Numeric { name, .. } => name,
            FeatureColumn::Categorical { name, .. } => name,
        }
    }

    /// Number of rows in this column.
    pub fn len(&self) -> usize {
        match self {
            FeatureColumn::Numeric { values, .. } => values.len(),
            FeatureColumn::Categorical { values, .. } => values.len(),
        }
    }

    /// Returns true if the column has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at `row` widened to `f64`.
    #[inline]
    pub fn value_f64(&self, row: usize) -> f64 {
        match self {
            FeatureColumn::Numeric { values, .. } => values[row],
            FeatureColumn::Categorical { values, .. } => values[row] as f64,
        }
    }

    fn select_rows(&self, rows: &[usize]) -> Self {
        match self {
            FeatureColumn::Numeric { name, values } => FeatureColumn::Numeric {
                name: name.clone(),
                values: rows.iter().map(|&r| values[r]).collect(),
            },
            FeatureColumn::Categorical { name, values } => FeatureColumn::Categorical {
                name: name.clone(),
                values: rows.iter().map(|&r| values[r]).collect(),
            },
        }
    }
}

/// Borrowed target column values.
#[derive(Debug, Clone, Copy)]
pub enum TargetColumn<'a> {
    Numeric(&'a [f64]),
    Categorical(&'a [i64]),
}

impl TargetColumn<'_> {
    pub fn len(&self) -> usize {
        match self {
            TargetColumn::Numeric(v) => v.len(),
            TargetColumn::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values widened to `f64`.
    pub fn to_f64(&self) -> Vec<f64> {
        match self {
            TargetColumn::Numeric(v) => v.to_vec(),
            TargetColumn::Categorical(v) => v.iter().map(|&c| c as f64).collect(),
        }
    }
}

/// Dataset construction and lookup errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DatasetError {
    #[error("inconsistent number of rows: column '{column}' expected {expected}, got {got}")]
    InconsistentRows {
        column: String,
        expected: usize,
        got: usize,
    },

    #[error("duplicate column name '{0}'")]
    DuplicateColumn(String),

    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    #[error("row index {row} out of range for {n_rows} rows")]
    RowOutOfRange { row: usize, n_rows: usize },
}

/// A named-column dataset with a single response.
#[derive(Debug, Clone)]
pub struct Dataset {
    features: Vec<FeatureColumn>,
    response: Vec<f64>,
    n_rows: usize,
}

impl Dataset {
    /// Create a dataset from feature columns and a response vector.
    ///
    /// # Example
    ///
    /// ```
    /// use stratx::data::{Dataset, FeatureColumn};
    ///
    /// let ds = Dataset::new(
    ///     vec![
    ///         FeatureColumn::numeric("x1", vec![1.0, 2.0, 3.0]),
    ///         FeatureColumn::categorical("state", vec![0, 1, 1]),
    ///     ],
    ///     vec![10.0, 12.0, 15.0],
    /// )
    /// .unwrap();
    /// assert_eq!(ds.n_rows(), 3);
    /// assert_eq!(ds.column_index("state"), Some(1));
    /// ```
    pub fn new(features: Vec<FeatureColumn>, response: Vec<f64>) -> Result<Self, DatasetError> {
        let n_rows = response.len();
        let mut seen = HashSet::with_capacity(features.len());

        for col in &features {
            if !seen.insert(col.name()) {
                return Err(DatasetError::DuplicateColumn(col.name().to_string()));
            }
            let got = col.len();
            if got != n_rows {
                return Err(DatasetError::InconsistentRows {
                    column: col.name().to_string(),
                    expected: n_rows,
                    got,
                });
            }
        }

        Ok(Self {
            features,
            response,
            n_rows,
        })
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of feature columns.
    pub fn n_features(&self) -> usize {
        self.features.len()
    }

    /// Response values (length = n_rows).
    pub fn response(&self) -> &[f64] {
        &self.response
    }

    /// Feature columns.
    pub fn features(&self) -> &[FeatureColumn] {
        &self.features
    }

    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.features.iter().position(|c| c.name() == name)
    }

    /// Column by name.
    pub fn column(&self, name: &str) -> Option<&FeatureColumn> {
        self.features.iter().find(|c| c.name() == name)
    }

    /// Target values for the named column.
    pub fn target(&self, name: &str) -> Result<TargetColumn<'_>, DatasetError> {
        match self.column(name) {
            Some(FeatureColumn::Numeric { values, .. }) => Ok(TargetColumn::Numeric(values)),
            Some(FeatureColumn::Categorical { values, .. }) => Ok(TargetColumn::Categorical(values)),
            None => Err(DatasetError::UnknownColumn(name.to_string())),
        }
    }

    /// Row-major matrix of every column except `target`: `[n_rows, n_features - 1]`.
    ///
    /// Category codes are widened to `f64`. This is the table the partitioning
    /// model is trained on and queried with.
    pub fn features_excluding(&self, target: &str) -> Result<Array2<f64>, DatasetError> {
        let skip = self
            .column_index(target)
            .ok_or_else(|| DatasetError::UnknownColumn(target.to_string()))?;
        let kept: Vec<&FeatureColumn> = self
            .features
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != skip)
            .map(|(_, c)| c)
            .collect();

        Ok(Array2::from_shape_fn((self.n_rows, kept.len()), |(row, col)| {
            kept[col].value_f64(row)
        }))
    }

    /// Response as an ndarray vector.
    pub fn response_array(&self) -> Array1<f64> {
        Array1::from(self.response.clone())
    }

    /// New dataset made of the given rows, in order. Rows may repeat.
    pub fn select_rows(&self, rows: &[usize]) -> Result<Dataset, DatasetError> {
        if let Some(&row) = rows.iter().find(|&&r| r >= self.n_rows) {
            return Err(DatasetError::RowOutOfRange {
                row,
                n_rows: self.n_rows,
            });
        }
        Ok(Dataset {
            features: self.features.iter().map(|c| c.select_rows(rows)).collect(),
            response: rows.iter().map(|&r| self.response[r]).collect(),
            n_rows: rows.len(),
        })
    }
}

/// Compress sparse category codes into 1-based min-ranks.
///
/// A code's rank is one plus the number of rows holding a smaller code, so
/// tied rows share the lowest rank of their run. Returns `None` when the
/// column is already dense, i.e. when the number of distinct codes is at least
/// 90% of the row count. `[40, 7, 40, 1000]` becomes `[2, 1, 2, 4]`.
pub fn compress_category_codes(values: &[i64]) -> Option<Vec<i64>> {
    let mut counts: BTreeMap<i64, i64> = BTreeMap::new();
    for &v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    if counts.len() as f64 >= 0.9 * values.len() as f64 {
        return None;
    }
    let mut below = 0;
    for count in counts.values_mut() {
        let n = *count;
        *count = below + 1;
        below += n;
    }
    Some(values.iter().map(|v| counts[v]).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::new(
            vec![
                FeatureColumn::numeric("x1", vec![1.0, 2.0, 3.0]),
                FeatureColumn::categorical("c", vec![4, 5, 4]),
                FeatureColumn::numeric("x2", vec![10.0, 20.0, 30.0]),
            ],
            vec![0.0, 1.0, 2.0],
        )
        .unwrap()
    }

    #[test]
    fn rejects_mismatched_rows() {
        let err = Dataset::new(vec![FeatureColumn::numeric("x", vec![1.0])], vec![0.0, 1.0]).unwrap_err();
        assert_eq!(
            err,
            DatasetError::InconsistentRows {
                column: "x".into(),
                expected: 2,
                got: 1
            }
        );
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = Dataset::new(
            vec![
                FeatureColumn::numeric("x", vec![1.0]),
                FeatureColumn::categorical("x", vec![1]),
            ],
            vec![0.0],
        )
        .unwrap_err();
        assert_eq!(err, DatasetError::DuplicateColumn("x".into()));
    }

    #[test]
    fn features_excluding_drops_target_and_widens_codes() {
        let ds = sample();
        let m = ds.features_excluding("x1").unwrap();
        assert_eq!(m.shape(), &[3, 2]);
        assert_eq!(m.row(0).to_vec(), vec![4.0, 10.0]);
        assert_eq!(m.row(2).to_vec(), vec![4.0, 30.0]);
        assert_eq!(
            ds.features_excluding("nope").unwrap_err(),
            DatasetError::UnknownColumn("nope".into())
        );
    }

    #[test]
    fn target_lookup() {
        let ds = sample();
        assert!(matches!(ds.target("c").unwrap(), TargetColumn::Categorical(&[4, 5, 4])));
        assert_eq!(ds.target("x2").unwrap().to_f64(), vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn select_rows_repeats_and_validates() {
        let ds = sample();
        let sub = ds.select_rows(&[2, 2, 0]).unwrap();
        assert_eq!(sub.n_rows(), 3);
        assert_eq!(sub.response(), &[2.0, 2.0, 0.0]);
        assert_eq!(sub.column("c"), Some(&FeatureColumn::categorical("c", vec![4, 4, 4])));
        assert!(matches!(
            ds.select_rows(&[3]),
            Err(DatasetError::RowOutOfRange { row: 3, n_rows: 3 })
        ));
    }

    #[test]
    fn compress_sparse_codes_to_min_ranks() {
        let codes = vec![40, 7, 40, 1000, 7, 7, 40, 1000, 7, 40];
        assert_eq!(
            compress_category_codes(&codes),
            Some(vec![5, 1, 5, 9, 1, 1, 5, 9, 1, 5])
        );
        assert_eq!(compress_category_codes(&[3, 1, 2]), None);
    }

    #[test]
    fn min_ranks_skip_past_ties() {
        // Sorted: -5, 2, 2, 2, 9, 9, 30, 30, 30, 30
        let codes = vec![9, 2, 30, -5, 30, 2, 9, 30, 2, 30];
        assert_eq!(
            compress_category_codes(&codes),
            Some(vec![5, 2, 7, 1, 7, 2, 5, 7, 2, 7])
        );
    }
}
