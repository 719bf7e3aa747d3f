//! Shared helpers for integration tests.
//!
//! For assertion helpers, use `stratx::testing`.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::{ArrayView1, ArrayView2};

use stratx::config::PartitionParams;
use stratx::partition::{PartitionError, PartitionTrainer};
use stratx::testing::{ExactMatchOracle, ExactMatchTrainer};
use stratx::Dataset;

#[allow(unused_imports)]
pub use stratx::assert_approx_eq_f64;
#[allow(unused_imports)]
pub use stratx::testing::{assert_evidence_eq, assert_slice_approx_eq, DEFAULT_TOLERANCE};

/// Base directory for test cases.
pub fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/test-cases")
}

/// Same feature columns, response replaced by `f(row, y)`.
pub fn map_response(ds: &Dataset, f: impl Fn(usize, f64) -> f64) -> Dataset {
    let response = ds.response().iter().enumerate().map(|(i, &y)| f(i, y)).collect();
    Dataset::new(ds.features().to_vec(), response).unwrap()
}

/// [`ExactMatchTrainer`] that counts how often it is fitted.
#[derive(Debug, Default)]
pub struct CountingTrainer {
    pub fits: AtomicUsize,
}

impl CountingTrainer {
    pub fn fits(&self) -> usize {
        self.fits.load(Ordering::SeqCst)
    }
}

impl PartitionTrainer for CountingTrainer {
    type Oracle = ExactMatchOracle;

    fn fit(
        &self,
        features: ArrayView2<'_, f64>,
        response: ArrayView1<'_, f64>,
        params: &PartitionParams,
    ) -> Result<ExactMatchOracle, PartitionError> {
        self.fits.fetch_add(1, Ordering::SeqCst);
        ExactMatchTrainer.fit(features, response, params)
    }
}

/// Trainer that always fails.
#[derive(Debug, Default)]
pub struct FailingTrainer;

impl PartitionTrainer for FailingTrainer {
    type Oracle = ExactMatchOracle;

    fn fit(
        &self,
        _features: ArrayView2<'_, f64>,
        _response: ArrayView1<'_, f64>,
        _params: &PartitionParams,
    ) -> Result<ExactMatchOracle, PartitionError> {
        Err(PartitionError::Training("refused".into()))
    }
}
