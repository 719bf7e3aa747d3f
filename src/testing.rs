//! Testing utilities for stratx.
//!
//! Assertion helpers for evidence vectors and curves, synthetic datasets with
//! known partial dependence, and simple partition trainers that need no
//! external model. Usable from unit tests, integration tests and benchmarks:
//!
//! ```
//! use stratx::testing::{synthetic_additive, ExactMatchTrainer};
//!
//! let ds = synthetic_additive(400, 7, 0.0);
//! assert_eq!(ds.n_rows(), 400);
//! let _trainer = ExactMatchTrainer;
//! ```

pub mod data;
pub mod trainers;

pub use data::{shuffled_rows, synthetic_additive, STATE_EFFECTS};
pub use trainers::{ExactMatchOracle, ExactMatchTrainer, GridOracle, GridTrainer};

use crate::evidence::Evidence;

// =============================================================================
// Constants
// =============================================================================

/// Default tolerance for floating point comparisons of fused values.
pub const DEFAULT_TOLERANCE: f64 = 1e-9;

// =============================================================================
// Floating Point Assertions
// =============================================================================

/// Assert that two f64 values are approximately equal.
///
/// Uses absolute difference comparison with the given tolerance.
///
/// # Examples
///
/// ```
/// # use stratx::assert_approx_eq_f64;
/// assert_approx_eq_f64!(1.0f64, 1.0001f64, 0.001);
/// ```
#[macro_export]
macro_rules! assert_approx_eq_f64 {
    ($left:expr, $right:expr, $tolerance:expr) => {{
        let left_val: f64 = $left;
        let right_val: f64 = $right;
        let tol: f64 = $tolerance;
        let diff = (left_val - right_val).abs();
        if !(diff <= tol) {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`\n right: `{:?}`\n  diff: `{:?}` > tolerance `{:?}`",
                left_val, right_val, diff, tol
            );
        }
    }};
    ($left:expr, $right:expr, $tolerance:expr, $($arg:tt)+) => {{
        let left_val: f64 = $left;
        let right_val: f64 = $right;
        let tol: f64 = $tolerance;
        let diff = (left_val - right_val).abs();
        if !(diff <= tol) {
            panic!(
                "assertion failed: `(left ≈ right)` - {}\n  left: `{:?}`\n right: `{:?}`\n  diff: `{:?}` > tolerance `{:?}`",
                format_args!($($arg)+), left_val, right_val, diff, tol
            );
        }
    }};
}

/// Assert that two f64 slices are approximately equal element-wise.
///
/// # Panics
///
/// Panics if lengths differ or any element differs by more than tolerance.
pub fn assert_slice_approx_eq(actual: &[f64], expected: &[f64], tolerance: f64, context: &str) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "{context}: length mismatch - got {}, expected {}",
        actual.len(),
        expected.len()
    );

    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        let diff = (a - e).abs();
        assert!(
            diff <= tolerance,
            "{context}[{i}]: {a} ≠ {e} (diff={diff}, tolerance={tolerance})"
        );
    }
}

/// Assert that two evidence vectors agree: same missing positions, measured
/// values within `tolerance`.
///
/// On failure, lists every differing position.
pub fn assert_evidence_eq(actual: &[Evidence], expected: &[Evidence], tolerance: f64, context: &str) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "{context}: length mismatch - got {}, expected {}",
        actual.len(),
        expected.len()
    );

    let mut diff = String::new();
    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        let same = match (a, e) {
            (Evidence::Measured(a), Evidence::Measured(e)) => (a - e).abs() <= tolerance,
            (Evidence::NoEvidence, Evidence::NoEvidence) => true,
            _ => false,
        };
        if !same {
            diff.push_str(&format!("[{i:3}] - {e:?}  (expected)\n      + {a:?}  (actual)\n"));
        }
    }

    if !diff.is_empty() {
        panic!("\n{context}: evidence differs (tolerance {tolerance:.0e})\n\n{diff}");
    }
}
