//! Evidence values and missing-aware fusion.
//!
//! Every aggregated quantity in stratx is either a measurement or an explicit
//! absence of one. [`Evidence`] keeps the two apart so that a measured zero
//! slope is never confused with "no leaf said anything about this position".
//!
//! The fusion rules are the same everywhere:
//!
//! | left | right | result |
//! |------|-------|--------|
//! | measured `a` (weight `wa`) | measured `b` (weight `wb`) | `(a·wa + b·wb) / (wa + wb)` |
//! | measured `a` | none | `a` |
//! | none | measured `b` | `b` |
//! | none | none | none |

use approx::{AbsDiffEq, RelativeEq};

/// A value that is either measured or missing.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum Evidence {
    /// No partition produced a usable measurement.
    #[default]
    NoEvidence,
    /// A measured value.
    Measured(f64),
}

impl Evidence {
    /// The measured value, if any.
    #[inline]
    pub fn value(self) -> Option<f64> {
        match self {
            Evidence::Measured(v) => Some(v),
            Evidence::NoEvidence => None,
        }
    }

    #[inline]
    pub fn is_measured(self) -> bool {
        matches!(self, Evidence::Measured(_))
    }

    #[inline]
    pub fn is_missing(self) -> bool {
        matches!(self, Evidence::NoEvidence)
    }

    /// Apply `f` to a measured value.
    #[inline]
    pub fn map(self, f: impl FnOnce(f64) -> f64) -> Evidence {
        match self {
            Evidence::Measured(v) => Evidence::Measured(f(v)),
            Evidence::NoEvidence => Evidence::NoEvidence,
        }
    }

    /// The measured value or `default`.
    #[inline]
    pub fn unwrap_or(self, default: f64) -> f64 {
        self.value().unwrap_or(default)
    }

    /// Convert to `f64`, using NaN for missing values.
    ///
    /// Meant for handing results to numeric consumers that expect a sentinel.
    #[inline]
    pub fn to_nan(self) -> f64 {
        self.unwrap_or(f64::NAN)
    }

    /// Read a NaN-sentinel value.
    #[inline]
    pub fn from_nan(v: f64) -> Evidence {
        if v.is_nan() {
            Evidence::NoEvidence
        } else {
            Evidence::Measured(v)
        }
    }
}

impl From<Option<f64>> for Evidence {
    fn from(value: Option<f64>) -> Self {
        match value {
            Some(v) => Evidence::Measured(v),
            None => Evidence::NoEvidence,
        }
    }
}

impl From<Evidence> for Option<f64> {
    fn from(value: Evidence) -> Self {
        value.value()
    }
}

impl AbsDiffEq for Evidence {
    type Epsilon = f64;

    fn default_epsilon() -> f64 {
        f64::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f64) -> bool {
        match (self, other) {
            (Evidence::Measured(a), Evidence::Measured(b)) => a.abs_diff_eq(b, epsilon),
            (Evidence::NoEvidence, Evidence::NoEvidence) => true,
            _ => false,
        }
    }
}

impl RelativeEq for Evidence {
    fn default_max_relative() -> f64 {
        f64::default_max_relative()
    }

    fn relative_eq(&self, other: &Self, epsilon: f64, max_relative: f64) -> bool {
        match (self, other) {
            (Evidence::Measured(a), Evidence::Measured(b)) => a.relative_eq(b, epsilon, max_relative),
            (Evidence::NoEvidence, Evidence::NoEvidence) => true,
            _ => false,
        }
    }
}

// =============================================================================
// Fusion
// =============================================================================

/// Fuse two evidence values with their weights.
///
/// A zero total weight with both sides measured divides by one instead.
#[inline]
pub fn fuse(a: Evidence, b: Evidence, wa: f64, wb: f64) -> Evidence {
    match (a, b) {
        (Evidence::Measured(a), Evidence::Measured(b)) => {
            Evidence::Measured((a * wa + b * wb) / crate::utils::zero_as_one(wa + wb))
        }
        (Evidence::Measured(_), Evidence::NoEvidence) => a,
        (Evidence::NoEvidence, _) => b,
    }
}

/// Element-wise weighted merge of two evidence vectors.
///
/// # Panics
///
/// Panics if the four slices differ in length.
///
/// # Example
///
/// ```
/// use stratx::evidence::{nan_weighted_merge, Evidence::*};
///
/// let merged = nan_weighted_merge(&[NoEvidence, Measured(2.0)], &[Measured(5.0), NoEvidence], &[1.0, 1.0], &[1.0, 1.0]);
/// assert_eq!(merged, vec![Measured(5.0), Measured(2.0)]);
/// ```
pub fn nan_weighted_merge(a: &[Evidence], b: &[Evidence], wa: &[f64], wb: &[f64]) -> Vec<Evidence> {
    assert_eq!(a.len(), b.len(), "evidence vectors differ in length");
    assert_eq!(a.len(), wa.len(), "left weights misaligned");
    assert_eq!(b.len(), wb.len(), "right weights misaligned");

    a.iter()
        .zip(b)
        .zip(wa.iter().zip(wb))
        .map(|((&a, &b), (&wa, &wb))| fuse(a, b, wa, wb))
        .collect()
}

/// Running mean over measured values.
///
/// Missing values are skipped; the mean of nothing is NoEvidence.
#[derive(Clone, Copy, Debug, Default)]
pub struct MeanAccumulator {
    sum: f64,
    count: usize,
}

impl MeanAccumulator {
    #[inline]
    pub fn push(&mut self, value: Evidence) {
        if let Evidence::Measured(v) = value {
            self.sum += v;
            self.count += 1;
        }
    }

    /// Number of measured values pushed.
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn mean(&self) -> Evidence {
        if self.count == 0 {
            Evidence::NoEvidence
        } else {
            Evidence::Measured(self.sum / self.count as f64)
        }
    }
}
