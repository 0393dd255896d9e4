use serde::{Deserialize, Serialize};

use crate::errors::{CdtError, ErrorInfo};
use crate::moves::CountDelta;

/// Coupling constants of the discretised Einstein-Hilbert action.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Couplings {
    /// Squared length ratio of timelike to spacelike edges.
    pub alpha: f64,
    /// Inverse Newton coupling, `k = 1 / (8 pi G)`.
    pub k: f64,
    /// Cosmological coupling, `lambda = k * Lambda`.
    pub lambda: f64,
}

impl Couplings {
    /// Validates and builds a coupling triple. Only finiteness is enforced.
    pub fn new(alpha: f64, k: f64, lambda: f64) -> Result<Self, CdtError> {
        for (name, value) in [("alpha", alpha), ("k", k), ("lambda", lambda)] {
            if !value.is_finite() {
                return Err(CdtError::Config(
                    ErrorInfo::new("coupling-not-finite", "coupling constants must be finite")
                        .with_context("coupling", name)
                        .with_context("value", value.to_string()),
                ));
            }
        }
        Ok(Self { alpha, k, lambda })
    }
}

/// Believed global topology of the triangulation.
///
/// Derived from a fresh classification once per run and then maintained
/// incrementally from the per-move deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ConfigurationCounts {
    /// Number of timelike edges, N1_TL.
    pub timelike_edges: u64,
    /// Number of (3,1) and (1,3) simplices, N3_31.
    pub three_one: u64,
    /// Number of (2,2) simplices, N3_22.
    pub two_two: u64,
}

impl ConfigurationCounts {
    /// Creates a count triple.
    pub fn new(timelike_edges: u64, three_one: u64, two_two: u64) -> Self {
        Self {
            timelike_edges,
            three_one,
            two_two,
        }
    }

    /// Total number of simplices, N3_31 + N3_22.
    pub fn total_simplices(&self) -> u64 {
        self.three_one + self.two_two
    }

    /// Returns the counts after applying `delta`, failing instead of wrapping below zero.
    pub fn apply(&self, delta: CountDelta) -> Result<Self, CdtError> {
        Ok(Self {
            timelike_edges: shift(self.timelike_edges, delta.timelike_edges, "timelike_edges")?,
            three_one: shift(self.three_one, delta.three_one, "three_one")?,
            two_two: shift(self.two_two, delta.two_two, "two_two")?,
        })
    }
}

fn shift(count: u64, delta: i64, field: &str) -> Result<u64, CdtError> {
    let shifted = if delta >= 0 {
        count.checked_add(delta.unsigned_abs())
    } else {
        count.checked_sub(delta.unsigned_abs())
    };
    shifted.ok_or_else(|| {
        CdtError::Numerical(
            ErrorInfo::new("count-underflow", "count delta leaves the representable range")
                .with_context("field", field)
                .with_context("count", count.to_string())
                .with_context("delta", delta.to_string()),
        )
    })
}
