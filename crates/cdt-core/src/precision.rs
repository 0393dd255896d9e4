//! Fixed working-precision arithmetic for acceptance ratios and actions.
//!
//! All values are `FBig` binary floats rounded half-to-even. The precision is
//! an explicit parameter carried by [`Precision`]; nothing here reads ambient
//! global state.

use dashu_float::round::mode::HalfEven;
use dashu_float::FBig;
use dashu_int::IBig;
use serde::{Deserialize, Serialize};

use crate::errors::{CdtError, ErrorInfo};

/// Arbitrary-precision real used for actions and probabilities.
pub type Real = FBig<HalfEven>;

/// Default working precision in bits.
pub const DEFAULT_PRECISION_BITS: usize = 256;

/// Smallest accepted working precision; f64 already has 53 bits.
pub const MIN_PRECISION_BITS: usize = 64;

/// Working precision for all precision-sensitive operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Precision {
    bits: usize,
}

impl Default for Precision {
    fn default() -> Self {
        Self {
            bits: DEFAULT_PRECISION_BITS,
        }
    }
}

impl Precision {
    /// Creates a working precision of `bits` binary digits.
    pub fn new(bits: usize) -> Result<Self, CdtError> {
        if bits < MIN_PRECISION_BITS {
            return Err(CdtError::Config(
                ErrorInfo::new("precision-too-low", "working precision is below the minimum")
                    .with_context("bits", bits.to_string())
                    .with_hint(format!("use at least {MIN_PRECISION_BITS} bits")),
            ));
        }
        Ok(Self { bits })
    }

    /// Number of binary digits carried.
    pub fn bits(&self) -> usize {
        self.bits
    }

    /// Most negative exponent whose exponential is still resolvable, `-bits * ln 2`.
    ///
    /// Below this `exp(x)` is smaller than one unit in the last place of 1.
    pub fn exp_floor(&self) -> f64 {
        -(self.bits as f64) * std::f64::consts::LN_2
    }

    /// Exact integer lifted to the working precision.
    pub fn integer(&self, value: i64) -> Real {
        Real::from(IBig::from(value))
            .with_precision(self.bits)
            .value()
    }

    /// Exact unsigned count lifted to the working precision.
    pub fn count(&self, value: u64) -> Real {
        Real::from(IBig::from(value))
            .with_precision(self.bits)
            .value()
    }

    /// Finite double lifted exactly, then rounded to the working precision.
    pub fn real(&self, value: f64) -> Result<Real, CdtError> {
        let exact = Real::try_from(value).map_err(|_| {
            CdtError::Numerical(
                ErrorInfo::new("non-finite-input", "value cannot be represented as a real")
                    .with_context("value", value.to_string()),
            )
        })?;
        Ok(exact.with_precision(self.bits).value())
    }

    /// `numerator / denominator` at the working precision.
    pub fn ratio(&self, numerator: u64, denominator: u64) -> Result<Real, CdtError> {
        if denominator == 0 {
            return Err(CdtError::Precondition(
                ErrorInfo::new("zero-denominator", "ratio requested with a zero denominator")
                    .with_context("numerator", numerator.to_string()),
            ));
        }
        Ok(self.count(numerator) / self.count(denominator))
    }

    /// `exp(exponent)` at the working precision for a non-positive exponent.
    ///
    /// Fails with a numerical error when the result would fall below the
    /// resolution of the working precision.
    pub fn exp_non_positive(&self, exponent: &Real) -> Result<Real, CdtError> {
        if *exponent >= Real::ZERO {
            return Ok(Real::ONE);
        }
        let approx = to_f64(exponent);
        if approx < self.exp_floor() {
            return Err(CdtError::Numerical(
                ErrorInfo::new(
                    "exp-underflow",
                    "action difference too large for the working precision",
                )
                .with_context("delta_action", format!("{approx:e}"))
                .with_context("precision_bits", self.bits.to_string())
                .with_hint("the configuration is likely unphysical; check the couplings"),
            ));
        }
        Ok(exponent.clone().with_precision(self.bits).value().exp())
    }
}

/// Nearest double to `value`, used for logging and reports only.
pub fn to_f64(value: &Real) -> f64 {
    value.to_f64().value()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_low_precision() {
        assert!(Precision::new(16).is_err());
        assert_eq!(Precision::new(128).unwrap().bits(), 128);
    }

    #[test]
    fn exp_of_zero_is_exactly_one() {
        let precision = Precision::default();
        let value = precision.exp_non_positive(&Real::ZERO).unwrap();
        assert_eq!(to_f64(&value), 1.0);
    }

    #[test]
    fn tiny_negative_exponent_stays_below_one() {
        let precision = Precision::default();
        let tiny = precision.real(-1e-30).unwrap();
        let value = precision.exp_non_positive(&tiny).unwrap();
        assert!(value < Real::ONE);
        assert!(value > precision.real(0.999).unwrap());
    }

    #[test]
    fn huge_negative_exponent_is_reported() {
        let precision = Precision::default();
        let huge = precision.real(-1.0e4).unwrap();
        let err = precision.exp_non_positive(&huge).unwrap_err();
        assert_eq!(err.info().code, "exp-underflow");
    }

    #[test]
    fn ratio_guards_zero_denominator() {
        let precision = Precision::default();
        assert!(matches!(
            precision.ratio(1, 0),
            Err(CdtError::Precondition(_))
        ));
        let half = precision.ratio(1, 2).unwrap();
        assert_eq!(to_f64(&half), 0.5);
    }
}
