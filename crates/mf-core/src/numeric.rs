use crate::MfError;

/// Floating point type used throughout system
pub type Real = f64;

/// Relative tolerance applied to fraction sums (explicit fractions, resolved totals).
pub const FRACTION_EPS: Real = 1e-9;

/// One tolerance for everything
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

impl Tolerances {
    pub fn new(abs: Real, rel: Real) -> Result<Self, MfError> {
        if !(abs >= 0.0 && abs.is_finite()) {
            return Err(MfError::InvalidArg {
                what: "absolute tolerance must be finite and non-negative",
            });
        }
        if !(rel >= 0.0 && rel.is_finite()) {
            return Err(MfError::InvalidArg {
                what: "relative tolerance must be finite and non-negative",
            });
        }
        Ok(Self { abs, rel })
    }

    /// Tolerance used when comparing mole fractions against unity.
    pub fn fraction() -> Self {
        Self {
            abs: FRACTION_EPS,
            rel: FRACTION_EPS,
        }
    }
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, MfError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(MfError::NonFinite { what, value: v })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearly_equal_basic() {
        let tol = Tolerances {
            abs: 1e-12,
            rel: 1e-9,
        };
        assert!(nearly_equal(1.0, 1.0 + 1e-12, tol));
        assert!(nearly_equal(0.0, 1e-13, tol));
        assert!(!nearly_equal(1.0, 1.0 + 1e-6, tol));
    }

    #[test]
    fn fraction_tolerance_accepts_rounding_noise() {
        let sum = 0.1 + 0.2 + 0.7;
        assert!(nearly_equal(sum, 1.0, Tolerances::fraction()));
        assert!(!nearly_equal(1.0 + 1e-6, 1.0, Tolerances::fraction()));
    }

    #[test]
    fn ensure_finite_detects_nan() {
        let err = ensure_finite(Real::NAN, "test").unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("Non-finite"));
    }

    #[test]
    fn tolerances_reject_negative() {
        assert!(Tolerances::new(-1.0, 1e-9).is_err());
        assert!(Tolerances::new(1e-9, f64::NAN).is_err());
        assert!(Tolerances::new(0.0, 0.0).is_ok());
    }
}
