//! Linear least squares through the SVD pseudo-inverse.

use crate::error::{MixtureError, MixtureResult};
use nalgebra::{DMatrix, DVector};

/// Solution of `A x ≈ b`.
#[derive(Debug, Clone)]
pub struct LeastSquares {
    pub x: DVector<f64>,
    /// Numerical rank of `A`
    pub rank: usize,
    /// `‖A x - b‖₂`
    pub residual: f64,
}

/// Solve `A x ≈ b` with the pseudo-inverse.
///
/// Exact for square full-rank systems, least squares when over-determined,
/// minimum-norm when under-determined. Singular values below
/// `rel_tol * σ_max` are treated as zero.
pub fn solve(a: &DMatrix<f64>, b: &DVector<f64>, rel_tol: f64) -> MixtureResult<LeastSquares> {
    if a.nrows() != b.len() {
        return Err(MixtureError::Numeric {
            what: format!("{} rows but {} right-hand sides", a.nrows(), b.len()),
        });
    }
    if a.ncols() == 0 || a.nrows() == 0 {
        return Err(MixtureError::Numeric {
            what: "empty system".to_string(),
        });
    }
    if a.iter().chain(b.iter()).any(|v| !v.is_finite()) {
        return Err(MixtureError::Numeric {
            what: "non-finite coefficient".to_string(),
        });
    }

    let svd = a.clone().svd(true, true);
    let sigma_max = svd.singular_values.max();
    let eps = if sigma_max > 0.0 {
        rel_tol * sigma_max
    } else {
        rel_tol
    };
    let rank = svd.rank(eps);
    let x = svd.solve(b, eps).map_err(|what| MixtureError::Numeric {
        what: what.to_string(),
    })?;
    let residual = (a * &x - b).norm();

    Ok(LeastSquares { x, rank, residual })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_system_is_exact() {
        let a = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 3.0]);
        let b = DVector::from_vec(vec![3.0, 5.0]);
        let sol = solve(&a, &b, 1e-12).unwrap();
        assert_eq!(sol.rank, 2);
        assert!((sol.x[0] - 0.8).abs() < 1e-12);
        assert!((sol.x[1] - 1.4).abs() < 1e-12);
        assert!(sol.residual < 1e-12);
    }

    #[test]
    fn underdetermined_takes_minimum_norm() {
        // x + y = 1
        let a = DMatrix::from_row_slice(1, 2, &[1.0, 1.0]);
        let b = DVector::from_vec(vec![1.0]);
        let sol = solve(&a, &b, 1e-12).unwrap();
        assert_eq!(sol.rank, 1);
        assert!((sol.x[0] - 0.5).abs() < 1e-12);
        assert!((sol.x[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn overdetermined_least_squares() {
        // x = 1, x = 3  ->  x = 2
        let a = DMatrix::from_row_slice(2, 1, &[1.0, 1.0]);
        let b = DVector::from_vec(vec![1.0, 3.0]);
        let sol = solve(&a, &b, 1e-12).unwrap();
        assert!((sol.x[0] - 2.0).abs() < 1e-12);
        assert!((sol.residual - 2.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn rejects_bad_shapes_and_values() {
        let a = DMatrix::from_row_slice(1, 1, &[1.0]);
        assert!(solve(&a, &DVector::from_vec(vec![1.0, 2.0]), 1e-12).is_err());
        assert!(solve(&a, &DVector::from_vec(vec![f64::NAN]), 1e-12).is_err());
    }
}
