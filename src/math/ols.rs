//! Dense linear solves for the nonlinear fitter.
//!
//! Each Levenberg–Marquardt step solves the damped normal equations
//!
//! ```text
//! (JᵀJ + μ D) δ = -Jᵀr
//! ```
//!
//! which is symmetric positive definite for μ > 0, so Cholesky is tried first.
//! Near-singular systems (parameters the data barely constrain) fall back to
//! an SVD least-squares solve with a tolerance ladder.
//!
//! Note: Nalgebra's `QR::solve` is intended for square systems and panics for
//! non-square matrices, so the fallback uses SVD for every shape.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Progressively looser tolerances if the strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Solve `a x = b` for symmetric positive (semi-)definite `a`.
pub fn solve_spd(a: &DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    if let Some(chol) = a.clone().cholesky() {
        let x = chol.solve(b);
        if x.iter().all(|v| v.is_finite()) {
            return Some(x);
        }
    }
    solve_least_squares(a, b)
}

/// Inverse of a symmetric positive definite matrix (e.g. `JᵀJ` for a covariance).
pub fn invert_spd(a: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let inv = match a.clone().cholesky() {
        Some(chol) => chol.inverse(),
        None => a.clone().try_inverse()?,
    };
    inv.iter().all(|v| v.is_finite()).then_some(inv)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn spd_solve_and_inverse() {
        let a = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 3.0]);
        let b = DVector::from_row_slice(&[1.0, 2.0]);
        let x = solve_spd(&a, &b).unwrap();
        let back = &a * &x;
        assert!((back[0] - 1.0).abs() < 1e-12 && (back[1] - 2.0).abs() < 1e-12);

        let inv = invert_spd(&a).unwrap();
        let eye = &a * inv;
        assert!((eye[(0, 0)] - 1.0).abs() < 1e-12);
        assert!(eye[(0, 1)].abs() < 1e-12);
    }

    #[test]
    fn singular_system_falls_back_to_svd() {
        // Rank-1: the minimum-norm solution still satisfies the system.
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        let b = DVector::from_row_slice(&[2.0, 2.0]);
        let x = solve_spd(&a, &b).unwrap();
        assert!((x[0] + x[1] - 2.0).abs() < 1e-8);
        assert!(invert_spd(&a).is_none());
    }
}
