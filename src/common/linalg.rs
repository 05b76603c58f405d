//! Linear algebra utilities
//!
//! Log-domain helpers and covariance conditioning used by the quadrature rule
//! and the filter recursion.

use nalgebra::{DMatrix, SymmetricEigen};

/// `ln(sqrt(2π))`
pub const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_8;

/// Relative tolerance used when testing symmetry and eigenvalue signs
pub const PSD_TOLERANCE: f64 = 1e-9;

/// Log density of a univariate Gaussian
///
/// Evaluated directly in the log domain so large deviations never underflow.
#[inline]
pub fn log_normal_pdf(x: f64, mu: f64, std: f64) -> f64 {
    let z = (x - mu) / std;
    -0.5 * z * z - std.ln() - LN_SQRT_2PI
}

/// Compute `ln(exp(a) + exp(b))` without overflow
#[inline]
pub fn log_add_exp(a: f64, b: f64) -> f64 {
    let max_val = a.max(b);
    if max_val == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    max_val + ((a - max_val).exp() + (b - max_val).exp()).ln()
}

/// Make matrix symmetric
///
/// Ensures a matrix is symmetric by averaging with its transpose
pub fn symmetrize(matrix: &DMatrix<f64>) -> DMatrix<f64> {
    0.5 * (matrix + matrix.transpose())
}

/// Largest absolute entry, at least 1.0, used to scale tolerances
fn tolerance_scale(matrix: &DMatrix<f64>) -> f64 {
    matrix.iter().fold(1.0_f64, |acc, v| acc.max(v.abs()))
}

/// Check that a matrix is finite, square and symmetric within tolerance
pub fn is_symmetric(matrix: &DMatrix<f64>) -> bool {
    if !matrix.is_square() || matrix.iter().any(|v| !v.is_finite()) {
        return false;
    }
    let tol = PSD_TOLERANCE * tolerance_scale(matrix);
    let n = matrix.nrows();
    (0..n).all(|i| (0..i).all(|j| (matrix[(i, j)] - matrix[(j, i)]).abs() <= tol))
}

/// Symmetric eigen-decomposition of a PSD matrix with tiny negative
/// eigenvalues clamped to zero
///
/// Returns `None` if the matrix is not symmetric or has an eigenvalue
/// below `-PSD_TOLERANCE * scale`.
pub fn psd_eigen(matrix: &DMatrix<f64>) -> Option<SymmetricEigen<f64, nalgebra::Dyn>> {
    if !is_symmetric(matrix) {
        return None;
    }
    let mut eigen = SymmetricEigen::new(symmetrize(matrix));
    let tol = PSD_TOLERANCE * tolerance_scale(matrix);
    if eigen.eigenvalues.iter().any(|&l| l < -tol || !l.is_finite()) {
        return None;
    }
    eigen.eigenvalues.iter_mut().for_each(|l| *l = l.max(0.0));
    Some(eigen)
}

/// Check if matrix is symmetric positive semi-definite
pub fn is_positive_semidefinite(matrix: &DMatrix<f64>) -> bool {
    psd_eigen(matrix).is_some()
}

/// Project a matrix onto the cone of symmetric PSD matrices
///
/// Symmetrizes, then clamps negative eigenvalues to zero. Non-finite
/// entries cannot be repaired and yield `None`.
pub fn nearest_psd(matrix: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    if !matrix.is_square() || matrix.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let mut eigen = SymmetricEigen::new(symmetrize(matrix));
    eigen.eigenvalues.iter_mut().for_each(|l| *l = l.max(0.0));
    let v = &eigen.eigenvectors;
    let projected = v * DMatrix::from_diagonal(&eigen.eigenvalues) * v.transpose();
    Some(symmetrize(&projected))
}
