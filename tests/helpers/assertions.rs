//! Assertion functions for numerical comparisons with tolerance

use nalgebra::{DMatrix, Isometry3};

use robust_multisensor_tracker::common::linalg::is_positive_semidefinite;

/// Compare scalar values with tolerance
pub fn assert_scalar_close(actual: f64, expected: f64, tolerance: f64, field_name: &str) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= tolerance,
        "{}: expected {}, got {} (diff: {}, tolerance: {})",
        field_name,
        expected,
        actual,
        diff,
        tolerance
    );
}

/// Compare DMatrix element-wise with tolerance
pub fn assert_dmatrix_close(
    actual: &DMatrix<f64>,
    expected: &DMatrix<f64>,
    tolerance: f64,
    field_name: &str,
) {
    assert_eq!(
        actual.shape(),
        expected.shape(),
        "{}: shape mismatch",
        field_name
    );
    for i in 0..actual.nrows() {
        for j in 0..actual.ncols() {
            let diff = (actual[(i, j)] - expected[(i, j)]).abs();
            assert!(
                diff <= tolerance,
                "{}[{},{}]: expected {}, got {} (diff: {}, tolerance: {})",
                field_name,
                i,
                j,
                expected[(i, j)],
                actual[(i, j)],
                diff,
                tolerance
            );
        }
    }
}

/// Compare poses by translation distance and rotation angle
pub fn assert_pose_close(
    actual: &Isometry3<f64>,
    expected: &Isometry3<f64>,
    tolerance: f64,
    field_name: &str,
) {
    let dt = (actual.translation.vector - expected.translation.vector).norm();
    let dr = actual.rotation.angle_to(&expected.rotation);
    assert!(
        dt <= tolerance && dr <= tolerance,
        "{}: translation off by {}, rotation off by {} (tolerance: {})",
        field_name,
        dt,
        dr,
        tolerance
    );
}

/// Symmetric positive semi-definite within numerical tolerance
pub fn assert_psd(matrix: &DMatrix<f64>, field_name: &str) {
    assert!(
        is_positive_semidefinite(matrix),
        "{}: not symmetric PSD: {}",
        field_name,
        matrix
    );
}
