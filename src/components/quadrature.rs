//! Unscented quadrature
//!
//! Deterministic sigma-point rule used for both prediction and update.
//! For an `n`-dimensional Gaussian the rule places `2n + 1` points:
//!
//! ```text
//! χ₀       = μ
//! χᵢ       = μ + sᵢ·vᵢ      sᵢ = sqrt(c·λᵢ),  i = 1..n
//! χᵢ₊ₙ     = μ − sᵢ·vᵢ
//! ```
//!
//! where `(λᵢ, vᵢ)` are the eigenpairs of `Σ` in ascending eigenvalue order
//! and `c = α²n`. Weights follow the scaled unscented transform with
//! `κ = 0`, `β = 2`:
//!
//! ```text
//! wm₀ = (c − n)/c,  wc₀ = wm₀ + 1 − α² + β,  wmᵢ = wcᵢ = 1/(2c)
//! ```
//!
//! Prediction collapses transformed points back to a Gaussian with these
//! weights ([`UnscentedQuadrature::reconstruct`]). Conditioning on a
//! log-likelihood ([`UnscentedQuadrature::condition`]) does not reweight the
//! points. It reads a gradient and a curvature off each `(χᵢ₊ₙ, χ₀, χᵢ)`
//! triple and applies the matching Gaussian correction per axis:
//!
//! ```text
//! gᵢ  = (ℓ(χᵢ) − ℓ(χᵢ₊ₙ)) / 2sᵢ
//! hᵢ  = max(0, (2ℓ(χ₀) − ℓ(χᵢ) − ℓ(χᵢ₊ₙ)) / sᵢ²)
//! λᵢ' = λᵢ / (1 + λᵢ·hᵢ)
//! μ'  = μ + Σ clamp(λᵢ'·gᵢ, −sᵢ, sᵢ)·vᵢ
//! Σ'  = Σ λᵢ'·vᵢvᵢᵀ
//! ```
//!
//! The correction is exact for a log-likelihood that is quadratic with no
//! cross terms between axes, never grows the covariance, and keeps the mean
//! inside the sampled box whatever `α` is.
//!
//! The rule is a pure function of `(μ, Σ, α)`: no hidden state, same
//! points in the same order on every call.

use nalgebra::{DMatrix, DVector};

use crate::common::linalg::{nearest_psd, psd_eigen, symmetrize};
use crate::errors::TrackerError;

/// Prior-knowledge parameter of the scaled unscented transform
pub const UT_BETA: f64 = 2.0;

/// One principal axis of the covariance the points were drawn from
#[derive(Debug, Clone, PartialEq)]
pub struct SigmaAxis {
    /// Unit eigenvector
    pub direction: DVector<f64>,
    /// Eigenvalue (variance along `direction`)
    pub variance: f64,
    /// Distance of the `±` points from the center
    pub spread: f64,
}

/// Weighted sigma points of one Gaussian
#[derive(Debug, Clone, PartialEq)]
pub struct SigmaPoints {
    /// Points in generation order: center, `+` directions, `−` directions
    pub points: Vec<DVector<f64>>,
    /// Weights for the mean
    pub mean_weights: Vec<f64>,
    /// Weights for the covariance
    pub covariance_weights: Vec<f64>,
    /// Axes in point order; axis `i` produced points `1 + i` and `1 + n + i`
    pub axes: Vec<SigmaAxis>,
}

impl SigmaPoints {
    /// Number of points
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the set is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// State dimension
    #[inline]
    pub fn dim(&self) -> usize {
        self.points.first().map_or(0, |p| p.len())
    }

    /// Center point (the mean)
    #[inline]
    pub fn center(&self) -> &DVector<f64> {
        &self.points[0]
    }

    /// `(mean weight, point)` pairs in order
    pub fn iter(&self) -> impl Iterator<Item = (f64, &DVector<f64>)> {
        self.mean_weights.iter().copied().zip(self.points.iter())
    }
}

/// Scaled unscented rule with spread `α`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnscentedQuadrature {
    alpha: f64,
}

impl UnscentedQuadrature {
    /// Create the rule; `alpha` must be finite and positive
    pub fn new(alpha: f64) -> Result<Self, TrackerError> {
        if !(alpha.is_finite() && alpha > 0.0) {
            return Err(TrackerError::invalid_parameter(
                "ut_alpha",
                format!("must be > 0, got {}", alpha),
            ));
        }
        Ok(Self { alpha })
    }

    /// Spread parameter
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Number of points for dimension `n`
    #[inline]
    pub fn point_count(n: usize) -> usize {
        2 * n + 1
    }

    /// Mean and covariance weights for dimension `n`
    pub fn weights(&self, n: usize) -> (Vec<f64>, Vec<f64>) {
        let a2 = self.alpha * self.alpha;
        let c = a2 * n as f64;
        let lambda = c - n as f64;
        let count = Self::point_count(n);

        let mut wm = vec![0.5 / c; count];
        wm[0] = lambda / c;
        let mut wc = wm.clone();
        wc[0] = wm[0] + (1.0 - a2 + UT_BETA);
        (wm, wc)
    }

    /// Sigma points of `N(mean, covariance)`
    ///
    /// Fails with `DegenerateCovariance` if the covariance is not finite,
    /// not symmetric, or has a clearly negative eigenvalue.
    pub fn sigma_points(
        &self,
        mean: &DVector<f64>,
        covariance: &DMatrix<f64>,
    ) -> Result<SigmaPoints, TrackerError> {
        let n = mean.len();
        if n == 0 {
            return Err(TrackerError::dimension_mismatch(1, 0, "sigma point mean"));
        }
        if covariance.nrows() != n || covariance.ncols() != n {
            return Err(TrackerError::dimension_mismatch(
                n,
                covariance.nrows(),
                "sigma point covariance",
            ));
        }
        if mean.iter().any(|v| !v.is_finite()) {
            return Err(TrackerError::DegenerateCovariance {
                context: "sigma point mean is not finite".to_string(),
            });
        }
        let eigen = psd_eigen(covariance).ok_or_else(|| TrackerError::DegenerateCovariance {
            context: "sigma point covariance".to_string(),
        })?;

        // Ascending eigenvalue order keeps the point order independent of
        // the decomposition's internal ordering
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| eigen.eigenvalues[a].total_cmp(&eigen.eigenvalues[b]));

        let c = self.alpha * self.alpha * n as f64;
        let axes: Vec<SigmaAxis> = order
            .iter()
            .map(|&j| {
                let variance = eigen.eigenvalues[j];
                SigmaAxis {
                    direction: eigen.eigenvectors.column(j).into_owned(),
                    variance,
                    spread: (c * variance).sqrt(),
                }
            })
            .collect();

        let mut points = Vec::with_capacity(Self::point_count(n));
        points.push(mean.clone());
        points.extend(axes.iter().map(|a| mean + &a.direction * a.spread));
        points.extend(axes.iter().map(|a| mean - &a.direction * a.spread));

        let (mean_weights, covariance_weights) = self.weights(n);
        Ok(SigmaPoints {
            points,
            mean_weights,
            covariance_weights,
            axes,
        })
    }

    /// Gaussian moments of transformed points, projected onto the PSD cone
    pub fn reconstruct(
        &self,
        sigma: &SigmaPoints,
        transformed: &[DVector<f64>],
    ) -> Result<(DVector<f64>, DMatrix<f64>), TrackerError> {
        if transformed.len() != sigma.len() {
            return Err(TrackerError::dimension_mismatch(
                sigma.len(),
                transformed.len(),
                "transformed sigma points",
            ));
        }
        let dim = transformed.first().map_or(0, |p| p.len());

        let mut mean = DVector::zeros(dim);
        for (w, x) in sigma.mean_weights.iter().zip(transformed) {
            mean += x * *w;
        }

        let mut covariance = DMatrix::zeros(dim, dim);
        for (w, x) in sigma.covariance_weights.iter().zip(transformed) {
            let d = x - &mean;
            covariance += &d * d.transpose() * *w;
        }

        let covariance = nearest_psd(&covariance).ok_or_else(|| {
            TrackerError::DegenerateCovariance {
                context: "reconstructed covariance is not finite".to_string(),
            }
        })?;
        Ok((mean, covariance))
    }

    /// Gaussian posterior of the points' source given a log-likelihood at
    /// every point
    ///
    /// `log_likelihoods` are in point order and must be finite; constant
    /// offsets do not matter. Axes with zero variance are left untouched.
    pub fn condition(
        &self,
        sigma: &SigmaPoints,
        log_likelihoods: &[f64],
    ) -> Result<(DVector<f64>, DMatrix<f64>), TrackerError> {
        if log_likelihoods.len() != sigma.len() {
            return Err(TrackerError::dimension_mismatch(
                sigma.len(),
                log_likelihoods.len(),
                "sigma point scores",
            ));
        }
        if log_likelihoods.iter().any(|l| !l.is_finite()) {
            return Err(TrackerError::DegenerateCovariance {
                context: "log-likelihood is not finite".to_string(),
            });
        }

        let n = sigma.axes.len();
        let center = log_likelihoods[0];
        let mut mean = sigma.center().clone();
        let mut covariance = DMatrix::zeros(n, n);

        for (i, axis) in sigma.axes.iter().enumerate() {
            let v = &axis.direction;
            if axis.spread <= 0.0 || axis.variance <= 0.0 {
                covariance += v * v.transpose() * axis.variance.max(0.0);
                continue;
            }
            let (plus, minus) = (log_likelihoods[1 + i], log_likelihoods[1 + n + i]);
            let s = axis.spread;

            let gradient = (plus - minus) / (2.0 * s);
            let curvature = ((2.0 * center - plus - minus) / (s * s)).max(0.0);
            let variance = axis.variance / (1.0 + axis.variance * curvature);
            let shift = (variance * gradient).clamp(-s, s);

            mean += v * shift;
            covariance += v * v.transpose() * variance;
        }

        let covariance = symmetrize(&covariance);
        if mean.iter().any(|m| !m.is_finite()) || covariance.iter().any(|c| !c.is_finite()) {
            return Err(TrackerError::DegenerateCovariance {
                context: "conditioned belief is not finite".to_string(),
            });
        }
        Ok((mean, covariance))
    }

    /// Push `N(mean, covariance)` through `f` and collapse back to a Gaussian
    pub fn unscented_transform<F>(
        &self,
        mean: &DVector<f64>,
        covariance: &DMatrix<f64>,
        f: F,
    ) -> Result<(DVector<f64>, DMatrix<f64>), TrackerError>
    where
        F: Fn(&DVector<f64>) -> Result<DVector<f64>, TrackerError>,
    {
        let sigma = self.sigma_points(mean, covariance)?;
        let transformed = sigma
            .points
            .iter()
            .map(f)
            .collect::<Result<Vec<_>, _>>()?;
        self.reconstruct(&sigma, &transformed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::linalg::is_positive_semidefinite;

    fn gaussian() -> (DVector<f64>, DMatrix<f64>) {
        let mean = DVector::from_vec(vec![1.0, -2.0, 0.5]);
        let cov = DMatrix::from_row_slice(3, 3, &[2.0, 0.3, 0.1, 0.3, 1.0, 0.2, 0.1, 0.2, 0.5]);
        (mean, cov)
    }

    #[test]
    fn test_weights_sum_to_one() {
        for alpha in [0.1, 0.5, 1.0, 2.0] {
            let ut = UnscentedQuadrature::new(alpha).unwrap();
            let (wm, wc) = ut.weights(6);
            assert_eq!(wm.len(), 13);
            assert!((wm.iter().sum::<f64>() - 1.0).abs() < 1e-10);
            assert!((wc[0] - wm[0] - (1.0 - alpha * alpha + UT_BETA)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_alpha_one_has_zero_center_weight() {
        let ut = UnscentedQuadrature::new(1.0).unwrap();
        let (wm, _) = ut.weights(4);
        assert_eq!(wm[0], 0.0);
    }

    #[test]
    fn test_sigma_points_deterministic_and_ordered() {
        let (mean, cov) = gaussian();
        let ut = UnscentedQuadrature::new(0.7).unwrap();
        let a = ut.sigma_points(&mean, &cov).unwrap();
        let b = ut.sigma_points(&mean, &cov).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 7);
        assert_eq!(a.points[0], mean);
        for i in 1..=3 {
            let mirrored = &a.points[i] + &a.points[i + 3];
            assert!((mirrored - &mean * 2.0).norm() < 1e-12);
        }
    }

    #[test]
    fn test_identity_transform_recovers_moments() {
        let (mean, cov) = gaussian();
        for alpha in [0.3, 1.0, 1.5] {
            let ut = UnscentedQuadrature::new(alpha).unwrap();
            let (m, p) = ut.unscented_transform(&mean, &cov, |x| Ok(x.clone())).unwrap();
            assert!((m - &mean).norm() < 1e-10);
            // wc₀ adds (1 − α² + β)·0 at the center, so the covariance is exact
            assert!((p - &cov).norm() < 1e-10);
        }
    }

    #[test]
    fn test_linear_transform_is_exact() {
        let (mean, cov) = gaussian();
        let a = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 0.0, 0.0, -1.0, 3.0]);
        let ut = UnscentedQuadrature::new(1.0).unwrap();
        let (m, p) = ut.unscented_transform(&mean, &cov, |x| Ok(&a * x)).unwrap();
        assert!((m - &a * &mean).norm() < 1e-10);
        assert!((p - &a * &cov * a.transpose()).norm() < 1e-10);
    }

    #[test]
    fn test_zero_covariance_is_allowed() {
        let mean = DVector::from_vec(vec![1.0, 2.0]);
        let ut = UnscentedQuadrature::new(1.0).unwrap();
        let sigma = ut.sigma_points(&mean, &DMatrix::zeros(2, 2)).unwrap();
        assert!(sigma.points.iter().all(|p| p == &mean));
    }

    #[test]
    fn test_rejects_degenerate_covariance() {
        let ut = UnscentedQuadrature::new(1.0).unwrap();
        let mean = DVector::zeros(2);
        let indefinite = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]);
        assert!(matches!(
            ut.sigma_points(&mean, &indefinite),
            Err(TrackerError::DegenerateCovariance { .. })
        ));
        let asymmetric = DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.0, 1.0]);
        assert!(ut.sigma_points(&mean, &asymmetric).is_err());
        assert!(matches!(
            ut.sigma_points(&mean, &DMatrix::identity(3, 3)),
            Err(TrackerError::DimensionMismatch { .. })
        ));
    }

    fn scores(sigma: &SigmaPoints, f: impl Fn(&DVector<f64>) -> f64) -> Vec<f64> {
        sigma.points.iter().map(f).collect()
    }

    #[test]
    fn test_condition_is_exact_for_gaussian_likelihood() {
        // prior N(0, 0.01·I), likelihood N(x₀; 0.05, 0.01): posterior N(0.025, 0.005)
        let mean = DVector::zeros(3);
        let cov = DMatrix::identity(3, 3) * 0.01;
        for alpha in [0.2, 0.3, 0.5, 1.0, 2.0] {
            let ut = UnscentedQuadrature::new(alpha).unwrap();
            let sigma = ut.sigma_points(&mean, &cov).unwrap();
            let ll = scores(&sigma, |x| -0.5 * (x[0] - 0.05).powi(2) / 0.01);
            let (m, p) = ut.condition(&sigma, &ll).unwrap();
            assert!((m[0] - 0.025).abs() < 1e-10, "alpha={} x={}", alpha, m[0]);
            assert!((p[(0, 0)] - 0.005).abs() < 1e-10, "alpha={} var={}", alpha, p[(0, 0)]);
            assert!((p[(1, 1)] - 0.01).abs() < 1e-12);
            assert!(m[1].abs() < 1e-12 && m[2].abs() < 1e-12);
        }
    }

    #[test]
    fn test_condition_on_correlated_prior() {
        let (mean, cov) = gaussian();
        let ut = UnscentedQuadrature::new(0.7).unwrap();
        let sigma = ut.sigma_points(&mean, &cov).unwrap();
        // isotropic quadratic: no cross terms in any basis
        let target = DVector::from_vec(vec![1.5, -1.0, 0.0]);
        let ll = scores(&sigma, |x| -0.5 * (x - &target).norm_squared() / 0.5);
        let (m, p) = ut.condition(&sigma, &ll).unwrap();

        let prior_info = cov.clone().try_inverse().unwrap();
        let post_info = &prior_info + DMatrix::identity(3, 3) * 2.0;
        let expected_cov = post_info.clone().try_inverse().unwrap();
        let expected_mean = &expected_cov * (&prior_info * &mean + &target * 2.0);
        assert!((m - expected_mean).norm() < 1e-9);
        assert!((p - expected_cov).norm() < 1e-9);
    }

    #[test]
    fn test_condition_on_constant_keeps_prior() {
        let (mean, cov) = gaussian();
        let ut = UnscentedQuadrature::new(1.0).unwrap();
        let sigma = ut.sigma_points(&mean, &cov).unwrap();
        let (m, p) = ut.condition(&sigma, &vec![-7.0; sigma.len()]).unwrap();
        assert!((m - &mean).norm() < 1e-12);
        assert!((p - &cov).norm() < 1e-10);
    }

    #[test]
    fn test_condition_step_stays_inside_spread() {
        let mean = DVector::zeros(2);
        let cov = DMatrix::identity(2, 2);
        let ut = UnscentedQuadrature::new(0.1).unwrap();
        let sigma = ut.sigma_points(&mean, &cov).unwrap();
        // steep linear evidence with no curvature
        let ll = scores(&sigma, |x| 1e6 * x[0]);
        let (m, p) = ut.condition(&sigma, &ll).unwrap();
        let spread = sigma.axes.iter().map(|a| a.spread).fold(0.0, f64::max);
        assert!(m.norm() <= spread * (1.0 + 1e-12));
        assert!(m.norm() > 0.0);
        assert!(is_positive_semidefinite(&p));
        assert!(is_positive_semidefinite(&(&cov - &p)));
    }

    #[test]
    fn test_condition_rejects_bad_scores() {
        let ut = UnscentedQuadrature::new(1.0).unwrap();
        let sigma = ut
            .sigma_points(&DVector::zeros(1), &DMatrix::identity(1, 1))
            .unwrap();
        assert!(matches!(
            ut.condition(&sigma, &[0.0, 1.0]),
            Err(TrackerError::DimensionMismatch { .. })
        ));
        assert!(ut.condition(&sigma, &[0.0, f64::NAN, 1.0]).is_err());
    }

    #[test]
    fn test_invalid_alpha() {
        assert!(UnscentedQuadrature::new(0.0).is_err());
        assert!(UnscentedQuadrature::new(f64::NAN).is_err());
    }
}
