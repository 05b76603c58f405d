//! Object state and Gaussian belief
//!
//! The belief is a Gaussian over a small *delta* around a reference pose:
//!
//! ```text
//! [ Δp (3) | Δr (3) | v (3) | ω (3) ]      (velocity block only for PoseVelocity)
//! ```
//!
//! `Δp` is a world-frame translation offset, `Δr` a world-frame rotation
//! vector applied on the left of the reference orientation, `v`/`ω` the
//! linear and angular velocity. After every update the delta is folded into
//! the reference so orientation deltas stay small.

use nalgebra::{DMatrix, DVector, Isometry3, Translation3, UnitQuaternion, Vector3};

use crate::common::linalg::is_positive_semidefinite;
use crate::config::TransitionKind;
use crate::errors::TrackerError;

/// Dimension of the pose block
pub const POSE_DIM: usize = 6;

/// Which quantities the state vector carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateLayout {
    /// Pose only (6-D)
    Pose,
    /// Pose plus linear and angular velocity (12-D)
    PoseVelocity,
}

impl StateLayout {
    /// State dimension
    #[inline]
    pub fn dim(&self) -> usize {
        match self {
            StateLayout::Pose => POSE_DIM,
            StateLayout::PoseVelocity => 2 * POSE_DIM,
        }
    }

    /// Whether the state carries velocities
    #[inline]
    pub fn has_velocity(&self) -> bool {
        matches!(self, StateLayout::PoseVelocity)
    }
}

impl From<TransitionKind> for StateLayout {
    fn from(kind: TransitionKind) -> Self {
        match kind {
            TransitionKind::ConstantPose => StateLayout::Pose,
            TransitionKind::ConstantVelocity => StateLayout::PoseVelocity,
        }
    }
}

/// Compose a state delta with a reference pose
#[inline]
pub fn compose_pose(reference: &Isometry3<f64>, delta: &DVector<f64>) -> Isometry3<f64> {
    let dp = Vector3::new(delta[0], delta[1], delta[2]);
    let dr = Vector3::new(delta[3], delta[4], delta[5]);
    let rotation = UnitQuaternion::from_scaled_axis(dr) * reference.rotation;
    Isometry3::from_parts(Translation3::from(reference.translation.vector + dp), rotation)
}

/// Gaussian belief over the object state
#[derive(Debug, Clone, PartialEq)]
pub struct Belief {
    layout: StateLayout,
    reference: Isometry3<f64>,
    /// Mean delta around the reference pose
    pub mean: DVector<f64>,
    /// Covariance of the delta
    pub covariance: DMatrix<f64>,
}

impl Belief {
    /// Belief centered on `pose` (zero velocity) with the given covariance
    pub fn new(
        layout: StateLayout,
        pose: Isometry3<f64>,
        covariance: DMatrix<f64>,
    ) -> Result<Self, TrackerError> {
        Self::with_mean(layout, pose, DVector::zeros(layout.dim()), covariance)
    }

    /// Belief from an explicit mean delta
    pub fn with_mean(
        layout: StateLayout,
        reference: Isometry3<f64>,
        mean: DVector<f64>,
        covariance: DMatrix<f64>,
    ) -> Result<Self, TrackerError> {
        let n = layout.dim();
        if mean.len() != n {
            return Err(TrackerError::dimension_mismatch(n, mean.len(), "belief mean"));
        }
        if covariance.nrows() != n || covariance.ncols() != n {
            return Err(TrackerError::dimension_mismatch(
                n,
                covariance.nrows().max(covariance.ncols()),
                "belief covariance",
            ));
        }
        let belief = Self {
            layout,
            reference,
            mean,
            covariance,
        };
        belief.check()?;
        Ok(belief)
    }

    /// Belief with an isotropic diagonal covariance
    pub fn isotropic(
        layout: StateLayout,
        pose: Isometry3<f64>,
        position_std: f64,
        rotation_std: f64,
        velocity_std: f64,
    ) -> Result<Self, TrackerError> {
        let mut diag = DVector::zeros(layout.dim());
        for i in 0..3 {
            diag[i] = position_std * position_std;
            diag[3 + i] = rotation_std * rotation_std;
        }
        if layout.has_velocity() {
            for i in 6..12 {
                diag[i] = velocity_std * velocity_std;
            }
        }
        Self::new(layout, pose, DMatrix::from_diagonal(&diag))
    }

    /// Set the velocity block of the mean
    pub fn set_velocity(&mut self, linear: Vector3<f64>, angular: Vector3<f64>) {
        if self.layout.has_velocity() {
            self.mean.fixed_rows_mut::<3>(6).copy_from(&linear);
            self.mean.fixed_rows_mut::<3>(9).copy_from(&angular);
        }
    }

    /// State layout
    pub fn layout(&self) -> StateLayout {
        self.layout
    }

    /// State dimension
    pub fn dim(&self) -> usize {
        self.layout.dim()
    }

    /// Reference pose the mean delta is expressed around
    pub fn reference(&self) -> &Isometry3<f64> {
        &self.reference
    }

    /// Pose of an arbitrary state delta
    pub fn pose_of(&self, delta: &DVector<f64>) -> Isometry3<f64> {
        compose_pose(&self.reference, delta)
    }

    /// Pose at the mean
    pub fn pose(&self) -> Isometry3<f64> {
        self.pose_of(&self.mean)
    }

    /// Linear velocity at the mean, if the layout carries one
    pub fn linear_velocity(&self) -> Option<Vector3<f64>> {
        self.layout
            .has_velocity()
            .then(|| self.mean.fixed_rows::<3>(6).into_owned())
    }

    /// Angular velocity at the mean, if the layout carries one
    pub fn angular_velocity(&self) -> Option<Vector3<f64>> {
        self.layout
            .has_velocity()
            .then(|| self.mean.fixed_rows::<3>(9).into_owned())
    }

    /// Fold the pose delta into the reference, leaving velocities in place
    pub fn recenter(&mut self) {
        self.reference = self.pose();
        self.mean.rows_mut(0, POSE_DIM).fill(0.0);
    }

    /// Finite mean and symmetric PSD covariance
    pub fn is_well_defined(&self) -> bool {
        self.mean.iter().all(|v| v.is_finite()) && is_positive_semidefinite(&self.covariance)
    }

    pub(crate) fn check(&self) -> Result<(), TrackerError> {
        if !self.mean.iter().all(|v| v.is_finite()) {
            return Err(TrackerError::DegenerateCovariance {
                context: "belief mean is not finite".to_string(),
            });
        }
        if !is_positive_semidefinite(&self.covariance) {
            return Err(TrackerError::DegenerateCovariance {
                context: "belief covariance".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pose() -> Isometry3<f64> {
        Isometry3::new(Vector3::new(0.1, 0.2, 1.0), Vector3::new(0.0, 0.3, 0.0))
    }

    #[test]
    fn test_layout_dims() {
        assert_eq!(StateLayout::Pose.dim(), 6);
        assert_eq!(StateLayout::PoseVelocity.dim(), 12);
        assert_eq!(
            StateLayout::from(TransitionKind::ConstantPose),
            StateLayout::Pose
        );
    }

    #[test]
    fn test_zero_delta_is_reference() {
        let belief = Belief::isotropic(StateLayout::Pose, pose(), 0.01, 0.01, 0.0).unwrap();
        let p = belief.pose();
        assert!((p.translation.vector - pose().translation.vector).norm() < 1e-12);
        assert!(p.rotation.angle_to(&pose().rotation) < 1e-12);
        assert!(belief.linear_velocity().is_none());
        assert!(belief.is_well_defined());
    }

    #[test]
    fn test_recenter_preserves_pose_and_velocity() {
        let mut belief =
            Belief::isotropic(StateLayout::PoseVelocity, pose(), 0.01, 0.01, 0.1).unwrap();
        belief.mean[0] = 0.05;
        belief.mean[5] = 0.2;
        belief.set_velocity(Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 0.5));
        let before = belief.pose();

        belief.recenter();
        let after = belief.pose();
        assert!((after.translation.vector - before.translation.vector).norm() < 1e-12);
        assert!(after.rotation.angle_to(&before.rotation) < 1e-12);
        assert!(belief.mean.rows(0, POSE_DIM).iter().all(|&v| v == 0.0));
        assert_eq!(belief.linear_velocity().unwrap().x, 1.0);
        assert_eq!(belief.angular_velocity().unwrap().z, 0.5);
    }

    #[test]
    fn test_rejects_bad_covariance() {
        let mut cov = DMatrix::identity(6, 6);
        cov[(0, 0)] = -1.0;
        let err = Belief::new(StateLayout::Pose, pose(), cov).unwrap_err();
        assert!(matches!(err, TrackerError::DegenerateCovariance { .. }));

        let err = Belief::new(StateLayout::Pose, pose(), DMatrix::identity(12, 12)).unwrap_err();
        assert!(matches!(err, TrackerError::DimensionMismatch { .. }));
    }
}
