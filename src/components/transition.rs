//! Object transition model
//!
//! Propagates the state delta between frames and supplies the additive
//! process noise, scaled by the time step:
//!
//! - **Constant pose**: `x' = x`, `Q = diag(σ²)·dt`
//! - **Constant velocity**: `Δp' = Δp + dt·v`, `Δr' = log(exp(dt·ω)·exp(Δr))`,
//!   velocities decay by `velocity_factor^dt`; per axis
//!   `Q = σ²·[dt³/3, dt²/2; dt²/2, dt]` (white-noise acceleration)

use nalgebra::{DMatrix, DVector, UnitQuaternion, Vector3};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::common::linalg::psd_eigen;
use crate::config::ObjectTransitionParams;
use crate::errors::TrackerError;
use crate::state::StateLayout;

/// Kinematic model with additive Gaussian process noise
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectTransitionModel {
    layout: StateLayout,
    linear_sigma: Vector3<f64>,
    angular_sigma: Vector3<f64>,
    velocity_factor: f64,
}

impl ObjectTransitionModel {
    /// Create from validated parameters
    pub fn new(params: &ObjectTransitionParams) -> Self {
        Self {
            layout: params.model.into(),
            linear_sigma: Vector3::from(params.linear_sigma),
            angular_sigma: Vector3::from(params.angular_sigma),
            velocity_factor: params.velocity_factor,
        }
    }

    /// State layout this model propagates
    pub fn layout(&self) -> StateLayout {
        self.layout
    }

    /// State dimension
    pub fn dim(&self) -> usize {
        self.layout.dim()
    }

    fn check(&self, state: &DVector<f64>, dt: f64) -> Result<(), TrackerError> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(TrackerError::InvalidTimestep { dt });
        }
        if state.len() != self.dim() {
            return Err(TrackerError::dimension_mismatch(
                self.dim(),
                state.len(),
                "transition state",
            ));
        }
        Ok(())
    }

    /// Deterministic kinematic step (the noise-free mean of the successor)
    pub fn predict(&self, state: &DVector<f64>, dt: f64) -> Result<DVector<f64>, TrackerError> {
        self.check(state, dt)?;
        let mut next = state.clone();
        if self.layout.has_velocity() {
            let v = state.fixed_rows::<3>(6).into_owned();
            let w = state.fixed_rows::<3>(9).into_owned();
            let dr = state.fixed_rows::<3>(3).into_owned();

            let dp = state.fixed_rows::<3>(0).into_owned() + v * dt;
            let rotated = UnitQuaternion::from_scaled_axis(w * dt)
                * UnitQuaternion::from_scaled_axis(dr);
            let decay = self.velocity_factor.powf(dt);

            next.fixed_rows_mut::<3>(0).copy_from(&dp);
            next.fixed_rows_mut::<3>(3).copy_from(&rotated.scaled_axis());
            next.fixed_rows_mut::<3>(6).copy_from(&(v * decay));
            next.fixed_rows_mut::<3>(9).copy_from(&(w * decay));
        }
        Ok(next)
    }

    /// Process-noise covariance accumulated over `dt`
    pub fn process_noise(&self, dt: f64) -> Result<DMatrix<f64>, TrackerError> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(TrackerError::InvalidTimestep { dt });
        }
        let n = self.dim();
        let mut q = DMatrix::zeros(n, n);
        let sigmas = self.linear_sigma.iter().chain(self.angular_sigma.iter());

        match self.layout {
            StateLayout::Pose => {
                for (i, s) in sigmas.enumerate() {
                    q[(i, i)] = s * s * dt;
                }
            }
            StateLayout::PoseVelocity => {
                let dt2 = dt * dt;
                let dt3 = dt2 * dt;
                for (i, s) in sigmas.enumerate() {
                    let var = s * s;
                    let j = i + 6;
                    q[(i, i)] = var * dt3 / 3.0;
                    q[(i, j)] = var * dt2 / 2.0;
                    q[(j, i)] = var * dt2 / 2.0;
                    q[(j, j)] = var * dt;
                }
            }
        }
        Ok(q)
    }

    /// Draw a successor state: kinematic step plus one process-noise sample
    pub fn sample<R: Rng + ?Sized>(
        &self,
        state: &DVector<f64>,
        dt: f64,
        rng: &mut R,
    ) -> Result<DVector<f64>, TrackerError> {
        let mean = self.predict(state, dt)?;
        let q = self.process_noise(dt)?;
        let eigen = psd_eigen(&q).ok_or_else(|| TrackerError::DegenerateCovariance {
            context: "process noise".to_string(),
        })?;
        let z = DVector::from_fn(self.dim(), |i, _| {
            eigen.eigenvalues[i].sqrt() * rng.sample::<f64, _>(StandardNormal)
        });
        Ok(mean + &eigen.eigenvectors * z)
    }
}
