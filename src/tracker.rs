//! Per-frame tracking loop
//!
//! [`ObjectTracker`] owns a filter and runs one predict + update per
//! time-aligned multi-sensor frame. Frames must arrive in time order.

use std::sync::Arc;

use nalgebra::{DMatrix, Isometry3, Vector3};

use crate::builder::TrackerBuilder;
use crate::camera::CameraData;
use crate::config::TrackerParams;
use crate::depth::DepthImage;
use crate::errors::TrackerError;
use crate::filter::{Filter, FilterState, RobustGaussianFilter};
use crate::observation::{ObservationBackend, ObservationModel};
use crate::reporter::{NoOpReporter, StepReporter};
use crate::state::Belief;

/// Linear and angular velocity of the object
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Twist {
    /// Linear velocity (world frame)
    pub linear: Vector3<f64>,
    /// Angular velocity (world frame, rotation vector per second)
    pub angular: Vector3<f64>,
}

/// Estimate after one frame
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerOutput {
    /// Mean object pose (world from object)
    pub pose: Isometry3<f64>,
    /// Mean velocity, if the state carries one
    pub velocity: Option<Twist>,
    /// Covariance of the state delta around `pose`
    pub covariance: DMatrix<f64>,
}

impl TrackerOutput {
    fn from_belief(belief: &Belief) -> Self {
        let velocity = belief
            .linear_velocity()
            .zip(belief.angular_velocity())
            .map(|(linear, angular)| Twist { linear, angular });
        Self {
            pose: belief.pose(),
            velocity,
            covariance: belief.covariance.clone(),
        }
    }
}

/// Single-object tracker driving a [`RobustGaussianFilter`]
#[derive(Debug)]
pub struct ObjectTracker<O: ObservationModel = ObservationBackend, R: StepReporter = NoOpReporter> {
    filter: RobustGaussianFilter<O, R>,
    initial_covariance: DMatrix<f64>,
    frames: usize,
}

impl ObjectTracker {
    /// Build a filter from parameters with the default loader and start tracking
    pub fn from_params(
        params: &TrackerParams,
        cameras: &[Arc<CameraData>],
        initial: Belief,
    ) -> Result<Self, TrackerError> {
        Self::new(TrackerBuilder::new().build(params, cameras)?, initial)
    }
}

impl<O: ObservationModel, R: StepReporter> ObjectTracker<O, R> {
    /// Initialize `filter` with `initial`; its covariance is reused by [`reset`](Self::reset)
    pub fn new(mut filter: RobustGaussianFilter<O, R>, initial: Belief) -> Result<Self, TrackerError> {
        let initial_covariance = initial.covariance.clone();
        filter.initialize(initial)?;
        Ok(Self {
            filter,
            initial_covariance,
            frames: 0,
        })
    }

    /// Predict by `dt`, then fuse one frame per sensor
    ///
    /// A per-frame error leaves the estimate as it was before the call.
    /// After a fault every call fails until [`reset`](Self::reset).
    pub fn track(
        &mut self,
        observations: &[DepthImage],
        dt: f64,
    ) -> Result<TrackerOutput, TrackerError> {
        let before = self.filter.belief().cloned();
        if let Err(e) = self.filter.step(observations, dt) {
            // undo the prediction if the update was rejected
            if self.filter.state() == FilterState::Ready {
                if let Some(belief) = before {
                    self.filter.initialize(belief)?;
                }
            }
            return Err(e);
        }
        self.frames += 1;
        self.output()
    }

    /// Current estimate
    pub fn output(&self) -> Result<TrackerOutput, TrackerError> {
        match self.filter.state() {
            FilterState::Uninitialized => Err(TrackerError::NotInitialized),
            FilterState::Faulted => Err(TrackerError::Faulted),
            FilterState::Ready => self
                .filter
                .belief()
                .map(TrackerOutput::from_belief)
                .ok_or(TrackerError::NotInitialized),
        }
    }

    /// Restart at `initial_pose` with zero velocity and the initial covariance
    pub fn reset(&mut self, initial_pose: Isometry3<f64>) -> Result<(), TrackerError> {
        let belief = Belief::new(self.filter.layout(), initial_pose, self.initial_covariance.clone())?;
        self.filter.initialize(belief)?;
        self.frames = 0;
        log::debug!("Tracker reset");
        Ok(())
    }

    /// Frames fused since construction or the last reset
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Underlying filter
    pub fn filter(&self) -> &RobustGaussianFilter<O, R> {
        &self.filter
    }

    /// Mutable access to the underlying filter
    pub fn filter_mut(&mut self) -> &mut RobustGaussianFilter<O, R> {
        &mut self.filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Intrinsics;
    use crate::components::{ObjectTransitionModel, UnscentedQuadrature};
    use crate::config::{ObjectTransitionParams, ObservationParams};
    use crate::object::ObjectModel;
    use crate::observation::{CpuObservationModel, PixelMixture};
    use crate::state::StateLayout;

    fn tracker() -> ObjectTracker<CpuObservationModel> {
        let camera = Arc::new(CameraData::new(Intrinsics::new(20.0, 20.0, 3.5, 2.5), 8, 6).unwrap());
        let mixture = PixelMixture::new(&ObservationParams {
            fg_noise_std: 0.02,
            ..ObservationParams::default()
        });
        let model = CpuObservationModel::new(mixture, Arc::new(ObjectModel::square(5.0)), &[camera]);
        let filter = RobustGaussianFilter::new(
            ObjectTransitionModel::new(&ObjectTransitionParams::default()),
            UnscentedQuadrature::new(1.0).unwrap(),
            model,
            1.0,
        )
        .unwrap();
        let initial = Belief::isotropic(
            StateLayout::PoseVelocity,
            Isometry3::translation(0.0, 0.0, 1.0),
            0.01,
            0.01,
            0.01,
        )
        .unwrap();
        ObjectTracker::new(filter, initial).unwrap()
    }

    #[test]
    fn test_track_reports_pose_and_velocity() {
        let mut t = tracker();
        let frame = t
            .filter()
            .observation_model()
            .render(0, &Isometry3::translation(0.0, 0.0, 1.0))
            .unwrap();
        let out = t.track(&[frame], 0.033).unwrap();
        assert!((out.pose.translation.vector.z - 1.0).abs() < 0.01);
        assert!(out.velocity.is_some());
        assert_eq!(out.covariance.nrows(), 12);
        assert_eq!(t.frames(), 1);
    }

    #[test]
    fn test_rejected_frame_keeps_estimate() {
        let mut t = tracker();
        let before = t.output().unwrap();
        assert!(t.track(&[DepthImage::invalid(3, 3)], 0.033).is_err());
        assert_eq!(t.output().unwrap(), before);
        assert!(t.track(&[DepthImage::invalid(8, 6)], -1.0).is_err());
        assert_eq!(t.output().unwrap(), before);
        assert_eq!(t.frames(), 0);
    }

    #[test]
    fn test_reset_restores_initial_covariance() {
        let mut t = tracker();
        let initial = t.output().unwrap().covariance;
        t.track(&[DepthImage::invalid(8, 6)], 0.1).unwrap();
        assert_ne!(t.output().unwrap().covariance, initial);

        let pose = Isometry3::translation(0.1, 0.0, 1.2);
        t.reset(pose).unwrap();
        let out = t.output().unwrap();
        assert!((out.pose.translation.vector - pose.translation.vector).norm() < 1e-12);
        assert!(out.pose.rotation.angle_to(&pose.rotation) < 1e-12);
        assert_eq!(out.covariance, initial);
        assert_eq!(t.frames(), 0);
    }
}
