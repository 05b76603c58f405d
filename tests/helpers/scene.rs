//! A large plane one meter in front of small symmetric depth cameras
//!
//! The plane fills the whole field of view, and the pixel grid is symmetric
//! about the principal point, so opposite sigma points of a diagonal prior
//! render mirrored images.

use std::sync::Arc;

use nalgebra::{DMatrix, DVector, Isometry3};

use robust_multisensor_tracker::{
    Belief, CameraData, DepthImage, InMemoryModelLoader, Intrinsics, ObjectModel,
    ObjectResourceIdentifier, ObjectTransitionParams, ObservationParams, RigidBodyRenderer,
    StateLayout, TrackerBuilder, TrackerParams,
};

pub const WIDTH: usize = 8;
pub const HEIGHT: usize = 6;
pub const FG_NOISE_STD: f64 = 0.055;
pub const POSITION_STD: f64 = 0.01;
pub const ROTATION_STD: f64 = 0.01;
pub const VELOCITY_STD: f64 = 0.01;

pub fn camera() -> Arc<CameraData> {
    Arc::new(
        CameraData::new(
            Intrinsics::new(20.0, 20.0, (WIDTH as f64 - 1.0) / 2.0, (HEIGHT as f64 - 1.0) / 2.0),
            WIDTH,
            HEIGHT,
        )
        .unwrap(),
    )
}

pub fn plane() -> ObjectModel {
    ObjectModel::square(5.0)
}

pub fn ori() -> ObjectResourceIdentifier {
    ObjectResourceIdentifier::new("/objects", "plane", vec!["square".to_string()])
}

pub fn loader() -> InMemoryModelLoader {
    InMemoryModelLoader::new().with_model("plane", &plane())
}

pub fn observation_params(sensors: usize) -> ObservationParams {
    ObservationParams {
        bg_depth: 3.0,
        fg_noise_std: FG_NOISE_STD,
        bg_noise_std: 0.1,
        tail_weight: 0.05,
        uniform_tail_min: 0.0,
        uniform_tail_max: 5.0,
        sensors,
        ..ObservationParams::default()
    }
}

pub fn params(sensors: usize, transition: ObjectTransitionParams) -> TrackerParams {
    TrackerParams::builder()
        .ut_alpha(1.0)
        .update_rate(1.0)
        .observation(observation_params(sensors))
        .object_transition(transition)
        .ori(ori())
        .build()
        .unwrap()
}

pub fn builder() -> TrackerBuilder {
    TrackerBuilder::new().with_loader(loader())
}

/// Object pose used as ground truth
pub fn truth() -> Isometry3<f64> {
    Isometry3::translation(0.0, 0.0, 1.0)
}

/// Diagonal prior centered on `pose`
pub fn prior(layout: StateLayout, pose: Isometry3<f64>) -> Belief {
    let mut diag = DVector::zeros(layout.dim());
    for i in 0..3 {
        diag[i] = POSITION_STD * POSITION_STD;
        diag[3 + i] = ROTATION_STD * ROTATION_STD;
    }
    for i in 6..layout.dim() {
        diag[i] = VELOCITY_STD * VELOCITY_STD;
    }
    Belief::new(layout, pose, DMatrix::from_diagonal(&diag)).unwrap()
}

/// Noise-free depth frame of the plane at `pose`
pub fn render(pose: &Isometry3<f64>) -> DepthImage {
    RigidBodyRenderer::new(Arc::new(plane()), camera()).render(pose)
}
