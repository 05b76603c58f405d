/*!
# Robust multi-sensor rigid-object tracker

6-DoF pose tracking of a known rigid object from one or more depth cameras.

A Gaussian belief over the object pose (and optionally its velocity) is
propagated with an unscented sigma-point rule. Every sigma point is rendered
into each camera and compared with the observed depth image under a robust
per-pixel mixture (foreground Gaussian, background Gaussian, uniform
outlier), so occlusions, dropouts and clutter cannot dominate the posterior.

## Features

- Constant-pose and damped constant-velocity transition models
- Robust render-and-compare likelihood fused additively across sensors
- CPU rasterizer backend, parallel with the `rayon` feature
- wgpu compute backend with the `gpu` feature
- Explicit lifecycle with fault state on covariance breakdown

## Modules

- [`config`] - Parameter bundle, validation, JSON loading
- [`builder`] - Assembles a filter from parameters and camera data
- [`filter`] - Recursive estimator and its state machine
- [`tracker`] - Per-frame predict + update loop
- [`observation`] - Pixel mixture and backends
- [`components`] - Transition model and quadrature rule
- [`object`], [`render`], [`camera`], [`depth`] - Scene inputs
- [`common`] - Low-level utilities

## Example

```rust,no_run
use std::sync::Arc;

use nalgebra::Isometry3;
use robust_multisensor_tracker::{
    Belief, CameraData, DepthImage, Intrinsics, ObjectResourceIdentifier, ObjectTracker,
    StateLayout, TrackerParams,
};

let params = TrackerParams::builder()
    .ori(ObjectResourceIdentifier::new("/data/objects", "box", vec!["box.obj".into()]))
    .build()
    .unwrap();
let camera = Arc::new(
    CameraData::new(Intrinsics::new(525.0, 525.0, 319.5, 239.5), 640, 480)
        .unwrap()
        .with_downsampling(4)
        .unwrap(),
);
let initial = Belief::isotropic(
    StateLayout::PoseVelocity,
    Isometry3::translation(0.0, 0.0, 1.0),
    0.01,
    0.05,
    0.01,
)
.unwrap();

let mut tracker = ObjectTracker::from_params(&params, &[camera], initial).unwrap();
let frame = DepthImage::invalid(160, 120);
let estimate = tracker.track(&[frame], 1.0 / 30.0).unwrap();
println!("{}", estimate.pose);
```
*/

// ============================================================================
// Core modules
// ============================================================================

/// Error taxonomy
pub mod errors;

/// Parameter bundle and defaults
pub mod config;

/// State layout and Gaussian belief
pub mod state;

/// Camera calibration
pub mod camera;

/// Depth images
pub mod depth;

/// Object resources, meshes and loaders
pub mod object;

/// CPU depth rendering
pub mod render;

/// Shared components (transition, quadrature)
pub mod components;

/// Robust observation model and backends
pub mod observation;

/// Filter trait and implementation
pub mod filter;

/// Observability hooks
pub mod reporter;

/// Filter assembly
pub mod builder;

/// Per-frame tracking loop
pub mod tracker;

/// Low-level utilities (linear algebra, RNG)
pub mod common;

// ============================================================================
// Re-exports for convenience
// ============================================================================

// Errors
pub use errors::TrackerError;

// Configuration
pub use config::{
    Backend, ObjectTransitionParams, ObservationParams, TrackerParams, TrackerParamsBuilder,
    TransitionKind,
};

// Scene inputs
pub use camera::{CameraData, Intrinsics};
pub use depth::DepthImage;
pub use object::{
    InMemoryModelLoader, MeshPart, ObjMeshLoader, ObjectModel, ObjectModelLoader,
    ObjectResourceIdentifier,
};
pub use render::RigidBodyRenderer;

// State
pub use state::{Belief, StateLayout};

// Components
pub use components::{ObjectTransitionModel, SigmaPoints, UnscentedQuadrature};

// Observation
#[cfg(feature = "gpu")]
pub use observation::GpuObservationModel;
pub use observation::{
    CpuObservationModel, ObservationBackend, ObservationModel, PixelMixture, PoseScore,
};

// Filter
pub use builder::{build, TrackerBuilder};
pub use filter::{Filter, FilterState, RobustGaussianFilter};
pub use tracker::{ObjectTracker, TrackerOutput, Twist};

// Reporters
pub use reporter::{CompositeReporter, DebugReporter, LoggingReporter, NoOpReporter, StepReporter};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
