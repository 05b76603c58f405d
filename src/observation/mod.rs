//! Robust multi-sensor observation model
//!
//! An observation model scores pose hypotheses against one depth frame per
//! sensor. Sensors are assumed independent, so per-sensor log-likelihoods
//! add up.
//!
//! - [`mixture`] - per-pixel foreground/background/outlier mixture
//! - [`cpu`] - z-buffer rasterizer backend (always available)
//! - `gpu` - wgpu compute backend (`gpu` feature)
//!
//! The backend is chosen once by the builder; [`ObservationBackend`] is the
//! closed set of variants the filter dispatches over.

pub mod cpu;
#[cfg(feature = "gpu")]
pub mod gpu;
pub mod mixture;

use nalgebra::Isometry3;
use smallvec::SmallVec;

use crate::camera::CameraData;
use crate::config::Backend;
use crate::depth::DepthImage;
use crate::errors::TrackerError;

pub use cpu::CpuObservationModel;
#[cfg(feature = "gpu")]
pub use gpu::GpuObservationModel;
pub use mixture::{PixelMixture, MIN_NOISE_STD};

/// Per-sensor log-likelihoods (SmallVec avoids heap for typical 1-4 sensors)
pub type SensorScores = SmallVec<[f64; 4]>;

/// Log-likelihood of one pose hypothesis
#[derive(Debug, Clone, PartialEq)]
pub struct PoseScore {
    /// Sum over sensors
    pub total: f64,
    /// Contribution of each sensor, in sensor order
    pub per_sensor: SensorScores,
}

impl PoseScore {
    /// Sum per-sensor scores
    pub fn from_sensors(per_sensor: SensorScores) -> Self {
        Self {
            total: per_sensor.iter().sum(),
            per_sensor,
        }
    }
}

/// Render-and-compare capability set used by the filter
pub trait ObservationModel {
    /// Backend implementing the model
    fn backend(&self) -> Backend;

    /// Number of sensors fused per update
    fn sensor_count(&self) -> usize;

    /// Calibration of a sensor
    fn camera(&self, sensor: usize) -> Option<&CameraData>;

    /// Synthetic depth image of the object at `pose` seen by `sensor`
    fn render(&self, sensor: usize, pose: &Isometry3<f64>) -> Result<DepthImage, TrackerError>;

    /// Score every pose against one observation per sensor
    ///
    /// Results are in the order of `poses`. Fails with `DimensionMismatch`
    /// if the number of observations differs from the sensor count or an
    /// image does not match its camera's working resolution.
    fn log_likelihoods(
        &self,
        poses: &[Isometry3<f64>],
        observations: &[DepthImage],
    ) -> Result<Vec<PoseScore>, TrackerError>;
}

/// Check stream count and per-sensor image shape
pub fn check_observations<O: ObservationModel + ?Sized>(
    model: &O,
    observations: &[DepthImage],
) -> Result<(), TrackerError> {
    if observations.len() != model.sensor_count() {
        return Err(TrackerError::dimension_mismatch(
            model.sensor_count(),
            observations.len(),
            "observation streams",
        ));
    }
    for (sensor, observed) in observations.iter().enumerate() {
        let camera = model.camera(sensor).ok_or_else(|| {
            TrackerError::dimension_mismatch(model.sensor_count(), sensor + 1, "sensor index")
        })?;
        let (width, height) = camera.resolution();
        observed.check_shape(width, height, &format!("sensor {} depth image", sensor))?;
    }
    Ok(())
}

// ============================================================================
// Backend dispatch
// ============================================================================

/// Observation model selected at build time
#[derive(Debug)]
pub enum ObservationBackend {
    /// CPU rasterizer
    Cpu(CpuObservationModel),
    /// wgpu compute kernel
    #[cfg(feature = "gpu")]
    Gpu(GpuObservationModel),
}

impl ObservationModel for ObservationBackend {
    fn backend(&self) -> Backend {
        match self {
            ObservationBackend::Cpu(m) => m.backend(),
            #[cfg(feature = "gpu")]
            ObservationBackend::Gpu(m) => m.backend(),
        }
    }

    fn sensor_count(&self) -> usize {
        match self {
            ObservationBackend::Cpu(m) => m.sensor_count(),
            #[cfg(feature = "gpu")]
            ObservationBackend::Gpu(m) => m.sensor_count(),
        }
    }

    fn camera(&self, sensor: usize) -> Option<&CameraData> {
        match self {
            ObservationBackend::Cpu(m) => m.camera(sensor),
            #[cfg(feature = "gpu")]
            ObservationBackend::Gpu(m) => m.camera(sensor),
        }
    }

    fn render(&self, sensor: usize, pose: &Isometry3<f64>) -> Result<DepthImage, TrackerError> {
        match self {
            ObservationBackend::Cpu(m) => m.render(sensor, pose),
            #[cfg(feature = "gpu")]
            ObservationBackend::Gpu(m) => m.render(sensor, pose),
        }
    }

    fn log_likelihoods(
        &self,
        poses: &[Isometry3<f64>],
        observations: &[DepthImage],
    ) -> Result<Vec<PoseScore>, TrackerError> {
        match self {
            ObservationBackend::Cpu(m) => m.log_likelihoods(poses, observations),
            #[cfg(feature = "gpu")]
            ObservationBackend::Gpu(m) => m.log_likelihoods(poses, observations),
        }
    }
}
