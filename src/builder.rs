//! Filter assembly
//!
//! [`TrackerBuilder::build`] turns a parameter bundle and per-sensor camera
//! calibration into a ready-to-initialize [`RobustGaussianFilter`]. Each step
//! can fail on its own and nothing partial is returned:
//!
//! 1. validate parameters (`InvalidParameter`)
//! 2. pair cameras with sensors (`InvalidParameter` on `observation.sensors`)
//! 3. load the object model (`ResourceNotFound` / `MalformedResource`)
//! 4. build the transition model and quadrature rule
//! 5. select the observation backend (`UnsupportedBackend`, never a fallback)

use std::fmt;
use std::sync::Arc;

use crate::camera::CameraData;
use crate::components::{ObjectTransitionModel, UnscentedQuadrature};
use crate::config::{Backend, TrackerParams};
use crate::errors::TrackerError;
use crate::filter::RobustGaussianFilter;
use crate::object::{ObjMeshLoader, ObjectModel, ObjectModelLoader};
use crate::observation::{CpuObservationModel, ObservationBackend, PixelMixture};
use crate::reporter::{NoOpReporter, StepReporter};

/// Assembles filters from parameters, camera data and an object loader
pub struct TrackerBuilder<R: StepReporter = NoOpReporter> {
    loader: Box<dyn ObjectModelLoader>,
    reporter: R,
}

impl<R: StepReporter> fmt::Debug for TrackerBuilder<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackerBuilder")
            .field("loader", &self.loader.name())
            .finish()
    }
}

impl Default for TrackerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackerBuilder {
    /// Builder that loads OBJ meshes from disk
    pub fn new() -> Self {
        Self {
            loader: Box::new(ObjMeshLoader::new()),
            reporter: NoOpReporter,
        }
    }
}

impl<R: StepReporter> TrackerBuilder<R> {
    /// Resolve object resources with a different loader
    pub fn with_loader(mut self, loader: impl ObjectModelLoader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    /// Attach a reporter to the built filter
    pub fn with_reporter<R2: StepReporter>(self, reporter: R2) -> TrackerBuilder<R2> {
        TrackerBuilder {
            loader: self.loader,
            reporter,
        }
    }

    /// Load (and optionally center) the object model named by `params.ori`
    pub fn load_object(&self, params: &TrackerParams) -> Result<Arc<ObjectModel>, TrackerError> {
        let model = self.loader.load(&params.ori)?;
        let model = if params.center_object_frame {
            let (centered, offset) = model.centered();
            log::debug!(
                "Centered object frame, offset ({:.4}, {:.4}, {:.4})",
                offset.x,
                offset.y,
                offset.z
            );
            centered
        } else {
            model
        };
        Ok(Arc::new(model))
    }

    /// Assemble a filter; it starts uninitialized
    ///
    /// `cameras` holds one calibration per sensor, or a single calibration
    /// shared by every sensor.
    pub fn build(
        self,
        params: &TrackerParams,
        cameras: &[Arc<CameraData>],
    ) -> Result<RobustGaussianFilter<ObservationBackend, R>, TrackerError> {
        params.validate()?;
        let cameras = pair_cameras(params.observation.sensors, cameras)?;

        let object = self.load_object(params)?;
        let transition = ObjectTransitionModel::new(&params.object_transition);
        let quadrature = UnscentedQuadrature::new(params.ut_alpha)?;
        let mixture = PixelMixture::new(&params.observation);
        let observation = select_backend(params.observation.backend, mixture, object.clone(), &cameras)?;

        log::info!(
            "Built tracker: backend={}, sensors={}, object={} triangles via {}, state={:?} ({}-D)",
            params.observation.backend.name(),
            cameras.len(),
            object.triangle_count(),
            self.loader.name(),
            transition.layout(),
            transition.dim()
        );

        Ok(
            RobustGaussianFilter::new(transition, quadrature, observation, params.update_rate)?
                .with_reporter(self.reporter),
        )
    }
}

/// Build with the default OBJ loader and no reporter
pub fn build(
    params: &TrackerParams,
    cameras: &[Arc<CameraData>],
) -> Result<RobustGaussianFilter, TrackerError> {
    TrackerBuilder::new().build(params, cameras)
}

/// One camera per sensor; a single camera is shared by all sensors
fn pair_cameras(
    sensors: usize,
    cameras: &[Arc<CameraData>],
) -> Result<Vec<Arc<CameraData>>, TrackerError> {
    match cameras.len() {
        n if n == sensors => Ok(cameras.to_vec()),
        1 => Ok(vec![Arc::clone(&cameras[0]); sensors]),
        n => Err(TrackerError::invalid_parameter(
            "observation.sensors",
            format!("{} sensors configured but {} cameras supplied", sensors, n),
        )),
    }
}

fn select_backend(
    backend: Backend,
    mixture: PixelMixture,
    object: Arc<ObjectModel>,
    cameras: &[Arc<CameraData>],
) -> Result<ObservationBackend, TrackerError> {
    match backend {
        Backend::Cpu => Ok(ObservationBackend::Cpu(CpuObservationModel::new(
            mixture, object, cameras,
        ))),
        Backend::Gpu => gpu_backend(mixture, object, cameras),
    }
}

#[cfg(feature = "gpu")]
fn gpu_backend(
    mixture: PixelMixture,
    object: Arc<ObjectModel>,
    cameras: &[Arc<CameraData>],
) -> Result<ObservationBackend, TrackerError> {
    crate::observation::GpuObservationModel::new(mixture, object, cameras)
        .map(ObservationBackend::Gpu)
}

#[cfg(not(feature = "gpu"))]
fn gpu_backend(
    _mixture: PixelMixture,
    _object: Arc<ObjectModel>,
    _cameras: &[Arc<CameraData>],
) -> Result<ObservationBackend, TrackerError> {
    Err(TrackerError::UnsupportedBackend {
        backend: Backend::Gpu.name().to_string(),
        reason: "this build does not include the `gpu` feature".to_string(),
    })
}
