//! CPU render-and-compare backend
//!
//! Every pose hypothesis is rasterized once per sensor and scored with the
//! pixel mixture. With the `rayon` feature, hypotheses are evaluated in
//! parallel and collected back in input order.

use std::sync::Arc;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use nalgebra::Isometry3;

use super::mixture::PixelMixture;
use super::{check_observations, ObservationModel, PoseScore, SensorScores};
use crate::camera::CameraData;
use crate::config::Backend;
use crate::depth::DepthImage;
use crate::errors::TrackerError;
use crate::object::ObjectModel;
use crate::render::RigidBodyRenderer;

/// Observation model backed by the CPU rasterizer
#[derive(Debug, Clone)]
pub struct CpuObservationModel {
    mixture: PixelMixture,
    renderers: Vec<RigidBodyRenderer>,
}

impl CpuObservationModel {
    /// One renderer per sensor, all sharing the object model
    pub fn new(
        mixture: PixelMixture,
        object: Arc<ObjectModel>,
        cameras: &[Arc<CameraData>],
    ) -> Self {
        let renderers = cameras
            .iter()
            .map(|camera| RigidBodyRenderer::new(Arc::clone(&object), Arc::clone(camera)))
            .collect();
        Self { mixture, renderers }
    }

    /// Pixel mixture shared by every sensor
    pub fn mixture(&self) -> &PixelMixture {
        &self.mixture
    }

    fn score_pose(
        &self,
        pose: &Isometry3<f64>,
        observations: &[DepthImage],
    ) -> Result<PoseScore, TrackerError> {
        let per_sensor = self
            .renderers
            .iter()
            .zip(observations)
            .map(|(renderer, observed)| {
                let rendered = renderer.render(pose);
                self.mixture.log_likelihood(&rendered, observed)
            })
            .collect::<Result<SensorScores, _>>()?;
        Ok(PoseScore::from_sensors(per_sensor))
    }
}

impl ObservationModel for CpuObservationModel {
    fn backend(&self) -> Backend {
        Backend::Cpu
    }

    fn sensor_count(&self) -> usize {
        self.renderers.len()
    }

    fn camera(&self, sensor: usize) -> Option<&CameraData> {
        self.renderers.get(sensor).map(|r| r.camera())
    }

    fn render(&self, sensor: usize, pose: &Isometry3<f64>) -> Result<DepthImage, TrackerError> {
        let renderer = self.renderers.get(sensor).ok_or_else(|| {
            TrackerError::dimension_mismatch(self.renderers.len(), sensor + 1, "sensor index")
        })?;
        Ok(renderer.render(pose))
    }

    fn log_likelihoods(
        &self,
        poses: &[Isometry3<f64>],
        observations: &[DepthImage],
    ) -> Result<Vec<PoseScore>, TrackerError> {
        check_observations(self, observations)?;

        #[cfg(feature = "rayon")]
        {
            poses
                .par_iter()
                .map(|pose| self.score_pose(pose, observations))
                .collect()
        }

        #[cfg(not(feature = "rayon"))]
        {
            poses
                .iter()
                .map(|pose| self.score_pose(pose, observations))
                .collect()
        }
    }
}
