//! Camera calibration
//!
//! [`CameraData`] is immutable after construction and shared (behind an
//! `Arc`) by the renderer and the observation model of every sensor that
//! uses it. Rendering and scoring run at the downsampled resolution.

use nalgebra::{Isometry3, Point3, Vector3};

use crate::errors::TrackerError;

/// Pinhole intrinsics in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intrinsics {
    /// Focal length along image columns
    pub fx: f64,
    /// Focal length along image rows
    pub fy: f64,
    /// Principal point column
    pub cx: f64,
    /// Principal point row
    pub cy: f64,
}

impl Intrinsics {
    /// Create new intrinsics
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// Intrinsics of the image downsampled by an integer factor
    pub fn downsampled(&self, factor: usize) -> Self {
        let s = 1.0 / factor as f64;
        Self {
            fx: self.fx * s,
            fy: self.fy * s,
            cx: self.cx * s,
            cy: self.cy * s,
        }
    }

    /// Project a camera-frame point to `(u, v)` = (column, row)
    ///
    /// Points on or behind the image plane have no projection.
    #[inline]
    pub fn project(&self, p: &Point3<f64>) -> Option<(f64, f64)> {
        if p.z <= 0.0 {
            return None;
        }
        Some((self.fx * p.x / p.z + self.cx, self.fy * p.y / p.z + self.cy))
    }

    /// Viewing ray through pixel `(u, v)`, scaled so its z component is 1
    #[inline]
    pub fn ray(&self, u: f64, v: f64) -> Vector3<f64> {
        Vector3::new((u - self.cx) / self.fx, (v - self.cy) / self.fy, 1.0)
    }
}

/// Calibration and metadata of one depth sensor
#[derive(Debug, Clone, PartialEq)]
pub struct CameraData {
    intrinsics: Intrinsics,
    native_width: usize,
    native_height: usize,
    downsampling_factor: usize,
    camera_from_world: Isometry3<f64>,
    frame_id: String,
}

impl CameraData {
    /// Create a camera at full resolution, placed at the world origin
    pub fn new(
        intrinsics: Intrinsics,
        width: usize,
        height: usize,
    ) -> Result<Self, TrackerError> {
        for (field, value) in [
            ("camera.fx", intrinsics.fx),
            ("camera.fy", intrinsics.fy),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(TrackerError::invalid_parameter(
                    field,
                    format!("must be > 0, got {}", value),
                ));
            }
        }
        if !(intrinsics.cx.is_finite() && intrinsics.cy.is_finite()) {
            return Err(TrackerError::invalid_parameter(
                "camera.principal_point",
                "must be finite",
            ));
        }
        if width == 0 || height == 0 {
            return Err(TrackerError::invalid_parameter(
                "camera.resolution",
                format!("must be non-empty, got {}x{}", width, height),
            ));
        }
        Ok(Self {
            intrinsics,
            native_width: width,
            native_height: height,
            downsampling_factor: 1,
            camera_from_world: Isometry3::identity(),
            frame_id: String::new(),
        })
    }

    /// Render and score at `1/factor` of the native resolution
    pub fn with_downsampling(mut self, factor: usize) -> Result<Self, TrackerError> {
        if factor == 0 || factor > self.native_width || factor > self.native_height {
            return Err(TrackerError::invalid_parameter(
                "camera.downsampling_factor",
                format!(
                    "must be in [1, {}], got {}",
                    self.native_width.min(self.native_height),
                    factor
                ),
            ));
        }
        self.downsampling_factor = factor;
        Ok(self)
    }

    /// Set the world-to-camera transform
    pub fn with_extrinsics(mut self, camera_from_world: Isometry3<f64>) -> Self {
        self.camera_from_world = camera_from_world;
        self
    }

    /// Set the sensor frame name
    pub fn with_frame_id(mut self, frame_id: impl Into<String>) -> Self {
        self.frame_id = frame_id.into();
        self
    }

    /// Intrinsics at the working (downsampled) resolution
    pub fn intrinsics(&self) -> Intrinsics {
        self.intrinsics.downsampled(self.downsampling_factor)
    }

    /// Intrinsics at native resolution
    pub fn native_intrinsics(&self) -> Intrinsics {
        self.intrinsics
    }

    /// Working resolution `(width, height)`
    pub fn resolution(&self) -> (usize, usize) {
        (
            self.native_width / self.downsampling_factor,
            self.native_height / self.downsampling_factor,
        )
    }

    /// Native resolution `(width, height)`
    pub fn native_resolution(&self) -> (usize, usize) {
        (self.native_width, self.native_height)
    }

    /// Number of pixels at working resolution
    pub fn pixel_count(&self) -> usize {
        let (w, h) = self.resolution();
        w * h
    }

    /// Downsampling factor
    pub fn downsampling_factor(&self) -> usize {
        self.downsampling_factor
    }

    /// World-to-camera transform
    pub fn camera_from_world(&self) -> &Isometry3<f64> {
        &self.camera_from_world
    }

    /// Sensor frame name
    pub fn frame_id(&self) -> &str {
        &self.frame_id
    }
}
