//! Tracker parameters
//!
//! [`TrackerParams`] is the flat, declarative parameter bundle handed to the
//! [`TrackerBuilder`](crate::builder::TrackerBuilder). It is validated exactly
//! once, at construction time; nothing downstream re-checks ranges per frame.
//!
//! Parameters can be assembled in code with [`TrackerParams::builder`] or
//! loaded from JSON:
//!
//! ```ignore
//! use robust_multisensor_tracker::config::TrackerParams;
//!
//! let params = TrackerParams::from_json_str(r#"{
//!     "ut_alpha": 1.0,
//!     "update_rate": 1.0,
//!     "observation": {
//!         "bg_depth": 7.0, "fg_noise_std": 0.005, "bg_noise_std": 0.1,
//!         "tail_weight": 0.01, "uniform_tail_min": 0.0, "uniform_tail_max": 7.0,
//!         "sensors": 1
//!     },
//!     "object_transition": { "model": "constant_velocity" },
//!     "ori": { "package_path": "/data/objects", "directory": "duck", "meshes": ["duck.obj"] }
//! }"#)?;
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::TrackerError;
use crate::object::ObjectResourceIdentifier;

// ============================================================================
// Defaults
// ============================================================================

/// Default sigma-point spread
pub const DEFAULT_UT_ALPHA: f64 = 1.0;
/// Default fusion rate (full Bayesian update)
pub const DEFAULT_UPDATE_RATE: f64 = 1.0;
/// Default background depth in meters
pub const DEFAULT_BG_DEPTH: f64 = 7.0;
/// Default foreground depth noise std in meters
pub const DEFAULT_FG_NOISE_STD: f64 = 0.005;
/// Default background depth noise std in meters
pub const DEFAULT_BG_NOISE_STD: f64 = 0.1;
/// Default outlier mixture weight
pub const DEFAULT_TAIL_WEIGHT: f64 = 0.01;
/// Default outlier support lower bound in meters
pub const DEFAULT_UNIFORM_TAIL_MIN: f64 = 0.0;
/// Default outlier support upper bound in meters
pub const DEFAULT_UNIFORM_TAIL_MAX: f64 = 7.0;
/// Default occlusion threshold in units of `fg_noise_std`
pub const DEFAULT_OCCLUSION_SIGMA_FACTOR: f64 = 3.0;
/// Default per-axis translational process noise std (m / sqrt(s))
pub const DEFAULT_LINEAR_SIGMA: f64 = 0.002;
/// Default per-axis rotational process noise std (rad / sqrt(s))
pub const DEFAULT_ANGULAR_SIGMA: f64 = 0.01;
/// Default velocity damping
pub const DEFAULT_VELOCITY_FACTOR: f64 = 0.8;

fn default_occlusion_sigma_factor() -> f64 {
    DEFAULT_OCCLUSION_SIGMA_FACTOR
}

// ============================================================================
// Backend
// ============================================================================

/// Render-and-compare backend requested by the configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// CPU z-buffer renderer, always available
    #[default]
    Cpu,
    /// wgpu compute backend, only present when built with the `gpu` feature
    Gpu,
}

impl Backend {
    /// Backend name used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Cpu => "cpu",
            Backend::Gpu => "gpu",
        }
    }

    /// Whether this binary was compiled with support for the backend
    pub fn is_compiled(&self) -> bool {
        match self {
            Backend::Cpu => true,
            Backend::Gpu => cfg!(feature = "gpu"),
        }
    }
}

// ============================================================================
// Observation parameters
// ============================================================================

/// Robust pixel mixture and sensor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationParams {
    /// Assumed depth of background/occluders
    pub bg_depth: f64,
    /// Std of on-object depth noise
    pub fg_noise_std: f64,
    /// Std of background depth noise
    pub bg_noise_std: f64,
    /// Weight of the uniform outlier component
    pub tail_weight: f64,
    /// Lower bound of the outlier support
    pub uniform_tail_min: f64,
    /// Upper bound of the outlier support
    pub uniform_tail_max: f64,
    /// Number of depth sensors fused per step
    pub sensors: usize,
    /// Requested rendering backend
    #[serde(default)]
    pub backend: Backend,
    /// Observed depth this many `fg_noise_std` behind the rendered surface
    /// routes a pixel to the background component
    #[serde(default = "default_occlusion_sigma_factor")]
    pub occlusion_sigma_factor: f64,
}

impl Default for ObservationParams {
    fn default() -> Self {
        Self {
            bg_depth: DEFAULT_BG_DEPTH,
            fg_noise_std: DEFAULT_FG_NOISE_STD,
            bg_noise_std: DEFAULT_BG_NOISE_STD,
            tail_weight: DEFAULT_TAIL_WEIGHT,
            uniform_tail_min: DEFAULT_UNIFORM_TAIL_MIN,
            uniform_tail_max: DEFAULT_UNIFORM_TAIL_MAX,
            sensors: 1,
            backend: Backend::Cpu,
            occlusion_sigma_factor: DEFAULT_OCCLUSION_SIGMA_FACTOR,
        }
    }
}

impl ObservationParams {
    fn validate(&self) -> Result<(), TrackerError> {
        require_positive("observation.bg_depth", self.bg_depth)?;
        require_non_negative("observation.fg_noise_std", self.fg_noise_std)?;
        require_non_negative("observation.bg_noise_std", self.bg_noise_std)?;
        if !(0.0..=1.0).contains(&self.tail_weight) {
            return Err(TrackerError::invalid_parameter(
                "observation.tail_weight",
                format!("must be in [0, 1], got {}", self.tail_weight),
            ));
        }
        require_finite("observation.uniform_tail_min", self.uniform_tail_min)?;
        require_finite("observation.uniform_tail_max", self.uniform_tail_max)?;
        if self.uniform_tail_min >= self.uniform_tail_max {
            return Err(TrackerError::invalid_parameter(
                "observation.uniform_tail_min",
                format!(
                    "must be below uniform_tail_max ({} >= {})",
                    self.uniform_tail_min, self.uniform_tail_max
                ),
            ));
        }
        if !(self.uniform_tail_max - self.uniform_tail_min).is_finite() {
            return Err(TrackerError::invalid_parameter(
                "observation.uniform_tail_max",
                format!(
                    "outlier support [{}, {}] is too wide",
                    self.uniform_tail_min, self.uniform_tail_max
                ),
            ));
        }
        if self.sensors == 0 {
            return Err(TrackerError::invalid_parameter(
                "observation.sensors",
                "at least one sensor is required",
            ));
        }
        require_positive(
            "observation.occlusion_sigma_factor",
            self.occlusion_sigma_factor,
        )
    }
}

// ============================================================================
// Transition parameters
// ============================================================================

/// Kinematic model of the object between frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// Random walk on the pose; 6-D state
    ConstantPose,
    /// Damped constant velocity; 12-D state (pose + linear/angular velocity)
    #[default]
    ConstantVelocity,
}

/// Process noise and damping of the object transition model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectTransitionParams {
    /// Kinematic model
    pub model: TransitionKind,
    /// Per-axis translational noise std, scaled by sqrt(dt)
    pub linear_sigma: [f64; 3],
    /// Per-axis rotational noise std, scaled by sqrt(dt)
    pub angular_sigma: [f64; 3],
    /// Fraction of velocity retained per second (constant-velocity model only)
    pub velocity_factor: f64,
}

impl Default for ObjectTransitionParams {
    fn default() -> Self {
        Self {
            model: TransitionKind::ConstantVelocity,
            linear_sigma: [DEFAULT_LINEAR_SIGMA; 3],
            angular_sigma: [DEFAULT_ANGULAR_SIGMA; 3],
            velocity_factor: DEFAULT_VELOCITY_FACTOR,
        }
    }
}

impl ObjectTransitionParams {
    /// Random-walk pose model with isotropic noise
    pub fn constant_pose(linear_sigma: f64, angular_sigma: f64) -> Self {
        Self {
            model: TransitionKind::ConstantPose,
            linear_sigma: [linear_sigma; 3],
            angular_sigma: [angular_sigma; 3],
            velocity_factor: 0.0,
        }
    }

    /// Damped constant-velocity model with isotropic acceleration noise
    pub fn constant_velocity(linear_sigma: f64, angular_sigma: f64, velocity_factor: f64) -> Self {
        Self {
            model: TransitionKind::ConstantVelocity,
            linear_sigma: [linear_sigma; 3],
            angular_sigma: [angular_sigma; 3],
            velocity_factor,
        }
    }

    fn validate(&self) -> Result<(), TrackerError> {
        for (axis, &s) in ["x", "y", "z"].iter().zip(self.linear_sigma.iter()) {
            require_non_negative(&format!("object_transition.linear_sigma.{}", axis), s)?;
        }
        for (axis, &s) in ["x", "y", "z"].iter().zip(self.angular_sigma.iter()) {
            require_non_negative(&format!("object_transition.angular_sigma.{}", axis), s)?;
        }
        if !(0.0..=1.0).contains(&self.velocity_factor) {
            return Err(TrackerError::invalid_parameter(
                "object_transition.velocity_factor",
                format!("must be in [0, 1], got {}", self.velocity_factor),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// TrackerParams
// ============================================================================

/// Complete parameter bundle for building a tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerParams {
    /// Sigma-point spread of the quadrature rule
    pub ut_alpha: f64,
    /// Fraction of new evidence fused per update (likelihood tempering exponent)
    pub update_rate: f64,
    /// Pixel mixture and sensor configuration
    pub observation: ObservationParams,
    /// Transition model configuration
    #[serde(default)]
    pub object_transition: ObjectTransitionParams,
    /// Which object mesh(es) to load
    pub ori: ObjectResourceIdentifier,
    /// Re-express the mesh around its vertex centroid after loading
    #[serde(default)]
    pub center_object_frame: bool,
}

impl TrackerParams {
    /// Create with builder pattern.
    pub fn builder() -> TrackerParamsBuilder {
        TrackerParamsBuilder::default()
    }

    /// Check every range constraint; the first violation is reported by field name
    pub fn validate(&self) -> Result<(), TrackerError> {
        require_positive("ut_alpha", self.ut_alpha)?;
        if !(self.update_rate > 0.0 && self.update_rate <= 1.0) {
            return Err(TrackerError::invalid_parameter(
                "update_rate",
                format!("must be in (0, 1], got {}", self.update_rate),
            ));
        }
        self.observation.validate()?;
        self.object_transition.validate()?;
        self.ori.validate()
    }

    /// Parse and validate parameters from JSON text
    pub fn from_json_str(json: &str) -> Result<Self, TrackerError> {
        let params: TrackerParams = serde_json::from_str(json)
            .map_err(|e| TrackerError::invalid_parameter("params", e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    /// Read, parse and validate parameters from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, TrackerError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            TrackerError::invalid_parameter(
                "params",
                format!("cannot read {}: {}", path.display(), e),
            )
        })?;
        Self::from_json_str(&text)
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Serialize to pretty-printed JSON string.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Builder for TrackerParams.
#[derive(Debug, Default)]
pub struct TrackerParamsBuilder {
    ut_alpha: Option<f64>,
    update_rate: Option<f64>,
    observation: Option<ObservationParams>,
    object_transition: Option<ObjectTransitionParams>,
    ori: Option<ObjectResourceIdentifier>,
    center_object_frame: bool,
}

impl TrackerParamsBuilder {
    /// Set the sigma-point spread.
    pub fn ut_alpha(mut self, alpha: f64) -> Self {
        self.ut_alpha = Some(alpha);
        self
    }

    /// Set the fusion rate.
    pub fn update_rate(mut self, rate: f64) -> Self {
        self.update_rate = Some(rate);
        self
    }

    /// Set the observation parameters.
    pub fn observation(mut self, observation: ObservationParams) -> Self {
        self.observation = Some(observation);
        self
    }

    /// Set the transition parameters.
    pub fn object_transition(mut self, transition: ObjectTransitionParams) -> Self {
        self.object_transition = Some(transition);
        self
    }

    /// Set the object resource identifier.
    pub fn ori(mut self, ori: ObjectResourceIdentifier) -> Self {
        self.ori = Some(ori);
        self
    }

    /// Center the object frame on the mesh centroid.
    pub fn center_object_frame(mut self, center: bool) -> Self {
        self.center_object_frame = center;
        self
    }

    /// Build and validate the parameters.
    pub fn build(self) -> Result<TrackerParams, TrackerError> {
        let ori = self
            .ori
            .ok_or_else(|| TrackerError::invalid_parameter("ori", "object resource is required"))?;
        let params = TrackerParams {
            ut_alpha: self.ut_alpha.unwrap_or(DEFAULT_UT_ALPHA),
            update_rate: self.update_rate.unwrap_or(DEFAULT_UPDATE_RATE),
            observation: self.observation.unwrap_or_default(),
            object_transition: self.object_transition.unwrap_or_default(),
            ori,
            center_object_frame: self.center_object_frame,
        };
        params.validate()?;
        Ok(params)
    }
}

// ============================================================================
// Range helpers
// ============================================================================

fn require_finite(field: &str, value: f64) -> Result<(), TrackerError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(TrackerError::invalid_parameter(
            field,
            format!("must be finite, got {}", value),
        ))
    }
}

fn require_positive(field: &str, value: f64) -> Result<(), TrackerError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(TrackerError::invalid_parameter(
            field,
            format!("must be > 0, got {}", value),
        ))
    }
}

fn require_non_negative(field: &str, value: f64) -> Result<(), TrackerError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(TrackerError::invalid_parameter(
            field,
            format!("must be >= 0, got {}", value),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ori() -> ObjectResourceIdentifier {
        ObjectResourceIdentifier::new("/tmp/objects", "box", vec!["box.obj".to_string()])
    }

    fn valid() -> TrackerParams {
        TrackerParams::builder().ori(ori()).build().unwrap()
    }

    fn field_of(params: &TrackerParams) -> String {
        params
            .validate()
            .unwrap_err()
            .parameter_field()
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_defaults_are_valid() {
        let params = valid();
        assert_eq!(params.ut_alpha, DEFAULT_UT_ALPHA);
        assert_eq!(params.update_rate, DEFAULT_UPDATE_RATE);
        assert_eq!(params.observation.sensors, 1);
        assert_eq!(params.observation.backend, Backend::Cpu);
    }

    #[test]
    fn test_builder_requires_ori() {
        let err = TrackerParams::builder().build().unwrap_err();
        assert_eq!(err.parameter_field(), Some("ori"));
    }

    #[test]
    fn test_each_out_of_range_field_is_named() {
        let mut p = valid();
        p.ut_alpha = 0.0;
        assert_eq!(field_of(&p), "ut_alpha");

        let mut p = valid();
        p.update_rate = 0.0;
        assert_eq!(field_of(&p), "update_rate");

        let mut p = valid();
        p.update_rate = 1.5;
        assert_eq!(field_of(&p), "update_rate");

        let mut p = valid();
        p.observation.bg_depth = -1.0;
        assert_eq!(field_of(&p), "observation.bg_depth");

        let mut p = valid();
        p.observation.fg_noise_std = -0.1;
        assert_eq!(field_of(&p), "observation.fg_noise_std");

        let mut p = valid();
        p.observation.bg_noise_std = f64::NAN;
        assert_eq!(field_of(&p), "observation.bg_noise_std");

        let mut p = valid();
        p.observation.tail_weight = 1.5;
        assert_eq!(field_of(&p), "observation.tail_weight");

        let mut p = valid();
        p.observation.uniform_tail_min = 7.0;
        assert_eq!(field_of(&p), "observation.uniform_tail_min");

        let mut p = valid();
        p.observation.sensors = 0;
        assert_eq!(field_of(&p), "observation.sensors");

        let mut p = valid();
        p.object_transition.velocity_factor = 2.0;
        assert_eq!(field_of(&p), "object_transition.velocity_factor");

        let mut p = valid();
        p.object_transition.angular_sigma[2] = -1.0;
        assert_eq!(field_of(&p), "object_transition.angular_sigma.z");
    }

    #[test]
    fn test_zero_noise_std_is_allowed() {
        let mut p = valid();
        p.observation.fg_noise_std = 0.0;
        p.observation.bg_noise_std = 0.0;
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_json_roundtrip_keeps_defaults() {
        let json = r#"{
            "ut_alpha": 1.2,
            "update_rate": 0.5,
            "observation": {
                "bg_depth": 7.0, "fg_noise_std": 0.005, "bg_noise_std": 0.1,
                "tail_weight": 0.01, "uniform_tail_min": 0.0, "uniform_tail_max": 7.0,
                "sensors": 2, "backend": "cpu"
            },
            "object_transition": { "model": "constant_pose", "velocity_factor": 0.0 },
            "ori": { "package_path": "/tmp/objects", "directory": "box", "meshes": ["box.obj"] }
        }"#;
        let params = TrackerParams::from_json_str(json).unwrap();
        assert_eq!(params.ut_alpha, 1.2);
        assert_eq!(params.observation.sensors, 2);
        assert_eq!(
            params.observation.occlusion_sigma_factor,
            DEFAULT_OCCLUSION_SIGMA_FACTOR
        );
        assert_eq!(params.object_transition.model, TransitionKind::ConstantPose);
        assert_eq!(params.object_transition.linear_sigma, [DEFAULT_LINEAR_SIGMA; 3]);

        let again = TrackerParams::from_json_str(&params.to_json_pretty()).unwrap();
        assert_eq!(again, params);
    }

    #[test]
    fn test_json_rejects_invalid_values() {
        let json = r#"{
            "ut_alpha": 1.0,
            "update_rate": 1.0,
            "observation": {
                "bg_depth": 7.0, "fg_noise_std": 0.005, "bg_noise_std": 0.1,
                "tail_weight": 1.5, "uniform_tail_min": 0.0, "uniform_tail_max": 7.0,
                "sensors": 1
            },
            "ori": { "package_path": "/tmp", "directory": "box", "meshes": ["box.obj"] }
        }"#;
        let err = TrackerParams::from_json_str(json).unwrap_err();
        assert_eq!(err.parameter_field(), Some("observation.tail_weight"));
    }

    #[test]
    fn test_gpu_compiled_flag() {
        assert!(Backend::Cpu.is_compiled());
        assert_eq!(Backend::Gpu.is_compiled(), cfg!(feature = "gpu"));
    }
}
