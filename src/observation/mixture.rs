//! Robust per-pixel depth likelihood
//!
//! Each pixel is scored with a three-component mixture:
//!
//! ```text
//! p(z | ẑ) = (1 − w)·body(z | ẑ) + w·U(z; a, b)
//!
//! body = N(z; ẑ, σ_fg)       if ẑ is finite and z ≤ ẑ + k·σ_fg
//!      = N(z; d_bg, σ_bg)    otherwise (background or occluded object)
//! ```
//!
//! with `w = tail_weight`, `[a, b]` the outlier support and `k` the
//! occlusion threshold in foreground standard deviations. The uniform
//! component has density `1/(b − a)` for every finite reading, so the total
//! never drops below `w/(b − a)`. Invalid readings carry no evidence about
//! the pose and are scored entirely by the outlier density.

use crate::common::linalg::{log_add_exp, log_normal_pdf};
use crate::config::ObservationParams;
use crate::depth::{is_valid_reading, DepthImage};
use crate::errors::TrackerError;

/// Smallest standard deviation used when evaluating a Gaussian component
pub const MIN_NOISE_STD: f64 = 1e-6;

/// Parameters of the pixel mixture with precomputed log weights
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelMixture {
    fg_std: f64,
    bg_std: f64,
    bg_depth: f64,
    tail_weight: f64,
    occlusion_margin: f64,
    ln_tail_density: f64,
    ln_body_weight: f64,
    ln_tail_weight: f64,
}

impl PixelMixture {
    /// Build from validated observation parameters
    pub fn new(params: &ObservationParams) -> Self {
        let fg_std = params.fg_noise_std.max(MIN_NOISE_STD);
        let bg_std = params.bg_noise_std.max(MIN_NOISE_STD);
        let support = params.uniform_tail_max - params.uniform_tail_min;
        Self {
            fg_std,
            bg_std,
            bg_depth: params.bg_depth,
            tail_weight: params.tail_weight,
            occlusion_margin: params.occlusion_sigma_factor * fg_std,
            ln_tail_density: -support.ln(),
            ln_body_weight: (1.0 - params.tail_weight).ln(),
            ln_tail_weight: params.tail_weight.ln(),
        }
    }

    /// Effective foreground std
    pub fn fg_std(&self) -> f64 {
        self.fg_std
    }

    /// Effective background std
    pub fn bg_std(&self) -> f64 {
        self.bg_std
    }

    /// Background depth
    pub fn bg_depth(&self) -> f64 {
        self.bg_depth
    }

    /// Observed depth this far behind the rendered surface counts as occluded
    pub fn occlusion_margin(&self) -> f64 {
        self.occlusion_margin
    }

    /// Log density of the uniform outlier component
    pub fn ln_tail_density(&self) -> f64 {
        self.ln_tail_density
    }

    /// `ln(1 − tail_weight)`
    pub fn ln_body_weight(&self) -> f64 {
        self.ln_body_weight
    }

    /// `ln(tail_weight)`
    pub fn ln_tail_weight(&self) -> f64 {
        self.ln_tail_weight
    }

    /// Lower bound of the mixture density for any reading
    pub fn outlier_floor(&self) -> f64 {
        self.tail_weight * self.ln_tail_density.exp()
    }

    /// Log density of the foreground component
    #[inline]
    pub fn foreground_log_density(&self, rendered: f64, observed: f64) -> f64 {
        log_normal_pdf(observed, rendered, self.fg_std)
    }

    /// Log density of the background component
    #[inline]
    pub fn background_log_density(&self, observed: f64) -> f64 {
        log_normal_pdf(observed, self.bg_depth, self.bg_std)
    }

    /// Whether the pixel is scored by the foreground Gaussian
    #[inline]
    pub fn uses_foreground(&self, rendered: f64, observed: f64) -> bool {
        rendered.is_finite() && observed <= rendered + self.occlusion_margin
    }

    /// Log of the mixture density of one pixel
    #[inline]
    pub fn log_density(&self, rendered: f64, observed: f64) -> f64 {
        if !is_valid_reading(observed) {
            return self.ln_tail_density;
        }
        let body = if self.uses_foreground(rendered, observed) {
            self.foreground_log_density(rendered, observed)
        } else {
            self.background_log_density(observed)
        };
        log_add_exp(
            self.ln_body_weight + body,
            self.ln_tail_weight + self.ln_tail_density,
        )
    }

    /// Mixture density of one pixel
    #[inline]
    pub fn density(&self, rendered: f64, observed: f64) -> f64 {
        self.log_density(rendered, observed).exp()
    }

    /// Sum of per-pixel log densities of one image pair
    pub fn log_likelihood(
        &self,
        rendered: &DepthImage,
        observed: &DepthImage,
    ) -> Result<f64, TrackerError> {
        observed.check_shape(rendered.width(), rendered.height(), "observed depth image")?;
        Ok(rendered
            .as_matrix()
            .iter()
            .zip(observed.as_matrix().iter())
            .map(|(&r, &z)| self.log_density(r, z))
            .sum())
    }
}
