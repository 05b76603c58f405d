//! Core algorithmic components
//!
//! The building blocks the filter is assembled from:
//!
//! - [`transition`] - Object kinematics and process noise
//! - [`quadrature`] - Scaled unscented sigma points, Gaussian reconstruction and conditioning

pub mod quadrature;
pub mod transition;

pub use quadrature::{SigmaAxis, SigmaPoints, UnscentedQuadrature, UT_BETA};
pub use transition::ObjectTransitionModel;
