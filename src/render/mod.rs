//! Depth rendering of rigid objects
//!
//! - [`rasterizer`] - CPU z-buffer renderer used by the CPU observation backend

pub mod rasterizer;

pub use rasterizer::{RigidBodyRenderer, NEAR_PLANE};
