//! Filter implementations
//!
//! - [`Filter`] - Core trait implemented by recursive estimators
//! - [`FilterState`] - Lifecycle of a filter instance
//! - [`RobustGaussianFilter`] - Sigma-point filter with a robust
//!   render-and-compare likelihood

pub mod gaussian;
pub mod traits;

pub use gaussian::RobustGaussianFilter;
pub use traits::{Filter, FilterState};
