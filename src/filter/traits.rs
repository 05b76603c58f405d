//! Core filter trait
//!
//! A filter owns one belief and advances it one synchronous step at a time.

use crate::errors::TrackerError;
use crate::state::Belief;

/// Lifecycle of a filter instance
///
/// ```text
/// Uninitialized --initialize--> Ready --predict/update--> Ready
///                                 |
///                     DegenerateCovariance
///                                 v
///                              Faulted --initialize--> Ready
/// ```
///
/// Predict and update run to completion inside a single call, so the
/// transient predicting/updating phases are never observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterState {
    /// No belief yet
    Uninitialized,
    /// Belief is valid; predict and update may be issued
    Ready,
    /// Belief integrity was lost; only `initialize` is accepted
    Faulted,
}

/// Core filter trait implemented by recursive estimators
///
/// # Type Parameters
/// - `Observations` - One time-aligned frame (e.g. one depth image per sensor)
pub trait Filter {
    /// Type of observations consumed by one update
    type Observations: ?Sized;

    /// Set the belief and enter [`FilterState::Ready`]
    fn initialize(&mut self, belief: Belief) -> Result<(), TrackerError>;

    /// Propagate the belief by `dt` seconds
    fn predict(&mut self, dt: f64) -> Result<(), TrackerError>;

    /// Fuse one frame into the belief
    fn update(&mut self, observations: &Self::Observations) -> Result<(), TrackerError>;

    /// Predict then update
    fn step(&mut self, observations: &Self::Observations, dt: f64) -> Result<(), TrackerError> {
        self.predict(dt)?;
        self.update(observations)
    }

    /// Current belief, if initialized and not faulted
    fn belief(&self) -> Option<&Belief>;

    /// Lifecycle state
    fn state(&self) -> FilterState;

    /// Drop the belief and return to [`FilterState::Uninitialized`]
    fn reset(&mut self);

    /// Get state dimension
    fn x_dim(&self) -> usize;
}
