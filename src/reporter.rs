//! Observability for filter execution.
//!
//! This module provides the [`StepReporter`] trait for debugging and research
//! instrumentation. Reporters receive callbacks at key points of a predict or
//! update step without polluting the core algorithm logic.
//!
//! # Zero-Cost Abstraction
//!
//! The filter is generic over its reporter and defaults to [`NoOpReporter`],
//! whose callbacks are empty and optimized away by the compiler.
//!
//! # Example
//!
//! ```
//! use robust_multisensor_tracker::reporter::{DebugReporter, StepReporter};
//!
//! let mut reporter = DebugReporter::new();
//! reporter.on_scores(&[]);
//! assert_eq!(reporter.score_events().len(), 1);
//! ```

use crate::components::SigmaPoints;
use crate::errors::TrackerError;
use crate::observation::PoseScore;
use crate::state::Belief;

// ============================================================================
// StepReporter Trait
// ============================================================================

/// Observability trait for filter step execution.
///
/// All methods have default empty implementations, so you only need
/// to override the events you care about.
///
/// Reporters use `&mut self` for callbacks and receive references; clone
/// inside the callback if the data must outlive it.
pub trait StepReporter {
    /// Called after a prediction step with the predicted belief.
    fn on_prediction(&mut self, _belief: &Belief, _dt: f64) {}

    /// Called after sigma points of the prior are generated for an update.
    fn on_sigma_points(&mut self, _sigma: &SigmaPoints) {}

    /// Called with the per-point log-likelihoods, in sigma-point order.
    fn on_scores(&mut self, _scores: &[PoseScore]) {}

    /// Called after an update with the posterior belief.
    ///
    /// `prior_kept` is true when the evidence was degenerate and the prior
    /// was retained unchanged.
    fn on_update(&mut self, _belief: &Belief, _prior_kept: bool) {}

    /// Called when the filter enters the faulted state.
    fn on_fault(&mut self, _error: &TrackerError) {}
}

// ============================================================================
// NoOpReporter
// ============================================================================

/// Zero-cost reporter that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpReporter;

impl NoOpReporter {
    /// Create a new no-op reporter.
    pub fn new() -> Self {
        Self
    }
}

impl StepReporter for NoOpReporter {
    // All methods use default empty implementations
}

// ============================================================================
// DebugReporter
// ============================================================================

/// Reporter that captures all events for debugging.
///
/// Stores clones of every belief and score set it sees, which is fine for
/// tests and short sessions but grows without bound on long runs.
#[derive(Debug, Clone, Default)]
pub struct DebugReporter {
    /// Predicted beliefs with their time steps
    predictions: Vec<(Belief, f64)>,

    /// Number of sigma points per update
    sigma_point_counts: Vec<usize>,

    /// Per-point scores per update
    scores: Vec<Vec<PoseScore>>,

    /// Posterior beliefs and whether the prior was kept
    updates: Vec<(Belief, bool)>,

    /// Errors that faulted the filter
    faults: Vec<TrackerError>,
}

impl DebugReporter {
    /// Create a new debug reporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all captured events.
    pub fn clear(&mut self) {
        self.predictions.clear();
        self.sigma_point_counts.clear();
        self.scores.clear();
        self.updates.clear();
        self.faults.clear();
    }

    /// Get captured prediction events.
    pub fn prediction_events(&self) -> &[(Belief, f64)] {
        &self.predictions
    }

    /// Get the number of sigma points of each update.
    pub fn sigma_point_counts(&self) -> &[usize] {
        &self.sigma_point_counts
    }

    /// Get captured score events.
    pub fn score_events(&self) -> &[Vec<PoseScore>] {
        &self.scores
    }

    /// Get captured update events.
    pub fn update_events(&self) -> &[(Belief, bool)] {
        &self.updates
    }

    /// Get captured faults.
    pub fn fault_events(&self) -> &[TrackerError] {
        &self.faults
    }

    /// Total number of captured events across all types.
    pub fn total_events(&self) -> usize {
        self.predictions.len()
            + self.sigma_point_counts.len()
            + self.scores.len()
            + self.updates.len()
            + self.faults.len()
    }
}

impl StepReporter for DebugReporter {
    fn on_prediction(&mut self, belief: &Belief, dt: f64) {
        self.predictions.push((belief.clone(), dt));
    }

    fn on_sigma_points(&mut self, sigma: &SigmaPoints) {
        self.sigma_point_counts.push(sigma.len());
    }

    fn on_scores(&mut self, scores: &[PoseScore]) {
        self.scores.push(scores.to_vec());
    }

    fn on_update(&mut self, belief: &Belief, prior_kept: bool) {
        self.updates.push((belief.clone(), prior_kept));
    }

    fn on_fault(&mut self, error: &TrackerError) {
        self.faults.push(error.clone());
    }
}

// ============================================================================
// LoggingReporter
// ============================================================================

/// Reporter that emits events through the `log` crate.
///
/// - `on_prediction`, `on_update`: DEBUG (pose details at TRACE when verbose)
/// - `on_sigma_points`, `on_scores`: TRACE
/// - `on_fault`: WARN
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingReporter {
    /// Whether to include pose details in log messages
    verbose: bool,
}

impl LoggingReporter {
    /// Create a new logging reporter.
    pub fn new() -> Self {
        Self { verbose: false }
    }

    /// Create a verbose logging reporter that includes pose details.
    pub fn verbose() -> Self {
        Self { verbose: true }
    }

    fn log_pose(&self, belief: &Belief) {
        if self.verbose {
            let pose = belief.pose();
            log::trace!(
                "  translation={:?}, rotation={:?}, trace(P)={:.3e}",
                pose.translation.vector.as_slice(),
                pose.rotation.scaled_axis().as_slice(),
                belief.covariance.trace()
            );
        }
    }
}

impl StepReporter for LoggingReporter {
    fn on_prediction(&mut self, belief: &Belief, dt: f64) {
        log::debug!("Prediction complete: dt={:.4}, dim={}", dt, belief.dim());
        self.log_pose(belief);
    }

    fn on_sigma_points(&mut self, sigma: &SigmaPoints) {
        log::trace!("Generated {} sigma points (dim {})", sigma.len(), sigma.dim());
    }

    fn on_scores(&mut self, scores: &[PoseScore]) {
        let best = scores
            .iter()
            .map(|s| s.total)
            .fold(f64::NEG_INFINITY, f64::max);
        log::trace!("Scored {} poses, best log-likelihood {:.3}", scores.len(), best);
    }

    fn on_update(&mut self, belief: &Belief, prior_kept: bool) {
        if prior_kept {
            log::debug!("Update complete: evidence degenerate, prior kept");
        } else {
            log::debug!("Update complete: trace(P)={:.3e}", belief.covariance.trace());
        }
        self.log_pose(belief);
    }

    fn on_fault(&mut self, error: &TrackerError) {
        log::warn!("Filter faulted: {}", error);
    }
}

// ============================================================================
// CompositeReporter
// ============================================================================

/// Reporter that forwards events to two child reporters.
#[derive(Debug, Clone)]
pub struct CompositeReporter<A: StepReporter, B: StepReporter> {
    first: A,
    second: B,
}

impl<A: StepReporter, B: StepReporter> CompositeReporter<A, B> {
    /// Create a new composite reporter.
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }

    /// Get a reference to the first reporter.
    pub fn first(&self) -> &A {
        &self.first
    }

    /// Get a mutable reference to the first reporter.
    pub fn first_mut(&mut self) -> &mut A {
        &mut self.first
    }

    /// Get a reference to the second reporter.
    pub fn second(&self) -> &B {
        &self.second
    }

    /// Get a mutable reference to the second reporter.
    pub fn second_mut(&mut self) -> &mut B {
        &mut self.second
    }

    /// Consume and return both reporters.
    pub fn into_parts(self) -> (A, B) {
        (self.first, self.second)
    }
}

impl<A: StepReporter, B: StepReporter> StepReporter for CompositeReporter<A, B> {
    fn on_prediction(&mut self, belief: &Belief, dt: f64) {
        self.first.on_prediction(belief, dt);
        self.second.on_prediction(belief, dt);
    }

    fn on_sigma_points(&mut self, sigma: &SigmaPoints) {
        self.first.on_sigma_points(sigma);
        self.second.on_sigma_points(sigma);
    }

    fn on_scores(&mut self, scores: &[PoseScore]) {
        self.first.on_scores(scores);
        self.second.on_scores(scores);
    }

    fn on_update(&mut self, belief: &Belief, prior_kept: bool) {
        self.first.on_update(belief, prior_kept);
        self.second.on_update(belief, prior_kept);
    }

    fn on_fault(&mut self, error: &TrackerError) {
        self.first.on_fault(error);
        self.second.on_fault(error);
    }
}

// ============================================================================
// Tests
// ============================================================================
