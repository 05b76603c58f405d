//! Robust Gaussian filter
//!
//! A sigma-point filter over the object state. Prediction pushes the belief
//! through the transition model and adds process noise. An update scores
//! every sigma point of the prior by render-and-compare against one frame
//! per sensor, tempers the scores by `update_rate`, and conditions the prior
//! on them axis by axis (see [`UnscentedQuadrature::condition`]).
//!
//! The score at each `±` pair and the center gives a slope and a curvature
//! of the log-likelihood along that axis. A flat likelihood leaves the axis
//! alone, a peaked one shrinks its variance, and the mean moves by at most
//! one sigma-point spread per update. `update_rate < 1` scales the slope and
//! curvature down and damps the correction.
//!
//! After each update the pose delta is folded into the reference pose.

use crate::common::linalg::symmetrize;
use crate::components::{ObjectTransitionModel, UnscentedQuadrature};
use crate::depth::DepthImage;
use crate::errors::TrackerError;
use crate::observation::{check_observations, ObservationBackend, ObservationModel};
use crate::reporter::{NoOpReporter, StepReporter};
use crate::state::{Belief, StateLayout};

use super::traits::{Filter, FilterState};

/// Sigma-point filter with a robust render-and-compare likelihood
///
/// # Type Parameters
///
/// * `O` - Observation model (default: the backend chosen by the builder)
/// * `R` - Step reporter (default: [`NoOpReporter`])
#[derive(Debug)]
pub struct RobustGaussianFilter<O: ObservationModel = ObservationBackend, R: StepReporter = NoOpReporter>
{
    transition: ObjectTransitionModel,
    quadrature: UnscentedQuadrature,
    observation: O,
    update_rate: f64,

    belief: Option<Belief>,
    state: FilterState,

    reporter: R,
}

impl<O: ObservationModel> RobustGaussianFilter<O, NoOpReporter> {
    /// Assemble a filter; it starts [`FilterState::Uninitialized`]
    pub fn new(
        transition: ObjectTransitionModel,
        quadrature: UnscentedQuadrature,
        observation: O,
        update_rate: f64,
    ) -> Result<Self, TrackerError> {
        if !(update_rate > 0.0 && update_rate <= 1.0) {
            return Err(TrackerError::invalid_parameter(
                "update_rate",
                format!("must be in (0, 1], got {}", update_rate),
            ));
        }
        Ok(Self {
            transition,
            quadrature,
            observation,
            update_rate,
            belief: None,
            state: FilterState::Uninitialized,
            reporter: NoOpReporter,
        })
    }
}

impl<O: ObservationModel, R: StepReporter> RobustGaussianFilter<O, R> {
    /// Replace the reporter
    pub fn with_reporter<R2: StepReporter>(self, reporter: R2) -> RobustGaussianFilter<O, R2> {
        RobustGaussianFilter {
            transition: self.transition,
            quadrature: self.quadrature,
            observation: self.observation,
            update_rate: self.update_rate,
            belief: self.belief,
            state: self.state,
            reporter,
        }
    }

    /// Transition model
    pub fn transition(&self) -> &ObjectTransitionModel {
        &self.transition
    }

    /// Quadrature rule
    pub fn quadrature(&self) -> &UnscentedQuadrature {
        &self.quadrature
    }

    /// Observation model
    pub fn observation_model(&self) -> &O {
        &self.observation
    }

    /// Likelihood tempering exponent
    pub fn update_rate(&self) -> f64 {
        self.update_rate
    }

    /// State layout expected of beliefs
    pub fn layout(&self) -> StateLayout {
        self.transition.layout()
    }

    /// Reporter
    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    /// Mutable reporter
    pub fn reporter_mut(&mut self) -> &mut R {
        &mut self.reporter
    }

    fn ready(&self) -> Result<&Belief, TrackerError> {
        match self.state {
            FilterState::Uninitialized => Err(TrackerError::NotInitialized),
            FilterState::Faulted => Err(TrackerError::Faulted),
            FilterState::Ready => self.belief.as_ref().ok_or(TrackerError::NotInitialized),
        }
    }

    /// Enter the faulted state on errors that invalidate the belief
    fn guard<T>(&mut self, result: Result<T, TrackerError>) -> Result<T, TrackerError> {
        if let Err(e) = &result {
            if e.is_fatal_to_filter() && self.state != FilterState::Faulted {
                log::warn!("Filter faulted: {}", e);
                self.state = FilterState::Faulted;
                self.belief = None;
                self.reporter.on_fault(e);
            }
        }
        result
    }

    fn update_impl(&mut self, observations: &[DepthImage]) -> Result<(), TrackerError> {
        self.ready()?;
        check_observations(&self.observation, observations)?;

        let sigma = {
            let belief = self.ready()?;
            self.quadrature.sigma_points(&belief.mean, &belief.covariance)
        };
        let sigma = self.guard(sigma)?;
        self.reporter.on_sigma_points(&sigma);

        let poses = {
            let belief = self.ready()?;
            sigma.points.iter().map(|p| belief.pose_of(p)).collect::<Vec<_>>()
        };
        let scores = self.observation.log_likelihoods(&poses, observations)?;
        if scores.len() != sigma.len() {
            return Err(TrackerError::dimension_mismatch(
                sigma.len(),
                scores.len(),
                "pose scores",
            ));
        }
        self.reporter.on_scores(&scores);

        let tempered: Vec<f64> = scores.iter().map(|s| self.update_rate * s.total).collect();
        if tempered.iter().any(|l| !l.is_finite()) {
            log::debug!("Non-finite pose score, keeping prior");
            if let Some(belief) = &self.belief {
                self.reporter.on_update(belief, true);
            }
            return Ok(());
        }

        let moments = self.quadrature.condition(&sigma, &tempered);
        let (mean, covariance) = self.guard(moments)?;

        let posterior = {
            let belief = self.ready()?;
            Belief::with_mean(belief.layout(), *belief.reference(), mean, covariance)
        };
        let mut posterior = self.guard(posterior)?;
        posterior.recenter();

        self.reporter.on_update(&posterior, false);
        self.belief = Some(posterior);
        Ok(())
    }
}

impl<O: ObservationModel, R: StepReporter> Filter for RobustGaussianFilter<O, R> {
    type Observations = [DepthImage];

    fn initialize(&mut self, belief: Belief) -> Result<(), TrackerError> {
        if belief.layout() != self.layout() {
            return Err(TrackerError::dimension_mismatch(
                self.layout().dim(),
                belief.dim(),
                "initial belief",
            ));
        }
        belief.check()?;
        self.belief = Some(belief);
        self.state = FilterState::Ready;
        Ok(())
    }

    fn predict(&mut self, dt: f64) -> Result<(), TrackerError> {
        self.ready()?;
        let q = self.transition.process_noise(dt)?;

        let moments = {
            let belief = self.ready()?;
            let transition = &self.transition;
            self.quadrature
                .unscented_transform(&belief.mean, &belief.covariance, |x| {
                    transition.predict(x, dt)
                })
        };
        let (mean, covariance) = self.guard(moments)?;

        let predicted = {
            let belief = self.ready()?;
            Belief::with_mean(
                belief.layout(),
                *belief.reference(),
                mean,
                symmetrize(&(covariance + q)),
            )
        };
        let predicted = self.guard(predicted)?;

        self.reporter.on_prediction(&predicted, dt);
        self.belief = Some(predicted);
        Ok(())
    }

    fn update(&mut self, observations: &[DepthImage]) -> Result<(), TrackerError> {
        self.update_impl(observations)
    }

    fn belief(&self) -> Option<&Belief> {
        self.ready().ok()
    }

    fn state(&self) -> FilterState {
        self.state
    }

    fn reset(&mut self) {
        self.belief = None;
        self.state = FilterState::Uninitialized;
    }

    fn x_dim(&self) -> usize {
        self.transition.dim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraData, Intrinsics};
    use crate::common::linalg::is_positive_semidefinite;
    use crate::config::{Backend, ObjectTransitionParams};
    use crate::observation::PoseScore;
    use nalgebra::{DMatrix, Isometry3, Vector3};
    use smallvec::smallvec;

    /// Scores poses by a Gaussian on their translation
    #[derive(Debug)]
    struct TranslationModel {
        camera: CameraData,
        target: Vector3<f64>,
        std: f64,
        flat: bool,
    }

    impl TranslationModel {
        fn new(target: Vector3<f64>, std: f64) -> Self {
            Self {
                camera: CameraData::new(Intrinsics::new(1.0, 1.0, 0.0, 0.0), 1, 1).unwrap(),
                target,
                std,
                flat: false,
            }
        }
    }

    impl ObservationModel for TranslationModel {
        fn backend(&self) -> Backend {
            Backend::Cpu
        }

        fn sensor_count(&self) -> usize {
            1
        }

        fn camera(&self, sensor: usize) -> Option<&CameraData> {
            (sensor == 0).then_some(&self.camera)
        }

        fn render(&self, _sensor: usize, _pose: &Isometry3<f64>) -> Result<DepthImage, TrackerError> {
            Ok(DepthImage::invalid(1, 1))
        }

        fn log_likelihoods(
            &self,
            poses: &[Isometry3<f64>],
            _observations: &[DepthImage],
        ) -> Result<Vec<PoseScore>, TrackerError> {
            Ok(poses
                .iter()
                .map(|p| {
                    let ll = if self.flat {
                        f64::NEG_INFINITY
                    } else {
                        let d = p.translation.vector - self.target;
                        -0.5 * d.norm_squared() / (self.std * self.std)
                    };
                    PoseScore::from_sensors(smallvec![ll])
                })
                .collect())
        }
    }

    fn filter(
        model: TranslationModel,
        transition: ObjectTransitionParams,
        update_rate: f64,
    ) -> RobustGaussianFilter<TranslationModel> {
        filter_with_alpha(model, transition, update_rate, 1.0)
    }

    fn filter_with_alpha(
        model: TranslationModel,
        transition: ObjectTransitionParams,
        update_rate: f64,
        alpha: f64,
    ) -> RobustGaussianFilter<TranslationModel> {
        let mut f = RobustGaussianFilter::new(
            ObjectTransitionModel::new(&transition),
            UnscentedQuadrature::new(alpha).unwrap(),
            model,
            update_rate,
        )
        .unwrap();
        let layout = f.layout();
        f.initialize(Belief::isotropic(layout, Isometry3::identity(), 0.1, 0.05, 0.1).unwrap())
            .unwrap();
        f
    }

    fn frame() -> Vec<DepthImage> {
        vec![DepthImage::invalid(1, 1)]
    }

    #[test]
    fn test_requires_initialization() {
        let mut f = RobustGaussianFilter::new(
            ObjectTransitionModel::new(&ObjectTransitionParams::default()),
            UnscentedQuadrature::new(1.0).unwrap(),
            TranslationModel::new(Vector3::zeros(), 0.1),
            1.0,
        )
        .unwrap();
        assert_eq!(f.state(), FilterState::Uninitialized);
        assert_eq!(f.predict(0.1), Err(TrackerError::NotInitialized));
        assert_eq!(f.update(&frame()), Err(TrackerError::NotInitialized));
        assert!(f.belief().is_none());
    }

    #[test]
    fn test_rejects_invalid_update_rate() {
        for rate in [0.0, -0.5, 1.5, f64::NAN] {
            let result = RobustGaussianFilter::new(
                ObjectTransitionModel::new(&ObjectTransitionParams::default()),
                UnscentedQuadrature::new(1.0).unwrap(),
                TranslationModel::new(Vector3::zeros(), 0.1),
                rate,
            );
            assert_eq!(result.unwrap_err().parameter_field(), Some("update_rate"));
        }
    }

    #[test]
    fn test_initialize_checks_layout() {
        let mut f = filter(
            TranslationModel::new(Vector3::zeros(), 0.1),
            ObjectTransitionParams::constant_pose(0.01, 0.01),
            1.0,
        );
        let wrong = Belief::isotropic(
            StateLayout::PoseVelocity,
            Isometry3::identity(),
            0.1,
            0.1,
            0.1,
        )
        .unwrap();
        assert!(matches!(
            f.initialize(wrong),
            Err(TrackerError::DimensionMismatch { .. })
        ));
        assert_eq!(f.state(), FilterState::Ready);
    }

    #[test]
    fn test_constant_pose_prediction_adds_process_noise() {
        let mut f = filter(
            TranslationModel::new(Vector3::zeros(), 0.1),
            ObjectTransitionParams::constant_pose(0.02, 0.03),
            1.0,
        );
        let prior = f.belief().unwrap().clone();
        f.predict(0.5).unwrap();
        let predicted = f.belief().unwrap();
        assert!((&predicted.mean - &prior.mean).norm() < 1e-12);
        let q = f.transition().process_noise(0.5).unwrap();
        assert!((&predicted.covariance - (&prior.covariance + q)).norm() < 1e-12);
    }

    #[test]
    fn test_invalid_timestep_leaves_belief_untouched() {
        let mut f = filter(
            TranslationModel::new(Vector3::zeros(), 0.1),
            ObjectTransitionParams::default(),
            1.0,
        );
        let prior = f.belief().unwrap().clone();
        for dt in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                f.predict(dt),
                Err(TrackerError::InvalidTimestep { .. })
            ));
        }
        assert_eq!(f.state(), FilterState::Ready);
        assert_eq!(f.belief().unwrap(), &prior);
    }

    #[test]
    fn test_update_moves_toward_evidence() {
        let target = Vector3::new(0.05, 0.0, 0.0);
        let mut f = filter(
            TranslationModel::new(target, 0.1),
            ObjectTransitionParams::constant_pose(0.01, 0.01),
            1.0,
        );
        let prior_var = f.belief().unwrap().covariance[(0, 0)];
        f.update(&frame()).unwrap();

        let posterior = f.belief().unwrap();
        let x = posterior.pose().translation.vector.x;
        assert!(x > 0.0 && x < 0.05, "x = {}", x);
        assert!(posterior.covariance[(0, 0)] < prior_var);
        assert!(posterior.is_well_defined());
        // delta folded into the reference
        assert!(posterior.mean.rows(0, 6).norm() < 1e-15);
    }

    #[test]
    fn test_gaussian_evidence_gives_exact_posterior_for_any_alpha() {
        // prior x ~ N(0, 0.01), likelihood x ~ N(0.05, 0.01)
        let target = Vector3::new(0.05, 0.0, 0.0);
        for alpha in [0.3, 0.5, 1.0, 2.0] {
            let mut f = filter_with_alpha(
                TranslationModel::new(target, 0.1),
                ObjectTransitionParams::constant_pose(0.01, 0.01),
                1.0,
                alpha,
            );
            f.update(&frame()).unwrap();
            let posterior = f.belief().unwrap();
            let t = posterior.pose().translation.vector;
            assert!((t.x - 0.025).abs() < 1e-9, "alpha={} x={}", alpha, t.x);
            assert!(t.y.abs() < 1e-9 && t.z.abs() < 1e-9);
            for i in 0..3 {
                let var = posterior.covariance[(i, i)];
                assert!((var - 0.005).abs() < 1e-9, "alpha={} var={}", alpha, var);
            }
            // rotation carries no evidence
            assert!((posterior.covariance[(3, 3)] - 0.0025).abs() < 1e-12);
        }
    }

    #[test]
    fn test_small_alpha_keeps_evidence() {
        let target = Vector3::new(0.05, 0.0, 0.0);
        let mut f = filter_with_alpha(
            TranslationModel::new(target, 0.1),
            ObjectTransitionParams::constant_pose(0.01, 0.01),
            1.0,
            0.5,
        )
        .with_reporter(crate::reporter::DebugReporter::new());
        let prior = f.belief().unwrap().clone();
        f.update(&frame()).unwrap();
        assert!(!f.reporter().update_events()[0].1);
        let posterior = f.belief().unwrap();
        assert!(posterior.pose().translation.vector.x > 0.02);
        assert!(posterior.covariance[(0, 0)] < prior.covariance[(0, 0)]);
        assert!(is_positive_semidefinite(&(&prior.covariance - &posterior.covariance)));
    }

    #[test]
    fn test_lower_update_rate_damps_correction() {
        // broad likelihood, where tempering shrinks the step monotonically
        let target = Vector3::new(0.05, 0.0, 0.0);
        let mut full = filter(
            TranslationModel::new(target, 1.0),
            ObjectTransitionParams::constant_pose(0.01, 0.01),
            1.0,
        );
        let mut damped = filter(
            TranslationModel::new(target, 1.0),
            ObjectTransitionParams::constant_pose(0.01, 0.01),
            0.25,
        );
        full.update(&frame()).unwrap();
        damped.update(&frame()).unwrap();
        let x_full = full.belief().unwrap().pose().translation.vector.x;
        let x_damped = damped.belief().unwrap().pose().translation.vector.x;
        assert!(x_damped > 0.0);
        assert!(x_damped < x_full);
    }

    #[test]
    fn test_degenerate_evidence_keeps_prior() {
        let mut model = TranslationModel::new(Vector3::zeros(), 0.1);
        model.flat = true;
        let mut f = filter(model, ObjectTransitionParams::default(), 1.0).with_reporter(
            crate::reporter::DebugReporter::new(),
        );
        let prior = f.belief().unwrap().clone();
        f.update(&frame()).unwrap();
        assert_eq!(f.belief().unwrap(), &prior);
        assert_eq!(f.state(), FilterState::Ready);
        assert!(f.reporter().update_events()[0].1);
    }

    #[test]
    fn test_stream_mismatch_is_per_frame() {
        let mut f = filter(
            TranslationModel::new(Vector3::zeros(), 0.1),
            ObjectTransitionParams::default(),
            1.0,
        );
        let prior = f.belief().unwrap().clone();
        let two = vec![DepthImage::invalid(1, 1), DepthImage::invalid(1, 1)];
        assert!(matches!(
            f.update(&two),
            Err(TrackerError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            f.update(&[DepthImage::invalid(2, 1)]),
            Err(TrackerError::DimensionMismatch { .. })
        ));
        assert_eq!(f.state(), FilterState::Ready);
        assert_eq!(f.belief().unwrap(), &prior);
    }

    #[test]
    fn test_overflowing_prediction_faults_until_reinitialized() {
        let mut f = filter(
            TranslationModel::new(Vector3::zeros(), 0.1),
            ObjectTransitionParams::constant_velocity(0.01, 0.01, 0.9),
            1.0,
        )
        .with_reporter(crate::reporter::DebugReporter::new());
        let result = f.predict(1e200);
        assert!(matches!(result, Err(TrackerError::DegenerateCovariance { .. })));
        assert_eq!(f.state(), FilterState::Faulted);
        assert!(f.belief().is_none());
        assert_eq!(f.reporter().fault_events().len(), 1);
        assert_eq!(f.predict(0.1), Err(TrackerError::Faulted));
        assert_eq!(f.update(&frame()), Err(TrackerError::Faulted));

        let layout = f.layout();
        let belief = Belief::new(layout, Isometry3::identity(), DMatrix::identity(12, 12)).unwrap();
        f.initialize(belief).unwrap();
        assert_eq!(f.state(), FilterState::Ready);
        f.predict(0.1).unwrap();
    }

    #[test]
    fn test_reset_returns_to_uninitialized() {
        let mut f = filter(
            TranslationModel::new(Vector3::zeros(), 0.1),
            ObjectTransitionParams::default(),
            1.0,
        );
        assert_eq!(f.x_dim(), 12);
        f.reset();
        assert_eq!(f.state(), FilterState::Uninitialized);
        assert!(f.belief().is_none());
    }
}
