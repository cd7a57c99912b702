//! High-fidelity orbit propagator
//!
//! Orchestrates the numerical integration with configurable force models and
//! samples the result on a fixed output grid.

use satkit::{Duration, Instant};

use super::forces::CompositeForce;
use super::integrator::{Integrator, IntegratorConfig, Rkf78};
use super::sampler::{FixedStepSampler, DEFAULT_OUTPUT_STEP};
use super::state::{duration_from_seconds, SpacecraftState};
use super::trajectory::SampledTrajectory;
use crate::error::PropagationError;

/// High-fidelity orbit propagator
///
/// Binds one force model, one integrator and one output step. Every call to
/// [`propagate`](Self::propagate) owns a fresh sampler, so the propagator can
/// be reused for any number of independent runs.
pub struct HiFiPropagator {
    /// Numerical integrator (swappable at runtime)
    integrator: Box<dyn Integrator>,

    /// Composite force model
    forces: CompositeForce,

    /// Output sample spacing in seconds
    output_step: f64,
}

impl HiFiPropagator {
    /// Create a new propagator with the given integrator and forces
    pub fn new(integrator: impl Integrator + 'static, forces: CompositeForce) -> Self {
        Self::with_output_step(Box::new(integrator), forces, DEFAULT_OUTPUT_STEP)
    }

    /// RKF 7(8) with `config` over `forces`
    pub fn rkf78(config: IntegratorConfig, forces: CompositeForce) -> Self {
        Self::new(Rkf78::new(config), forces)
    }

    /// Create with a custom output step
    pub fn with_output_step(
        integrator: Box<dyn Integrator>,
        forces: CompositeForce,
        output_step: f64,
    ) -> Self {
        Self {
            integrator,
            forces,
            output_step,
        }
    }

    pub fn forces(&self) -> &CompositeForce {
        &self.forces
    }

    pub fn integrator_name(&self) -> &'static str {
        self.integrator.name()
    }

    pub fn output_step(&self) -> f64 {
        self.output_step
    }

    /// Propagate from initial state to target epoch
    pub fn propagate(
        &self,
        initial: &SpacecraftState,
        target_epoch: Instant,
    ) -> Result<SampledTrajectory, PropagationError> {
        // Validate initial state
        if !initial.is_finite() {
            return Err(PropagationError::InvalidState(
                "position or velocity is not finite".to_string(),
            ));
        }
        if initial.radius() < 1.0 {
            return Err(PropagationError::InvalidState(
                "position magnitude too small".to_string(),
            ));
        }
        if !(self.output_step.is_finite() && self.output_step > 0.0) {
            return Err(PropagationError::InvalidState(format!(
                "output step must be positive, got {} s",
                self.output_step
            )));
        }

        // Direction is checked by the integrator
        log::debug!(
            "Propagating {:.1} s about the {} with {} (order {}, {} stages), forces: {}",
            (target_epoch - initial.epoch()).as_seconds(),
            self.forces.central_body(),
            self.integrator.name(),
            self.integrator.order(),
            self.integrator.stages(),
            self.forces.model_names().join(", ")
        );

        let forces = &self.forces;
        let derivatives =
            |state: &SpacecraftState| (*state.velocity(), forces.total_acceleration(state));

        let mut sampler = FixedStepSampler::new(self.output_step);
        let summary =
            self.integrator
                .integrate(initial, target_epoch, &derivatives, &mut sampler)?;

        let trajectory = sampler.into_trajectory();
        log::debug!(
            "Propagation complete: {} samples, {} steps ({} rejected)",
            trajectory.len(),
            summary.accepted_steps,
            summary.rejected_steps
        );

        Ok(trajectory)
    }

    /// Propagate for a duration
    pub fn propagate_duration(
        &self,
        initial: &SpacecraftState,
        duration: Duration,
    ) -> Result<SampledTrajectory, PropagationError> {
        let target_epoch = initial.epoch() + duration;
        self.propagate(initial, target_epoch)
    }

    /// Propagate for a number of two-body periods about the central body
    pub fn propagate_periods(
        &self,
        initial: &SpacecraftState,
        periods: f64,
    ) -> Result<SampledTrajectory, PropagationError> {
        let period = initial.period(self.forces.mu()).ok_or_else(|| {
            PropagationError::InvalidState("state is not on a bound orbit".to_string())
        })?;
        self.propagate_duration(initial, duration_from_seconds(period * periods))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bodies::{CelestialBody, MU_MOON};
    use crate::error::IntegrationError;
    use crate::propagation::elements::KeplerianElements;
    use crate::propagation::ephemeris::SatkitEphemeris;
    use crate::propagation::forces::{BuiltinGravityFields, SphericalHarmonics, ThirdBody};
    use nalgebra::Vector3;
    use std::sync::Arc;

    fn epoch() -> Instant {
        Instant::from_datetime(2025, 1, 23, 0, 0, 0.0).unwrap()
    }

    fn eccentric_initial() -> SpacecraftState {
        KeplerianElements::from_apsides(
            CelestialBody::Moon.equatorial_radius() + 100_000.0,
            CelestialBody::Moon.equatorial_radius() + 500_000.0,
            30f64.to_radians(),
            0.0,
            0.0,
            0.0,
            MU_MOON,
        )
        .to_cartesian(epoch())
        .unwrap()
    }

    #[test]
    fn test_two_body_sma_constant_over_one_period() {
        let forces = CompositeForce::point_mass_only(CelestialBody::Moon);
        let propagator = HiFiPropagator::rkf78(IntegratorConfig::default(), forces);

        let initial = eccentric_initial();
        let a0 = initial.semi_major_axis(MU_MOON);
        let trajectory = propagator.propagate_periods(&initial, 1.0).unwrap();

        for state in &trajectory {
            let a = state.semi_major_axis(MU_MOON);
            assert!((a - a0).abs() / a0 < 1e-7, "sma drift {} m", a - a0);
        }

        // Back at periapsis after one period
        let final_pos = trajectory.last().unwrap().position();
        let pos_error = (final_pos - initial.position()).norm() / initial.radius();
        assert!(pos_error < 1e-6, "Position error too large: {}", pos_error);
    }

    #[test]
    fn test_repeated_calls_are_independent() {
        let forces = CompositeForce::point_mass_only(CelestialBody::Moon);
        let propagator = HiFiPropagator::rkf78(IntegratorConfig::default(), forces);
        let initial = eccentric_initial();

        let first = propagator
            .propagate_duration(&initial, Duration::from_seconds(1800.0))
            .unwrap();
        let second = propagator
            .propagate_duration(&initial, Duration::from_seconds(1800.0))
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 31);
        assert_eq!(first.step(), propagator.output_step());
    }

    #[test]
    fn test_full_force_model() {
        let ephemeris = Arc::new(SatkitEphemeris::low_precision());
        let forces = CompositeForce::builder(CelestialBody::Moon)
            .with_harmonics(
                SphericalHarmonics::from_provider(
                    &BuiltinGravityFields,
                    CelestialBody::Moon,
                    3,
                    3,
                )
                .unwrap(),
            )
            .with_third_body(ThirdBody::new(
                CelestialBody::Earth,
                CelestialBody::Moon,
                ephemeris.clone(),
            ))
            .with_third_body(ThirdBody::new(
                CelestialBody::Sun,
                CelestialBody::Moon,
                ephemeris,
            ))
            .build();
        let propagator = HiFiPropagator::rkf78(IntegratorConfig::default(), forces);

        let initial = eccentric_initial();
        let trajectory = propagator
            .propagate_duration(&initial, Duration::from_seconds(3600.0))
            .unwrap();

        assert_eq!(trajectory.len(), 61);
        // Perturbations keep the orbit close to its two-body size over an hour
        let a0 = initial.semi_major_axis(MU_MOON);
        let a1 = trajectory.last().unwrap().semi_major_axis(MU_MOON);
        assert!((a1 - a0).abs() / a0 < 1e-2);
    }

    #[test]
    fn test_rejects_invalid_inputs() {
        let propagator = HiFiPropagator::rkf78(
            IntegratorConfig::default(),
            CompositeForce::point_mass_only(CelestialBody::Moon),
        );

        let at_centre = SpacecraftState::new(Vector3::zeros(), Vector3::zeros(), epoch());
        assert!(matches!(
            propagator.propagate(&at_centre, epoch() + Duration::from_seconds(60.0)),
            Err(PropagationError::InvalidState(_))
        ));

        let initial = eccentric_initial();
        assert!(matches!(
            propagator.propagate(&initial, epoch() - Duration::from_seconds(60.0)),
            Err(PropagationError::Integration(
                IntegrationError::BackwardIntegration { .. }
            ))
        ));
    }

    #[test]
    fn test_integration_errors_pass_through() {
        let config = IntegratorConfig {
            min_step: 500.0,
            max_step: 1000.0,
            abs_tol: 1e-16,
            rel_tol: 1e-16,
            ..IntegratorConfig::default()
        };
        let propagator = HiFiPropagator::rkf78(
            config,
            CompositeForce::point_mass_only(CelestialBody::Moon),
        );

        let result = propagator
            .propagate_duration(&eccentric_initial(), Duration::from_seconds(3600.0));
        assert!(matches!(
            result,
            Err(PropagationError::Integration(IntegrationError::Diverged { .. }))
        ));
    }
}
