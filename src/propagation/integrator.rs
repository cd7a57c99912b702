//! Adaptive numerical integrator for orbit propagation
//!
//! The integrator drives a state from an initial epoch to a target epoch,
//! handing every accepted step to a [`StepSink`]. Integrators sit behind a trait
//! so the method can be swapped without touching the orchestrator.
//!
//! # Available Integrators
//!
//! - **Rkf78**: Runge-Kutta-Fehlberg 7(8), 13 stages, eighth-order solution
//!   propagated, seventh-order companion for local error control

use nalgebra::{Vector3, Vector6};
use satkit::Instant;
use serde::{Deserialize, Serialize};

use crate::error::IntegrationError;
use crate::propagation::state::{duration_from_seconds, SpacecraftState};

/// Gap under which a step is stretched to land on the next stop instead of
/// leaving a sliver behind (seconds)
const STOP_SNAP_S: f64 = 1e-6;

/// Derivative function: state -> (velocity, acceleration)
pub type Derivatives<'a> = dyn Fn(&SpacecraftState) -> (Vector3<f64>, Vector3<f64>) + 'a;

/// Step size and error control settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegratorConfig {
    /// Minimum allowed step size (seconds)
    pub min_step: f64,

    /// Maximum allowed step size (seconds)
    pub max_step: f64,

    /// Absolute tolerance (m and m/s)
    pub abs_tol: f64,

    /// Relative tolerance
    pub rel_tol: f64,

    /// Safety factor for step size adjustment
    pub safety: f64,

    /// Maximum step growth factor
    pub max_growth: f64,

    /// Maximum step shrink factor
    pub max_shrink: f64,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self {
            min_step: 1.0,
            max_step: 1000.0,
            abs_tol: 1e-8,
            rel_tol: 1e-10,
            safety: 0.9,
            max_growth: 5.0,
            max_shrink: 0.2,
        }
    }
}

impl IntegratorConfig {
    /// Looser tolerances for quick studies
    pub fn fast() -> Self {
        Self {
            min_step: 1.0,
            max_step: 1000.0,
            abs_tol: 1e-6,
            rel_tol: 1e-8,
            ..Self::default()
        }
    }

    /// Tighter tolerances and smaller steps
    pub fn high_precision() -> Self {
        Self {
            min_step: 0.01,
            max_step: 300.0,
            abs_tol: 1e-10,
            rel_tol: 1e-12,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), IntegrationError> {
        let invalid = |msg: String| Err(IntegrationError::InvalidConfig(msg));

        if !(self.min_step.is_finite() && self.min_step > 0.0) {
            return invalid(format!("min_step must be positive, got {}", self.min_step));
        }
        if !(self.max_step.is_finite() && self.max_step >= self.min_step) {
            return invalid(format!(
                "max_step ({}) must be at least min_step ({})",
                self.max_step, self.min_step
            ));
        }
        if !(self.abs_tol.is_finite() && self.abs_tol > 0.0) {
            return invalid(format!("abs_tol must be positive, got {}", self.abs_tol));
        }
        if !(self.rel_tol.is_finite() && self.rel_tol > 0.0) {
            return invalid(format!("rel_tol must be positive, got {}", self.rel_tol));
        }
        if !(self.safety > 0.0 && self.safety <= 1.0) {
            return invalid(format!("safety must lie in (0, 1], got {}", self.safety));
        }
        if !(self.max_shrink > 0.0 && self.max_shrink < 1.0) {
            return invalid(format!(
                "max_shrink must lie in (0, 1), got {}",
                self.max_shrink
            ));
        }
        if !(self.max_growth > 1.0 && self.max_growth.is_finite()) {
            return invalid(format!(
                "max_growth must exceed 1, got {}",
                self.max_growth
            ));
        }
        Ok(())
    }
}

/// Receiver of accepted integration steps
pub trait StepSink {
    /// Called once before the first step
    fn init(&mut self, _initial: &SpacecraftState, _target_epoch: Instant) {}

    /// Next elapsed time (seconds from the initial epoch) the integrator must
    /// land on exactly, if any
    fn next_stop(&self) -> Option<f64> {
        None
    }

    /// Called exactly once per accepted step with the new state and the
    /// elapsed seconds since the initial epoch
    fn handle_step(&mut self, state: &SpacecraftState, elapsed: f64);
}

/// Outcome of a successful integration
#[derive(Debug, Clone)]
pub struct IntegrationSummary {
    /// State at the target epoch
    pub final_state: SpacecraftState,

    pub accepted_steps: usize,

    pub rejected_steps: usize,

    /// Number of derivative evaluations
    pub evaluations: usize,
}

/// Trait for numerical integrators
///
/// Implementations must be `Send + Sync` to allow parallel propagation of
/// independent trajectories.
pub trait Integrator: Send + Sync {
    /// Integrate from `initial` to `target_epoch`, landing exactly on it
    fn integrate(
        &self,
        initial: &SpacecraftState,
        target_epoch: Instant,
        derivatives: &Derivatives<'_>,
        sink: &mut dyn StepSink,
    ) -> Result<IntegrationSummary, IntegrationError>;

    /// Integrator name
    fn name(&self) -> &'static str;

    /// Order of the propagated solution
    fn order(&self) -> u8;

    /// Number of function evaluations per step
    fn stages(&self) -> usize;
}

// Fehlberg 7(8) tableau
const C: [f64; 13] = [
    0.0,
    2.0 / 27.0,
    1.0 / 9.0,
    1.0 / 6.0,
    5.0 / 12.0,
    1.0 / 2.0,
    5.0 / 6.0,
    1.0 / 6.0,
    2.0 / 3.0,
    1.0 / 3.0,
    1.0,
    0.0,
    1.0,
];

const A: [[f64; 12]; 13] = [
    [0.0; 12],
    [2.0 / 27.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0 / 36.0, 1.0 / 12.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0 / 24.0, 0.0, 1.0 / 8.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [5.0 / 12.0, 0.0, -25.0 / 16.0, 25.0 / 16.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0 / 20.0, 0.0, 0.0, 1.0 / 4.0, 1.0 / 5.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [
        -25.0 / 108.0,
        0.0,
        0.0,
        125.0 / 108.0,
        -65.0 / 27.0,
        125.0 / 54.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
    ],
    [
        31.0 / 300.0,
        0.0,
        0.0,
        0.0,
        61.0 / 225.0,
        -2.0 / 9.0,
        13.0 / 900.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
    ],
    [
        2.0,
        0.0,
        0.0,
        -53.0 / 6.0,
        704.0 / 45.0,
        -107.0 / 9.0,
        67.0 / 90.0,
        3.0,
        0.0,
        0.0,
        0.0,
        0.0,
    ],
    [
        -91.0 / 108.0,
        0.0,
        0.0,
        23.0 / 108.0,
        -976.0 / 135.0,
        311.0 / 54.0,
        -19.0 / 60.0,
        17.0 / 6.0,
        -1.0 / 12.0,
        0.0,
        0.0,
        0.0,
    ],
    [
        2383.0 / 4100.0,
        0.0,
        0.0,
        -341.0 / 164.0,
        4496.0 / 1025.0,
        -301.0 / 82.0,
        2133.0 / 4100.0,
        45.0 / 82.0,
        45.0 / 164.0,
        18.0 / 41.0,
        0.0,
        0.0,
    ],
    [
        3.0 / 205.0,
        0.0,
        0.0,
        0.0,
        0.0,
        -6.0 / 41.0,
        -3.0 / 205.0,
        -3.0 / 41.0,
        3.0 / 41.0,
        6.0 / 41.0,
        0.0,
        0.0,
    ],
    [
        -1777.0 / 4100.0,
        0.0,
        0.0,
        -341.0 / 164.0,
        4496.0 / 1025.0,
        -289.0 / 82.0,
        2193.0 / 4100.0,
        51.0 / 82.0,
        33.0 / 164.0,
        12.0 / 41.0,
        0.0,
        1.0,
    ],
];

/// Eighth-order weights
const B8: [f64; 13] = [
    0.0,
    0.0,
    0.0,
    0.0,
    0.0,
    34.0 / 105.0,
    9.0 / 35.0,
    9.0 / 35.0,
    9.0 / 280.0,
    9.0 / 280.0,
    0.0,
    41.0 / 840.0,
    41.0 / 840.0,
];

/// Seventh/eighth-order difference weight on k0, k10, k11 and k12
const ERR_WEIGHT: f64 = 41.0 / 840.0;

/// Evaluates the dynamics in elapsed-time form and counts evaluations
struct Dynamics<'a, 'b> {
    initial_epoch: Instant,
    derivatives: &'a Derivatives<'b>,
    evaluations: usize,
}

impl Dynamics<'_, '_> {
    fn eval(&mut self, elapsed: f64, y: &Vector6<f64>) -> Vector6<f64> {
        self.evaluations += 1;
        let epoch = self.initial_epoch + duration_from_seconds(elapsed);
        let (v, a) = (self.derivatives)(&unpack(y, epoch));
        Vector6::new(v.x, v.y, v.z, a.x, a.y, a.z)
    }
}

fn pack(state: &SpacecraftState) -> Vector6<f64> {
    let p = state.position();
    let v = state.velocity();
    Vector6::new(p.x, p.y, p.z, v.x, v.y, v.z)
}

fn unpack(y: &Vector6<f64>, epoch: Instant) -> SpacecraftState {
    SpacecraftState::new(
        Vector3::new(y[0], y[1], y[2]),
        Vector3::new(y[3], y[4], y[5]),
        epoch,
    )
}

/// Runge-Kutta-Fehlberg 7(8) integrator with adaptive step size control
#[derive(Debug, Clone, Copy, Default)]
pub struct Rkf78 {
    config: IntegratorConfig,
}

impl Rkf78 {
    pub fn new(config: IntegratorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IntegratorConfig {
        &self.config
    }

    /// Scaled max-norm of the local error estimate
    fn error_norm(&self, y: &Vector6<f64>, y_new: &Vector6<f64>, err: &Vector6<f64>) -> f64 {
        (0..6)
            .map(|i| {
                let scale =
                    self.config.abs_tol + self.config.rel_tol * y[i].abs().max(y_new[i].abs());
                err[i].abs() / scale
            })
            .fold(0.0, f64::max)
    }

    /// Scaled RMS norm used by the starting step heuristic
    fn rms_norm(&self, v: &Vector6<f64>, y: &Vector6<f64>) -> f64 {
        let sum: f64 = (0..6)
            .map(|i| {
                let scale = self.config.abs_tol + self.config.rel_tol * y[i].abs();
                (v[i] / scale).powi(2)
            })
            .sum();
        (sum / 6.0).sqrt()
    }

    /// Starting step from the scaled ‖y‖/‖f‖ ratio and a second-derivative probe
    fn initial_step(&self, dynamics: &mut Dynamics, y: &Vector6<f64>, f0: &Vector6<f64>) -> f64 {
        let d0 = self.rms_norm(y, y);
        let d1 = self.rms_norm(f0, y);
        let h0 = if d0 < 1e-5 || d1 < 1e-5 {
            1e-6
        } else {
            0.01 * d0 / d1
        };

        let y1 = y + f0 * h0;
        let f1 = dynamics.eval(h0, &y1);
        let d2 = self.rms_norm(&(f1 - f0), y) / h0;

        let dmax = d1.max(d2);
        let h1 = if dmax <= 1e-15 {
            (h0 * 1e-3).max(1e-6)
        } else {
            (0.01 / dmax).powf(1.0 / 8.0)
        };

        (100.0 * h0)
            .min(h1)
            .clamp(self.config.min_step, self.config.max_step)
    }

    /// One Fehlberg step of size `h`: (eighth-order solution, error estimate)
    fn rkf78_step(
        &self,
        dynamics: &mut Dynamics,
        t: f64,
        y: &Vector6<f64>,
        f0: &Vector6<f64>,
        h: f64,
    ) -> (Vector6<f64>, Vector6<f64>) {
        let mut k = [Vector6::<f64>::zeros(); 13];
        k[0] = *f0;

        for s in 1..13 {
            let mut yi = *y;
            for (j, kj) in k.iter().enumerate().take(s) {
                let a = A[s][j];
                if a != 0.0 {
                    yi += kj * (h * a);
                }
            }
            k[s] = dynamics.eval(t + C[s] * h, &yi);
        }

        let increment = k
            .iter()
            .zip(B8.iter())
            .filter(|(_, b)| **b != 0.0)
            .fold(Vector6::zeros(), |acc, (kj, b)| acc + kj * *b);
        let y_new = y + increment * h;
        let err = (k[11] + k[12] - k[0] - k[10]) * (h * ERR_WEIGHT);

        (y_new, err)
    }

    fn step_factor(&self, err: f64) -> f64 {
        if err == 0.0 {
            return self.config.max_growth;
        }
        (self.config.safety * err.powf(-1.0 / 8.0))
            .clamp(self.config.max_shrink, self.config.max_growth)
    }
}

impl Integrator for Rkf78 {
    fn integrate(
        &self,
        initial: &SpacecraftState,
        target_epoch: Instant,
        derivatives: &Derivatives<'_>,
        sink: &mut dyn StepSink,
    ) -> Result<IntegrationSummary, IntegrationError> {
        self.config.validate()?;

        let initial_epoch = initial.epoch();
        let duration = (target_epoch - initial_epoch).as_seconds();
        if duration < 0.0 {
            return Err(IntegrationError::BackwardIntegration {
                duration: -duration,
            });
        }

        sink.init(initial, target_epoch);

        let mut dynamics = Dynamics {
            initial_epoch,
            derivatives,
            evaluations: 0,
        };
        let mut accepted_steps = 0;
        let mut rejected_steps = 0;

        if duration == 0.0 {
            return Ok(IntegrationSummary {
                final_state: *initial,
                accepted_steps,
                rejected_steps,
                evaluations: 0,
            });
        }

        let min_step = self.config.min_step;
        let max_step = self.config.max_step;

        let mut t = 0.0;
        let mut y = pack(initial);
        let mut f0 = dynamics.eval(t, &y);
        let mut h = self.initial_step(&mut dynamics, &y, &f0);

        loop {
            // Next landing point: a sink stop strictly ahead of t, else the target
            let (stop, stop_is_target) = match sink.next_stop() {
                Some(s) if s > t && s < duration => (s, false),
                _ => (duration, true),
            };
            let remaining = stop - t;
            let lands = h >= remaining || remaining - h < STOP_SNAP_S;
            let h_try = if lands { remaining } else { h };

            let (y_new, err_vec) = self.rkf78_step(&mut dynamics, t, &y, &f0, h_try);
            let err = self.error_norm(&y, &y_new, &err_vec);

            if err <= 1.0 {
                t = if lands { stop } else { t + h_try };
                y = y_new;

                let epoch = if lands && stop_is_target {
                    target_epoch
                } else {
                    initial_epoch + duration_from_seconds(t)
                };
                let state = unpack(&y, epoch);
                if !state.is_finite() {
                    return Err(IntegrationError::NonFiniteState { elapsed: t });
                }

                accepted_steps += 1;
                sink.handle_step(&state, t);

                if lands && stop_is_target {
                    log::debug!(
                        "RKF78 reached {:.3} s: {} accepted, {} rejected steps, {} evaluations",
                        duration,
                        accepted_steps,
                        rejected_steps,
                        dynamics.evaluations
                    );
                    return Ok(IntegrationSummary {
                        final_state: state,
                        accepted_steps,
                        rejected_steps,
                        evaluations: dynamics.evaluations,
                    });
                }

                f0 = dynamics.eval(t, &y);

                // A step clipped to a stop says nothing about the step the
                // dynamics would allow, so it never shrinks the proposal
                let proposed = h_try * self.step_factor(err);
                let next = if lands { h.max(proposed) } else { proposed };
                h = next.clamp(min_step, max_step);
            } else {
                rejected_steps += 1;

                if h_try <= min_step {
                    if !y_new.iter().all(|v| v.is_finite()) {
                        return Err(IntegrationError::NonFiniteState { elapsed: t });
                    }
                    return Err(IntegrationError::Diverged {
                        elapsed: t,
                        step: h_try,
                        min_step,
                        error_ratio: err,
                    });
                }

                let factor = if err.is_finite() {
                    self.step_factor(err).min(1.0)
                } else {
                    self.config.max_shrink
                };
                h = (h_try * factor).max(min_step);
                log::trace!(
                    "Rejected step at {:.3} s (error {:.3e}), retrying with {:.3} s",
                    t,
                    err,
                    h
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "RKF 7(8) (adaptive)"
    }

    fn order(&self) -> u8 {
        8
    }

    fn stages(&self) -> usize {
        13
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bodies::{CelestialBody, MU_MOON};
    use satkit::Duration;

    /// Sink that remembers every elapsed time and stops at fixed points
    struct RecordingSink {
        stops: Vec<f64>,
        elapsed: Vec<f64>,
    }

    impl StepSink for RecordingSink {
        fn next_stop(&self) -> Option<f64> {
            let last = self.elapsed.last().copied().unwrap_or(0.0);
            self.stops.iter().copied().find(|s| *s > last)
        }

        fn handle_step(&mut self, _state: &SpacecraftState, elapsed: f64) {
            self.elapsed.push(elapsed);
        }
    }

    fn two_body(s: &SpacecraftState) -> (Vector3<f64>, Vector3<f64>) {
        let r = s.position().norm();
        (*s.velocity(), s.position() * (-MU_MOON / (r * r * r)))
    }

    fn circular_state() -> SpacecraftState {
        let r = CelestialBody::Moon.equatorial_radius() + 100_000.0;
        let v = (MU_MOON / r).sqrt();
        let epoch = Instant::from_datetime(2025, 1, 23, 0, 0, 0.0).unwrap();
        SpacecraftState::new(Vector3::new(r, 0.0, 0.0), Vector3::new(0.0, v, 0.0), epoch)
    }

    #[test]
    fn test_rkf78_circular_orbit() {
        let integrator = Rkf78::default();
        let state = circular_state();
        let r = state.radius();
        let v = state.speed();
        let period = state.period(MU_MOON).unwrap();
        let target = state.epoch() + Duration::from_seconds(period.round());

        let mut sink = RecordingSink {
            stops: vec![],
            elapsed: vec![],
        };
        let summary = integrator
            .integrate(&state, target, &two_body, &mut sink)
            .unwrap();

        // Radius and speed preserved on a circular orbit
        let final_state = summary.final_state;
        assert!((final_state.radius() - r).abs() / r < 1e-7);
        assert!((final_state.speed() - v).abs() / v < 1e-7);

        assert_eq!(final_state.epoch(), target);
        assert_eq!(summary.accepted_steps, sink.elapsed.len());
        assert!(summary.evaluations >= 13 * summary.accepted_steps);
        let last = sink.elapsed.last().copied().unwrap();
        assert!((last - period.round()).abs() < 1e-6);
    }

    #[test]
    fn test_lands_on_stops() {
        let integrator = Rkf78::default();
        let state = circular_state();
        let target = state.epoch() + Duration::from_seconds(1500.0);

        let mut sink = RecordingSink {
            stops: vec![100.0, 250.0, 1400.0],
            elapsed: vec![],
        };
        integrator
            .integrate(&state, target, &two_body, &mut sink)
            .unwrap();

        assert!(sink.elapsed.contains(&100.0));
        assert!(sink.elapsed.contains(&250.0));
        assert!(sink.elapsed.contains(&1400.0));
        let last = sink.elapsed.last().copied().unwrap();
        assert!((last - 1500.0).abs() < 1e-6);
        assert!(sink.elapsed.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_zero_duration() {
        let integrator = Rkf78::default();
        let state = circular_state();
        let mut sink = RecordingSink {
            stops: vec![],
            elapsed: vec![],
        };

        let summary = integrator
            .integrate(&state, state.epoch(), &two_body, &mut sink)
            .unwrap();
        assert_eq!(summary.final_state, state);
        assert_eq!(summary.accepted_steps, 0);
        assert!(sink.elapsed.is_empty());
    }

    #[test]
    fn test_backward_target_rejected() {
        let integrator = Rkf78::default();
        let state = circular_state();
        let target = state.epoch() - Duration::from_seconds(10.0);
        let mut sink = RecordingSink {
            stops: vec![],
            elapsed: vec![],
        };

        let result = integrator.integrate(&state, target, &two_body, &mut sink);
        assert!(matches!(
            result,
            Err(IntegrationError::BackwardIntegration { .. })
        ));
    }

    #[test]
    fn test_divergence_reported() {
        let integrator = Rkf78::new(IntegratorConfig {
            min_step: 500.0,
            max_step: 1000.0,
            abs_tol: 1e-16,
            rel_tol: 1e-16,
            ..IntegratorConfig::default()
        });
        let state = circular_state();
        let target = state.epoch() + Duration::from_seconds(3600.0);
        let mut sink = RecordingSink {
            stops: vec![],
            elapsed: vec![],
        };

        let result = integrator.integrate(&state, target, &two_body, &mut sink);
        assert!(matches!(result, Err(IntegrationError::Diverged { .. })));
    }

    #[test]
    fn test_invalid_config() {
        let bad = IntegratorConfig {
            min_step: 10.0,
            max_step: 1.0,
            ..IntegratorConfig::default()
        };
        assert!(matches!(
            bad.validate(),
            Err(IntegrationError::InvalidConfig(_))
        ));
        assert!(IntegratorConfig::default().validate().is_ok());
        assert!(IntegratorConfig::fast().validate().is_ok());
        assert!(IntegratorConfig::high_precision().validate().is_ok());
    }

    #[test]
    fn test_tableau_rows_sum_to_nodes() {
        for (row, c) in A.iter().zip(C.iter()) {
            let sum: f64 = row.iter().sum();
            assert!((sum - c).abs() < 1e-14, "row sum {} vs node {}", sum, c);
        }
        let b_sum: f64 = B8.iter().sum();
        assert!((b_sum - 1.0).abs() < 1e-14);

        let rkf = Rkf78::default();
        assert_eq!(rkf.stages(), C.len());
        assert_eq!(rkf.order(), 8);
    }
}
