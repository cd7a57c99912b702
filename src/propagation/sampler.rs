//! Fixed-step sampling of an adaptive integration
//!
//! The sampler asks the integrator to land on every grid boundary k·Δt, so
//! each recorded state is an accepted integrator state (no interpolation).

use satkit::Instant;

use crate::propagation::integrator::StepSink;
use crate::propagation::state::SpacecraftState;
use crate::propagation::trajectory::SampledTrajectory;

/// Default output spacing in seconds
pub const DEFAULT_OUTPUT_STEP: f64 = 60.0;

/// Grid points closer than this to the end are folded into the final state
const GRID_EPSILON_S: f64 = 1e-9;

/// Step sink recording the initial state, every grid state and the final state
#[derive(Debug, Clone)]
pub struct FixedStepSampler {
    step: f64,
    end: f64,
    next_index: u64,
    states: Vec<SpacecraftState>,
}

impl Default for FixedStepSampler {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_STEP)
    }
}

impl FixedStepSampler {
    /// Sampler with spacing `step` seconds (must be positive)
    pub fn new(step: f64) -> Self {
        Self {
            step,
            end: 0.0,
            next_index: 1,
            states: Vec::new(),
        }
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    /// States recorded so far
    pub fn states(&self) -> &[SpacecraftState] {
        &self.states
    }

    pub fn into_trajectory(self) -> SampledTrajectory {
        SampledTrajectory::new(self.step, self.states)
    }

    fn grid_point(&self) -> f64 {
        self.next_index as f64 * self.step
    }
}

impl StepSink for FixedStepSampler {
    fn init(&mut self, initial: &SpacecraftState, target_epoch: Instant) {
        self.end = (target_epoch - initial.epoch()).as_seconds();
        self.next_index = 1;
        self.states.clear();
        self.states.push(*initial);
    }

    fn next_stop(&self) -> Option<f64> {
        let point = self.grid_point();
        (point < self.end - GRID_EPSILON_S).then_some(point)
    }

    fn handle_step(&mut self, state: &SpacecraftState, elapsed: f64) {
        if elapsed >= self.end {
            self.states.push(*state);
            return;
        }

        if let Some(point) = self.next_stop() {
            if elapsed >= point {
                self.states.push(*state);
                self.next_index += 1;
            }
        }
    }
}
