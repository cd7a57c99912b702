//! Sampled trajectories and sample-by-sample comparison

use satkit::Instant;

use crate::error::TrajectoryMismatchError;
use crate::propagation::state::SpacecraftState;

/// Default tolerance on sample epoch agreement, in seconds
pub const DEFAULT_EPOCH_TOLERANCE: f64 = 1e-9;

/// States on a uniform grid plus the exact final state
///
/// Epochs strictly increase. Spacing is the nominal step except possibly for
/// the last interval.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledTrajectory {
    step: f64,
    states: Vec<SpacecraftState>,
}

impl SampledTrajectory {
    pub(crate) fn new(step: f64, states: Vec<SpacecraftState>) -> Self {
        Self { step, states }
    }

    /// Nominal sample spacing in seconds
    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn states(&self) -> &[SpacecraftState] {
        &self.states
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn first(&self) -> Option<&SpacecraftState> {
        self.states.first()
    }

    pub fn last(&self) -> Option<&SpacecraftState> {
        self.states.last()
    }

    pub fn initial_epoch(&self) -> Option<Instant> {
        self.first().map(|s| s.epoch())
    }

    /// Seconds since the first sample, per sample
    pub fn elapsed_seconds(&self) -> Vec<f64> {
        match self.initial_epoch() {
            Some(origin) => self.states.iter().map(|s| s.seconds_since(&origin)).collect(),
            None => Vec::new(),
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SpacecraftState> {
        self.states.iter()
    }
}

impl<'a> IntoIterator for &'a SampledTrajectory {
    type Item = &'a SpacecraftState;
    type IntoIter = std::slice::Iter<'a, SpacecraftState>;

    fn into_iter(self) -> Self::IntoIter {
        self.states.iter()
    }
}

/// Check that two trajectories have the same length and matching epochs
///
/// Matching epochs differ by strictly less than `tolerance` seconds.
pub fn check_aligned(
    primary: &SampledTrajectory,
    secondary: &SampledTrajectory,
    tolerance: f64,
) -> Result<(), TrajectoryMismatchError> {
    if primary.len() != secondary.len() {
        return Err(TrajectoryMismatchError::LengthMismatch {
            primary: primary.len(),
            secondary: secondary.len(),
        });
    }

    for (index, (a, b)) in primary.iter().zip(secondary.iter()).enumerate() {
        let offset = (a.epoch() - b.epoch()).as_seconds().abs();
        if offset >= tolerance {
            return Err(TrajectoryMismatchError::EpochMismatch {
                index,
                offset,
                tolerance,
            });
        }
    }

    Ok(())
}

/// Distance between matching samples as (elapsed seconds, meters)
///
/// Fails instead of resampling when the trajectories are not aligned.
pub fn relative_distances(
    primary: &SampledTrajectory,
    secondary: &SampledTrajectory,
    tolerance: f64,
) -> Result<Vec<(f64, f64)>, TrajectoryMismatchError> {
    check_aligned(primary, secondary, tolerance)?;

    Ok(primary
        .elapsed_seconds()
        .into_iter()
        .zip(primary.iter().zip(secondary.iter()))
        .map(|(t, (a, b))| (t, (a.position() - b.position()).norm()))
        .collect())
}
