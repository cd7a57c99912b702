//! Error types for element conversion, integration and trajectory comparison
//!
//! Every error here is fatal where it is raised: nothing in the crate retries
//! or returns partial results.

use thiserror::Error;

use crate::bodies::CelestialBody;

/// Malformed or non-physical orbital elements
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidElementsError {
    #[error("semi-major axis must be positive, got {0} m")]
    NonPositiveSemiMajorAxis(f64),

    #[error("eccentricity must lie in [0, 1), got {0}")]
    EccentricityOutOfRange(f64),

    #[error("gravitational parameter must be positive, got {0} m^3/s^2")]
    NonPositiveGravitationalParameter(f64),

    #[error("{0} is not finite")]
    NonFinite(&'static str),

    #[error("state is not bound (specific energy {energy} J/kg)")]
    Unbound { energy: f64 },

    #[error("state is degenerate (zero position or angular momentum)")]
    Degenerate,
}

/// Failure of the adaptive integrator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntegrationError {
    #[error(
        "integration diverged {elapsed:.3} s after start: step {step:e} s at minimum {min_step:e} s \
         still fails the error test (error ratio {error_ratio:.3e})"
    )]
    Diverged {
        elapsed: f64,
        step: f64,
        min_step: f64,
        error_ratio: f64,
    },

    #[error("state became non-finite {elapsed:.3} s after start")]
    NonFiniteState { elapsed: f64 },

    #[error("target epoch is {duration:.3} s before the initial epoch")]
    BackwardIntegration { duration: f64 },

    #[error("invalid integrator configuration: {0}")]
    InvalidConfig(String),
}

/// Two trajectories cannot be compared sample by sample
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrajectoryMismatchError {
    #[error("trajectory size mismatch: {primary} vs {secondary} samples")]
    LengthMismatch { primary: usize, secondary: usize },

    #[error("sample epoch mismatch at index {index}: offset {offset:e} s exceeds {tolerance:e} s")]
    EpochMismatch {
        index: usize,
        offset: f64,
        tolerance: f64,
    },
}

/// Gravity field coefficients cannot be provided as requested
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GravityFieldError {
    #[error("gravity field order {order} exceeds degree {degree}")]
    OrderExceedsDegree { degree: usize, order: usize },

    #[error("no gravity field for {body} beyond degree {max_degree} (requested {degree}x{order})")]
    Unavailable {
        body: CelestialBody,
        degree: usize,
        order: usize,
        max_degree: usize,
    },
}

/// Body name lookup failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown celestial body: {0}")]
pub struct UnknownBodyError(pub String);

/// Errors surfaced by the propagation orchestrator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PropagationError {
    #[error("invalid initial state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    Integration(#[from] IntegrationError),

    #[error(transparent)]
    GravityField(#[from] GravityFieldError),
}

/// Errors surfaced while running the phasing study
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScenarioError {
    #[error(transparent)]
    Elements(#[from] InvalidElementsError),

    #[error(transparent)]
    Propagation(#[from] PropagationError),

    #[error(transparent)]
    Mismatch(#[from] TrajectoryMismatchError),
}
