//! Numerical orbit propagation
//!
//! The module is organized around composable, hot-swappable components:
//!
//! - **SpacecraftState / KeplerianElements**: state snapshots and two-body relations
//! - **ForceModel**: Individual force contributions (harmonics, third-body)
//! - **Integrator**: Adaptive Runge-Kutta integration with hard stops
//! - **FixedStepSampler**: Records accepted states on a uniform output grid
//! - **HiFiPropagator**: Orchestrates integration with configurable forces
//!
//! # Example
//!
//! ```ignore
//! use lunar_phasing::propagation::*;
//!
//! let ctx = AstroContext::low_precision();
//! let propagator = PropagationSettings::default().build_propagator(&ctx)?;
//!
//! let trajectory = propagator.propagate(&initial_state, target_epoch)?;
//! ```

pub mod elements;
pub mod ephemeris;
pub mod forces;
pub mod integrator;
pub mod sampler;
pub mod state;
pub mod trajectory;

mod propagator;
mod settings;

// Re-export main types
pub use elements::{AnomalyKind, KeplerianElements};
pub use ephemeris::{Ephemeris, EphemerisType, SatkitEphemeris, StaticEphemeris};
pub use forces::{CompositeForce, ForceModel};
pub use integrator::{Integrator, IntegratorConfig, Rkf78, StepSink};
pub use propagator::HiFiPropagator;
pub use sampler::FixedStepSampler;
pub use settings::{load_settings, GravitySettings, PropagationSettings};
pub use state::{duration_from_seconds, SpacecraftState};
pub use trajectory::{check_aligned, relative_distances, SampledTrajectory};
