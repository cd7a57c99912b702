//! Lunar phasing - numerical propagation for two-spacecraft phasing studies
//!
//! Propagates spacecraft around the Moon with an adaptive Runge-Kutta
//! integrator, a lunar gravity field and Earth/Sun perturbations, sampling
//! each run on a fixed output grid so two trajectories can be compared
//! sample by sample.

pub mod bodies;
pub mod context;
pub mod error;
pub mod propagation;
pub mod scenario;

pub use bodies::CelestialBody;
pub use context::AstroContext;
