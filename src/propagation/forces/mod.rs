//! Force models for lunar orbit propagation
//!
//! Each force model implements the `ForceModel` trait, which computes the
//! acceleration contribution at a given spacecraft state.
//!
//! Models are combined using `CompositeForce`, which always carries the point
//! mass of the central body and sums every registered perturbation. A
//! perturbation is turned off by not registering it.
//!
//! # Available Models
//!
//! - **PointMass**: Central body μ/r² (implicit in every `CompositeForce`)
//! - **SphericalHarmonics**: Non-spherical central body gravity (degree ≥ 2)
//! - **ThirdBody**: Differential gravity of a perturbing body from an ephemeris

mod gravity;
mod third_body;

pub use gravity::{
    BodyOrientation, BuiltinGravityFields, GravityField, GravityFieldProvider, PointMass,
    SphericalHarmonics, BUILTIN_MAX_DEGREE,
};
pub use third_body::ThirdBody;

use crate::bodies::CelestialBody;
use crate::propagation::state::SpacecraftState;
use nalgebra::Vector3;

/// Trait for force model contributions
///
/// Models are thread-safe so independent propagations can run in parallel.
pub trait ForceModel: Send + Sync {
    /// Acceleration contribution in the propagation frame, in m/s²
    fn acceleration(&self, state: &SpacecraftState) -> Vector3<f64>;

    /// Force model name for debugging and logging
    fn name(&self) -> &'static str;

    /// Brief description of the model
    fn description(&self) -> &'static str {
        self.name()
    }
}

/// Central point mass plus a list of perturbations
///
/// # Example
///
/// ```ignore
/// let forces = CompositeForce::builder(CelestialBody::Moon)
///     .with_harmonics(SphericalHarmonics::from_provider(&BuiltinGravityFields, CelestialBody::Moon, 3, 3)?)
///     .with_third_body(ThirdBody::new(CelestialBody::Earth, CelestialBody::Moon, ephemeris))
///     .build();
///
/// let total_accel = forces.total_acceleration(&state);
/// ```
pub struct CompositeForce {
    central_body: CelestialBody,
    central: PointMass,
    perturbations: Vec<Box<dyn ForceModel>>,
}

impl CompositeForce {
    /// Two-body dynamics about `central_body`
    pub fn point_mass_only(central_body: CelestialBody) -> Self {
        Self {
            central_body,
            central: PointMass::for_body(central_body),
            perturbations: Vec::new(),
        }
    }

    /// Register a perturbation
    pub fn add(&mut self, force: Box<dyn ForceModel>) {
        log::debug!(
            "Adding force model: {} ({})",
            force.name(),
            force.description()
        );
        self.perturbations.push(force);
    }

    /// Create a builder for convenient force model construction
    pub fn builder(central_body: CelestialBody) -> CompositeForceBuilder {
        CompositeForceBuilder::new(central_body)
    }

    pub fn central_body(&self) -> CelestialBody {
        self.central_body
    }

    /// Gravitational parameter of the central point mass
    pub fn mu(&self) -> f64 {
        self.central.mu()
    }

    /// Number of registered perturbations (the point mass is not counted)
    pub fn perturbation_count(&self) -> usize {
        self.perturbations.len()
    }

    /// List all force model names, central term first
    pub fn model_names(&self) -> Vec<&'static str> {
        std::iter::once(self.central.name())
            .chain(self.perturbations.iter().map(|f| f.name()))
            .collect()
    }

    /// Compute total acceleration from all forces
    pub fn total_acceleration(&self, state: &SpacecraftState) -> Vector3<f64> {
        self.perturbations
            .iter()
            .map(|f| f.acceleration(state))
            .fold(self.central.acceleration(state), |acc, a| acc + a)
    }

    /// Compute acceleration with individual contributions for debugging
    pub fn acceleration_breakdown(
        &self,
        state: &SpacecraftState,
    ) -> Vec<(&'static str, Vector3<f64>)> {
        std::iter::once((self.central.name(), self.central.acceleration(state)))
            .chain(
                self.perturbations
                    .iter()
                    .map(|f| (f.name(), f.acceleration(state))),
            )
            .collect()
    }
}

/// Builder for CompositeForce
pub struct CompositeForceBuilder {
    forces: CompositeForce,
}

impl CompositeForceBuilder {
    fn new(central_body: CelestialBody) -> Self {
        Self {
            forces: CompositeForce::point_mass_only(central_body),
        }
    }

    /// Add a force model
    pub fn with(mut self, force: Box<dyn ForceModel>) -> Self {
        self.forces.add(force);
        self
    }

    /// Add non-spherical central body gravity
    pub fn with_harmonics(self, model: SphericalHarmonics) -> Self {
        self.with(Box::new(model))
    }

    /// Add a third-body perturbation
    pub fn with_third_body(self, model: ThirdBody) -> Self {
        self.with(Box::new(model))
    }

    /// Build the composite force model
    pub fn build(self) -> CompositeForce {
        self.forces
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagation::ephemeris::StaticEphemeris;
    use satkit::Instant;
    use std::sync::Arc;

    fn low_lunar_state() -> SpacecraftState {
        let epoch = Instant::from_datetime(2025, 1, 23, 0, 0, 0.0).unwrap();
        let r = CelestialBody::Moon.equatorial_radius() + 100_000.0;
        SpacecraftState::new(
            Vector3::new(r, 0.0, 0.0),
            Vector3::new(0.0, (CelestialBody::Moon.mu() / r).sqrt(), 0.0),
            epoch,
        )
    }

    #[test]
    fn test_point_mass_only() {
        let forces = CompositeForce::point_mass_only(CelestialBody::Moon);
        assert_eq!(forces.perturbation_count(), 0);
        assert_eq!(forces.model_names(), vec!["Central Body Point Mass"]);

        let state = low_lunar_state();
        let accel = forces.total_acceleration(&state);

        // Should be pointing toward the Moon's centre (negative x)
        assert!(accel.x < 0.0);
        assert!(accel.y.abs() < 1e-12);
        assert!(accel.z.abs() < 1e-12);

        let r = state.radius();
        let expected_mag = CelestialBody::Moon.mu() / (r * r);
        assert!((accel.norm() - expected_mag).abs() / expected_mag < 1e-12);
    }

    #[test]
    fn test_breakdown_sums_to_total() {
        let ephemeris = Arc::new(
            StaticEphemeris::new()
                .with_position(CelestialBody::Earth, Vector3::new(-3.84e8, 0.0, 0.0)),
        );
        let harmonics =
            SphericalHarmonics::from_provider(&BuiltinGravityFields, CelestialBody::Moon, 3, 3)
                .unwrap();
        let forces = CompositeForce::builder(CelestialBody::Moon)
            .with_harmonics(harmonics)
            .with_third_body(ThirdBody::new(
                CelestialBody::Earth,
                CelestialBody::Moon,
                ephemeris,
            ))
            .build();

        assert_eq!(forces.perturbation_count(), 2);
        assert_eq!(
            forces.model_names(),
            vec![
                "Central Body Point Mass",
                "Lunar Gravity Field",
                "Third-Body (Earth)"
            ]
        );

        let state = low_lunar_state();
        let breakdown = forces.acceleration_breakdown(&state);
        let summed = breakdown
            .iter()
            .fold(Vector3::zeros(), |acc, (_, a)| acc + a);
        let total = forces.total_acceleration(&state);
        assert!((summed - total).norm() < 1e-15 * total.norm());
    }

    struct ConstantPush;

    impl ForceModel for ConstantPush {
        fn acceleration(&self, _state: &SpacecraftState) -> Vector3<f64> {
            Vector3::new(0.0, 1e-6, 0.0)
        }

        fn name(&self) -> &'static str {
            "Constant Push"
        }
    }

    #[test]
    fn test_descriptions() {
        assert_eq!(ConstantPush.description(), "Constant Push");
        assert_eq!(
            PointMass::for_body(CelestialBody::Moon).description(),
            "Central body gravity μ/r²"
        );

        let forces = CompositeForce::builder(CelestialBody::Moon)
            .with(Box::new(ConstantPush))
            .build();
        let state = low_lunar_state();
        let push = forces.total_acceleration(&state)
            - CompositeForce::point_mass_only(CelestialBody::Moon).total_acceleration(&state);
        assert!((push - Vector3::new(0.0, 1e-6, 0.0)).norm() < 1e-15);
    }
}
