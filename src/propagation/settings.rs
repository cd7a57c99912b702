//! Configuration helpers for high-fidelity propagation

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::ephemeris::EphemerisType;
use super::forces::{BodyOrientation, CompositeForce, SphericalHarmonics, ThirdBody};
use super::integrator::{IntegratorConfig, Rkf78};
use super::sampler::DEFAULT_OUTPUT_STEP;
use super::HiFiPropagator;
use crate::bodies::CelestialBody;
use crate::context::AstroContext;
use crate::error::{GravityFieldError, PropagationError};

/// Truncation and orientation of the central body gravity field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GravitySettings {
    pub degree: usize,
    pub order: usize,
    /// Spin the field with the body (IAU prime meridian) instead of holding it
    /// fixed in the inertially oriented frame
    pub rotating: bool,
}

impl Default for GravitySettings {
    fn default() -> Self {
        Self {
            degree: 3,
            order: 3,
            rotating: false,
        }
    }
}

impl GravitySettings {
    /// Field orientation for a gravity model of `body`
    pub fn orientation(&self, body: CelestialBody) -> BodyOrientation {
        if self.rotating {
            BodyOrientation::iau_rotating(body)
        } else {
            BodyOrientation::Inertial
        }
    }
}

/// Propagation settings (swappable models)
///
/// Missing fields take their default values when deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropagationSettings {
    pub central_body: CelestialBody,
    pub integrator: IntegratorConfig,
    /// Output sample spacing in seconds
    pub output_step: f64,
    /// Non-spherical gravity of the central body, `None` for point mass only
    pub gravity: Option<GravitySettings>,
    /// Bodies whose differential gravity perturbs the orbit
    pub third_bodies: Vec<CelestialBody>,
    /// Ephemeris type for third-body calculations
    pub ephemeris: EphemerisType,
}

impl Default for PropagationSettings {
    fn default() -> Self {
        Self {
            central_body: CelestialBody::Moon,
            integrator: IntegratorConfig::default(),
            output_step: DEFAULT_OUTPUT_STEP,
            gravity: Some(GravitySettings::default()),
            third_bodies: vec![CelestialBody::Earth, CelestialBody::Sun],
            ephemeris: EphemerisType::LowPrecision,
        }
    }
}

impl PropagationSettings {
    /// Point mass of the central body only
    pub fn two_body(central_body: CelestialBody) -> Self {
        Self {
            central_body,
            gravity: None,
            third_bodies: Vec::new(),
            ..Self::default()
        }
    }

    /// Default force model with looser integration tolerances
    pub fn fast() -> Self {
        Self {
            integrator: IntegratorConfig::fast(),
            ..Self::default()
        }
    }

    pub fn high_precision() -> Self {
        Self {
            integrator: IntegratorConfig::high_precision(),
            ..Self::default()
        }
    }

    /// Context matching the configured ephemeris type
    pub fn context(&self) -> AstroContext {
        AstroContext::with_ephemeris_type(self.ephemeris)
    }

    pub fn build_forces(&self, ctx: &AstroContext) -> Result<CompositeForce, GravityFieldError> {
        let mut forces = CompositeForce::point_mass_only(self.central_body);

        if let Some(gravity) = self.gravity {
            let harmonics = SphericalHarmonics::from_provider(
                ctx.gravity_fields(),
                self.central_body,
                gravity.degree,
                gravity.order,
            )?
            .with_orientation(gravity.orientation(self.central_body));
            forces.add(Box::new(harmonics));
        }

        for &body in &self.third_bodies {
            if body == self.central_body {
                log::warn!(
                    "Ignoring third-body perturbation by the central body ({})",
                    body
                );
                continue;
            }
            forces.add(Box::new(ThirdBody::new(
                body,
                self.central_body,
                ctx.ephemeris(),
            )));
        }

        Ok(forces)
    }

    pub fn build_propagator(&self, ctx: &AstroContext) -> Result<HiFiPropagator, PropagationError> {
        self.integrator.validate()?;
        let forces = self.build_forces(ctx)?;
        Ok(HiFiPropagator::with_output_step(
            Box::new(Rkf78::new(self.integrator)),
            forces,
            self.output_step,
        ))
    }
}

/// Load propagation settings from a JSON file
pub fn load_settings(path: impl AsRef<Path>) -> Result<PropagationSettings> {
    let path = path.as_ref();
    log::info!("Loading propagation settings from {:?}", path);

    let file =
        File::open(path).with_context(|| format!("Failed to open settings file: {:?}", path))?;

    let reader = BufReader::new(file);
    let settings: PropagationSettings =
        serde_json::from_reader(reader).with_context(|| "Failed to parse settings JSON")?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagation::ephemeris::StaticEphemeris;
    use crate::propagation::forces::BuiltinGravityFields;
    use nalgebra::Vector3;
    use std::sync::Arc;

    fn static_context() -> AstroContext {
        AstroContext::new(
            Arc::new(
                StaticEphemeris::new()
                    .with_position(CelestialBody::Earth, Vector3::new(3.84e8, 0.0, 0.0))
                    .with_position(CelestialBody::Sun, Vector3::new(0.0, 1.496e11, 0.0)),
            ),
            Arc::new(BuiltinGravityFields),
        )
    }

    #[test]
    fn test_default_force_model() {
        let settings = PropagationSettings::default();
        let forces = settings.build_forces(&static_context()).unwrap();

        assert_eq!(forces.central_body(), CelestialBody::Moon);
        assert_eq!(
            forces.model_names(),
            vec![
                "Central Body Point Mass",
                "Lunar Gravity Field",
                "Third-Body (Earth)",
                "Third-Body (Sun)"
            ]
        );
    }

    #[test]
    fn test_two_body_has_no_perturbations() {
        let settings = PropagationSettings::two_body(CelestialBody::Moon);
        let forces = settings.build_forces(&static_context()).unwrap();
        assert_eq!(forces.perturbation_count(), 0);
    }

    #[test]
    fn test_central_body_not_a_third_body() {
        let settings = PropagationSettings {
            gravity: None,
            third_bodies: vec![CelestialBody::Moon, CelestialBody::Earth],
            ..PropagationSettings::default()
        };
        let forces = settings.build_forces(&static_context()).unwrap();
        assert_eq!(forces.perturbation_count(), 1);
    }

    #[test]
    fn test_unavailable_field_degree() {
        let settings = PropagationSettings {
            gravity: Some(GravitySettings {
                degree: 10,
                order: 10,
                ..GravitySettings::default()
            }),
            ..PropagationSettings::default()
        };
        assert!(matches!(
            settings.build_propagator(&static_context()),
            Err(PropagationError::GravityField(
                GravityFieldError::Unavailable { .. }
            ))
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "output_step": 30.0, "third_bodies": ["Earth"], "integrator": { "rel_tol": 1e-12 } }"#;
        let settings: PropagationSettings = serde_json::from_str(json).unwrap();

        assert_eq!(settings.output_step, 30.0);
        assert_eq!(settings.third_bodies, vec![CelestialBody::Earth]);
        assert_eq!(settings.central_body, CelestialBody::Moon);
        assert_eq!(settings.gravity, Some(GravitySettings::default()));
        assert_eq!(settings.integrator.rel_tol, 1e-12);
        assert_eq!(settings.integrator.abs_tol, 1e-8);
    }

    #[test]
    fn test_null_gravity_means_point_mass() {
        let settings: PropagationSettings = serde_json::from_str(r#"{ "gravity": null }"#).unwrap();
        assert_eq!(settings.gravity, None);
    }

    #[test]
    fn test_rotating_field_from_json() {
        let settings: PropagationSettings =
            serde_json::from_str(r#"{ "gravity": { "degree": 2, "rotating": true } }"#).unwrap();
        assert_eq!(
            settings.gravity,
            Some(GravitySettings {
                degree: 2,
                order: 3,
                rotating: true,
            })
        );

        // Order above degree is refused by the provider
        assert!(matches!(
            settings.build_forces(&static_context()),
            Err(GravityFieldError::OrderExceedsDegree { .. })
        ));

        let rotating = GravitySettings {
            rotating: true,
            ..GravitySettings::default()
        };
        assert_eq!(
            rotating.orientation(CelestialBody::Moon),
            BodyOrientation::iau_rotating(CelestialBody::Moon)
        );
        assert_eq!(
            GravitySettings::default().orientation(CelestialBody::Moon),
            BodyOrientation::Inertial
        );
    }

    #[test]
    fn test_load_missing_file() {
        assert!(load_settings("/nonexistent/settings.json").is_err());
    }
}
