//! Third-body gravitational perturbations
//!
//! Models the differential pull of a body other than the central one (the
//! Earth and the Sun for lunar orbits). Body positions come from an
//! [`Ephemeris`] evaluated at the state epoch, in the central body's frame.

use std::sync::Arc;

use super::ForceModel;
use crate::bodies::CelestialBody;
use crate::propagation::ephemeris::Ephemeris;
use crate::propagation::state::SpacecraftState;
use nalgebra::Vector3;

/// Third-body gravitational perturbation model
pub struct ThirdBody {
    body: CelestialBody,
    central_body: CelestialBody,
    mu: f64,
    ephemeris: Arc<dyn Ephemeris>,
}

impl ThirdBody {
    /// Perturbation by `body` on an orbit about `central_body`
    pub fn new(
        body: CelestialBody,
        central_body: CelestialBody,
        ephemeris: Arc<dyn Ephemeris>,
    ) -> Self {
        Self {
            body,
            central_body,
            mu: body.mu(),
            ephemeris,
        }
    }

    /// Compute third-body acceleration
    ///
    /// a = μ_body × (r_sat_body/|r_sat_body|³ - r_body/|r_body|³)
    ///
    /// where `body_pos` is relative to the central body.
    fn third_body_accel(&self, sat_pos: &Vector3<f64>, body_pos: &Vector3<f64>) -> Vector3<f64> {
        // Vector from satellite to body
        let r_sat_body = body_pos - sat_pos;
        let r_sat_body_mag = r_sat_body.norm();

        if r_sat_body_mag < 1.0 {
            return Vector3::zeros();
        }

        let r_body_mag = body_pos.norm();
        if r_body_mag < 1.0 {
            return Vector3::zeros();
        }

        let term1 = r_sat_body / r_sat_body_mag.powi(3);
        let term2 = body_pos / r_body_mag.powi(3);

        self.mu * (term1 - term2)
    }
}

impl ForceModel for ThirdBody {
    fn acceleration(&self, state: &SpacecraftState) -> Vector3<f64> {
        let body_pos = self
            .ephemeris
            .position(self.body, self.central_body, &state.epoch());
        self.third_body_accel(state.position(), &body_pos)
    }

    fn name(&self) -> &'static str {
        match self.body {
            CelestialBody::Earth => "Third-Body (Earth)",
            CelestialBody::Sun => "Third-Body (Sun)",
            CelestialBody::Moon => "Third-Body (Moon)",
        }
    }

    fn description(&self) -> &'static str {
        "Differential point-mass gravity of a perturbing body"
    }
}
