//! Spacecraft state representation
//!
//! Provides the immutable state snapshot used for numerical integration.

use nalgebra::Vector3;
use satkit::{Duration, Instant};

use crate::bodies::CelestialBody;

/// Offset of `seconds`, rounded to the nearest microsecond
///
/// `Duration::from_seconds` truncates toward zero instead.
pub fn duration_from_seconds(seconds: f64) -> Duration {
    Duration::from_microseconds((seconds * 1e6).round() as i64)
}

/// Spacecraft state: position, velocity and epoch
///
/// Position and velocity are expressed in the inertially oriented frame of the
/// central body ([`CelestialBody::inertial_frame`]) for the whole propagation. A state is never modified once built; integration produces a
/// new state at every accepted step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpacecraftState {
    position: Vector3<f64>,
    velocity: Vector3<f64>,
    epoch: Instant,
}

impl SpacecraftState {
    /// Create a new state from position (m) and velocity (m/s)
    pub fn new(position: Vector3<f64>, velocity: Vector3<f64>, epoch: Instant) -> Self {
        Self {
            position,
            velocity,
            epoch,
        }
    }

    /// Position in meters
    pub fn position(&self) -> &Vector3<f64> {
        &self.position
    }

    /// Velocity in m/s
    pub fn velocity(&self) -> &Vector3<f64> {
        &self.velocity
    }

    pub fn epoch(&self) -> Instant {
        self.epoch
    }

    /// Distance from the central body centre in meters
    pub fn radius(&self) -> f64 {
        self.position.norm()
    }

    /// Altitude above the equatorial radius of `body` in meters
    pub fn altitude_above(&self, body: CelestialBody) -> f64 {
        self.radius() - body.equatorial_radius()
    }

    /// Orbital speed in m/s
    pub fn speed(&self) -> f64 {
        self.velocity.norm()
    }

    /// Seconds elapsed from `origin` to this state's epoch
    pub fn seconds_since(&self, origin: &Instant) -> f64 {
        (self.epoch - *origin).as_seconds()
    }

    /// Specific orbital energy (vis-viva) in J/kg
    pub fn specific_energy(&self, mu: f64) -> f64 {
        0.5 * self.velocity.norm_squared() - mu / self.radius()
    }

    /// Semi-major axis recovered from the orbital energy, in meters
    ///
    /// Negative for hyperbolic states.
    pub fn semi_major_axis(&self, mu: f64) -> f64 {
        -mu / (2.0 * self.specific_energy(mu))
    }

    /// Orbital period in seconds (only valid for elliptical orbits)
    pub fn period(&self, mu: f64) -> Option<f64> {
        let a = self.semi_major_axis(mu);
        if a > 0.0 {
            Some(std::f64::consts::TAU * (a.powi(3) / mu).sqrt())
        } else {
            None // Hyperbolic or parabolic
        }
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.position.iter().chain(self.velocity.iter()).all(|v| v.is_finite())
    }
}
