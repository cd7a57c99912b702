//! Body positions for third-body perturbations
//!
//! # Ephemeris Options
//!
//! - **LowPrecision (lpephem)**: Fast analytical approximations, no external data needed
//! - **HighPrecision (jplephem)**: JPL DE440 ephemeris, ~100MB download, sub-arcsecond accuracy
//!
//! `satkit` answers geocentric positions in GCRF axes; positions relative to
//! another centre are differences of geocentric vectors, rotated into that
//! centre's inertially oriented frame.

use std::collections::HashMap;

use nalgebra::Vector3;
use satkit::{jplephem, lpephem, Instant, SolarSystem};
use serde::{Deserialize, Serialize};

use crate::bodies::CelestialBody;

/// Source of body positions at an epoch
pub trait Ephemeris: Send + Sync {
    /// Position of `target` relative to `center` at `epoch`, in meters
    ///
    /// Expressed in the inertially oriented frame of `center`
    /// ([`CelestialBody::inertial_frame`]), the frame orbits about `center`
    /// are propagated in.
    fn position(&self, target: CelestialBody, center: CelestialBody, epoch: &Instant)
        -> Vector3<f64>;

    fn name(&self) -> &'static str;
}

/// Ephemeris precision level for third-body calculations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EphemerisType {
    /// Low-precision analytical ephemeris (fast, no external data)
    /// Accuracy: ~0.1° for Sun, ~0.3° for Moon
    #[default]
    LowPrecision,

    /// High-precision JPL DE440 ephemeris (requires ~100MB download)
    /// Accuracy: sub-arcsecond
    HighPrecision,
}

impl EphemerisType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::LowPrecision => "Low-Precision (lpephem)",
            Self::HighPrecision => "High-Precision (jplephem/DE440)",
        }
    }
}

/// Ephemeris backed by `satkit`
#[derive(Debug, Clone, Copy, Default)]
pub struct SatkitEphemeris {
    precision: EphemerisType,
}

impl SatkitEphemeris {
    pub fn new(precision: EphemerisType) -> Self {
        Self { precision }
    }

    pub fn low_precision() -> Self {
        Self::new(EphemerisType::LowPrecision)
    }

    fn analytic_geocentric(body: CelestialBody, epoch: &Instant) -> Vector3<f64> {
        match body {
            CelestialBody::Earth => Vector3::zeros(),
            CelestialBody::Sun => {
                let sun_gcrf = lpephem::sun::pos_gcrf(epoch);
                Vector3::new(sun_gcrf[0], sun_gcrf[1], sun_gcrf[2])
            }
            CelestialBody::Moon => {
                let moon_gcrf = lpephem::moon::pos_gcrf(epoch);
                Vector3::new(moon_gcrf[0], moon_gcrf[1], moon_gcrf[2])
            }
        }
    }

    /// Position of `body` relative to the Earth's centre
    fn geocentric(&self, body: CelestialBody, epoch: &Instant) -> Vector3<f64> {
        if self.precision == EphemerisType::LowPrecision || body == CelestialBody::Earth {
            return Self::analytic_geocentric(body, epoch);
        }

        let target = match body {
            CelestialBody::Sun => SolarSystem::Sun,
            _ => SolarSystem::Moon,
        };
        match jplephem::geocentric_pos(target, epoch) {
            Ok(pos) => Vector3::new(pos[0], pos[1], pos[2]),
            Err(e) => {
                log::warn!(
                    "JPL ephemeris failed for {}, falling back to lpephem: {}",
                    body,
                    e
                );
                Self::analytic_geocentric(body, epoch)
            }
        }
    }
}

impl Ephemeris for SatkitEphemeris {
    fn position(
        &self,
        target: CelestialBody,
        center: CelestialBody,
        epoch: &Instant,
    ) -> Vector3<f64> {
        if target == center {
            return Vector3::zeros();
        }
        let relative = self.geocentric(target, epoch) - self.geocentric(center, epoch);
        center.inertial_frame() * relative
    }

    fn name(&self) -> &'static str {
        self.precision.name()
    }
}

/// Fixed body positions relative to the central body, independent of epoch
///
/// Positions are taken as already expressed in the central body's frame.
#[derive(Debug, Clone, Default)]
pub struct StaticEphemeris {
    positions: HashMap<CelestialBody, Vector3<f64>>,
}

impl StaticEphemeris {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place `body` at `position` relative to the central body
    pub fn with_position(mut self, body: CelestialBody, position: Vector3<f64>) -> Self {
        self.positions.insert(body, position);
        self
    }

    fn lookup(&self, body: CelestialBody) -> Vector3<f64> {
        self.positions.get(&body).copied().unwrap_or_else(Vector3::zeros)
    }
}

impl Ephemeris for StaticEphemeris {
    fn position(
        &self,
        target: CelestialBody,
        center: CelestialBody,
        _epoch: &Instant,
    ) -> Vector3<f64> {
        self.lookup(target) - self.lookup(center)
    }

    fn name(&self) -> &'static str {
        "Static positions"
    }
}
