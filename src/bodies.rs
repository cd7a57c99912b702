//! Physical constants of the bodies involved in lunar phasing studies

use std::fmt;
use std::str::FromStr;

use nalgebra::{Matrix3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::UnknownBodyError;

/// Moon gravitational parameter (JPL SSD) in m³/s²
pub const MU_MOON: f64 = 4.902_800_066e12;

/// Moon mean equatorial radius in meters
pub const MOON_EQUATORIAL_RADIUS_M: f64 = 1_737_400.0;

/// Moon sidereal rotation rate in rad/s
pub const OMEGA_MOON: f64 = 2.661_699_5e-6;

/// Earth gravitational parameter (GM) in m³/s²
pub const MU_EARTH: f64 = 3.986_004_418e14;

/// Earth equatorial radius (WGS84) in meters
pub const EARTH_EQUATORIAL_RADIUS_M: f64 = 6_378_137.0;

/// Earth rotation rate in rad/s
pub const OMEGA_EARTH: f64 = 7.292_115_0e-5;

/// Sun gravitational parameter in m³/s²
pub const MU_SUN: f64 = 1.327_124_400_18e20;

/// Sun nominal radius in meters
pub const SUN_RADIUS_M: f64 = 6.957e8;

/// Sun rotation rate (Carrington) in rad/s
pub const OMEGA_SUN: f64 = 2.865_329_6e-6;

/// IAU mean pole and prime meridian at J2000: (α0, δ0, W0) in degrees
///
/// Secular and periodic terms are dropped. The lunar mean pole is about 1.5°
/// from the true pole, which precesses about it over 18.6 years.
const MOON_IAU_ORIENTATION: (f64, f64, f64) = (269.9949, 66.5392, 38.3213);
const EARTH_IAU_ORIENTATION: (f64, f64, f64) = (0.0, 90.0, 190.147);
const SUN_IAU_ORIENTATION: (f64, f64, f64) = (286.13, 63.87, 84.176);

/// Celestial bodies known to the propagation engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CelestialBody {
    Moon,
    Earth,
    Sun,
}

impl CelestialBody {
    /// Gravitational parameter in m³/s²
    pub fn mu(&self) -> f64 {
        match self {
            Self::Moon => MU_MOON,
            Self::Earth => MU_EARTH,
            Self::Sun => MU_SUN,
        }
    }

    /// Equatorial radius in meters
    pub fn equatorial_radius(&self) -> f64 {
        match self {
            Self::Moon => MOON_EQUATORIAL_RADIUS_M,
            Self::Earth => EARTH_EQUATORIAL_RADIUS_M,
            Self::Sun => SUN_RADIUS_M,
        }
    }

    /// Rotation rate about the body pole in rad/s
    pub fn rotation_rate(&self) -> f64 {
        match self {
            Self::Moon => OMEGA_MOON,
            Self::Earth => OMEGA_EARTH,
            Self::Sun => OMEGA_SUN,
        }
    }

    fn iau_orientation(&self) -> (f64, f64, f64) {
        match self {
            Self::Moon => MOON_IAU_ORIENTATION,
            Self::Earth => EARTH_IAU_ORIENTATION,
            Self::Sun => SUN_IAU_ORIENTATION,
        }
    }

    /// Unit vector along the mean rotation pole, in ICRF axes
    pub fn pole(&self) -> Vector3<f64> {
        let (ra, dec, _) = self.iau_orientation();
        let (ra, dec) = (ra.to_radians(), dec.to_radians());
        Vector3::new(dec.cos() * ra.cos(), dec.cos() * ra.sin(), dec.sin())
    }

    /// Prime meridian angle at J2000 in radians
    pub fn prime_meridian_at_j2000(&self) -> f64 {
        self.iau_orientation().2.to_radians()
    }

    /// Rotation from ICRF axes to the body's inertially oriented frame
    ///
    /// The frame has z along the mean pole and x along the ascending node of
    /// the body equator on the ICRF equator. Propagation about a body, its
    /// orbital elements and its gravity field all use these axes. A pole on the
    /// ICRF z axis (the Earth) gives the identity.
    pub fn inertial_frame(&self) -> Rotation3<f64> {
        let z = self.pole();
        let node = Vector3::z().cross(&z);
        if node.norm() < 1e-12 {
            return Rotation3::identity();
        }
        let x = node.normalize();
        let y = z.cross(&x);
        Rotation3::from_matrix_unchecked(Matrix3::from_rows(&[
            x.transpose(),
            y.transpose(),
            z.transpose(),
        ]))
    }

    /// Gravitational acceleration at the equatorial surface, GM/R², in m/s²
    ///
    /// This is the "standard gravity" used to turn a specific impulse into an
    /// exhaust velocity for burns performed around this body.
    pub fn surface_gravity(&self) -> f64 {
        let r = self.equatorial_radius();
        self.mu() / (r * r)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Moon => "Moon",
            Self::Earth => "Earth",
            Self::Sun => "Sun",
        }
    }

    pub fn all() -> &'static [CelestialBody] {
        &[CelestialBody::Moon, CelestialBody::Earth, CelestialBody::Sun]
    }
}

impl fmt::Display for CelestialBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CelestialBody {
    type Err = UnknownBodyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|body| body.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownBodyError(s.to_string()))
    }
}
