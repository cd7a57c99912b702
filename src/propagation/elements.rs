//! Keplerian elements and closed-form two-body relations
//!
//! Conversion between classical orbital elements and Cartesian states, plus
//! the handful of formulas used to size a phasing manoeuvre:
//!
//! - Kepler's third law: T = 2π√(a³/μ)
//! - Vis-viva: v = √(μ(2/r − 1/a))
//! - Rocket equation burn time under constant thrust

use std::f64::consts::TAU;

use nalgebra::{Rotation3, Vector3};
use satkit::Instant;
use serde::{Deserialize, Serialize};

use super::state::SpacecraftState;
use crate::error::InvalidElementsError;

/// Below this, eccentricity or inclination is treated as zero when recovering angles
const SINGULARITY_EPS: f64 = 1e-11;

/// Newton iteration limits for Kepler's equation
const KEPLER_MAX_ITER: usize = 50;
const KEPLER_TOL: f64 = 1e-14;

/// Convention used for the anomaly angle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AnomalyKind {
    #[default]
    True,
    Mean,
    Eccentric,
}

/// Classical orbital elements of an elliptical orbit
///
/// Angles are in radians, the semi-major axis in meters and `mu` in m³/s².
/// The periapsis must clear the central body's surface; this is the caller's
/// responsibility and is not checked here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeplerianElements {
    pub semi_major_axis: f64,
    pub eccentricity: f64,
    pub inclination: f64,
    pub argument_of_periapsis: f64,
    /// Right ascension of the ascending node
    pub raan: f64,
    pub anomaly: f64,
    pub anomaly_kind: AnomalyKind,
    /// Gravitational parameter of the central body
    pub mu: f64,
}

impl KeplerianElements {
    /// Elements with a true anomaly
    pub fn new(
        semi_major_axis: f64,
        eccentricity: f64,
        inclination: f64,
        argument_of_periapsis: f64,
        raan: f64,
        true_anomaly: f64,
        mu: f64,
    ) -> Self {
        Self {
            semi_major_axis,
            eccentricity,
            inclination,
            argument_of_periapsis,
            raan,
            anomaly: true_anomaly,
            anomaly_kind: AnomalyKind::True,
            mu,
        }
    }

    /// Elliptical orbit from its periapsis and apoapsis radii
    pub fn from_apsides(
        periapsis_radius: f64,
        apoapsis_radius: f64,
        inclination: f64,
        argument_of_periapsis: f64,
        raan: f64,
        true_anomaly: f64,
        mu: f64,
    ) -> Self {
        let a = 0.5 * (periapsis_radius + apoapsis_radius);
        let e = (apoapsis_radius - periapsis_radius) / (apoapsis_radius + periapsis_radius);
        Self::new(a, e, inclination, argument_of_periapsis, raan, true_anomaly, mu)
    }

    /// Same orbit with a different anomaly convention
    pub fn with_anomaly(mut self, anomaly: f64, kind: AnomalyKind) -> Self {
        self.anomaly = anomaly;
        self.anomaly_kind = kind;
        self
    }

    /// Same orbit shape and orientation with another semi-major axis
    pub fn with_semi_major_axis(mut self, semi_major_axis: f64) -> Self {
        self.semi_major_axis = semi_major_axis;
        self
    }

    /// Check the element set describes a bound, non-degenerate ellipse
    pub fn validate(&self) -> Result<(), InvalidElementsError> {
        let fields = [
            ("semi-major axis", self.semi_major_axis),
            ("eccentricity", self.eccentricity),
            ("inclination", self.inclination),
            ("argument of periapsis", self.argument_of_periapsis),
            ("RAAN", self.raan),
            ("anomaly", self.anomaly),
            ("gravitational parameter", self.mu),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(InvalidElementsError::NonFinite(*name));
        }
        if self.mu <= 0.0 {
            return Err(InvalidElementsError::NonPositiveGravitationalParameter(self.mu));
        }
        if self.semi_major_axis <= 0.0 {
            return Err(InvalidElementsError::NonPositiveSemiMajorAxis(self.semi_major_axis));
        }
        if !(0.0..1.0).contains(&self.eccentricity) {
            return Err(InvalidElementsError::EccentricityOutOfRange(self.eccentricity));
        }
        Ok(())
    }

    pub fn periapsis_radius(&self) -> f64 {
        self.semi_major_axis * (1.0 - self.eccentricity)
    }

    pub fn apoapsis_radius(&self) -> f64 {
        self.semi_major_axis * (1.0 + self.eccentricity)
    }

    /// Keplerian period in seconds
    pub fn period(&self) -> f64 {
        keplerian_period(self.mu, self.semi_major_axis)
    }

    /// Semi-latus rectum p = a(1 − e²)
    pub fn semi_latus_rectum(&self) -> f64 {
        self.semi_major_axis * (1.0 - self.eccentricity * self.eccentricity)
    }

    /// Anomaly converted to the true anomaly convention
    pub fn true_anomaly(&self) -> f64 {
        let e = self.eccentricity;
        match self.anomaly_kind {
            AnomalyKind::True => self.anomaly,
            AnomalyKind::Eccentric => eccentric_to_true(self.anomaly, e),
            AnomalyKind::Mean => eccentric_to_true(mean_to_eccentric(self.anomaly, e), e),
        }
    }

    /// Anomaly converted to the mean anomaly convention
    pub fn mean_anomaly(&self) -> f64 {
        let e = self.eccentricity;
        match self.anomaly_kind {
            AnomalyKind::Mean => self.anomaly,
            AnomalyKind::Eccentric => eccentric_to_mean(self.anomaly, e),
            AnomalyKind::True => eccentric_to_mean(true_to_eccentric(self.anomaly, e), e),
        }
    }

    /// Convert to a Cartesian state in the central body's inertial frame
    ///
    /// Inclination, node and argument of periapsis are read against the body
    /// equator ([`CelestialBody::inertial_frame`](crate::bodies::CelestialBody::inertial_frame)).
    pub fn to_cartesian(&self, epoch: Instant) -> Result<SpacecraftState, InvalidElementsError> {
        self.validate()?;

        let e = self.eccentricity;
        let nu = self.true_anomaly();
        let p = self.semi_latus_rectum();
        let r = p / (1.0 + e * nu.cos());

        // Perifocal frame: x towards periapsis, z along angular momentum
        let pos_pf = Vector3::new(r * nu.cos(), r * nu.sin(), 0.0);
        let vel_pf = (self.mu / p).sqrt() * Vector3::new(-nu.sin(), e + nu.cos(), 0.0);

        let rotation = perifocal_to_inertial(self.raan, self.inclination, self.argument_of_periapsis);

        Ok(SpacecraftState::new(
            rotation * pos_pf,
            rotation * vel_pf,
            epoch,
        ))
    }

    /// Recover elements (true anomaly) from a Cartesian state
    ///
    /// Circular orbits get ω = 0 with the anomaly measured from the ascending
    /// node; equatorial orbits get Ω = 0 with ω measured from the x axis. A
    /// circular equatorial orbit reports the true longitude as its anomaly.
    pub fn from_cartesian(state: &SpacecraftState, mu: f64) -> Result<Self, InvalidElementsError> {
        if !state.is_finite() {
            return Err(InvalidElementsError::NonFinite("state vector"));
        }
        if mu <= 0.0 {
            return Err(InvalidElementsError::NonPositiveGravitationalParameter(mu));
        }

        let r_vec = *state.position();
        let v_vec = *state.velocity();
        let r = r_vec.norm();
        let h_vec = r_vec.cross(&v_vec);
        let h = h_vec.norm();
        if r == 0.0 || h == 0.0 {
            return Err(InvalidElementsError::Degenerate);
        }

        let energy = state.specific_energy(mu);
        if energy >= 0.0 {
            return Err(InvalidElementsError::Unbound { energy });
        }
        let a = -mu / (2.0 * energy);

        let e_vec = ((v_vec.norm_squared() - mu / r) * r_vec - r_vec.dot(&v_vec) * v_vec) / mu;
        let e = e_vec.norm();

        let h_hat = h_vec / h;
        let inclination = h_hat.z.clamp(-1.0, 1.0).acos();

        // Node vector k × h
        let n_vec = Vector3::new(-h_vec.y, h_vec.x, 0.0);
        let n = n_vec.norm();

        let circular = e < SINGULARITY_EPS;
        let equatorial = n < SINGULARITY_EPS * h;

        let raan = if equatorial { 0.0 } else { n_vec.y.atan2(n_vec.x) };
        // Reference direction in the orbit plane from which ω (or u) is measured
        let reference = if equatorial {
            Vector3::x()
        } else {
            n_vec / n
        };

        let angle_from_reference = |v: &Vector3<f64>| {
            reference.cross(v).dot(&h_hat).atan2(reference.dot(v))
        };

        let (argument_of_periapsis, true_anomaly) = if circular {
            (0.0, angle_from_reference(&r_vec))
        } else {
            let omega = angle_from_reference(&e_vec);
            let e_hat = e_vec / e;
            let nu = e_hat.cross(&r_vec).dot(&h_hat).atan2(e_hat.dot(&r_vec));
            (omega, nu)
        };

        Ok(Self::new(
            a,
            if circular { 0.0 } else { e },
            inclination,
            normalize_angle(argument_of_periapsis),
            normalize_angle(raan),
            normalize_angle(true_anomaly),
            mu,
        ))
    }
}

/// Rotation R3(−Ω) R1(−i) R3(−ω) taking perifocal vectors to the inertial frame
fn perifocal_to_inertial(raan: f64, inclination: f64, argument_of_periapsis: f64) -> Rotation3<f64> {
    Rotation3::from_axis_angle(&Vector3::z_axis(), raan)
        * Rotation3::from_axis_angle(&Vector3::x_axis(), inclination)
        * Rotation3::from_axis_angle(&Vector3::z_axis(), argument_of_periapsis)
}

/// Wrap an angle into [0, 2π)
pub fn normalize_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(TAU);
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

/// Solve Kepler's equation M = E − e·sin(E) for E by Newton iteration
pub fn mean_to_eccentric(mean_anomaly: f64, eccentricity: f64) -> f64 {
    let m = mean_anomaly;
    let mut ecc_anomaly = if eccentricity < 0.8 { m } else { std::f64::consts::PI };

    for _ in 0..KEPLER_MAX_ITER {
        let f = ecc_anomaly - eccentricity * ecc_anomaly.sin() - m;
        let f_prime = 1.0 - eccentricity * ecc_anomaly.cos();
        let delta = f / f_prime;
        ecc_anomaly -= delta;
        if delta.abs() < KEPLER_TOL {
            break;
        }
    }

    ecc_anomaly
}

pub fn eccentric_to_mean(eccentric_anomaly: f64, eccentricity: f64) -> f64 {
    eccentric_anomaly - eccentricity * eccentric_anomaly.sin()
}

pub fn eccentric_to_true(eccentric_anomaly: f64, eccentricity: f64) -> f64 {
    let half = 0.5 * eccentric_anomaly;
    2.0 * ((1.0 + eccentricity).sqrt() * half.sin()).atan2((1.0 - eccentricity).sqrt() * half.cos())
}

pub fn true_to_eccentric(true_anomaly: f64, eccentricity: f64) -> f64 {
    let half = 0.5 * true_anomaly;
    2.0 * ((1.0 - eccentricity).sqrt() * half.sin()).atan2((1.0 + eccentricity).sqrt() * half.cos())
}

/// Keplerian period T = 2π√(a³/μ) in seconds
pub fn keplerian_period(mu: f64, semi_major_axis: f64) -> f64 {
    TAU * (semi_major_axis.powi(3) / mu).sqrt()
}

/// Semi-major axis of the orbit with the given period (inverse of Kepler's third law)
pub fn semi_major_axis_from_period(mu: f64, period: f64) -> f64 {
    (mu * (period / TAU).powi(2)).cbrt()
}

/// Orbital speed at radius `r` on an orbit of semi-major axis `semi_major_axis`
pub fn vis_viva_speed(mu: f64, r: f64, semi_major_axis: f64) -> f64 {
    (mu * (2.0 / r - 1.0 / semi_major_axis)).sqrt()
}

/// Duration of a constant-thrust burn delivering `delta_v`, from the ideal rocket equation
///
/// The exhaust velocity is `surface_gravity * isp`. Pass the surface gravity of
/// the body the burn happens around (see
/// [`CelestialBody::surface_gravity`](crate::bodies::CelestialBody::surface_gravity)),
/// not 9.80665 m/s².
///
/// Units: kg, s, N, m/s, m/s². Returns seconds.
pub fn burn_duration(
    initial_mass: f64,
    isp: f64,
    thrust: f64,
    delta_v: f64,
    surface_gravity: f64,
) -> f64 {
    let exhaust_velocity = surface_gravity * isp;
    initial_mass * exhaust_velocity / thrust * (1.0 - (-delta_v / exhaust_velocity).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bodies::{CelestialBody, MU_MOON};
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    const EARTH_MU: f64 = 3.986004e14;
    const ISS_SMA: f64 = 6_371_000.0 + 400_000.0;

    fn epoch() -> Instant {
        Instant::from_datetime(2025, 1, 23, 0, 0, 0.0).unwrap()
    }

    fn assert_angle_eq(a: f64, b: f64, tol: f64) {
        let diff = (a - b).rem_euclid(TAU);
        assert!(diff.min(TAU - diff) < tol, "angles differ: {} vs {}", a, b);
    }

    #[test]
    fn test_keplerian_period_iss() {
        assert_relative_eq!(keplerian_period(EARTH_MU, ISS_SMA), 5544.855, max_relative = 1e-3);
    }

    #[test]
    fn test_vis_viva_iss() {
        assert_relative_eq!(
            vis_viva_speed(EARTH_MU, ISS_SMA, ISS_SMA),
            7672.598,
            max_relative = 1e-3
        );
    }

    #[test]
    fn test_vis_viva_circular_any_radius() {
        for a in [1_800_000.0, 5_000_000.0, 42_164_000.0] {
            for mu in [MU_MOON, EARTH_MU] {
                assert_relative_eq!(vis_viva_speed(mu, a, a), (mu / a).sqrt(), max_relative = 1e-14);
            }
        }
    }

    #[test]
    fn test_period_round_trip() {
        let period = keplerian_period(MU_MOON, 6_787_400.0);
        assert_relative_eq!(
            semi_major_axis_from_period(MU_MOON, period),
            6_787_400.0,
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_burn_duration_unit_inputs() {
        let t = burn_duration(1.0, 1.0, 1.0, 1.0, 1.0);
        assert!(t.is_finite());
        assert!(t > 0.0);
        assert_relative_eq!(t, 1.0 - (-1.0f64).exp(), max_relative = 1e-12);

        let lunar = burn_duration(1.0, 1.0, 1.0, 1.0, CelestialBody::Moon.surface_gravity());
        assert!(lunar.is_finite() && lunar > 0.0);
    }

    #[test]
    fn test_burn_duration_small_delta_v_is_linear() {
        // For Δv << ve the burn time tends to m0·Δv/F
        let t = burn_duration(1000.0, 240.0, 20.0, 0.5, CelestialBody::Moon.surface_gravity());
        assert_relative_eq!(t, 1000.0 * 0.5 / 20.0, max_relative = 1e-2);
    }

    #[test]
    fn test_rejects_invalid_elements() {
        let base = KeplerianElements::new(7_000_000.0, 0.1, 0.5, 0.0, 0.0, 0.0, EARTH_MU);

        let bad_a = KeplerianElements { semi_major_axis: -1.0, ..base };
        assert_eq!(
            bad_a.to_cartesian(epoch()),
            Err(InvalidElementsError::NonPositiveSemiMajorAxis(-1.0))
        );

        let bad_e = KeplerianElements { eccentricity: 1.0, ..base };
        assert_eq!(
            bad_e.to_cartesian(epoch()),
            Err(InvalidElementsError::EccentricityOutOfRange(1.0))
        );

        let nan = KeplerianElements { raan: f64::NAN, ..base };
        assert_eq!(nan.to_cartesian(epoch()), Err(InvalidElementsError::NonFinite("RAAN")));
    }

    #[test]
    fn test_periapsis_state_matches_vis_viva() {
        let rp = CelestialBody::Moon.equatorial_radius() + 100_000.0;
        let ra = CelestialBody::Moon.equatorial_radius() + 10_000_000.0;
        let elements = KeplerianElements::from_apsides(rp, ra, TAU / 4.0, 0.0, 0.0, 0.0, MU_MOON);

        let state = elements.to_cartesian(epoch()).unwrap();
        assert_relative_eq!(state.radius(), rp, max_relative = 1e-12);
        assert_relative_eq!(
            state.speed(),
            vis_viva_speed(MU_MOON, rp, elements.semi_major_axis),
            max_relative = 1e-12
        );
        // Polar orbit with Ω = ω = 0: periapsis on +x, velocity along +z
        assert_abs_diff_eq!(state.velocity().y, 0.0, epsilon = 1e-9);
        assert!(state.velocity().z > 0.0);
    }

    #[test]
    fn test_round_trip_circular_equatorial() {
        let elements = KeplerianElements::new(7_000_000.0, 0.0, 0.0, 0.0, 0.0, 1.2, EARTH_MU);
        let state = elements.to_cartesian(epoch()).unwrap();
        let back = KeplerianElements::from_cartesian(&state, EARTH_MU).unwrap();

        assert_relative_eq!(back.semi_major_axis, 7_000_000.0, max_relative = 1e-10);
        assert_abs_diff_eq!(back.eccentricity, 0.0, epsilon = 1e-10);
        assert_abs_diff_eq!(back.inclination, 0.0, epsilon = 1e-10);
        assert_angle_eq(back.raan, 0.0, 1e-10);
        assert_angle_eq(back.argument_of_periapsis, 0.0, 1e-10);
        assert_angle_eq(back.anomaly, 1.2, 1e-10);
    }

    #[test]
    fn test_round_trip_eccentric_inclined() {
        let elements = KeplerianElements::new(6_787_400.0, 0.72, 1.1, 0.7, 2.3, 4.0, MU_MOON);
        let state = elements.to_cartesian(epoch()).unwrap();
        let back = KeplerianElements::from_cartesian(&state, MU_MOON).unwrap();

        assert_relative_eq!(back.semi_major_axis, elements.semi_major_axis, max_relative = 1e-10);
        assert_relative_eq!(back.eccentricity, elements.eccentricity, max_relative = 1e-10);
        assert_abs_diff_eq!(back.inclination, elements.inclination, epsilon = 1e-10);
        assert_angle_eq(back.argument_of_periapsis, elements.argument_of_periapsis, 1e-9);
        assert_angle_eq(back.raan, elements.raan, 1e-10);
        assert_angle_eq(back.anomaly, elements.anomaly, 1e-9);
    }

    #[test]
    fn test_anomaly_conventions_agree() {
        let e = 0.4;
        let nu = 2.1;
        let ecc = true_to_eccentric(nu, e);
        let mean = eccentric_to_mean(ecc, e);

        let by_true = KeplerianElements::new(9_000_000.0, e, 0.3, 0.2, 0.1, nu, EARTH_MU);
        let by_mean = by_true.with_anomaly(mean, AnomalyKind::Mean);
        let by_ecc = by_true.with_anomaly(ecc, AnomalyKind::Eccentric);

        let s_true = by_true.to_cartesian(epoch()).unwrap();
        let s_mean = by_mean.to_cartesian(epoch()).unwrap();
        let s_ecc = by_ecc.to_cartesian(epoch()).unwrap();

        assert!((s_true.position() - s_mean.position()).norm() < 1e-5);
        assert!((s_true.position() - s_ecc.position()).norm() < 1e-5);
        assert_angle_eq(by_mean.true_anomaly(), nu, 1e-12);
        assert_angle_eq(by_true.mean_anomaly(), mean, 1e-12);
    }
}
