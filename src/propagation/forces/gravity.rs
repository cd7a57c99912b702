//! Central body gravity force models
//!
//! Provides the two fidelity levels used around the central body:
//! - Point mass (μ/r²), always present in a [`CompositeForce`](super::CompositeForce)
//! - Truncated spherical harmonics (degree ≥ 2) as an optional perturbation
//!
//! Harmonic accelerations use the Cunningham recursion for the V/W functions
//! (Montenbruck & Gill, *Satellite Orbits*, §3.2) on unnormalized coefficients.

use nalgebra::{DMatrix, Rotation3, Vector3};
use satkit::Instant;

use super::ForceModel;
use crate::bodies::CelestialBody;
use crate::error::GravityFieldError;
use crate::propagation::state::SpacecraftState;

/// Largest degree of the built-in coefficient tables
pub const BUILTIN_MAX_DEGREE: usize = 3;

/// Low-degree lunar field, fully normalized (n, m, C̄nm, S̄nm), GRAIL-derived and rounded
const LUNAR_COEFFICIENTS: &[(usize, usize, f64, f64)] = &[
    (2, 0, -9.0880e-5, 0.0),
    (2, 1, 0.0, 0.0),
    (2, 2, 3.4674e-5, 0.0),
    (3, 0, -3.1980e-6, 0.0),
    (3, 1, 2.6392e-5, 5.4533e-6),
    (3, 2, 1.4174e-5, 4.8788e-6),
    (3, 3, 1.2280e-5, -1.7764e-6),
];
const LUNAR_FIELD_MU: f64 = 4.902_800_1e12;
const LUNAR_FIELD_RADIUS_M: f64 = 1_738_000.0;

/// Low-degree Earth field (EGM96), fully normalized (n, m, C̄nm, S̄nm)
const EARTH_COEFFICIENTS: &[(usize, usize, f64, f64)] = &[
    (2, 0, -4.841_653_717_36e-4, 0.0),
    (2, 1, -1.869_876_359_55e-10, 1.195_280_120_31e-9),
    (2, 2, 2.439_143_523_98e-6, -1.400_166_836_54e-6),
    (3, 0, 9.572_541_737_92e-7, 0.0),
    (3, 1, 2.030_462_010_47e-6, 2.482_004_158_56e-7),
    (3, 2, 9.047_878_948_09e-7, -6.190_054_751_77e-7),
    (3, 3, 7.213_217_571_21e-7, 1.414_349_261_92e-6),
];
const EARTH_FIELD_MU: f64 = 3.986_004_415e14;
const EARTH_FIELD_RADIUS_M: f64 = 6_378_136.3;

/// Point mass gravity of the central body: a = -μ/r³ × r
#[derive(Debug, Clone, Copy)]
pub struct PointMass {
    mu: f64,
}

impl PointMass {
    pub fn new(mu: f64) -> Self {
        Self { mu }
    }

    pub fn for_body(body: CelestialBody) -> Self {
        Self::new(body.mu())
    }

    pub fn mu(&self) -> f64 {
        self.mu
    }

    pub(crate) fn accel(&self, position: &Vector3<f64>) -> Vector3<f64> {
        let r = position.norm();
        if r < 1.0 {
            // Avoid singularity at origin
            return Vector3::zeros();
        }
        let r3 = r * r * r;
        position * (-self.mu / r3)
    }
}

impl ForceModel for PointMass {
    fn acceleration(&self, state: &SpacecraftState) -> Vector3<f64> {
        self.accel(state.position())
    }

    fn name(&self) -> &'static str {
        "Central Body Point Mass"
    }

    fn description(&self) -> &'static str {
        "Central body gravity μ/r²"
    }
}

/// Truncated spherical-harmonic gravity field
///
/// Coefficients are stored unnormalized, indexed `(n, m)`, for degrees
/// `0..=degree`. Terms below degree 2 are never evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct GravityField {
    mu: f64,
    reference_radius: f64,
    degree: usize,
    order: usize,
    c: DMatrix<f64>,
    s: DMatrix<f64>,
}

impl GravityField {
    /// Build a field from fully normalized coefficients `(n, m, C̄nm, S̄nm)`
    ///
    /// Entries beyond the requested degree/order are ignored; missing entries
    /// are zero.
    pub fn from_normalized(
        mu: f64,
        reference_radius: f64,
        degree: usize,
        order: usize,
        coefficients: &[(usize, usize, f64, f64)],
    ) -> Result<Self, GravityFieldError> {
        if order > degree {
            return Err(GravityFieldError::OrderExceedsDegree { degree, order });
        }

        let mut c = DMatrix::zeros(degree + 1, degree + 1);
        let mut s = DMatrix::zeros(degree + 1, degree + 1);
        for &(n, m, c_bar, s_bar) in coefficients {
            if n > degree || m > order || m > n {
                continue;
            }
            let factor = normalization_factor(n, m);
            c[(n, m)] = c_bar * factor;
            s[(n, m)] = s_bar * factor;
        }

        Ok(Self {
            mu,
            reference_radius,
            degree,
            order,
            c,
            s,
        })
    }

    pub fn mu(&self) -> f64 {
        self.mu
    }

    pub fn reference_radius(&self) -> f64 {
        self.reference_radius
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Unnormalized zonal coefficient Jn = −Cn0
    pub fn zonal_j(&self, n: usize) -> f64 {
        if n > self.degree {
            0.0
        } else {
            -self.c[(n, 0)]
        }
    }

    /// Perturbing acceleration (degrees 2..=degree) at a body-fixed position
    pub fn acceleration_body_fixed(&self, position: &Vector3<f64>) -> Vector3<f64> {
        let n_max = self.degree;
        let r_sqr = position.norm_squared();
        if n_max < 2 || r_sqr < 1.0 {
            return Vector3::zeros();
        }

        let re = self.reference_radius;
        let rho = re * re / r_sqr;
        let x0 = re * position.x / r_sqr;
        let y0 = re * position.y / r_sqr;
        let z0 = re * position.z / r_sqr;

        // V/W need one degree more than the field for the gradient
        let size = n_max + 2;
        let mut v = DMatrix::<f64>::zeros(size, size);
        let mut w = DMatrix::<f64>::zeros(size, size);

        // Zonal terms
        v[(0, 0)] = re / r_sqr.sqrt();
        v[(1, 0)] = z0 * v[(0, 0)];
        for n in 2..size {
            let nf = n as f64;
            v[(n, 0)] =
                ((2.0 * nf - 1.0) * z0 * v[(n - 1, 0)] - (nf - 1.0) * rho * v[(n - 2, 0)]) / nf;
        }

        // Tesseral and sectorial terms
        for m in 1..size {
            let mf = m as f64;
            v[(m, m)] = (2.0 * mf - 1.0) * (x0 * v[(m - 1, m - 1)] - y0 * w[(m - 1, m - 1)]);
            w[(m, m)] = (2.0 * mf - 1.0) * (x0 * w[(m - 1, m - 1)] + y0 * v[(m - 1, m - 1)]);

            if m + 1 < size {
                v[(m + 1, m)] = (2.0 * mf + 1.0) * z0 * v[(m, m)];
                w[(m + 1, m)] = (2.0 * mf + 1.0) * z0 * w[(m, m)];
            }

            for n in (m + 2)..size {
                let nf = n as f64;
                let k1 = (2.0 * nf - 1.0) * z0;
                let k2 = (nf + mf - 1.0) * rho;
                v[(n, m)] = (k1 * v[(n - 1, m)] - k2 * v[(n - 2, m)]) / (nf - mf);
                w[(n, m)] = (k1 * w[(n - 1, m)] - k2 * w[(n - 2, m)]) / (nf - mf);
            }
        }

        let (mut ax, mut ay, mut az) = (0.0, 0.0, 0.0);
        for n in 2..=n_max {
            let nf = n as f64;
            for m in 0..=n.min(self.order) {
                let c = self.c[(n, m)];
                let s = self.s[(n, m)];

                if m == 0 {
                    ax -= c * v[(n + 1, 1)];
                    ay -= c * w[(n + 1, 1)];
                    az -= (nf + 1.0) * c * v[(n + 1, 0)];
                } else {
                    let mf = m as f64;
                    let fac = 0.5 * (nf - mf + 1.0) * (nf - mf + 2.0);
                    ax += 0.5 * (-c * v[(n + 1, m + 1)] - s * w[(n + 1, m + 1)])
                        + fac * (c * v[(n + 1, m - 1)] + s * w[(n + 1, m - 1)]);
                    ay += 0.5 * (-c * w[(n + 1, m + 1)] + s * v[(n + 1, m + 1)])
                        + fac * (-c * w[(n + 1, m - 1)] + s * v[(n + 1, m - 1)]);
                    az += (nf - mf + 1.0) * (-c * v[(n + 1, m)] - s * w[(n + 1, m)]);
                }
            }
        }

        self.mu / (re * re) * Vector3::new(ax, ay, az)
    }
}

/// Factor N such that Cnm = N·C̄nm: √((2 − δ0m)(2n + 1)(n − m)!/(n + m)!)
fn normalization_factor(n: usize, m: usize) -> f64 {
    let delta = if m == 0 { 1.0 } else { 2.0 };
    // (n − m)!/(n + m)! = 1/((n − m + 1)(n − m + 2)…(n + m))
    let ratio = ((n - m + 1)..=(n + m)).fold(1.0, |acc, k| acc / k as f64);
    (delta * (2 * n + 1) as f64 * ratio).sqrt()
}

/// Source of gravity field coefficients
pub trait GravityFieldProvider: Send + Sync {
    /// Field of `body` truncated to `degree` × `order`
    fn field(
        &self,
        body: CelestialBody,
        degree: usize,
        order: usize,
    ) -> Result<GravityField, GravityFieldError>;

    fn name(&self) -> &'static str;
}

/// Built-in low-degree fields for the Moon and the Earth (up to 3×3)
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinGravityFields;

impl GravityFieldProvider for BuiltinGravityFields {
    fn field(
        &self,
        body: CelestialBody,
        degree: usize,
        order: usize,
    ) -> Result<GravityField, GravityFieldError> {
        if order > degree {
            return Err(GravityFieldError::OrderExceedsDegree { degree, order });
        }

        let (mu, radius, table) = match body {
            CelestialBody::Moon => (LUNAR_FIELD_MU, LUNAR_FIELD_RADIUS_M, LUNAR_COEFFICIENTS),
            CelestialBody::Earth => (EARTH_FIELD_MU, EARTH_FIELD_RADIUS_M, EARTH_COEFFICIENTS),
            CelestialBody::Sun => {
                return Err(GravityFieldError::Unavailable {
                    body,
                    degree,
                    order,
                    max_degree: 0,
                })
            }
        };

        if degree > BUILTIN_MAX_DEGREE {
            return Err(GravityFieldError::Unavailable {
                body,
                degree,
                order,
                max_degree: BUILTIN_MAX_DEGREE,
            });
        }

        GravityField::from_normalized(mu, radius, degree, order, table)
    }

    fn name(&self) -> &'static str {
        "Built-in low-degree fields"
    }
}

/// Orientation of the frame the harmonic coefficients are expressed in
///
/// Propagation about a body uses its inertially oriented frame
/// ([`CelestialBody::inertial_frame`]), whose z axis is already the mean pole.
/// The body-fixed frame differs from it only by the spin about that axis.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum BodyOrientation {
    /// Body frame aligned with the propagation frame
    #[default]
    Inertial,

    /// Body frame spinning about the pole
    Rotating {
        /// Spin rate in rad/s
        rate: f64,
        /// Epoch at which the prime meridian angle is known
        reference_epoch: Instant,
        /// Prime meridian angle at the reference epoch (rad)
        angle_at_reference: f64,
    },
}

impl BodyOrientation {
    /// Uniform spin of `body` from its IAU prime meridian at J2000
    pub fn iau_rotating(body: CelestialBody) -> Self {
        Self::Rotating {
            rate: body.rotation_rate(),
            reference_epoch: Instant::J2000,
            angle_at_reference: body.prime_meridian_at_j2000(),
        }
    }

    /// Rotation taking body-fixed vectors to the propagation frame at `epoch`
    fn body_to_inertial(&self, epoch: &Instant) -> Option<Rotation3<f64>> {
        match self {
            Self::Inertial => None,
            Self::Rotating {
                rate,
                reference_epoch,
                angle_at_reference,
            } => {
                let elapsed = (*epoch - *reference_epoch).as_seconds();
                let angle = angle_at_reference + rate * elapsed;
                Some(Rotation3::from_axis_angle(&Vector3::z_axis(), angle))
            }
        }
    }
}

/// Non-spherical gravity of the central body
pub struct SphericalHarmonics {
    body: CelestialBody,
    field: GravityField,
    orientation: BodyOrientation,
}

impl SphericalHarmonics {
    pub fn new(body: CelestialBody, field: GravityField) -> Self {
        Self {
            body,
            field,
            orientation: BodyOrientation::Inertial,
        }
    }

    /// Fetch a `degree` × `order` field for `body` from `provider`
    pub fn from_provider(
        provider: &dyn GravityFieldProvider,
        body: CelestialBody,
        degree: usize,
        order: usize,
    ) -> Result<Self, GravityFieldError> {
        let field = provider.field(body, degree, order)?;
        log::debug!(
            "Loaded {}x{} {} gravity field from {}",
            degree,
            order,
            body,
            provider.name()
        );
        Ok(Self::new(body, field))
    }

    pub fn with_orientation(mut self, orientation: BodyOrientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn field(&self) -> &GravityField {
        &self.field
    }
}

impl ForceModel for SphericalHarmonics {
    fn acceleration(&self, state: &SpacecraftState) -> Vector3<f64> {
        match self.orientation.body_to_inertial(&state.epoch()) {
            None => self.field.acceleration_body_fixed(state.position()),
            Some(to_inertial) => {
                let pos_body = to_inertial.inverse() * state.position();
                to_inertial * self.field.acceleration_body_fixed(&pos_body)
            }
        }
    }

    fn name(&self) -> &'static str {
        match self.body {
            CelestialBody::Moon => "Lunar Gravity Field",
            CelestialBody::Earth => "Earth Gravity Field",
            CelestialBody::Sun => "Solar Gravity Field",
        }
    }

    fn description(&self) -> &'static str {
        "Truncated spherical harmonics (degree ≥ 2)"
    }
}
