//! Two-spacecraft phasing study
//!
//! A primary spacecraft flies an elliptical lunar orbit. A secondary starts at
//! the same point after a tangential burn at periapsis that lengthens its
//! period just enough to trail the primary by a target distance after one
//! revolution. The plan sizes that burn in closed form; the run checks it by
//! propagating both spacecraft with the full force model.

use satkit::Instant;
use serde::{Deserialize, Serialize};

use crate::bodies::CelestialBody;
use crate::error::{InvalidElementsError, ScenarioError};
use crate::propagation::elements::{
    burn_duration, keplerian_period, semi_major_axis_from_period, vis_viva_speed,
    KeplerianElements,
};
use crate::propagation::state::duration_from_seconds;
use crate::propagation::trajectory::{relative_distances, DEFAULT_EPOCH_TOLERANCE};
use crate::propagation::{HiFiPropagator, SampledTrajectory};

/// Manoeuvring vehicle: wet mass (kg), specific impulse (s), thrust (N)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub mass: f64,
    pub isp: f64,
    pub thrust: f64,
}

impl Default for Vehicle {
    /// Lander-class vehicle on attitude thrusters
    fn default() -> Self {
        Self {
            mass: 1000.0,
            isp: 240.0,
            thrust: 20.0,
        }
    }
}

/// Inputs of the phasing study
///
/// Angles are measured in the central body's inertially oriented frame, so
/// 90° inclination is a polar orbit about the body's own pole.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioParameters {
    /// Periapsis altitude above the equatorial radius (m)
    pub periapsis_altitude: f64,
    /// Apoapsis altitude above the equatorial radius (m)
    pub apoapsis_altitude: f64,
    pub inclination_deg: f64,
    pub argument_of_periapsis_deg: f64,
    pub raan_deg: f64,
    pub true_anomaly_deg: f64,
    /// Along-track separation wanted after one revolution (m)
    pub target_separation: f64,
    pub vehicle: Vehicle,
}

impl Default for ScenarioParameters {
    /// 100 x 10 000 km polar orbit, starting at periapsis, 10 km separation
    fn default() -> Self {
        Self {
            periapsis_altitude: 100_000.0,
            apoapsis_altitude: 10_000_000.0,
            inclination_deg: 90.0,
            argument_of_periapsis_deg: 0.0,
            raan_deg: 0.0,
            true_anomaly_deg: 0.0,
            target_separation: 10_000.0,
            vehicle: Vehicle::default(),
        }
    }
}

/// Closed-form sizing of the phasing manoeuvre
#[derive(Debug, Clone, PartialEq)]
pub struct PhasingPlan {
    pub primary: KeplerianElements,
    pub secondary: KeplerianElements,
    /// Primary Keplerian period (s)
    pub period: f64,
    pub periapsis_speed: f64,
    pub apoapsis_speed: f64,
    /// Extra period needed by the secondary (s)
    pub period_difference: f64,
    pub target_period: f64,
    pub target_semi_major_axis: f64,
    /// Tangential Δv reaching the target semi-major axis at periapsis (m/s)
    pub delta_v_periapsis: f64,
    /// Same semi-major axis change performed at apoapsis (m/s)
    pub delta_v_apoapsis: f64,
    /// Duration of the periapsis burn (s)
    pub burn_duration: f64,
}

impl PhasingPlan {
    /// Burn duration as a fraction of the orbital period
    pub fn burn_fraction(&self) -> f64 {
        self.burn_duration / self.period
    }
}

/// Propagated outcome of the study
#[derive(Debug, Clone)]
pub struct PhasingOutcome {
    pub plan: PhasingPlan,
    pub primary: SampledTrajectory,
    pub secondary: SampledTrajectory,
    /// (elapsed seconds, separation in meters) per sample
    pub separation: Vec<(f64, f64)>,
}

impl PhasingOutcome {
    /// Separation at the end of the run (m)
    pub fn final_separation(&self) -> Option<f64> {
        self.separation.last().map(|&(_, d)| d)
    }

    /// Largest separation over the run (m)
    pub fn max_separation(&self) -> Option<f64> {
        self.separation
            .iter()
            .map(|&(_, d)| d)
            .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |m| m.max(d))))
    }
}

/// Phasing study about one central body starting at one epoch
#[derive(Debug, Clone)]
pub struct PhasingScenario {
    pub body: CelestialBody,
    pub epoch: Instant,
    pub parameters: ScenarioParameters,
}

impl PhasingScenario {
    pub fn new(body: CelestialBody, epoch: Instant, parameters: ScenarioParameters) -> Self {
        Self {
            body,
            epoch,
            parameters,
        }
    }

    /// Default lunar study
    pub fn lunar_default(epoch: Instant) -> Self {
        Self::new(CelestialBody::Moon, epoch, ScenarioParameters::default())
    }

    pub fn plan(&self) -> Result<PhasingPlan, InvalidElementsError> {
        let p = &self.parameters;
        let mu = self.body.mu();
        let radius = self.body.equatorial_radius();

        let rp = radius + p.periapsis_altitude;
        let ra = radius + p.apoapsis_altitude;
        let primary = KeplerianElements::from_apsides(
            rp,
            ra,
            p.inclination_deg.to_radians(),
            p.argument_of_periapsis_deg.to_radians(),
            p.raan_deg.to_radians(),
            p.true_anomaly_deg.to_radians(),
            mu,
        );
        primary.validate()?;

        let a = primary.semi_major_axis;
        let period = keplerian_period(mu, a);
        let periapsis_speed = vis_viva_speed(mu, rp, a);
        let apoapsis_speed = vis_viva_speed(mu, ra, a);

        // Linear along-track drift around periapsis: Δs ≈ v_p·ΔT
        let period_difference = p.target_separation / periapsis_speed;
        let target_period = period + period_difference;
        let target_semi_major_axis = semi_major_axis_from_period(mu, target_period);

        let delta_v_periapsis =
            vis_viva_speed(mu, rp, target_semi_major_axis) - periapsis_speed;
        let delta_v_apoapsis = vis_viva_speed(mu, ra, target_semi_major_axis) - apoapsis_speed;

        let burn = burn_duration(
            p.vehicle.mass,
            p.vehicle.isp,
            p.vehicle.thrust,
            delta_v_periapsis,
            self.body.surface_gravity(),
        );

        // Impulsive burn: eccentricity kept, only the size of the orbit changes
        let secondary = primary.with_semi_major_axis(target_semi_major_axis);
        secondary.validate()?;

        Ok(PhasingPlan {
            primary,
            secondary,
            period,
            periapsis_speed,
            apoapsis_speed,
            period_difference,
            target_period,
            target_semi_major_axis,
            delta_v_periapsis,
            delta_v_apoapsis,
            burn_duration: burn,
        })
    }

    /// Propagate both spacecraft over one primary period and compare them
    pub fn run(&self, propagator: &HiFiPropagator) -> Result<PhasingOutcome, ScenarioError> {
        let plan = self.plan()?;
        log::info!(
            "Phasing plan: a = {:.3} km, T = {:.1} s, target a = {:.3} km, dV(periapsis) = {:.4} m/s, dV(apoapsis) = {:.4} m/s",
            plan.primary.semi_major_axis / 1000.0,
            plan.period,
            plan.target_semi_major_axis / 1000.0,
            plan.delta_v_periapsis,
            plan.delta_v_apoapsis
        );
        log::info!(
            "Burn duration {:.2} s ({:.4} % of the period)",
            plan.burn_duration,
            plan.burn_fraction() * 100.0
        );

        let end_epoch = self.epoch + duration_from_seconds(plan.period);

        let primary_state = plan.primary.to_cartesian(self.epoch)?;
        let secondary_state = plan.secondary.to_cartesian(self.epoch)?;

        log::info!("Propagating primary and secondary spacecraft");
        let primary = propagator.propagate(&primary_state, end_epoch)?;
        let secondary = propagator.propagate(&secondary_state, end_epoch)?;

        let separation = relative_distances(&primary, &secondary, DEFAULT_EPOCH_TOLERANCE)?;

        let outcome = PhasingOutcome {
            plan,
            primary,
            secondary,
            separation,
        };
        if let Some(d) = outcome.final_separation() {
            log::info!("Separation after one revolution: {:.3} km", d / 1000.0);
        }

        Ok(outcome)
    }
}
