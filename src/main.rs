//! Lunar phasing study runner
//!
//! Sizes a phasing manoeuvre between two spacecraft on an elliptical lunar
//! orbit and checks it by propagating both over one revolution.
//!
//! Propagation settings are read from the JSON file named by
//! `LUNAR_PHASING_SETTINGS` when set, otherwise the defaults apply.

use anyhow::{Context, Result};
use satkit::Instant;

use lunar_phasing::propagation::{load_settings, PropagationSettings};
use lunar_phasing::scenario::PhasingScenario;

const SETTINGS_ENV: &str = "LUNAR_PHASING_SETTINGS";

/// Seconds between separation log lines
const REPORT_INTERVAL_S: f64 = 3600.0;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Lunar phasing study starting");

    let settings = match std::env::var_os(SETTINGS_ENV) {
        Some(path) => load_settings(path)?,
        None => PropagationSettings::default(),
    };
    log::info!(
        "Central body {}, gravity {:?}, third bodies {:?}, output every {} s",
        settings.central_body,
        settings.gravity,
        settings.third_bodies,
        settings.output_step
    );

    let ctx = settings.context();
    let propagator = settings
        .build_propagator(&ctx)
        .context("Failed to build propagator")?;

    let epoch = Instant::from_datetime(2025, 1, 23, 0, 0, 0.0)
        .map_err(|e| anyhow::anyhow!("Invalid start epoch: {}", e))?;
    let scenario = PhasingScenario::lunar_default(epoch);

    let outcome = scenario.run(&propagator).context("Phasing study failed")?;

    let mut next_report = 0.0;
    for &(elapsed, distance) in &outcome.separation {
        if elapsed >= next_report {
            log::info!(
                "t = {:>8.0} s  separation = {:>10.3} km",
                elapsed,
                distance / 1000.0
            );
            next_report += REPORT_INTERVAL_S;
        }
    }

    if let (Some(last), Some(max)) = (outcome.final_separation(), outcome.max_separation()) {
        log::info!(
            "Final separation {:.3} km (target {:.3} km), maximum {:.3} km",
            last / 1000.0,
            scenario.parameters.target_separation / 1000.0,
            max / 1000.0
        );
    }

    log::info!("All done");
    Ok(())
}
