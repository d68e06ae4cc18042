//! ---
//! jm_section: "05-operator-tooling"
//! jm_subsection: "binary"
//! jm_type: "source"
//! jm_scope: "code"
//! jm_description: "Control CLI for operators interacting with Joulemetry."
//! jm_version: "v1.2.0"
//! jm_owner: "tbd"
//! ---
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use joulemetry_common::config::AppConfig;
use joulemetry_sensors::discover;

#[derive(Debug, Args)]
pub struct SensorsCommand {
    /// Configuration file controlling which sources are probed.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

/// Probe every discovered sensor once and print the readings.
pub fn run(command: SensorsCommand) -> Result<()> {
    let config = AppConfig::resolve(command.config.as_deref())?.config;
    let mut sensors = discover(&config.sources);
    if sensors.is_empty() {
        println!("No sensors discovered.");
        println!("Enable [sources] in the configuration, or run as root for RAPL access.");
        return Ok(());
    }
    println!("{:<44} {:>4} {:>16}", "SENSOR", "UNIT", "FIRST READING");
    for sensor in &mut sensors {
        let unit = sensor.unit().to_string();
        match sensor.read() {
            Ok(value) => println!("{:<44} {:>4} {:>16.6}", sensor.name(), unit, value),
            Err(error) => println!("{:<44} {:>4} error: {error}", sensor.name(), unit),
        }
    }
    Ok(())
}
