//! ---
//! jm_section: "02-sensor-probes"
//! jm_subsection: "module"
//! jm_type: "source"
//! jm_scope: "code"
//! jm_description: "Energy and power sensor discovery and acquisition."
//! jm_version: "v1.2.0"
//! jm_owner: "tbd"
//! ---
//! Sensor discovery and acquisition for the Joulemetry sampler.
//!
//! Three probe families are supported: Intel RAPL energy counters under the
//! powercap sysfs tree, the generic hwmon sysfs class, and a deterministic
//! synthetic source for hosts without readable counters. GPU vendor SDK
//! backends are deliberately not part of this crate; acquisition sticks to
//! plain sysfs interfaces.

use std::fmt;
use std::num::ParseIntError;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{info, warn};

use joulemetry_common::config::SourcesConfig;

pub mod hwmon;
pub mod rapl;
pub mod synthetic;

pub use hwmon::find_hwmon;
pub use rapl::find_rapl;
pub use synthetic::SyntheticSensor;

/// Conversion factor from a micro SI unit to an unprefixed one.
pub const MICRO_TO_UNPREFIXED: f64 = 1.0 / 1_000_000.0;
/// Conversion factor from a milli SI unit to an unprefixed one.
pub const MILLI_TO_UNPREFIXED: f64 = 1.0 / 1_000.0;

/// Measurement unit reported by a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    Joules,
    Watts,
    Amps,
    Volts,
    Unknown,
}

impl Unit {
    /// Parse the single-letter rendering used in trace headings.
    #[must_use]
    pub fn from_symbol(symbol: &str) -> Unit {
        match symbol {
            "J" => Unit::Joules,
            "W" => Unit::Watts,
            "A" => Unit::Amps,
            "V" => Unit::Volts,
            _ => Unit::Unknown,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Unit::Joules => "J",
            Unit::Watts => "W",
            Unit::Amps => "A",
            Unit::Volts => "V",
            Unit::Unknown => "?",
        };
        f.write_str(symbol)
    }
}

/// Errors produced by sensor probes.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("failed reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed parsing {path} ({raw}): {source}")]
    Parse {
        path: PathBuf,
        raw: String,
        #[source]
        source: ParseIntError,
    },
    #[error("failed traversing {root}: {source}")]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

pub type Result<T> = std::result::Result<T, SensorError>;

/// A readable measurement channel.
///
/// Energy (`J`) sensors report the energy consumed since their previous
/// read; power (`W`) sensors report an instantaneous rate. Reads take
/// `&mut self` because incremental counters carry state between reads.
pub trait Sensor: Send {
    fn name(&self) -> &str;
    fn unit(&self) -> Unit;
    fn read(&mut self) -> Result<f64>;
}

/// Assemble the enabled probes into a single sensor list.
///
/// Individual probe failures are logged and skipped so that a host with,
/// say, no RAPL support still exposes its hwmon channels. An empty result
/// is left to the caller to judge.
pub fn discover(sources: &SourcesConfig) -> Vec<Box<dyn Sensor>> {
    let mut sensors: Vec<Box<dyn Sensor>> = Vec::new();

    if sources.rapl {
        match rapl::find_rapl() {
            Ok(found) => {
                info!(count = found.len(), "discovered RAPL energy counters");
                sensors.extend(
                    found
                        .into_iter()
                        .map(|counter| Box::new(counter) as Box<dyn Sensor>),
                );
            }
            Err(err) => warn!(error = %err, "RAPL discovery failed"),
        }
    }

    if sources.hwmon {
        match hwmon::find_hwmon() {
            Ok(found) => {
                info!(count = found.len(), "discovered hwmon channels");
                sensors.extend(found);
            }
            Err(err) => warn!(error = %err, "hwmon discovery failed"),
        }
    }

    if sources.synthetic.enabled {
        for index in 0..sources.synthetic.count {
            sensors.push(Box::new(SyntheticSensor::new(index, &sources.synthetic)));
        }
        info!(
            count = sources.synthetic.count,
            seed = sources.synthetic.seed,
            "registered synthetic sources"
        );
    }

    sensors
}
