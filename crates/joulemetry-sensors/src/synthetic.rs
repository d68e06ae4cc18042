//! ---
//! jm_section: "02-sensor-probes"
//! jm_subsection: "module"
//! jm_type: "source"
//! jm_scope: "code"
//! jm_description: "Energy and power sensor discovery and acquisition."
//! jm_version: "v1.2.0"
//! jm_owner: "tbd"
//! ---
use std::f64::consts::PI;

use rand::prelude::*;
use rand_distr::Normal;

use joulemetry_common::config::SyntheticConfig;

use crate::{Result, Sensor, Unit};

/// Deterministic wattage waveform for hosts without readable counters.
///
/// The signal is a slow sinusoid around a base load plus gaussian noise,
/// advanced one step per read so traces are reproducible for a given seed
/// regardless of wall time.
#[derive(Debug)]
pub struct SyntheticSensor {
    name: String,
    base_watts: f64,
    amplitude_watts: f64,
    noise: Normal<f64>,
    rng: StdRng,
    step: u64,
}

impl SyntheticSensor {
    pub fn new(index: usize, config: &SyntheticConfig) -> Self {
        Self {
            name: format!("synthetic-{index}"),
            base_watts: config.base_watts,
            amplitude_watts: config.amplitude_watts,
            noise: Normal::new(0.0, config.amplitude_watts * 0.05)
                .expect("noise sigma must not be negative"),
            rng: StdRng::seed_from_u64(config.seed.wrapping_add(index as u64)),
            step: 0,
        }
    }
}

impl Sensor for SyntheticSensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn unit(&self) -> Unit {
        Unit::Watts
    }

    fn read(&mut self) -> Result<f64> {
        let t = self.step as f64;
        self.step += 1;
        let wave = self.base_watts + self.amplitude_watts * (2.0 * PI * 0.01 * t).sin();
        let sample = wave + self.noise.sample(&mut self.rng);
        Ok(sample.max(0.0))
    }
}
