//! ---
//! jm_section: "02-sensor-probes"
//! jm_subsection: "module"
//! jm_type: "source"
//! jm_scope: "code"
//! jm_description: "Energy and power sensor discovery and acquisition."
//! jm_version: "v1.2.0"
//! jm_owner: "tbd"
//! ---
//! Hardware monitoring channels from the hwmon sysfs class.
//!
//! Each `/sys/class/hwmon/hwmon*` directory is one chip; its input files
//! follow the kernel ABI: `energy*_input` (µJ, cumulative), `power*_input`
//! (µW), `curr*_input` (mA), `in*_input` (mV), with an optional
//! `<channel>_label`. Energy and power channels are exported directly;
//! when a chip exposes both a current and a voltage channel, a power sensor
//! is synthesized from their product.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{Result, Sensor, SensorError, Unit, MICRO_TO_UNPREFIXED, MILLI_TO_UNPREFIXED};

const HWMON_ROOT: &str = "/sys/class/hwmon";

/// Input channel kinds this probe understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Energy,
    Power,
    Current,
    Voltage,
}

impl Kind {
    /// Parse a channel stem such as `power1` or `in0`.
    fn from_stem(stem: &str) -> Option<Kind> {
        const PREFIXES: [(&str, Kind); 4] = [
            ("energy", Kind::Energy),
            ("power", Kind::Power),
            ("curr", Kind::Current),
            ("in", Kind::Voltage),
        ];
        for (prefix, kind) in PREFIXES {
            if let Some(rest) = stem.strip_prefix(prefix) {
                if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
                    return Some(kind);
                }
            }
        }
        None
    }

    fn unit(self) -> Unit {
        match self {
            Kind::Energy => Unit::Joules,
            Kind::Power => Unit::Watts,
            Kind::Current => Unit::Amps,
            Kind::Voltage => Unit::Volts,
        }
    }
}

/// One hwmon input channel.
#[derive(Debug)]
pub struct HwmonChannel {
    name: String,
    path: PathBuf,
    kind: Kind,
    last_value: i64,
}

impl Sensor for HwmonChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn unit(&self) -> Unit {
        self.kind.unit()
    }

    fn read(&mut self) -> Result<f64> {
        let raw = fs::read_to_string(&self.path).map_err(|source| SensorError::Io {
            path: self.path.clone(),
            source,
        })?;
        let trimmed = raw.trim_end();
        let value = trimmed
            .parse::<i64>()
            .map_err(|source| SensorError::Parse {
                path: self.path.clone(),
                raw: trimmed.to_owned(),
                source,
            })?;
        let reading = match self.kind {
            Kind::Energy => {
                // Cumulative counter with no advertised range: a wrap shows
                // up as a decrease and yields no measurable energy.
                let increment = if value < self.last_value {
                    debug!(sensor = %self.name, "energy counter decreased; emitting zero");
                    0
                } else {
                    value - self.last_value
                };
                self.last_value = value;
                increment as f64 * MICRO_TO_UNPREFIXED
            }
            Kind::Power => value as f64 * MICRO_TO_UNPREFIXED,
            Kind::Current | Kind::Voltage => value as f64 * MILLI_TO_UNPREFIXED,
        };
        Ok(reading)
    }
}

/// A power sensor synthesized from a chip's current and voltage channels.
#[derive(Debug)]
pub struct SynthesizedPower {
    name: String,
    current: HwmonChannel,
    voltage: HwmonChannel,
}

impl SynthesizedPower {
    fn new(current: HwmonChannel, voltage: HwmonChannel) -> Self {
        let name = format!("synthesized power ({} x {})", current.name, voltage.name);
        Self {
            name,
            current,
            voltage,
        }
    }
}

impl Sensor for SynthesizedPower {
    fn name(&self) -> &str {
        &self.name
    }

    fn unit(&self) -> Unit {
        Unit::Watts
    }

    fn read(&mut self) -> Result<f64> {
        Ok(self.current.read()? * self.voltage.read()?)
    }
}

/// Discover hwmon channels under the conventional sysfs class root.
pub fn find_hwmon() -> Result<Vec<Box<dyn Sensor>>> {
    find_hwmon_in(Path::new(HWMON_ROOT))
}

/// Discover hwmon channels under an explicit root.
pub fn find_hwmon_in(root: &Path) -> Result<Vec<Box<dyn Sensor>>> {
    let mut chip_dirs: Vec<PathBuf> = fs::read_dir(root)
        .map_err(|source| SensorError::Io {
            path: root.to_path_buf(),
            source,
        })?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .collect();
    chip_dirs.sort();

    let mut sensors = Vec::new();
    for chip_dir in chip_dirs {
        if !chip_dir.is_dir() {
            continue;
        }
        let chip = match fs::read_to_string(chip_dir.join("name")) {
            Ok(name) => name.trim().to_owned(),
            Err(err) => {
                warn!(chip = %chip_dir.display(), error = %err, "skipping hwmon chip without a name");
                continue;
            }
        };
        sensors.extend(scan_chip(&chip_dir, &chip));
    }
    Ok(sensors)
}

/// Collect the readable channels of one chip.
fn scan_chip(chip_dir: &Path, chip: &str) -> Vec<Box<dyn Sensor>> {
    let mut file_names: Vec<String> = match fs::read_dir(chip_dir) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(err) => {
            warn!(chip = %chip_dir.display(), error = %err, "failed listing hwmon chip");
            return Vec::new();
        }
    };
    file_names.sort_unstable();

    let input_stems: HashSet<&str> = file_names
        .iter()
        .filter_map(|name| name.strip_suffix("_input"))
        .collect();

    let mut exported: Vec<Box<dyn Sensor>> = Vec::new();
    let mut current: Option<HwmonChannel> = None;
    let mut voltage: Option<HwmonChannel> = None;

    for file_name in &file_names {
        let stem = if let Some(stem) = file_name.strip_suffix("_input") {
            stem
        } else if let Some(stem) = file_name.strip_suffix("_average") {
            // Some power meters only report an averaged reading. Prefer the
            // instantaneous channel when both exist.
            if input_stems.contains(stem) || Kind::from_stem(stem) != Some(Kind::Power) {
                continue;
            }
            stem
        } else {
            continue;
        };
        let kind = match Kind::from_stem(stem) {
            Some(kind) => kind,
            None => continue,
        };

        let label = fs::read_to_string(chip_dir.join(format!("{stem}_label")))
            .ok()
            .map(|raw| raw.trim().to_owned())
            .filter(|label| !label.is_empty());
        let display = label.unwrap_or_else(|| stem.to_owned());

        let mut channel = HwmonChannel {
            name: format!("{chip}#{display}"),
            path: chip_dir.join(file_name),
            kind,
            last_value: 0,
        };
        // Probe once so channels that need privileges we lack never make it
        // into a trace header.
        if let Err(err) = channel.read() {
            debug!(sensor = %channel.name, error = %err, "skipping unreadable hwmon channel");
            continue;
        }

        match kind {
            Kind::Energy | Kind::Power => exported.push(Box::new(channel)),
            Kind::Current => current = Some(channel),
            Kind::Voltage => voltage = Some(channel),
        }
    }

    if let (Some(current), Some(voltage)) = (current, voltage) {
        exported.push(Box::new(SynthesizedPower::new(current, voltage)));
    }
    exported
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_chip(root: &Path, dir: &str, name: &str, files: &[(&str, &str)]) -> PathBuf {
        let chip = root.join(dir);
        fs::create_dir_all(&chip).unwrap();
        fs::write(chip.join("name"), format!("{name}\n")).unwrap();
        for (file, contents) in files {
            fs::write(chip.join(file), format!("{contents}\n")).unwrap();
        }
        chip
    }

    #[test]
    fn power_channels_scale_from_microwatts() {
        let root = tempfile::tempdir().unwrap();
        write_chip(
            root.path(),
            "hwmon0",
            "fakechip",
            &[("power1_input", "15000000")],
        );

        let mut sensors = find_hwmon_in(root.path()).unwrap();
        assert_eq!(sensors.len(), 1);
        assert_eq!(sensors[0].name(), "fakechip#power1");
        assert_eq!(sensors[0].unit(), Unit::Watts);
        assert!((sensors[0].read().unwrap() - 15.0).abs() < 1e-9);
    }

    #[test]
    fn labels_override_channel_stems() {
        let root = tempfile::tempdir().unwrap();
        write_chip(
            root.path(),
            "hwmon0",
            "fakechip",
            &[("power1_input", "1000000"), ("power1_label", "CPU Power")],
        );

        let sensors = find_hwmon_in(root.path()).unwrap();
        assert_eq!(sensors[0].name(), "fakechip#CPU Power");
    }

    #[test]
    fn current_and_voltage_synthesize_power() {
        let root = tempfile::tempdir().unwrap();
        write_chip(
            root.path(),
            "hwmon0",
            "psu",
            &[("curr1_input", "2000"), ("in0_input", "12000")],
        );

        let mut sensors = find_hwmon_in(root.path()).unwrap();
        assert_eq!(sensors.len(), 1);
        assert_eq!(sensors[0].name(), "synthesized power (psu#curr1 x psu#in0)");
        assert_eq!(sensors[0].unit(), Unit::Watts);
        assert!((sensors[0].read().unwrap() - 24.0).abs() < 1e-9);
    }

    #[test]
    fn energy_channels_report_increments() {
        let root = tempfile::tempdir().unwrap();
        let chip = write_chip(
            root.path(),
            "hwmon0",
            "battery",
            &[("energy1_input", "5000000")],
        );

        let mut sensors = find_hwmon_in(root.path()).unwrap();
        let sensor = &mut sensors[0];
        assert_eq!(sensor.unit(), Unit::Joules);
        // The discovery probe already consumed the initial total.
        fs::write(chip.join("energy1_input"), "5500000\n").unwrap();
        assert!((sensor.read().unwrap() - 0.5).abs() < 1e-9);

        fs::write(chip.join("energy1_input"), "1000\n").unwrap();
        assert_eq!(sensor.read().unwrap(), 0.0);
    }

    #[test]
    fn unrelated_and_unreadable_channels_are_skipped() {
        let root = tempfile::tempdir().unwrap();
        write_chip(
            root.path(),
            "hwmon0",
            "board",
            &[
                ("temp1_input", "42000"),
                ("fan1_input", "1200"),
                ("intrusion0_alarm", "0"),
                ("power1_input", "not-a-number"),
                ("power2_input", "3000000"),
            ],
        );

        let sensors = find_hwmon_in(root.path()).unwrap();
        assert_eq!(sensors.len(), 1);
        assert_eq!(sensors[0].name(), "board#power2");
    }

    #[test]
    fn averaged_power_is_used_only_without_instantaneous() {
        let root = tempfile::tempdir().unwrap();
        write_chip(
            root.path(),
            "hwmon0",
            "meter",
            &[("power1_average", "2000000")],
        );
        write_chip(
            root.path(),
            "hwmon1",
            "cpu",
            &[("power1_average", "9000000"), ("power1_input", "8000000")],
        );

        let mut sensors = find_hwmon_in(root.path()).unwrap();
        assert_eq!(sensors.len(), 2);
        assert_eq!(sensors[0].name(), "meter#power1");
        assert!((sensors[0].read().unwrap() - 2.0).abs() < 1e-9);
        assert_eq!(sensors[1].name(), "cpu#power1");
        assert!((sensors[1].read().unwrap() - 8.0).abs() < 1e-9);
    }
}
