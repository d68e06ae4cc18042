//! ---
//! jm_section: "02-sensor-probes"
//! jm_subsection: "module"
//! jm_type: "source"
//! jm_scope: "code"
//! jm_description: "Energy and power sensor discovery and acquisition."
//! jm_version: "v1.2.0"
//! jm_owner: "tbd"
//! ---
//! Intel RAPL energy counters.
//!
//! The powercap subsystem exposes one `energy_uj` file per RAPL domain,
//! a cumulative microjoule counter that wraps at the value advertised by
//! the sibling `max_energy_range_uj`. Counters usually require root to
//! read.

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;

use crate::{Result, Sensor, SensorError, Unit, MICRO_TO_UNPREFIXED};

const RAPL_ROOT: &str = "/sys/devices/virtual/powercap/intel-rapl";

/// One RAPL domain counter, kept open between reads.
#[derive(Debug)]
pub struct RaplCounter {
    path: PathBuf,
    domain: String,
    file: File,
    last_value: i64,
    max_range: i64,
}

impl RaplCounter {
    fn open(path: &Path) -> Option<Self> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed opening RAPL counter");
                return None;
            }
        };
        let dir = path.parent()?;
        let domain = match fs::read_to_string(dir.join("name")) {
            Ok(name) => name.trim().to_owned(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed resolving RAPL domain name");
                String::new()
            }
        };
        // Without the advertised range, wrap correction silently degrades to
        // a zero increment on the wrapping read.
        let max_range = fs::read_to_string(dir.join("max_energy_range_uj"))
            .ok()
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .unwrap_or_else(|| {
                warn!(path = %path.display(), "failed resolving max energy range");
                0
            });
        Some(Self {
            path: path.to_path_buf(),
            domain,
            file,
            last_value: 0,
            max_range,
        })
    }
}

impl Sensor for RaplCounter {
    fn name(&self) -> &str {
        &self.domain
    }

    fn unit(&self) -> Unit {
        Unit::Joules
    }

    /// Joules consumed since the previous read. The first read after open
    /// returns the counter's full value; callers discard it by pre-reading.
    fn read(&mut self) -> Result<f64> {
        self.file
            .seek(SeekFrom::Start(0))
            .map_err(|source| SensorError::Io {
                path: self.path.clone(),
                source,
            })?;
        let mut raw = String::new();
        self.file
            .read_to_string(&mut raw)
            .map_err(|source| SensorError::Io {
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
        let mut increment = value - self.last_value;
        if value < self.last_value {
            // The counter wrapped back past zero.
            increment += self.max_range;
        }
        self.last_value = value;
        Ok(increment as f64 * MICRO_TO_UNPREFIXED)
    }
}

/// Discover RAPL counters under the conventional powercap root.
pub fn find_rapl() -> Result<Vec<RaplCounter>> {
    find_rapl_in(Path::new(RAPL_ROOT))
}

/// Discover RAPL counters under an explicit root.
///
/// Unopenable counters are skipped with a warning; only a failed directory
/// walk (including a missing root) aborts discovery.
pub fn find_rapl_in(root: &Path) -> Result<Vec<RaplCounter>> {
    let mut counters = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|source| SensorError::Walk {
            root: root.to_path_buf(),
            source,
        })?;
        if entry.file_name() != "energy_uj" {
            continue;
        }
        if let Some(counter) = RaplCounter::open(entry.path()) {
            counters.push(counter);
        }
    }
    Ok(counters)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_domain(dir: &Path, name: &str, energy_uj: i64, range_uj: i64) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join("name"), format!("{name}\n")).unwrap();
        fs::write(dir.join("energy_uj"), format!("{energy_uj}\n")).unwrap();
        fs::write(dir.join("max_energy_range_uj"), format!("{range_uj}\n")).unwrap();
    }

    #[test]
    fn discovery_finds_nested_domains() {
        let root = tempfile::tempdir().unwrap();
        let package = root.path().join("intel-rapl:0");
        write_domain(&package, "package-0", 1_000_000, 262_143_328_850);
        write_domain(&package.join("intel-rapl:0:0"), "core", 400_000, 262_143_328_850);

        let counters = find_rapl_in(root.path()).unwrap();
        assert_eq!(counters.len(), 2);
        let mut names: Vec<&str> = counters.iter().map(|c| c.name()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["core", "package-0"]);
    }

    #[test]
    fn read_returns_increment_since_last_read() {
        let root = tempfile::tempdir().unwrap();
        let domain = root.path().join("intel-rapl:0");
        write_domain(&domain, "package-0", 1_000_000, 262_143_328_850);

        let mut counters = find_rapl_in(root.path()).unwrap();
        let counter = &mut counters[0];
        assert!((counter.read().unwrap() - 1.0).abs() < 1e-9);

        fs::write(domain.join("energy_uj"), "3500000\n").unwrap();
        assert!((counter.read().unwrap() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn wrap_adds_the_advertised_range() {
        let root = tempfile::tempdir().unwrap();
        let domain = root.path().join("intel-rapl:0");
        write_domain(&domain, "package-0", 8_000_000, 10_000_000);

        let mut counters = find_rapl_in(root.path()).unwrap();
        let counter = &mut counters[0];
        counter.read().unwrap();

        fs::write(domain.join("energy_uj"), "2000000\n").unwrap();
        assert!((counter.read().unwrap() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn missing_root_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let missing = root.path().join("no-powercap-here");
        assert!(find_rapl_in(&missing).is_err());
    }
}
