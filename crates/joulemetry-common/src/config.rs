//! ---
//! jm_section: "01-core-runtime"
//! jm_subsection: "module"
//! jm_type: "source"
//! jm_scope: "code"
//! jm_description: "Shared runtime primitives for the Joulemetry workspace."
//! jm_version: "v1.2.0"
//! jm_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use tracing::debug;

use crate::logging::LogFormat;

fn default_sample_interval() -> Duration {
    Duration::from_millis(100)
}

fn default_rapl_enabled() -> bool {
    true
}

fn default_hwmon_enabled() -> bool {
    true
}

fn default_synthetic_count() -> usize {
    2
}

fn default_synthetic_seed() -> u64 {
    0xA11CEu64
}

fn default_synthetic_base_watts() -> f64 {
    12.5
}

fn default_synthetic_amplitude_watts() -> f64 {
    4.0
}

fn default_session_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

/// Primary configuration object for the Joulemetry tools.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    /// `None` when no file was found and built-in defaults apply.
    pub source: Option<PathBuf>,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "JOULEMETRY_CONFIG";

    /// Conventional locations probed when no explicit path is given.
    pub const DEFAULT_CANDIDATES: [&str; 2] =
        ["configs/joulemetry.toml", "/etc/joulemetry/joulemetry.toml"];

    /// Load configuration from disk, respecting the `JOULEMETRY_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Resolve configuration for a CLI invocation.
    ///
    /// An explicit path (`--config`) is authoritative and must exist. Without
    /// one, resolution falls through to [`Self::load_with_source`] over the
    /// conventional candidates.
    pub fn resolve(explicit: Option<&Path>) -> Result<LoadedAppConfig> {
        match explicit {
            Some(path) => {
                let config = Self::from_path(path.to_path_buf())?;
                Ok(LoadedAppConfig {
                    config,
                    source: Some(path.to_path_buf()),
                })
            }
            None => Self::load_with_source(&Self::DEFAULT_CANDIDATES),
        }
    }

    /// Load configuration together with the effective source path.
    ///
    /// Resolution order: the `JOULEMETRY_CONFIG` environment variable, then
    /// the first existing candidate. The sampler has to work on a bare host,
    /// so when nothing is found the built-in defaults apply instead of
    /// failing.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        debug!("no configuration file found; using built-in defaults");
        let config = AppConfig::default();
        config.validate()?;
        Ok(LoadedAppConfig {
            config,
            source: None,
        })
    }

    fn from_path(path: PathBuf) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        if self.sampling.interval.is_zero() {
            return Err(anyhow!("sampling interval must be greater than zero"));
        }
        self.sources.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Sampling loop parameters for the daemon.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Interval between samples, in milliseconds on the wire.
    #[serde(default = "default_sample_interval")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub interval: Duration,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval: default_sample_interval(),
        }
    }
}

/// Which sensor sources the daemon assembles at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_rapl_enabled")]
    pub rapl: bool,
    #[serde(default = "default_hwmon_enabled")]
    pub hwmon: bool,
    #[serde(default)]
    pub synthetic: SyntheticConfig,
}

impl SourcesConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.rapl && !self.hwmon && !self.synthetic.enabled {
            return Err(anyhow!("at least one sensor source must be enabled"));
        }
        self.synthetic.validate()?;
        Ok(())
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            rapl: default_rapl_enabled(),
            hwmon: default_hwmon_enabled(),
            synthetic: SyntheticConfig::default(),
        }
    }
}

/// Deterministic waveform source for hosts without readable counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_synthetic_count")]
    pub count: usize,
    #[serde(default = "default_synthetic_seed")]
    pub seed: u64,
    #[serde(default = "default_synthetic_base_watts")]
    pub base_watts: f64,
    #[serde(default = "default_synthetic_amplitude_watts")]
    pub amplitude_watts: f64,
}

impl SyntheticConfig {
    pub fn validate(&self) -> Result<()> {
        if self.enabled && self.count == 0 {
            return Err(anyhow!(
                "synthetic sources are enabled but count is zero"
            ));
        }
        if self.amplitude_watts < 0.0 {
            return Err(anyhow!("synthetic amplitude must not be negative"));
        }
        Ok(())
    }
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            count: default_synthetic_count(),
            seed: default_synthetic_seed(),
            base_watts: default_synthetic_base_watts(),
            amplitude_watts: default_synthetic_amplitude_watts(),
        }
    }
}

/// Where session traces and benchmark stores are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_directory")]
    pub directory: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            directory: default_session_directory(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
    /// When set, a daily-rolling JSON log file is written under `directory`.
    #[serde(default)]
    pub file_enabled: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
            file_enabled: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_empty_document() {
        let config: AppConfig = "".parse().unwrap();
        assert_eq!(config.sampling.interval, Duration::from_millis(100));
        assert!(config.sources.rapl);
        assert!(config.sources.hwmon);
        assert!(!config.sources.synthetic.enabled);
        assert_eq!(config.session.directory, PathBuf::from("."));
    }

    #[test]
    fn interval_is_parsed_from_milliseconds() {
        let config: AppConfig = "[sampling]\ninterval = 250\n".parse().unwrap();
        assert_eq!(config.sampling.interval, Duration::from_millis(250));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = "[sampling]\ninterval = 0\n".parse::<AppConfig>().unwrap_err();
        assert!(err.to_string().contains("sampling interval"));
    }

    #[test]
    fn all_sources_disabled_is_rejected() {
        let doc = "[sources]\nrapl = false\nhwmon = false\n";
        let err = doc.parse::<AppConfig>().unwrap_err();
        assert!(err.to_string().contains("at least one sensor source"));
    }

    #[test]
    fn synthetic_zero_count_is_rejected() {
        let doc = "[sources.synthetic]\nenabled = true\ncount = 0\n";
        let err = doc.parse::<AppConfig>().unwrap_err();
        assert!(err.to_string().contains("count is zero"));
    }

    #[test]
    fn synthetic_section_round_trips() {
        let doc = "[sources]\nrapl = false\nhwmon = false\n\n\
                   [sources.synthetic]\nenabled = true\ncount = 3\nseed = 7\n";
        let config: AppConfig = doc.parse().unwrap();
        assert!(config.sources.synthetic.enabled);
        assert_eq!(config.sources.synthetic.count, 3);
        assert_eq!(config.sources.synthetic.seed, 7);
        assert_eq!(config.sources.synthetic.base_watts, 12.5);
    }

    #[test]
    fn resolve_requires_an_explicit_path_to_exist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("joulemetry.toml");
        std::fs::write(&path, "[sampling]\ninterval = 75\n").unwrap();

        let loaded = AppConfig::resolve(Some(&path)).unwrap();
        assert_eq!(loaded.source, Some(path));
        assert_eq!(loaded.config.sampling.interval, Duration::from_millis(75));

        let missing = dir.path().join("absent.toml");
        let err = AppConfig::resolve(Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("unable to read config file"));
    }

    #[test]
    fn load_prefers_the_first_existing_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("joulemetry.toml");
        std::fs::write(&path, "[sampling]\ninterval = 50\n").unwrap();
        let missing = dir.path().join("absent.toml");

        let loaded = AppConfig::load_with_source(&[missing.clone(), path.clone()]).unwrap();
        assert_eq!(loaded.source, Some(path));
        assert_eq!(loaded.config.sampling.interval, Duration::from_millis(50));

        let loaded = AppConfig::load_with_source(&[missing]).unwrap();
        assert_eq!(loaded.source, None);
        assert_eq!(
            loaded.config.sampling.interval,
            Duration::from_millis(100)
        );
    }
}
