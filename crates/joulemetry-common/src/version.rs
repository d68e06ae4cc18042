//! ---
//! jm_section: "01-core-runtime"
//! jm_subsection: "module"
//! jm_type: "source"
//! jm_scope: "code"
//! jm_description: "Release identity constants and version metadata helpers."
//! jm_version: "v1.2.0"
//! jm_owner: "tbd"
//! ---
//! Release identity for the Joulemetry toolkit.
//!
//! The identity is four compile-time integer constants rather than metadata
//! captured from the build environment: traces and benchmark stores written
//! by a binary must remain attributable to an exact release long after that
//! build environment is gone. The dotted rendering of the current constants
//! is `1.2.0.72`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Major version. Bumped when the trace or benchmark store format breaks.
pub const VER_MAJOR: u32 = 1;
/// Minor version. Bumped on backwards-compatible additions.
pub const VER_MINOR: u32 = 2;
/// Release number within a minor series.
pub const VER_RELEASE: u32 = 0;
/// Monotonic build counter across all releases.
pub const VER_BUILD: u32 = 72;

/// Four-part version identity rendered as `major.minor.release.build`.
///
/// Ordering is lexicographic over the fields in declaration order, so a
/// higher build of the same release sorts as newer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(into = "String", try_from = "String")]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub release: u32,
    pub build: u32,
}

impl Version {
    /// The identity compiled into this workspace.
    pub const CURRENT: Version = Version::new(VER_MAJOR, VER_MINOR, VER_RELEASE, VER_BUILD);

    #[must_use]
    pub const fn new(major: u32, minor: u32, release: u32, build: u32) -> Self {
        Self {
            major,
            minor,
            release,
            build,
        }
    }

    /// Whether artifacts written under `other` can be read by this version.
    ///
    /// Compatibility is defined by the major field alone; minor, release,
    /// and build never change persisted formats.
    #[must_use]
    pub const fn is_compatible_with(&self, other: &Version) -> bool {
        self.major == other.major
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.release, self.build
        )
    }
}

/// Failure to parse a dotted four-part version string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VersionParseError {
    #[error("expected four dot-separated fields, found {0}")]
    FieldCount(usize),
    #[error("version field '{0}' is not a non-negative integer")]
    InvalidField(String),
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split('.').collect();
        if fields.len() != 4 {
            return Err(VersionParseError::FieldCount(fields.len()));
        }
        let mut parsed = [0u32; 4];
        for (slot, field) in parsed.iter_mut().zip(&fields) {
            *slot = field
                .parse::<u32>()
                .map_err(|_| VersionParseError::InvalidField((*field).to_owned()))?;
        }
        Ok(Version::new(parsed[0], parsed[1], parsed[2], parsed[3]))
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}

impl TryFrom<String> for Version {
    type Error = VersionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Compile-time version metadata for CLI and logging surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct VersionInfo {
    /// Four-part release identity baked into the binary.
    pub version: Version,
    /// Cargo package version (`major.minor.release`).
    pub semver: String,
}

impl VersionInfo {
    /// Construct a new [`VersionInfo`] from the compiled constants.
    #[must_use]
    pub fn current() -> Self {
        Self {
            version: Version::CURRENT,
            semver: env!("CARGO_PKG_VERSION").to_owned(),
        }
    }

    /// Returns a concise CLI string combining semver and build number.
    #[must_use]
    pub fn cli_string(&self) -> String {
        format!("{} (build {})", self.semver, self.version.build)
    }

    /// Human readable banner used in logging surfaces.
    #[must_use]
    pub fn banner(&self) -> String {
        format!("Joulemetry v{}", self.version)
    }

    /// Extended string suitable for `--version` flags.
    #[must_use]
    pub fn extended(&self) -> String {
        format!(
            "{banner}\nPackage: {semver}\nStore compatibility: major {major}",
            banner = self.banner(),
            semver = self.semver,
            major = self.version.major
        )
    }
}

/// Helper for Clap commands to print the extended version string.
#[must_use]
pub fn clap_long_version() -> String {
    VersionInfo::current().extended()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_concatenate_to_dotted_string() {
        let dotted = format!("{VER_MAJOR}.{VER_MINOR}.{VER_RELEASE}.{VER_BUILD}");
        assert_eq!(dotted, "1.2.0.72");
        assert_eq!(Version::CURRENT.to_string(), "1.2.0.72");
    }

    #[test]
    fn constants_agree_with_package_version() {
        let package = format!("{VER_MAJOR}.{VER_MINOR}.{VER_RELEASE}");
        assert_eq!(package, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn parse_round_trips_current() {
        let parsed: Version = "1.2.0.72".parse().unwrap();
        assert_eq!(parsed, Version::CURRENT);
    }

    #[test]
    fn parse_rejects_wrong_field_count() {
        let err = "1.2.0".parse::<Version>().unwrap_err();
        assert_eq!(err, VersionParseError::FieldCount(3));
        let err = "1.2.0.72.9".parse::<Version>().unwrap_err();
        assert_eq!(err, VersionParseError::FieldCount(5));
    }

    #[test]
    fn parse_rejects_non_numeric_fields() {
        let err = "1.2.0.seventy-two".parse::<Version>().unwrap_err();
        assert_eq!(
            err,
            VersionParseError::InvalidField("seventy-two".to_owned())
        );
        assert!("1.2.-1.72".parse::<Version>().is_err());
    }

    #[test]
    fn ordering_is_lexicographic_including_build() {
        assert!(Version::new(1, 2, 0, 71) < Version::new(1, 2, 0, 72));
        assert!(Version::new(1, 2, 0, 72) < Version::new(1, 2, 1, 0));
        assert!(Version::new(1, 9, 9, 999) < Version::new(2, 0, 0, 0));
    }

    #[test]
    fn compatibility_follows_major_field() {
        let newer_minor = Version::new(1, 3, 0, 80);
        let next_major = Version::new(2, 0, 0, 90);
        assert!(Version::CURRENT.is_compatible_with(&newer_minor));
        assert!(!Version::CURRENT.is_compatible_with(&next_major));
    }

    #[test]
    fn serde_uses_dotted_string() {
        let json = serde_json::to_string(&Version::CURRENT).unwrap();
        assert_eq!(json, "\"1.2.0.72\"");
        let back: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Version::CURRENT);
        assert!(serde_json::from_str::<Version>("\"1.2.0\"").is_err());
    }

    #[test]
    fn extended_contains_banner_and_semver() {
        let info = VersionInfo::current();
        let extended = info.extended();
        assert!(extended.contains(&info.semver));
        assert!(extended.contains("1.2.0.72"));
    }
}
