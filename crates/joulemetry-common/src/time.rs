//! ---
//! jm_section: "01-core-runtime"
//! jm_subsection: "module"
//! jm_type: "source"
//! jm_scope: "code"
//! jm_description: "Shared runtime primitives for the Joulemetry workspace."
//! jm_version: "v1.2.0"
//! jm_owner: "tbd"
//! ---
use std::time::{Duration, Instant};

use chrono::Utc;

/// Wall-clock nanoseconds since the UNIX epoch.
pub fn unix_nanos_now() -> i64 {
    Utc::now()
        .timestamp_nanos_opt()
        .expect("current time within chrono nanosecond range")
}

/// Convert a duration into microseconds, saturating at `u64::MAX`.
pub fn duration_to_micros(duration: Duration) -> u64 {
    duration.as_secs().saturating_mul(1_000_000) + u64::from(duration.subsec_micros())
}

/// Converts monotonic instants into wall-clock nanoseconds.
///
/// All timestamps derived from one anchor share a single wall reading plus
/// monotonic offsets, so a clock step mid-run cannot reorder them.
#[derive(Debug, Clone, Copy)]
pub struct WallAnchor {
    wall_ns: i64,
    origin: Instant,
}

impl WallAnchor {
    pub fn now() -> Self {
        Self {
            wall_ns: unix_nanos_now(),
            origin: Instant::now(),
        }
    }

    /// Wall nanoseconds for an instant at or after the anchor origin.
    pub fn wall_ns_at(&self, at: Instant) -> i64 {
        let offset = at.saturating_duration_since(self.origin);
        self.wall_ns.saturating_add(offset.as_nanos() as i64)
    }

    /// Wall nanoseconds for the current instant.
    pub fn now_ns(&self) -> i64 {
        self.wall_ns_at(Instant::now())
    }
}
