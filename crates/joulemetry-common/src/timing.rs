//! ---
//! jm_section: "01-core-runtime"
//! jm_subsection: "module"
//! jm_type: "source"
//! jm_scope: "code"
//! jm_description: "Shared runtime primitives for the Joulemetry workspace."
//! jm_version: "v1.2.0"
//! jm_owner: "tbd"
//! ---
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

/// Timing diagnostics for the sampling loop.
///
/// Records how far each tick lands from the target interval and how long the
/// sensor sweep takes, so the daemon can report scheduling health at
/// shutdown.
#[derive(Debug)]
pub struct SamplerTimings {
    target_interval: Duration,
    last_tick: Mutex<Option<Instant>>,
    jitter_ns: Mutex<Vec<f64>>,
    read_ns: Mutex<Vec<f64>>,
    dropped_rows: AtomicU64,
}

impl SamplerTimings {
    pub fn new(target_interval: Duration) -> Self {
        Self {
            target_interval,
            last_tick: Mutex::new(None),
            jitter_ns: Mutex::new(Vec::new()),
            read_ns: Mutex::new(Vec::new()),
            dropped_rows: AtomicU64::new(0),
        }
    }

    /// Record one loop tick; jitter is measured against the previous tick.
    pub fn record_tick(&self) {
        let mut last_tick = self.last_tick.lock();
        let now = Instant::now();
        if let Some(previous) = *last_tick {
            let actual = now.duration_since(previous);
            let jitter = if actual > self.target_interval {
                actual - self.target_interval
            } else {
                self.target_interval - actual
            };
            self.jitter_ns
                .lock()
                .push(jitter.as_secs_f64() * 1_000_000_000.0);
        }
        *last_tick = Some(now);
    }

    /// Record the duration of one full sensor sweep.
    pub fn record_read(&self, duration: Duration) {
        self.read_ns
            .lock()
            .push(duration.as_secs_f64() * 1_000_000_000.0);
    }

    /// Record a row discarded because the sweep overran the interval.
    pub fn record_dropped_row(&self) {
        self.dropped_rows.fetch_add(1, Ordering::Relaxed);
    }

    /// Summarise recorded ticks; `None` until at least two ticks happened.
    pub fn summary(&self) -> Option<TimingSummary> {
        let jitter = summarize(&self.jitter_ns.lock())?;
        let read = summarize(&self.read_ns.lock()).unwrap_or_default();
        Some(TimingSummary {
            target_interval_us: crate::time::duration_to_micros(self.target_interval),
            jitter,
            read,
            dropped_rows: self.dropped_rows.load(Ordering::Relaxed),
        })
    }
}

/// Shutdown report for the sampling loop.
#[derive(Debug, Serialize)]
pub struct TimingSummary {
    pub target_interval_us: u64,
    pub jitter: StatSummary,
    pub read: StatSummary,
    pub dropped_rows: u64,
}

#[derive(Debug, Default, Serialize)]
pub struct StatSummary {
    pub mean_ns: f64,
    pub std_dev_ns: f64,
    pub max_ns: f64,
    pub min_ns: f64,
    pub samples: u64,
}

fn summarize(slice: &[f64]) -> Option<StatSummary> {
    if slice.is_empty() {
        return None;
    }
    let count = slice.len() as f64;
    let mean = slice.iter().sum::<f64>() / count;
    let variance = if slice.len() > 1 {
        let sum_sq = slice
            .iter()
            .map(|value| {
                let delta = value - mean;
                delta * delta
            })
            .sum::<f64>();
        sum_sq / (count - 1.0)
    } else {
        0.0
    };
    let std_dev = variance.sqrt();
    let max = slice.iter().copied().fold(f64::MIN, f64::max);
    let min = slice.iter().copied().fold(f64::MAX, f64::min);
    Some(StatSummary {
        mean_ns: mean,
        std_dev_ns: std_dev,
        max_ns: max,
        min_ns: min,
        samples: slice.len() as u64,
    })
}
