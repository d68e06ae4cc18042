//! ---
//! jm_section: "04-benchmark-harness"
//! jm_subsection: "module"
//! jm_type: "source"
//! jm_scope: "code"
//! jm_description: "Benchmark orchestration, baseline correction, and the versioned store."
//! jm_version: "v1.2.0"
//! jm_owner: "tbd"
//! ---
use std::time::Duration;

use joulemetry_trace::{Dataset, RateWindow};
use serde::Serialize;

use crate::store::BenchmarkRecord;

/// Rate statistics for one series over one benchmark section.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SectionStats {
    pub joules: f64,
    pub min_watts: f64,
    pub max_watts: f64,
    pub mean_watts: f64,
}

impl From<RateWindow> for SectionStats {
    fn from(window: RateWindow) -> Self {
        Self {
            joules: window.sum_joules,
            min_watts: window.min_watts,
            max_watts: window.max_watts,
            mean_watts: window.mean_watts,
        }
    }
}

/// Benchmark summary for one series.
#[derive(Debug, Clone, Serialize)]
pub struct SeriesResults {
    pub series: String,
    pub pre: SectionStats,
    pub run: SectionStats,
    pub post: SectionStats,
    /// Mean of the two baseline means, in watts.
    pub baseline_watts: f64,
    /// The run section with the baseline subtracted.
    pub adjusted: SectionStats,
}

/// Benchmark summary across every series in the dataset.
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkResults {
    pub series: Vec<SeriesResults>,
    pub run_duration: Duration,
}

impl BenchmarkResults {
    /// Summarize `record`'s sections over every series in `dataset`.
    ///
    /// Returns `None` when any section of any series has no samples;
    /// partial results would silently misstate the workload's cost.
    pub fn compute(dataset: &Dataset, record: &BenchmarkRecord) -> Option<Self> {
        let run_duration = record.run_duration();
        let run_secs = run_duration.as_secs_f64();

        let mut series_results = Vec::new();
        for series in dataset.snapshot() {
            let pre: SectionStats = series
                .rates_between(record.pre_baseline_start_ns, record.pre_baseline_end_ns)?
                .into();
            let run: SectionStats = series
                .rates_between(record.pre_baseline_end_ns, record.post_baseline_start_ns)?
                .into();
            let post: SectionStats = series
                .rates_between(record.post_baseline_start_ns, record.post_baseline_end_ns)?
                .into();

            let baseline_watts = (pre.mean_watts + post.mean_watts) * 0.5;
            let adjusted = SectionStats {
                joules: run.joules - baseline_watts * run_secs,
                min_watts: run.min_watts - baseline_watts,
                max_watts: run.max_watts - baseline_watts,
                mean_watts: run.mean_watts - baseline_watts,
            };
            series_results.push(SeriesResults {
                series: series.name().to_owned(),
                pre,
                run,
                post,
                baseline_watts,
                adjusted,
            });
        }
        Some(Self {
            series: series_results,
            run_duration,
        })
    }
}
