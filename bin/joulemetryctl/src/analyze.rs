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

use anyhow::{Context, Result};
use clap::{ArgAction, Args};
use joulemetry_trace::{stream_path, Dataset};
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Args)]
pub struct AnalyzeCommand {
    /// Trace file to summarize.
    #[arg(value_name = "TRACE")]
    trace: PathBuf,

    /// Emit the summary as JSON instead of a table.
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct SeriesSummary {
    series: String,
    samples: usize,
    duration_secs: f64,
    min_watts: f64,
    mean_watts: f64,
    max_watts: f64,
    total_joules: f64,
}

/// Replay a recorded trace and print per-series statistics.
pub fn run(command: AnalyzeCommand) -> Result<()> {
    let dataset = Dataset::new();
    stream_path(&command.trace, false, |event| {
        if let Err(error) = dataset.apply(&event) {
            warn!(%error, "ignoring trace event");
        }
    })
    .with_context(|| format!("reading trace {}", command.trace.display()))?;

    let mut summaries = Vec::new();
    for series in dataset.snapshot() {
        let (domain_start, domain_end) = match series.domain() {
            Some(domain) => domain,
            None => continue,
        };
        let (min_watts, max_watts) = series.rate_range();
        let mean_watts = series
            .rates_between(domain_start, domain_end)
            .map(|window| window.mean_watts)
            .unwrap_or_default();
        summaries.push(SeriesSummary {
            series: series.name().to_owned(),
            samples: series.len(),
            duration_secs: (domain_end - domain_start) as f64 / 1_000_000_000.0,
            min_watts,
            mean_watts,
            max_watts,
            total_joules: series.sum_joules(),
        });
    }

    if command.json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }
    if summaries.is_empty() {
        println!("Trace contains no samples.");
        return Ok(());
    }
    println!(
        "{:<40} {:>8} {:>10} {:>9} {:>9} {:>9} {:>12}",
        "SERIES", "SAMPLES", "DURATION", "MIN W", "MEAN W", "MAX W", "TOTAL J"
    );
    for summary in &summaries {
        println!(
            "{:<40} {:>8} {:>9.1}s {:>9.3} {:>9.3} {:>9.3} {:>12.3}",
            summary.series,
            summary.samples,
            summary.duration_secs,
            summary.min_watts,
            summary.mean_watts,
            summary.max_watts,
            summary.total_joules
        );
    }
    Ok(())
}
