//! ---
//! jm_section: "05-operator-tooling"
//! jm_subsection: "binary"
//! jm_type: "source"
//! jm_scope: "code"
//! jm_description: "Control CLI for operators interacting with Joulemetry."
//! jm_version: "v1.2.0"
//! jm_owner: "tbd"
//! ---
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Subcommand};
use joulemetry_bench::{
    run_benchmark, BenchmarkPlan, BenchmarkRecord, BenchmarkResults, BenchmarkStore, SectionStats,
};
use joulemetry_common::config::AppConfig;
use joulemetry_trace::{session_file_for, stream_path, Dataset};
use serde::Serialize;
use tokio::runtime::Runtime;
use tracing::warn;

#[derive(Debug, Subcommand)]
pub enum BenchCommand {
    /// Run a workload under the sampler and record the benchmark.
    Run(RunOptions),
    /// Recompute and print results for every stored benchmark.
    Report(ReportOptions),
}

#[derive(Debug, Args)]
pub struct RunOptions {
    /// Workload command line, run through the shell.
    #[arg(long, value_name = "CMD")]
    command: String,

    /// Seconds of idle baseline recorded before and after the workload.
    #[arg(long = "baseline-secs", value_name = "SECS", default_value_t = 5)]
    baseline_secs: u64,

    /// Free-form note stored with the record.
    #[arg(long, default_value = "")]
    notes: String,

    /// Configuration file naming the session directory.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ReportOptions {
    /// Benchmark store to report on (joulemetry-<session>-benchmarks.json).
    #[arg(value_name = "STORE")]
    store: PathBuf,

    /// Emit results as JSON instead of tables.
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

pub fn run(command: BenchCommand) -> Result<()> {
    match command {
        BenchCommand::Run(options) => run_one(options),
        BenchCommand::Report(options) => report(options),
    }
}

fn run_one(options: RunOptions) -> Result<()> {
    let config = AppConfig::resolve(options.config.as_deref())?.config;
    let plan = BenchmarkPlan {
        command: options.command,
        notes: options.notes,
        baseline: Duration::from_secs(options.baseline_secs),
        session_directory: config.session.directory.clone(),
    };
    let runtime = Runtime::new()?;
    let summary = runtime.block_on(run_benchmark(plan))?;
    render(&summary.record, &summary.results);
    if let Some(error) = &summary.record.error {
        println!("\nWorkload reported an error: {error}");
    }
    Ok(())
}

fn report(options: ReportOptions) -> Result<()> {
    let store = BenchmarkStore::open(&options.store)?;
    if store.is_empty() {
        println!("No benchmarks recorded in {}", options.store.display());
        return Ok(());
    }
    let directory = options.store.parent().unwrap_or_else(|| Path::new("."));
    let mut entries = Vec::new();
    for record in store.records() {
        let trace = session_file_for(directory, &record.session_id);
        let dataset = Dataset::new();
        stream_path(&trace, false, |event| {
            if let Err(error) = dataset.apply(&event) {
                warn!(%error, "ignoring trace event");
            }
        })
        .with_context(|| format!("replaying session trace {}", trace.display()))?;

        match BenchmarkResults::compute(&dataset, record) {
            Some(results) => entries.push((record.clone(), results)),
            None => println!(
                "Benchmark {}: session trace does not cover every section",
                record.benchmark_id
            ),
        }
    }

    if options.json {
        let report: Vec<ReportEntry> = entries
            .iter()
            .map(|(record, results)| ReportEntry { record, results })
            .collect();
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    for (record, results) in &entries {
        render(record, results);
        println!();
    }
    Ok(())
}

#[derive(Serialize)]
struct ReportEntry<'a> {
    record: &'a BenchmarkRecord,
    results: &'a BenchmarkResults,
}

fn render(record: &BenchmarkRecord, results: &BenchmarkResults) {
    println!(
        "Benchmark {} [{}] run {:.1}s",
        record.benchmark_id,
        record.command,
        results.run_duration.as_secs_f64()
    );
    if !record.notes.is_empty() {
        println!("Notes: {}", record.notes);
    }
    for series in &results.series {
        println!("\n  {} (baseline {:.3} W)", series.series, series.baseline_watts);
        println!(
            "    {:<10} {:>12} {:>10} {:>10} {:>10}",
            "section", "joules", "min W", "mean W", "max W"
        );
        render_section("pre", &series.pre);
        render_section("run", &series.run);
        render_section("post", &series.post);
        render_section("adjusted", &series.adjusted);
    }
}

fn render_section(label: &str, stats: &SectionStats) {
    println!(
        "    {:<10} {:>12.3} {:>10.3} {:>10.3} {:>10.3}",
        label, stats.joules, stats.min_watts, stats.mean_watts, stats.max_watts
    );
}
