//! ---
//! jm_section: "01-core-runtime"
//! jm_subsection: "binary"
//! jm_type: "source"
//! jm_scope: "code"
//! jm_description: "Binary entrypoint for the Joulemetry sampler daemon."
//! jm_version: "v1.2.0"
//! jm_owner: "tbd"
//! ---
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};
use joulemetry_common::config::AppConfig;
use joulemetry_common::logging::init_tracing;
use joulemetry_common::time::WallAnchor;
use joulemetry_common::timing::SamplerTimings;
use joulemetry_common::version::VersionInfo;
use joulemetry_sensors::discover;
use joulemetry_trace::{SensorColumn, TraceWriter};
use tokio::signal;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    about = "Joulemetry energy sampler",
    long_about = None
)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(
        long = "sample-interval-ms",
        value_name = "MS",
        help = "Override the sampling interval in milliseconds"
    )]
    sample_interval_ms: Option<u64>,

    #[arg(
        long,
        value_name = "FILE",
        default_value = "-",
        help = "Trace destination, '-' for stdout"
    )]
    output: PathBuf,

    #[arg(
        long,
        action = ArgAction::SetTrue,
        help = "Probe each discovered sensor once, print the results, and exit"
    )]
    list: bool,

    #[arg(
        long,
        action = ArgAction::SetTrue,
        help = "Enable the deterministic synthetic source regardless of configuration"
    )]
    synthetic: bool,

    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "Print extended version information and exit"
    )]
    version: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let version = VersionInfo::current();
    if cli.version {
        println!("{}", version.extended());
        return Ok(());
    }

    let loaded = AppConfig::resolve(cli.config.as_deref())?;
    let mut config = loaded.config;
    if let Some(millis) = cli.sample_interval_ms {
        config.sampling.interval = Duration::from_millis(millis);
    }
    if cli.synthetic {
        config.sources.synthetic.enabled = true;
    }
    config.validate()?;
    init_tracing("joulemetryd", &config.logging)?;
    match &loaded.source {
        Some(path) => info!(path = %path.display(), "configuration loaded"),
        None => info!("no configuration file found, using defaults"),
    }
    info!(version = %version.version, "starting joulemetryd");

    if cli.list {
        return list_sensors(&config);
    }
    run_sampler(config, cli.output).await
}

fn list_sensors(config: &AppConfig) -> Result<()> {
    let mut sensors = discover(&config.sources);
    if sensors.is_empty() {
        println!("No sensors discovered.");
        return Ok(());
    }
    println!("{:<44} {:>4} {:>16}", "SENSOR", "UNIT", "FIRST READING");
    for sensor in &mut sensors {
        let unit = sensor.unit().to_string();
        match sensor.read() {
            Ok(value) => println!("{:<44} {:>4} {:>16.6}", sensor.name(), unit, value),
            Err(error) => println!("{:<44} {:>4} error: {error}", sensor.name(), unit),
        }
    }
    Ok(())
}

async fn run_sampler(config: AppConfig, output: PathBuf) -> Result<()> {
    let mut sensors = discover(&config.sources);
    if sensors.is_empty() {
        bail!("no sensors discovered; enable at least one source in the configuration");
    }
    info!(count = sensors.len(), "sensors discovered");

    // Prime delta counters so the first row reports a real increment.
    for sensor in &mut sensors {
        sensor
            .read()
            .with_context(|| format!("priming sensor '{}'", sensor.name()))?;
    }

    let columns: Vec<SensorColumn> = sensors
        .iter()
        .map(|sensor| SensorColumn::new(sensor.name(), sensor.unit()))
        .collect();
    let out: Box<dyn Write> = if output.as_os_str() == "-" {
        Box::new(io::stdout().lock())
    } else {
        let file = File::create(&output)
            .with_context(|| format!("creating trace output {}", output.display()))?;
        Box::new(file)
    };
    let mut writer = TraceWriter::new(out, columns)?;

    let interval = config.sampling.interval;
    let timings = SamplerTimings::new(interval);
    let anchor = WallAnchor::now();
    let mut last_read_ns = anchor.now_ns();
    let drop_threshold_ns = interval.as_nanos() as i64 * 2;

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the loop below samples once
    // per full interval.
    ticker.tick().await;

    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut values = vec![0.0_f64; sensors.len()];

    info!(interval = ?interval, output = %output.display(), "sampling");
    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result?;
                info!("ctrl-c received; shutting down");
                break;
            }
            _ = ticker.tick() => {
                timings.record_tick();
                let read_started = Instant::now();
                for (sensor, value) in sensors.iter_mut().zip(values.iter_mut()) {
                    *value = sensor
                        .read()
                        .with_context(|| format!("reading sensor '{}'", sensor.name()))?;
                }
                timings.record_read(read_started.elapsed());

                let end_ns = anchor.now_ns();
                if end_ns - last_read_ns >= drop_threshold_ns {
                    // A stalled read leaves the row covering more than one
                    // interval; consumers would misattribute the energy.
                    timings.record_dropped_row();
                    warn!(row_ns = end_ns - last_read_ns, "sample stalled, dropping row");
                } else {
                    writer.write_row(last_read_ns, end_ns, &values)?;
                }
                last_read_ns = end_ns;
            }
        }
    }

    if let Some(summary) = timings.summary() {
        info!(
            target_interval_us = summary.target_interval_us,
            jitter_mean_ns = summary.jitter.mean_ns,
            jitter_max_ns = summary.jitter.max_ns,
            read_mean_ns = summary.read.mean_ns,
            read_max_ns = summary.read.max_ns,
            dropped_rows = summary.dropped_rows,
            "sampler timings"
        );
    }
    writer.flush()?;
    Ok(())
}
