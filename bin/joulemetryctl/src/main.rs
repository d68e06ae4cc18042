//! ---
//! jm_section: "05-operator-tooling"
//! jm_subsection: "binary"
//! jm_type: "source"
//! jm_scope: "code"
//! jm_description: "Control CLI for operators interacting with Joulemetry."
//! jm_version: "v1.2.0"
//! jm_owner: "tbd"
//! ---
use anyhow::Result;
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use joulemetry_common::config::LoggingConfig;
use joulemetry_common::logging::init_tracing;
use joulemetry_common::version::VersionInfo;

mod analyze;
mod bench;
mod config;
mod sensors;

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    about = "Joulemetry operator utility",
    long_about = None
)]
struct Cli {
    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "Print extended version information and exit"
    )]
    version: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Probe discovered sensors and print one reading each")]
    Sensors(sensors::SensorsCommand),
    #[command(about = "Summarize a recorded trace per series")]
    Analyze(analyze::AnalyzeCommand),
    #[command(subcommand, about = "Run workloads under the sampler and report results")]
    Bench(bench::BenchCommand),
    #[command(subcommand, about = "Inspect and validate configuration files")]
    Config(config::ConfigCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.version {
        println!("{}", VersionInfo::current().extended());
        return Ok(());
    }
    init_tracing("joulemetryctl", &LoggingConfig::default())?;
    match cli.command {
        Some(Commands::Sensors(cmd)) => sensors::run(cmd)?,
        Some(Commands::Analyze(cmd)) => analyze::run(cmd)?,
        Some(Commands::Bench(cmd)) => bench::run(cmd)?,
        Some(Commands::Config(cmd)) => config::run(cmd)?,
        None => {
            Cli::command().print_help()?;
        }
    }
    Ok(())
}
