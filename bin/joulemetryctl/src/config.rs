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
use clap::{Args, Subcommand};
use joulemetry_common::config::AppConfig;

/// Dispatch entry point for configuration subcommands.
pub fn run(command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Validate(cmd) => cmd.execute(),
    }
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Resolve, validate, and print the effective configuration.
    #[command(name = "validate")]
    Validate(ValidateCommand),
}

#[derive(Debug, Args)]
pub struct ValidateCommand {
    /// Configuration file to check instead of the resolved one.
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,
}

impl ValidateCommand {
    pub fn execute(self) -> Result<()> {
        let loaded = AppConfig::resolve(self.file.as_deref())?;
        match &loaded.source {
            Some(path) => println!("Configuration OK: {}", path.display()),
            None => println!("Configuration OK: built-in defaults"),
        }
        let rendered = toml::to_string_pretty(&loaded.config)
            .context("rendering effective configuration")?;
        println!("\n{rendered}");
        Ok(())
    }
}
