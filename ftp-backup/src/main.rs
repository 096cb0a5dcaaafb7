//! FTP Backup - Main entry point
//!
//! Meant to be invoked once per backup interval by an external scheduler.

use anyhow::Context;
use clap::Parser;
use ftp_backup::{archive::RunId, config::Config, executor, utils};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Validate configuration and probe the remote store, then exit
    #[arg(long)]
    check: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    if let Err(e) = utils::logger::init(log_level) {
        eprintln!("Failed to initialize logging: {e:#}");
        return ExitCode::FAILURE;
    }

    match run(&args, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args, config: &Config) -> anyhow::Result<()> {
    tracing::info!("Starting ftp-backup v{}", env!("CARGO_PKG_VERSION"));

    let backup = executor::from_config(config)?;

    if args.check {
        backup.check().context("Pre-flight check failed")?;
        tracing::info!("Configuration valid and remote store reachable");
        return Ok(());
    }

    let run_id = RunId::now();
    let report = backup.execute(&run_id)?;
    report.log();
    Ok(())
}
