//! # Flood - Main Entry Point
//!
//! Loads the XML configuration (from a file or standard input), prepares the
//! runtime context and runs the selected farm. Any configuration or profile
//! error ends the process with exit code -1.

use anyhow::{Context, Result};
use clap::Parser;
use flood::{cli::Args, logging, run_farm, ConfigTree, OutputSink, RuntimeContext};
use std::io::Read;
use std::process;
use tracing::{error, info};

fn load_config(args: &Args) -> Result<ConfigTree> {
    match &args.config {
        Some(path) => ConfigTree::from_path(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => {
            let mut xml = String::new();
            std::io::stdin()
                .read_to_string(&mut xml)
                .context("Failed to read configuration from standard input")?;
            ConfigTree::parse(&xml).context("Failed to parse configuration from standard input")
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let config = load_config(args)?;
    config.check_version();

    let ctx = RuntimeContext::new(OutputSink::stdout())
        .context("Failed to initialize the TLS engine")?
        .with_seed(config.seed()?)
        .with_exit_on_fatal(true);

    let summary = run_farm(&ctx, &config, &args.farm)
        .with_context(|| format!("Farm '{}' failed", args.farm))?;

    let total = summary.total();
    info!(
        "Farm '{}' completed: {} requests, {} OK, {} failed",
        args.farm, total.cycles, total.valid, total.invalid
    );
    Ok(())
}

fn main() {
    let args = Args::parse();

    let guard = match logging::init(args.log_level(), args.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to open log file: {}", e);
            process::exit(-1);
        }
    };

    let result = run(&args);
    if let Err(e) = &result {
        error!("{:#}", e);
    }
    // flush the file appender before exiting
    drop(guard);
    if result.is_err() {
        process::exit(-1);
    }
}
