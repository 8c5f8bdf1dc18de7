use clap::Parser;
use std::path::PathBuf;

/// Flood - a profile-driven HTTP/HTTPS load generator
#[derive(Parser, Debug)]
#[clap(version, about, long_about = None)]
pub struct Args {
    /// XML configuration file; read from standard input when absent
    #[clap(value_name = "CONFIG")]
    pub config: Option<PathBuf>,

    /// Farm to run
    #[clap(short = 'f', long, default_value = crate::defaults::FARM_NAME)]
    pub farm: String,

    /// Increase diagnostic output (-v info, -vv debug, -vvv trace)
    #[clap(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Also write diagnostics, without colors, to this file
    #[clap(long)]
    pub log_file: Option<PathBuf>,
}

impl Args {
    /// Default filter directive for the chosen verbosity.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
