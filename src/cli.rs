//! Command-line interface
//!
//! Every flag is optional at the parser level so that a `--config` file can
//! supply values; explicit flags always win over the file. Missing credentials
//! or dates are reported by [`Config::validate`].

use crate::config::{Config, Region};
use crate::error::Result;
use crate::types::TimeUnit;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Export raw events from Amplitude into newline-delimited JSON files
#[derive(Debug, Parser)]
#[command(name = "amplitude-extract", version, about)]
pub struct Cli {
    /// Amplitude project API key
    #[arg(long, alias = "api_key", env = "AMP_API_KEY", hide_env_values = true)]
    pub key: Option<String>,

    /// Amplitude project secret key
    #[arg(long, alias = "api_secret", env = "AMP_API_SECRET", hide_env_values = true)]
    pub secret: Option<String>,

    /// First day to export (YYYY-MM-DD, UTC)
    #[arg(long, alias = "start_date")]
    pub start: Option<String>,

    /// Last day to export (YYYY-MM-DD, UTC, inclusive)
    #[arg(long, alias = "end_date")]
    pub end: Option<String>,

    /// Data residency region: US or EU [default: US]
    #[arg(long)]
    pub region: Option<Region>,

    /// Window size for each export request: hour, day or month [default: month]
    #[arg(long, alias = "time_unit")]
    pub unit: Option<TimeUnit>,

    /// Staging directory for downloaded archives [default: ./tmp]
    #[arg(long, aliases = ["tempDir", "temp_dir"])]
    pub temp_dir: Option<PathBuf>,

    /// Destination directory for event files [default: ./amplitude-data]
    #[arg(long, aliases = ["destDir", "dest_dir"])]
    pub dest_dir: Option<PathBuf>,

    /// Write the run log to this file when the run ends
    #[arg(long, aliases = ["logFile", "log_file"])]
    pub log_file: Option<PathBuf>,

    /// Seconds to wait for response headers or the next body chunk [default: 300]
    #[arg(long, value_name = "SECS")]
    pub read_timeout: Option<u64>,

    /// Record per-archive and per-file detail
    #[arg(long, short)]
    pub verbose: bool,

    /// Keep staged archives and unpacked entries
    #[arg(long)]
    pub no_cleanup: bool,

    /// JSON configuration file; flags override its values
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Merge the parsed flags over the config file (or defaults)
    pub fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_json_file(path)?,
            None => Config::default(),
        };

        if let Some(key) = self.key {
            config.api_key = key;
        }
        if let Some(secret) = self.secret {
            config.api_secret = secret;
        }
        if let Some(start) = self.start {
            config.start_date = start;
        }
        if let Some(end) = self.end {
            config.end_date = end;
        }
        if let Some(region) = self.region {
            config.region = region;
        }
        if let Some(unit) = self.unit {
            config.time_unit = unit;
        }
        if let Some(temp_dir) = self.temp_dir {
            config.temp_dir = temp_dir;
        }
        if let Some(dest_dir) = self.dest_dir {
            config.dest_dir = dest_dir;
        }
        if self.log_file.is_some() {
            config.log_file = self.log_file;
        }
        if let Some(secs) = self.read_timeout {
            config.read_timeout = Duration::from_secs(secs);
        }
        if self.verbose {
            config.verbose = true;
        }
        if self.no_cleanup {
            config.cleanup = false;
        }

        Ok(config)
    }
}
