//! Configuration types for amplitude-extract

use crate::error::{Error, Result};
use crate::types::{DateRange, TimeUnit};
use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};

/// US data-residency export endpoint
pub const US_EXPORT_URL: &str = "https://amplitude.com/api/2/export";
/// EU data-residency export endpoint
pub const EU_EXPORT_URL: &str = "https://analytics.eu.amplitude.com/api/2/export";

/// Data residency region of the Amplitude project
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Region {
    /// United States (default)
    #[default]
    Us,
    /// European Union
    Eu,
}

impl Region {
    /// Export endpoint for this region
    pub fn export_url(&self) -> &'static str {
        match self {
            Region::Us => US_EXPORT_URL,
            Region::Eu => EU_EXPORT_URL,
        }
    }
}

impl std::str::FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "US" => Ok(Region::Us),
            "EU" => Ok(Region::Eu),
            _ => Err(format!("invalid region: {s}. Valid options: US, EU")),
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Region::Us => write!(f, "US"),
            Region::Eu => write!(f, "EU"),
        }
    }
}

/// Retry behavior for export requests
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 1000)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// External tool paths (unzip, gunzip, wc)
///
/// The external tools are a fast path only; the in-process decoders are always
/// available as a fallback.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Try external tools before the in-process implementations (default: true)
    #[serde(default = "default_true")]
    pub use_external_tools: bool,

    /// Path to unzip executable (auto-detected if None)
    #[serde(default)]
    pub unzip_path: Option<PathBuf>,

    /// Path to gunzip executable (auto-detected if None)
    #[serde(default)]
    pub gunzip_path: Option<PathBuf>,

    /// Path to wc executable (auto-detected if None)
    #[serde(default)]
    pub wc_path: Option<PathBuf>,

    /// Whether to search PATH for external binaries if explicit paths not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            use_external_tools: true,
            unzip_path: None,
            gunzip_path: None,
            wc_path: None,
            search_path: true,
        }
    }
}

/// Main configuration for an extraction run
///
/// Dates are kept as the raw `YYYY-MM-DD` strings the user supplied; they are
/// parsed by [`Config::validate`] / [`Config::date_range`] before any network
/// activity happens.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Amplitude project API key
    #[serde(default)]
    pub api_key: String,

    /// Amplitude project secret key
    #[serde(default)]
    pub api_secret: String,

    /// Data residency region (default: US)
    #[serde(default)]
    pub region: Region,

    /// Window granularity (default: month)
    #[serde(default)]
    pub time_unit: TimeUnit,

    /// First day to export, `YYYY-MM-DD` (UTC, inclusive)
    #[serde(default)]
    pub start_date: String,

    /// Last day to export, `YYYY-MM-DD` (UTC, inclusive)
    #[serde(default)]
    pub end_date: String,

    /// Staging directory for downloaded archives (default: "./tmp")
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Destination for decompressed event files (default: "./amplitude-data")
    #[serde(default = "default_dest_dir")]
    pub dest_dir: PathBuf,

    /// Record per-chunk and per-entry detail in the run log
    #[serde(default)]
    pub verbose: bool,

    /// Remove staged archives, unpacked entries and staging folders (default: true)
    #[serde(default = "default_true")]
    pub cleanup: bool,

    /// Write the accumulated run log to this file when the run ends
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Override the region's export endpoint (proxies, stub servers)
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Longest wait for response headers or for the next body chunk (default: 5 minutes)
    ///
    /// The timer restarts with every chunk, so a slow but steady download of a
    /// large archive never times out while a stalled one does.
    #[serde(
        default = "default_read_timeout",
        alias = "request_timeout",
        with = "duration_serde"
    )]
    pub read_timeout: Duration,

    /// Timeout for establishing a connection (default: 30 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Retry behavior for export requests
    #[serde(default)]
    pub retry: RetryConfig,

    /// External tool configuration
    #[serde(default)]
    pub tools: ToolsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_secret: String::new(),
            region: Region::default(),
            time_unit: TimeUnit::default(),
            start_date: String::new(),
            end_date: String::new(),
            temp_dir: default_temp_dir(),
            dest_dir: default_dest_dir(),
            verbose: false,
            cleanup: true,
            log_file: None,
            endpoint: None,
            read_timeout: default_read_timeout(),
            connect_timeout: default_connect_timeout(),
            retry: RetryConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

impl Config {
    /// Load a configuration from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("failed to read config file '{}': {}", path.display(), e),
            ))
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Export endpoint to use: the override if set, otherwise the region's
    pub fn export_url(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or_else(|| self.region.export_url())
    }

    /// Parse the configured dates into a validated range
    pub fn date_range(&self) -> Result<DateRange> {
        DateRange::parse(&self.start_date, &self.end_date)
    }

    /// Check everything that can be checked before touching the network
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(Error::config("api_key", "API key is required"));
        }
        if self.api_secret.trim().is_empty() {
            return Err(Error::config("api_secret", "API secret is required"));
        }
        self.date_range()?;
        if let Some(endpoint) = &self.endpoint {
            url::Url::parse(endpoint).map_err(|e| {
                Error::config("endpoint", format!("invalid endpoint URL '{endpoint}': {e}"))
            })?;
        }
        if self.read_timeout.is_zero() {
            return Err(Error::config("read_timeout", "read timeout must be greater than zero"));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(Error::config(
                "retry.backoff_multiplier",
                "backoff multiplier must be at least 1.0",
            ));
        }
        Ok(())
    }
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("./tmp")
}

fn default_dest_dir() -> PathBuf {
    PathBuf::from("./amplitude-data")
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    1000
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_read_timeout() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
