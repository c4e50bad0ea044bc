//! Test configuration helpers for stub and live runs

use super::fixtures::EXPORT_PATH;
use amplitude_extract::{Config, RetryConfig, TimeUnit, ToolsConfig};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::MockServer;

/// Staging and destination directories under one temp root
///
/// Keep the value alive for the duration of the test.
pub struct TestDirs {
    root: TempDir,
    /// Staging directory (not created up front)
    pub staging: PathBuf,
    /// Destination directory (not created up front)
    pub dest: PathBuf,
}

impl TestDirs {
    /// Fresh directory pair
    pub fn new() -> Self {
        let root = TempDir::new().unwrap();
        let staging = root.path().join("tmp");
        let dest = root.path().join("amplitude-data");
        Self {
            root,
            staging,
            dest,
        }
    }

    /// Path for a file under the temp root
    pub fn file(&self, name: &str) -> PathBuf {
        self.root.path().join(name)
    }
}

/// Day-granularity config pointed at a stub endpoint with fast retries
pub fn stub_config(server: &MockServer, dirs: &TestDirs, start: &str, end: &str) -> Config {
    Config {
        api_key: "test-key".to_string(),
        api_secret: "test-secret".to_string(),
        start_date: start.to_string(),
        end_date: end.to_string(),
        time_unit: TimeUnit::Day,
        temp_dir: dirs.staging.clone(),
        dest_dir: dirs.dest.clone(),
        endpoint: Some(format!("{}{}", server.uri(), EXPORT_PATH)),
        retry: RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            backoff_multiplier: 2.0,
            jitter: false,
        },
        tools: ToolsConfig {
            use_external_tools: false,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Load live credentials from `.env` / environment
///
/// Reads `AMP_API_KEY` and `AMP_API_SECRET`.
pub fn load_live_credentials() -> Option<(String, String)> {
    dotenvy::dotenv().ok();
    let key = std::env::var("AMP_API_KEY").ok()?;
    let secret = std::env::var("AMP_API_SECRET").ok()?;
    if key.is_empty() || secret.is_empty() {
        return None;
    }
    Some((key, secret))
}

/// Check if live credentials are available
pub fn has_live_credentials() -> bool {
    load_live_credentials().is_some()
}
