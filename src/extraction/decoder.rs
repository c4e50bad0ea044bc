use super::cli::CliGunzip;
use super::in_process::InProcessGzip;
use super::traits::DecodeStrategy;
use crate::config::ToolsConfig;
use crate::context::RunContext;
use crate::error::{ExtractionError, Result};
use crate::types::{DecodedFile, UnpackedEntry};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Decompresses unpacked entries into the destination directory
///
/// Output files are named after the entry with its partition prefix and
/// `.gz` suffix removed, so `123_2021-09-17_17#0.json.gz` becomes
/// `2021-09-17_17#0.json`.
#[derive(Clone)]
pub struct PayloadDecoder {
    strategies: Vec<Arc<dyn DecodeStrategy>>,
    remove_entries: bool,
}

impl PayloadDecoder {
    /// Create with an explicit strategy list
    pub fn new(strategies: Vec<Arc<dyn DecodeStrategy>>, remove_entries: bool) -> Self {
        Self {
            strategies,
            remove_entries,
        }
    }

    /// Build the default strategy chain from tool configuration
    pub fn from_config(tools: &ToolsConfig, remove_entries: bool) -> Self {
        let mut strategies: Vec<Arc<dyn DecodeStrategy>> = Vec::with_capacity(2);
        if let Some(cli) = CliGunzip::from_config(tools) {
            strategies.push(Arc::new(cli));
        }
        strategies.push(Arc::new(InProcessGzip));
        Self::new(strategies, remove_entries)
    }

    /// Names of the configured strategies, in the order they are tried
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Decode `entry` into `dest_dir` and report its record count
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::AllStrategiesFailed`] when no strategy could
    /// decode the entry.
    pub async fn decode(
        &self,
        entry: &UnpackedEntry,
        dest_dir: &Path,
        ctx: &mut RunContext,
    ) -> Result<DecodedFile> {
        let output_name = entry.output_name();
        let dest = dest_dir.join(&output_name);
        // Strategies write here; an existing output is only replaced on success
        let partial = dest_dir.join(format!("{output_name}.partial"));
        let mut last_error = String::from("no strategies configured");

        for strategy in &self.strategies {
            match strategy.decode(&entry.path, &partial).await {
                Ok(records) => {
                    tokio::fs::rename(&partial, &dest).await?;
                    debug!(
                        strategy = strategy.name(),
                        entry = ?entry.path,
                        ?dest,
                        records,
                        "entry decoded"
                    );
                    ctx.detail(format!("{output_name}: {records} events"));
                    if self.remove_entries {
                        tokio::fs::remove_file(&entry.path).await?;
                    }
                    return Ok(DecodedFile {
                        path: dest,
                        records,
                    });
                }
                Err(e) => {
                    warn!(
                        strategy = strategy.name(),
                        entry = ?entry.path,
                        error = %e,
                        "decode strategy failed, trying next"
                    );
                    last_error = e.to_string();
                }
            }
        }

        if let Err(e) = tokio::fs::remove_file(&partial).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(?partial, error = %e, "failed to remove partial output");
        }

        Err(ExtractionError::AllStrategiesFailed {
            path: entry.path.clone(),
            attempted: self.strategies.len(),
            last_error,
        }
        .into())
    }
}
