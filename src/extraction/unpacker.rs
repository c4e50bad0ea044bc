use super::cli::CliUnzip;
use super::in_process::InProcessZip;
use super::traits::ArchiveStrategy;
use crate::config::ToolsConfig;
use crate::context::RunContext;
use crate::error::{ExtractionError, Result};
use crate::types::{StagedChunk, UnpackedEntry};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Suffix of the inner payloads inside a chunk archive
const ENTRY_SUFFIX: &str = ".json.gz";

/// Unpacks staged chunks into per-chunk staging folders
///
/// Strategies are tried in order; the first one that succeeds wins. The default
/// order is the external `unzip` tool (when available) followed by the
/// in-process `zip` implementation.
#[derive(Clone)]
pub struct ArchiveUnpacker {
    strategies: Vec<Arc<dyn ArchiveStrategy>>,
    remove_archives: bool,
}

impl ArchiveUnpacker {
    /// Create with an explicit strategy list
    pub fn new(strategies: Vec<Arc<dyn ArchiveStrategy>>, remove_archives: bool) -> Self {
        Self {
            strategies,
            remove_archives,
        }
    }

    /// Build the default strategy chain from tool configuration
    pub fn from_config(tools: &ToolsConfig, remove_archives: bool) -> Self {
        let mut strategies: Vec<Arc<dyn ArchiveStrategy>> = Vec::with_capacity(2);
        if let Some(cli) = CliUnzip::from_config(tools) {
            debug!(binary = ?cli.binary_path(), "using external unzip");
            strategies.push(Arc::new(cli));
        }
        strategies.push(Arc::new(InProcessZip));
        Self::new(strategies, remove_archives)
    }

    /// Names of the configured strategies, in the order they are tried
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Unpack `chunk` into `staging_root/<chunk id>/` and list its payload entries
    ///
    /// The archive is deleted afterwards when archive removal is enabled.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::AllStrategiesFailed`] when no strategy could
    /// unpack the archive, or an I/O error if the staging folder cannot be used.
    pub async fn unpack(
        &self,
        chunk: &StagedChunk,
        staging_root: &Path,
        ctx: &mut RunContext,
    ) -> Result<Vec<UnpackedEntry>> {
        let chunk_id = chunk.id();
        let folder = staging_root.join(&chunk_id);
        tokio::fs::create_dir_all(&folder).await?;

        let mut last_error = String::from("no strategies configured");
        let mut unpacked_with = None;

        for strategy in &self.strategies {
            match strategy.unpack(&chunk.path, &folder).await {
                Ok(()) => {
                    unpacked_with = Some(strategy.name());
                    break;
                }
                Err(e) => {
                    warn!(
                        strategy = strategy.name(),
                        archive = ?chunk.path,
                        error = %e,
                        "unpack strategy failed, trying next"
                    );
                    ctx.detail(format!(
                        "{}: {} failed ({e})",
                        chunk.window.label(),
                        strategy.name()
                    ));
                    last_error = e.to_string();
                }
            }
        }

        let Some(strategy) = unpacked_with else {
            return Err(ExtractionError::AllStrategiesFailed {
                path: chunk.path.clone(),
                attempted: self.strategies.len(),
                last_error,
            }
            .into());
        };

        let entries = list_entries(&folder).await?;
        ctx.detail(format!(
            "{}: unpacked {} entries with {strategy}",
            chunk.window.label(),
            entries.len()
        ));

        if self.remove_archives {
            tokio::fs::remove_file(&chunk.path).await?;
        }

        Ok(entries
            .into_iter()
            .map(|path| UnpackedEntry {
                chunk_id: chunk_id.clone(),
                path,
            })
            .collect())
    }
}

/// Payload files in `folder`, sorted by path
async fn list_entries(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    let mut dir = tokio::fs::read_dir(folder).await?;
    while let Some(entry) = dir.next_entry().await? {
        let path = entry.path();
        let is_payload = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(ENTRY_SUFFIX));
        if is_payload && entry.file_type().await?.is_file() {
            entries.push(path);
        }
    }
    entries.sort();
    Ok(entries)
}
