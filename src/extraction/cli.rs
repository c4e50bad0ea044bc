//! External-tool strategies: `unzip`, `gunzip` and `wc`
//!
//! These are the fast path. Binaries are discovered on `PATH` with the `which`
//! crate unless an explicit path is configured.

use super::traits::{ArchiveStrategy, DecodeStrategy};
use crate::config::ToolsConfig;
use crate::error::{Error, ExtractionError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Resolve a tool from an explicit path or, if allowed, from `PATH`
fn resolve_tool(explicit: Option<&PathBuf>, name: &str, search_path: bool) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.clone()),
        None if search_path => which::which(name).ok(),
        None => None,
    }
}

fn stderr_excerpt(stderr: &[u8]) -> String {
    String::from_utf8_lossy(stderr).trim().to_string()
}

/// Unpacks archives with the external `unzip` binary (`unzip -j`)
#[derive(Debug, Clone)]
pub struct CliUnzip {
    binary_path: PathBuf,
}

impl CliUnzip {
    /// Create with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find `unzip` in PATH
    pub fn from_path() -> Option<Self> {
        which::which("unzip").ok().map(Self::new)
    }

    /// Build from tool configuration; `None` when external tools are disabled or missing
    pub fn from_config(tools: &ToolsConfig) -> Option<Self> {
        if !tools.use_external_tools {
            return None;
        }
        resolve_tool(tools.unzip_path.as_ref(), "unzip", tools.search_path).map(Self::new)
    }

    /// Path of the binary this strategy runs
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }
}

#[async_trait]
impl ArchiveStrategy for CliUnzip {
    async fn unpack(&self, archive: &Path, dest: &Path) -> crate::Result<()> {
        // -j junk paths, -o overwrite without prompting, -qq quiet
        let output = Command::new(&self.binary_path)
            .arg("-qq")
            .arg("-o")
            .arg("-j")
            .arg(archive)
            .arg("-d")
            .arg(dest)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::ExternalTool(format!("failed to execute unzip: {}", e)))?;

        if !output.status.success() {
            return Err(ExtractionError::UnpackFailed {
                archive: archive.to_path_buf(),
                reason: format!(
                    "unzip exited with {}: {}",
                    output.status,
                    stderr_excerpt(&output.stderr)
                ),
            }
            .into());
        }

        debug!(?archive, ?dest, "unzip completed");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "cli-unzip"
    }
}

/// Decodes entries with `gunzip -c` and counts records with `wc -l`
#[derive(Debug, Clone)]
pub struct CliGunzip {
    gunzip_path: PathBuf,
    wc_path: PathBuf,
}

impl CliGunzip {
    /// Create with explicit binary paths
    pub fn new(gunzip_path: PathBuf, wc_path: PathBuf) -> Self {
        Self {
            gunzip_path,
            wc_path,
        }
    }

    /// Attempt to find `gunzip` and `wc` in PATH
    pub fn from_path() -> Option<Self> {
        let gunzip = which::which("gunzip").ok()?;
        let wc = which::which("wc").ok()?;
        Some(Self::new(gunzip, wc))
    }

    /// Build from tool configuration; `None` when external tools are disabled or missing
    pub fn from_config(tools: &ToolsConfig) -> Option<Self> {
        if !tools.use_external_tools {
            return None;
        }
        let gunzip = resolve_tool(tools.gunzip_path.as_ref(), "gunzip", tools.search_path)?;
        let wc = resolve_tool(tools.wc_path.as_ref(), "wc", tools.search_path)?;
        Some(Self::new(gunzip, wc))
    }

    async fn count_lines(&self, path: &Path) -> crate::Result<u64> {
        let output = Command::new(&self.wc_path)
            .arg("-l")
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::ExternalTool(format!("failed to execute wc: {}", e)))?;

        if !output.status.success() {
            return Err(Error::ExternalTool(format!(
                "wc exited with {}: {}",
                output.status,
                stderr_excerpt(&output.stderr)
            )));
        }

        parse_wc_output(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
            Error::ExternalTool(format!(
                "unexpected wc output: {}",
                String::from_utf8_lossy(&output.stdout).trim()
            ))
        })
    }
}

/// First whitespace-separated token of `wc -l` output (`"   100 /path"` -> 100)
pub(crate) fn parse_wc_output(stdout: &str) -> Option<u64> {
    stdout.split_whitespace().next()?.parse().ok()
}

#[async_trait]
impl DecodeStrategy for CliGunzip {
    async fn decode(&self, entry: &Path, dest: &Path) -> crate::Result<u64> {
        let out = tokio::fs::File::create(dest).await?.into_std().await;

        // output() would replace the file redirect with a pipe
        let child = Command::new(&self.gunzip_path)
            .arg("-c")
            .arg(entry)
            .stdin(Stdio::null())
            .stdout(Stdio::from(out))
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::ExternalTool(format!("failed to execute gunzip: {}", e)))?;
        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Error::ExternalTool(format!("failed to wait for gunzip: {}", e)))?;

        if !output.status.success() {
            return Err(ExtractionError::DecodeFailed {
                entry: entry.to_path_buf(),
                reason: format!(
                    "gunzip exited with {}: {}",
                    output.status,
                    stderr_excerpt(&output.stderr)
                ),
            }
            .into());
        }

        let records = self.count_lines(dest).await?;
        debug!(?entry, ?dest, records, "gunzip completed");
        Ok(records)
    }

    fn name(&self) -> &'static str {
        "cli-gunzip"
    }
}
