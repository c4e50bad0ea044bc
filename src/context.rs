//! Per-run context threaded through the pipeline
//!
//! Holds the verbose flag, the current [`Stage`], and the user-facing log lines
//! accumulated during the run so they can be persisted when the run ends.

use crate::error::Result;
use crate::types::Stage;
use chrono::{SecondsFormat, Utc};
use std::path::Path;
use tracing::{debug, info};

/// One recorded log line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogLine {
    /// RFC 3339 UTC timestamp
    pub at: String,
    /// Message text
    pub message: String,
}

/// Explicit run state, owned by the orchestrator
#[derive(Debug)]
pub struct RunContext {
    verbose: bool,
    stage: Stage,
    lines: Vec<LogLine>,
}

impl RunContext {
    /// Create a context for a new run
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            stage: Stage::Planning,
            lines: Vec::new(),
        }
    }

    /// Whether detail lines are recorded
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Current pipeline stage
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Move to the next stage
    pub fn enter(&mut self, stage: Stage) {
        debug!(from = %self.stage, to = %stage, "entering stage");
        self.stage = stage;
    }

    /// Record a user-facing line
    pub fn log(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!(stage = %self.stage, "{}", message);
        self.push(message);
    }

    /// Record a detail line; dropped unless verbose
    pub fn detail(&mut self, message: impl Into<String>) {
        let message = message.into();
        debug!(stage = %self.stage, "{}", message);
        if self.verbose {
            self.push(message);
        }
    }

    /// Lines recorded so far
    pub fn lines(&self) -> &[LogLine] {
        &self.lines
    }

    /// Write all recorded lines to `path`, one `<timestamp> <message>` per line
    pub async fn persist(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut content = String::new();
        for line in &self.lines {
            content.push_str(&line.at);
            content.push(' ');
            content.push_str(&line.message);
            content.push('\n');
        }
        tokio::fs::write(path, content).await?;
        debug!(?path, lines = self.lines.len(), "wrote run log");
        Ok(())
    }

    fn push(&mut self, message: String) {
        self.lines.push(LogLine {
            at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            message,
        });
    }
}
