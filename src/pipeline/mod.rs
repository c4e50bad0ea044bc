//! Pipeline orchestrator
//!
//! A run moves through the stages strictly in order:
//! 1. Planning - split the date range into windows
//! 2. Fetching - download each window's archive into staging
//! 3. Unpacking - flatten each staged archive into its own folder
//! 4. Decoding - decompress every entry into the destination directory
//! 5. Finalizing - remove staging artifacts and list the outputs
//!
//! Each stage finishes all of its items before the next one starts. A window
//! that cannot be fetched is recorded and skipped; an archive or entry that no
//! strategy can handle aborts the run, leaving already written outputs in place.

mod cleanup;


use crate::config::Config;
use crate::context::RunContext;
use crate::error::Result;
use crate::extraction::{ArchiveUnpacker, PayloadDecoder};
use crate::fetcher::{ChunkFetcher, FetchOutcome, discard_empty};
use crate::planner;
use crate::types::{
    RunSummary, Stage, StagedChunk, TimeWindow, UnpackedEntry, WindowOutcome, WindowReport,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Runs the extraction pipeline for one configuration
pub struct Extractor {
    config: Config,
    fetcher: ChunkFetcher,
    unpacker: ArchiveUnpacker,
    decoder: PayloadDecoder,
}

impl Extractor {
    /// Build an extractor with the default components for `config`
    ///
    /// The configuration is expected to be validated already.
    pub fn new(config: Config) -> Result<Self> {
        let fetcher = ChunkFetcher::new(&config)?;
        let unpacker = ArchiveUnpacker::from_config(&config.tools, config.cleanup);
        let decoder = PayloadDecoder::from_config(&config.tools, config.cleanup);
        debug!(
            unpack = ?unpacker.strategy_names(),
            decode = ?decoder.strategy_names(),
            "extraction strategies"
        );
        Ok(Self::with_components(config, fetcher, unpacker, decoder))
    }

    /// Build an extractor from explicit components
    pub fn with_components(
        config: Config,
        fetcher: ChunkFetcher,
        unpacker: ArchiveUnpacker,
        decoder: PayloadDecoder,
    ) -> Self {
        Self {
            config,
            fetcher,
            unpacker,
            decoder,
        }
    }

    /// Configuration this extractor runs with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Execute every stage and return the run summary
    ///
    /// # Errors
    ///
    /// Fails on invalid dates, on filesystem errors while preparing or using the
    /// staging and destination directories, and when an archive or entry cannot
    /// be processed by any strategy. Individual window fetch failures do not
    /// fail the run.
    pub async fn run(&self, ctx: &mut RunContext) -> Result<RunSummary> {
        ctx.enter(Stage::Planning);
        let range = self.config.date_range()?;
        let windows = planner::plan(&range, self.config.time_unit);
        let (staging_root, dest_dir) = self.prepare_dirs().await?;
        info!(
            windows = windows.len(),
            unit = %self.config.time_unit,
            endpoint = self.fetcher.url(),
            ?staging_root,
            ?dest_dir,
            "starting extraction"
        );
        ctx.detail(format!(
            "planned {} {} windows from {} to {}",
            windows.len(),
            self.config.time_unit,
            range.start(),
            range.end()
        ));

        ctx.enter(Stage::Fetching);
        let (staged, mut reports) = self.fetch_all(&windows, &staging_root, ctx).await;

        let (chunks, discarded) = discard_empty(staged).await?;
        for report in &mut reports {
            if discarded.contains(&staging_root.join(report.window.file_name())) {
                ctx.detail(format!("{}: empty archive, skipped", report.window.label()));
                report.outcome = WindowOutcome::Empty;
            }
        }

        ctx.enter(Stage::Unpacking);
        let mut entries: Vec<UnpackedEntry> = Vec::new();
        let mut chunk_ids = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            chunk_ids.push(chunk.id());
            entries.extend(self.unpacker.unpack(chunk, &staging_root, ctx).await?);
        }

        ctx.enter(Stage::Decoding);
        let mut event_count = 0u64;
        for entry in &entries {
            let decoded = self.decoder.decode(entry, &dest_dir, ctx).await?;
            event_count += decoded.records;
        }

        ctx.enter(Stage::Finalizing);
        if self.config.cleanup {
            cleanup::remove_staging(&staging_root, &chunk_ids).await;
        }
        let output_files = cleanup::list_outputs(&dest_dir).await?;
        ctx.log(format!(
            "extracted {} files for {} events",
            with_thousands(output_files.len() as u64),
            with_thousands(event_count)
        ));

        ctx.enter(Stage::Done);
        let summary = RunSummary {
            output_files,
            event_count,
            windows: reports,
        };
        info!(
            files = summary.output_files.len(),
            events = summary.event_count,
            staged = summary.staged_windows(),
            skipped = summary.skipped_windows(),
            "extraction complete"
        );
        Ok(summary)
    }

    /// Create staging and destination directories, resolving both to absolute paths
    async fn prepare_dirs(&self) -> Result<(PathBuf, PathBuf)> {
        tokio::fs::create_dir_all(&self.config.temp_dir).await?;
        tokio::fs::create_dir_all(&self.config.dest_dir).await?;
        let staging_root = tokio::fs::canonicalize(&self.config.temp_dir).await?;
        let dest_dir = tokio::fs::canonicalize(&self.config.dest_dir).await?;
        Ok((staging_root, dest_dir))
    }

    /// Fetch every window in order; per-window failures are recorded, not raised
    async fn fetch_all(
        &self,
        windows: &[TimeWindow],
        staging_root: &Path,
        ctx: &mut RunContext,
    ) -> (Vec<StagedChunk>, Vec<WindowReport>) {
        let mut staged = Vec::with_capacity(windows.len());
        let mut reports = Vec::with_capacity(windows.len());

        for window in windows {
            let outcome = match self.fetcher.fetch(window, staging_root, ctx).await {
                Ok(FetchOutcome::Staged { chunk, retries }) => {
                    let outcome = WindowOutcome::Staged {
                        bytes: chunk.bytes,
                        retries,
                    };
                    staged.push(chunk);
                    outcome
                }
                Ok(FetchOutcome::Skipped { status }) => WindowOutcome::NotFound { status },
                Err(e) => {
                    warn!(window = %window.label(), error = %e, "window skipped after fetch failure");
                    WindowOutcome::Failed {
                        status: e.status(),
                        reason: e.to_string(),
                    }
                }
            };
            reports.push(WindowReport {
                window: *window,
                outcome,
            });
        }

        (staged, reports)
    }
}

/// Format a count with comma thousands separators (`1234567` -> `"1,234,567"`)
pub fn with_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
