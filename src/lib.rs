//! # amplitude-extract
//!
//! Bulk extraction of raw event data from the Amplitude export API.
//!
//! The export endpoint only serves bounded time windows, each as a zip archive
//! of gzip-compressed, newline-delimited JSON files. This crate splits an
//! arbitrary date range into windows, downloads each one with retries, unpacks
//! and decompresses the payloads, and leaves one `.json` file per partition in
//! the destination directory.
//!
//! ## Quick Start
//!
//! ```no_run
//! use amplitude_extract::{Config, TimeUnit, extract};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         api_key: "your-api-key".to_string(),
//!         api_secret: "your-api-secret".to_string(),
//!         start_date: "2021-09-17".to_string(),
//!         end_date: "2021-09-29".to_string(),
//!         time_unit: TimeUnit::Day,
//!         ..Default::default()
//!     };
//!
//!     let summary = extract(config).await?;
//!     println!(
//!         "{} files, {} events",
//!         summary.output_files.len(),
//!         summary.event_count
//!     );
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Command-line argument model
pub mod cli;
/// Configuration types
pub mod config;
/// Per-run state and log accumulation
pub mod context;
/// Error types
pub mod error;
/// Archive unpacking and payload decoding
pub mod extraction;
/// Export endpoint client
pub mod fetcher;
/// Stage sequencing
pub mod pipeline;
/// Date range to window planning
pub mod planner;
/// Retry logic with exponential backoff
pub mod retry;
/// Core domain types
pub mod types;

// Re-export commonly used types
pub use config::{Config, Region, RetryConfig, ToolsConfig};
pub use context::RunContext;
pub use error::{Error, ExtractionError, Result};
pub use extraction::{ArchiveStrategy, ArchiveUnpacker, DecodeStrategy, PayloadDecoder};
pub use fetcher::{ChunkFetcher, FetchOutcome};
pub use pipeline::Extractor;
pub use types::{
    DateRange, DecodedFile, RunSummary, Stage, StagedChunk, TimeUnit, TimeWindow,
    UnpackedEntry, WindowOutcome, WindowReport,
};

use tracing::{error, warn};

/// Validate `config`, run the whole pipeline, and persist the run log if configured
///
/// The log file is written whether the run succeeds or fails.
///
/// # Errors
///
/// Returns configuration errors before any network activity, and any fatal
/// pipeline error (unpack or decode failure, filesystem errors).
pub async fn extract(config: Config) -> Result<RunSummary> {
    config.validate()?;

    let mut ctx = RunContext::new(config.verbose);
    let log_file = config.log_file.clone();

    let result = match Extractor::new(config) {
        Ok(extractor) => extractor.run(&mut ctx).await,
        Err(e) => Err(e),
    };

    if let Err(e) = &result {
        error!(stage = %ctx.stage(), error = %e, "extraction failed");
        ctx.log(format!("failed during {}: {e}", ctx.stage()));
    }

    if let Some(path) = log_file
        && let Err(e) = ctx.persist(&path).await
    {
        warn!(?path, error = %e, "failed to write run log");
    }

    result
}
