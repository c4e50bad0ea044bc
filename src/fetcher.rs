//! Chunk fetching from the export endpoint
//!
//! Each [`TimeWindow`] is requested with a streaming GET and the response body is
//! written straight to the staging directory, so memory use stays flat no matter
//! how large the window's archive is. Transient failures are retried with backoff;
//! a 404 means the endpoint has no data for the window and is reported as skipped.

use crate::config::{Config, RetryConfig};
use crate::context::RunContext;
use crate::error::{Error, Result};
use crate::retry::download_with_retry_notify;
use crate::types::{StagedChunk, TimeWindow};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONNECTION};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Longest response body excerpt carried in an HTTP error
const MAX_ERROR_BODY: usize = 200;

/// Result of fetching one window
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Archive written to staging
    Staged {
        /// The staged archive
        chunk: StagedChunk,
        /// Retries needed before the successful attempt
        retries: u32,
    },
    /// Endpoint has no data for the window
    Skipped {
        /// HTTP status the endpoint answered with
        status: u16,
    },
}

enum Attempt {
    Written(u64),
    NotFound(u16),
}

/// Downloads window archives from the export endpoint
pub struct ChunkFetcher {
    client: reqwest::Client,
    url: String,
    authorization: String,
    retry: RetryConfig,
    read_timeout: Duration,
}

impl ChunkFetcher {
    /// Create a fetcher for the configured endpoint and credentials
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            url: config.export_url().to_string(),
            authorization: basic_auth_header(&config.api_key, &config.api_secret),
            retry: config.retry.clone(),
            read_timeout: config.read_timeout,
        })
    }

    /// Endpoint this fetcher requests
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch one window into `staging_dir`
    ///
    /// Retry notices and the final per-window line are recorded in `ctx`. Errors
    /// returned here are per-window: retries exhausted or a permanent HTTP failure.
    pub async fn fetch(
        &self,
        window: &TimeWindow,
        staging_dir: &Path,
        ctx: &mut RunContext,
    ) -> Result<FetchOutcome> {
        let dest = staging_dir.join(window.file_name());
        let mut retries = 0;

        debug!(window = %window.label(), ?dest, "fetching window");

        let result = download_with_retry_notify(
            &self.retry,
            || self.attempt(window, &dest),
            |attempt, err: &Error| {
                retries = attempt;
                ctx.log(format!("got {err}...retrying request...#{attempt}"));
            },
        )
        .await;

        match result {
            Ok(Attempt::Written(bytes)) => {
                ctx.log(format!("{}: got 200; OK", window.label()));
                info!(window = %window.label(), bytes, retries, "window staged");
                Ok(FetchOutcome::Staged {
                    chunk: StagedChunk {
                        window: *window,
                        path: dest,
                        bytes,
                    },
                    retries,
                })
            }
            Ok(Attempt::NotFound(status)) => {
                remove_partial(&dest).await;
                ctx.log(format!("{}: got {status}; NOT FOUND", window.label()));
                Ok(FetchOutcome::Skipped { status })
            }
            Err(e) => {
                remove_partial(&dest).await;
                let status = e
                    .status()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "no response".to_string());
                ctx.log(format!("{}: got {status}; FAILED ({e})", window.label()));
                Err(e)
            }
        }
    }

    async fn attempt(&self, window: &TimeWindow, dest: &Path) -> Result<Attempt> {
        let request = self
            .client
            .get(&self.url)
            .query(&[("start", window.query_start()), ("end", window.query_end())])
            .header(AUTHORIZATION, &self.authorization)
            .header(CONNECTION, "keep-alive")
            .send();
        let mut response = self.within_read_timeout(request, "response headers").await??;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(Attempt::NotFound(status.as_u16()));
        }
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                message: error_message(status, response).await,
            });
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0u64;
        while let Some(chunk) = self
            .within_read_timeout(response.chunk(), "response body")
            .await??
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(Attempt::Written(written))
    }

    /// Await `fut`, failing with a retryable `TimedOut` error when the read timeout elapses
    async fn within_read_timeout<F: Future>(
        &self,
        fut: F,
        waiting_for: &str,
    ) -> Result<F::Output> {
        tokio::time::timeout(self.read_timeout, fut)
            .await
            .map_err(|_| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!(
                        "no {waiting_for} within {}s",
                        self.read_timeout.as_secs_f64()
                    ),
                ))
            })
    }
}

/// `Basic base64(key:secret)`
pub fn basic_auth_header(key: &str, secret: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{key}:{secret}")))
}

async fn error_message(status: StatusCode, response: reqwest::Response) -> String {
    let reason = status.canonical_reason().unwrap_or("unknown status");
    match response.text().await {
        Ok(body) if !body.trim().is_empty() => {
            let body = body.trim();
            let excerpt: String = body.chars().take(MAX_ERROR_BODY).collect();
            format!("{reason}: {excerpt}")
        }
        _ => reason.to_string(),
    }
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(?path, "removed partial download"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(?path, error = %e, "failed to remove partial download"),
    }
}

/// Split staged chunks into non-empty ones and zero-length ones, deleting the latter
pub async fn discard_empty(chunks: Vec<StagedChunk>) -> Result<(Vec<StagedChunk>, Vec<PathBuf>)> {
    let mut kept = Vec::with_capacity(chunks.len());
    let mut discarded = Vec::new();

    for chunk in chunks {
        let len = tokio::fs::metadata(&chunk.path).await?.len();
        if len == 0 {
            tokio::fs::remove_file(&chunk.path).await?;
            debug!(path = ?chunk.path, "discarded empty chunk");
            discarded.push(chunk.path);
        } else {
            kept.push(chunk);
        }
    }

    Ok((kept, discarded))
}
