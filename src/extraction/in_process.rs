//! In-process strategies built on the `zip` and `flate2` crates
//!
//! Always available; used when the external tools are missing or fail.

use super::traits::{ArchiveStrategy, DecodeStrategy};
use crate::error::{Error, ExtractionError, Result};
use async_trait::async_trait;
use flate2::read::MultiGzDecoder;
use std::io::Read;
use std::path::{Path, PathBuf};
use tokio::task::spawn_blocking;
use tracing::{debug, warn};

/// Unpacks archives with the `zip` crate, flattening directories
#[derive(Debug, Clone, Copy, Default)]
pub struct InProcessZip;

impl InProcessZip {
    fn unpack_blocking(archive_path: &Path, dest: &Path) -> Result<usize> {
        let unpack_failed = |reason: String| -> Error {
            ExtractionError::UnpackFailed {
                archive: archive_path.to_path_buf(),
                reason,
            }
            .into()
        };

        std::fs::create_dir_all(dest)?;

        let file = std::fs::File::open(archive_path)?;
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| unpack_failed(format!("failed to read ZIP archive: {}", e)))?;

        let mut extracted = 0;
        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| unpack_failed(format!("failed to read ZIP entry {}: {}", i, e)))?;

            if entry.is_dir() {
                continue;
            }

            let file_name = match entry
                .enclosed_name()
                .and_then(|p| p.file_name())
                .map(|n| n.to_os_string())
            {
                Some(name) => name,
                None => {
                    warn!(entry = entry.name(), "skipping entry with unsafe path");
                    continue;
                }
            };

            let out_path = dest.join(file_name);
            let mut out = std::fs::File::create(&out_path)?;
            std::io::copy(&mut entry, &mut out).map_err(|e| {
                unpack_failed(format!("failed to extract {}: {}", out_path.display(), e))
            })?;
            extracted += 1;
        }

        Ok(extracted)
    }
}

#[async_trait]
impl ArchiveStrategy for InProcessZip {
    async fn unpack(&self, archive: &Path, dest: &Path) -> Result<()> {
        let archive_owned = archive.to_path_buf();
        let dest_owned = dest.to_path_buf();

        let extracted =
            spawn_blocking(move || Self::unpack_blocking(&archive_owned, &dest_owned))
                .await
                .map_err(|e| {
                    Error::from(ExtractionError::UnpackFailed {
                        archive: archive.to_path_buf(),
                        reason: format!("extraction task panicked: {}", e),
                    })
                })??;

        debug!(?archive, ?dest, extracted, "in-process unzip completed");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "in-process-zip"
    }
}

/// Decodes entries fully in memory with `flate2`
#[derive(Debug, Clone, Copy, Default)]
pub struct InProcessGzip;

impl InProcessGzip {
    /// Decompress a gzip payload (concatenated members included)
    pub fn decompress(entry: &Path, compressed: &[u8]) -> Result<Vec<u8>> {
        let mut decoded = Vec::with_capacity(compressed.len() * 4);
        MultiGzDecoder::new(compressed)
            .read_to_end(&mut decoded)
            .map_err(|e| ExtractionError::DecodeFailed {
                entry: entry.to_path_buf(),
                reason: format!("invalid gzip data: {}", e),
            })?;
        Ok(decoded)
    }

    fn decode_blocking(entry: &Path, dest: &Path) -> Result<u64> {
        let compressed = std::fs::read(entry)?;
        let decoded = Self::decompress(entry, &compressed)?;
        let records = count_records(&decoded);
        std::fs::write(dest, &decoded)?;
        Ok(records)
    }
}

/// Newline-terminated records in `data`
pub fn count_records(data: &[u8]) -> u64 {
    data.iter().filter(|&&b| b == b'\n').count() as u64
}

#[async_trait]
impl DecodeStrategy for InProcessGzip {
    async fn decode(&self, entry: &Path, dest: &Path) -> Result<u64> {
        let entry_owned: PathBuf = entry.to_path_buf();
        let dest_owned: PathBuf = dest.to_path_buf();

        let records = spawn_blocking(move || Self::decode_blocking(&entry_owned, &dest_owned))
            .await
            .map_err(|e| {
                Error::from(ExtractionError::DecodeFailed {
                    entry: entry.to_path_buf(),
                    reason: format!("decode task panicked: {}", e),
                })
            })??;

        debug!(?entry, ?dest, records, "in-process gunzip completed");
        Ok(records)
    }

    fn name(&self) -> &'static str {
        "in-process-gzip"
    }
}
