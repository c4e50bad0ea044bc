//! Capability traits for archive unpacking and payload decoding

use async_trait::async_trait;
use std::path::Path;

/// A way of unpacking the outer zip archive of a staged chunk
///
/// Every implementation must produce the same flat set of files: each file
/// entry of the archive written directly into `dest` under its base name, with
/// the archive's internal directory structure discarded.
#[async_trait]
pub trait ArchiveStrategy: Send + Sync {
    /// Extract all file entries of `archive` into `dest`
    ///
    /// # Errors
    ///
    /// Returns an error if the tool cannot be executed, exits unsuccessfully,
    /// or the archive cannot be read.
    async fn unpack(&self, archive: &Path, dest: &Path) -> crate::Result<()>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// A way of decompressing one gzip-compressed newline-delimited JSON entry
///
/// Implementations must write byte-identical output and agree on the record
/// count: the number of newline characters, so a trailing unterminated line is
/// not counted.
#[async_trait]
pub trait DecodeStrategy: Send + Sync {
    /// Decompress `entry` into `dest` and return its record count
    ///
    /// # Errors
    ///
    /// Returns an error if the tool cannot be executed, exits unsuccessfully,
    /// or the payload is not valid gzip.
    async fn decode(&self, entry: &Path, dest: &Path) -> crate::Result<u64>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
