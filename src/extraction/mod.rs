//! Archive unpacking and payload decoding
//!
//! Each staged chunk is a zip archive holding gzip-compressed, newline-delimited
//! JSON files. [`ArchiveUnpacker`] flattens the archive into a per-chunk staging
//! folder and [`PayloadDecoder`] decompresses each entry into the destination
//! directory while counting its records.
//!
//! Both components hold an ordered list of strategies. The external tools
//! (`unzip`, `gunzip`, `wc`) are tried first when they can be found; the
//! in-process `zip`/`flate2` implementations are always available as fallback
//! and produce identical files and counts.

mod cli;
mod decoder;
mod in_process;
mod traits;
mod unpacker;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

// Re-exports
pub use cli::{CliGunzip, CliUnzip};
pub use decoder::PayloadDecoder;
pub use in_process::{InProcessGzip, InProcessZip, count_records};
pub use traits::{ArchiveStrategy, DecodeStrategy};
pub use unpacker::ArchiveUnpacker;
