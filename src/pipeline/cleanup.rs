//! Finalizing stage: staging cleanup and output listing

use crate::error::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Remove per-chunk staging folders and, when it is left empty, the staging root
///
/// Failures are logged as warnings and never fail the run; the output files
/// are already in place at this point.
pub(crate) async fn remove_staging(staging_root: &Path, chunk_ids: &[String]) {
    use tokio::fs;

    let mut deleted_folders = 0;
    for id in chunk_ids {
        let folder = staging_root.join(id);
        match fs::remove_dir_all(&folder).await {
            Ok(()) => {
                debug!(?folder, "deleted staging folder");
                deleted_folders += 1;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(?folder, error = %e, "failed to delete staging folder"),
        }
    }

    // Only removes the root when nothing else lives in it
    match fs::remove_dir(staging_root).await {
        Ok(()) => debug!(?staging_root, "deleted staging root"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => debug!(?staging_root, error = %e, "staging root kept"),
    }

    info!(deleted_folders, "staging cleanup complete");
}

/// Every `*.json` file directly inside `dest_dir`, sorted by path
pub(crate) async fn list_outputs(dest_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut outputs = Vec::new();
    let mut entries = tokio::fs::read_dir(dest_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
        if is_json && entry.file_type().await?.is_file() {
            outputs.push(path);
        }
    }
    outputs.sort();
    Ok(outputs)
}
