//! Pre-encoded transaction pool.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Errors while loading the transaction pool.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("No transactions found in {}", .0.display())]
    Empty(PathBuf),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> LoadError {
    let path = path.to_path_buf();
    move |source| LoadError::Io { path, source }
}

/// Load one encoded transaction per regular file in `dir`.
///
/// Files are taken in file-name order, which fixes the sequence index of
/// every transaction. Contents are trimmed; empty files are skipped.
pub fn load_transactions(dir: &Path) -> Result<Vec<String>, LoadError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err(dir))? {
        let path = entry.map_err(io_err(dir))?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    let mut txs = Vec::with_capacity(files.len());
    for path in files {
        let content = std::fs::read_to_string(&path).map_err(io_err(&path))?;
        let tx = content.trim();
        if tx.is_empty() {
            warn!(path = %path.display(), "Skipping empty transaction file");
            continue;
        }
        txs.push(tx.to_string());
    }

    if txs.is_empty() {
        return Err(LoadError::Empty(dir.to_path_buf()));
    }

    info!(dir = %dir.display(), count = txs.len(), "Loaded transactions");
    Ok(txs)
}
