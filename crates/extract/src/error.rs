//! Extraction errors.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors while reading benchmark logs.
///
/// Lines that do not match are skipped and never reported here.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// A log file could not be opened.
    #[error("Failed to open {}: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },

    /// Reading from an open source failed.
    #[error("Failed to read {name} after line {line}: {source}")]
    Read {
        name: String,
        line: usize,
        source: io::Error,
    },

    /// No record matched across all inputs; usually a wrong path or pattern.
    #[error("No data found in {0}")]
    NoData(String),
}
