//! Shared submission log.

use cosmbench_extract::format_submission_line;
use cosmbench_types::{SubmissionRecord, SubmissionStore};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Errors writing the submission log.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to create submission log {}: {source}", .path.display())]
    Create {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write submission log: {0}")]
    Write(#[from] std::io::Error),
}

struct SinkInner {
    writer: Box<dyn Write + Send>,
    store: SubmissionStore,
}

/// Append-only submission log shared by all concurrent submissions.
///
/// One lock covers both the writer and the in-memory store, so a record is
/// never interleaved with another on disk and the store matches the file.
pub struct SubmissionSink {
    inner: Mutex<SinkInner>,
}

impl SubmissionSink {
    /// Create (truncate) a log file.
    pub fn create(path: &Path) -> Result<Self, SinkError> {
        let file = File::create(path).map_err(|source| SinkError::Create {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_writer(BufWriter::new(file)))
    }

    /// Log to an arbitrary writer.
    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            inner: Mutex::new(SinkInner {
                writer: Box::new(writer),
                store: SubmissionStore::new(),
            }),
        }
    }

    /// Append one record and flush it.
    ///
    /// The record is kept in memory even if the write fails. This blocks on
    /// file I/O; async callers run it on the blocking pool.
    pub fn append(&self, record: SubmissionRecord) -> Result<(), SinkError> {
        let line = format_submission_line(&record);
        let mut inner = self.inner.lock();
        inner.store.append(record);
        writeln!(inner.writer, "{line}")?;
        inner.writer.flush()?;
        Ok(())
    }

    /// Number of records appended so far.
    pub fn len(&self) -> usize {
        self.inner.lock().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the records appended so far.
    pub fn snapshot(&self) -> SubmissionStore {
        self.inner.lock().store.clone()
    }

    /// Flush the writer and return the records.
    pub fn finish(self) -> Result<SubmissionStore, SinkError> {
        let mut inner = self.inner.into_inner();
        inner.writer.flush()?;
        Ok(inner.store)
    }
}
