//! Per-line record parsers.
//!
//! Each log kind has its own [`LineParser`]. A parser looks at one line and
//! either produces a record or reports [`LineMatch::NoMatch`]; a line that
//! does not match is never an error.
//!
//! Submission lines:
//!
//! ```text
//! txIdx: 12 time: 1700000000123 height: 845 hash: 9F3A...
//! txIdx: 13 time: 1700000000131 height: unknown
//! ```
//!
//! Commit lines (node logs, usually colorized):
//!
//! ```text
//! 1700000000456 INF committed state app_hash=AB12 height=845 module=state num_txs=97
//! ```

use crate::ansi::strip_ansi;
use cosmbench_types::{BlockHeight, BlockRecord, SubmissionRecord, TxIndex};

/// Outcome of parsing one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineMatch<T> {
    /// The line had the expected shape.
    Record(T),
    /// The line is not a record of this kind.
    NoMatch,
}

impl<T> LineMatch<T> {
    pub fn into_record(self) -> Option<T> {
        match self {
            LineMatch::Record(r) => Some(r),
            LineMatch::NoMatch => None,
        }
    }
}

/// A record-extraction strategy for one kind of log line.
pub trait LineParser {
    type Record;

    fn parse(&self, line: &str) -> LineMatch<Self::Record>;
}

/// Marker written in the height field when no height was resolved.
pub const UNKNOWN_HEIGHT: &str = "unknown";

/// Parser for submission log lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubmissionLineParser;

impl LineParser for SubmissionLineParser {
    type Record = SubmissionRecord;

    fn parse(&self, line: &str) -> LineMatch<SubmissionRecord> {
        parse_submission_line(line)
    }
}

/// Parse a `txIdx: <n> time: <ms> height: <n|unknown> [hash: <id>]` line.
///
/// `txIdx` and `time` are required. A missing, zero, or `unknown` height
/// yields an unresolved record.
pub fn parse_submission_line(line: &str) -> LineMatch<SubmissionRecord> {
    let line = strip_ansi(line);
    let tokens: Vec<&str> = line.split_whitespace().collect();

    let mut tx_idx = None;
    let mut time = None;
    let mut height = None;
    let mut tx_hash = None;

    let mut i = 0;
    while i < tokens.len() {
        let value = tokens.get(i + 1).copied();
        match (tokens[i], value) {
            ("txIdx:", Some(v)) => {
                let Ok(n) = v.parse::<u64>() else {
                    return LineMatch::NoMatch;
                };
                tx_idx = Some(TxIndex(n));
                i += 1;
            }
            ("time:", Some(v)) => {
                let Ok(ms) = v.parse::<i64>() else {
                    return LineMatch::NoMatch;
                };
                time = Some(ms);
                i += 1;
            }
            ("height:", Some(v)) => {
                height = match v {
                    UNKNOWN_HEIGHT => None,
                    v => match v.parse::<u64>() {
                        Ok(h) => BlockHeight::from_reported(h),
                        Err(_) => return LineMatch::NoMatch,
                    },
                };
                i += 1;
            }
            ("hash:", Some(v)) => {
                tx_hash = Some(v.to_string());
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }

    match (tx_idx, time) {
        (Some(tx_idx), Some(time)) => LineMatch::Record(
            SubmissionRecord::new(tx_idx, time)
                .with_height(height)
                .with_tx_hash(tx_hash),
        ),
        _ => LineMatch::NoMatch,
    }
}

/// Render a record in the submission log line format.
pub fn format_submission_line(record: &SubmissionRecord) -> String {
    let height = match record.height {
        Some(h) => h.0.to_string(),
        None => UNKNOWN_HEIGHT.to_string(),
    };
    let mut line = format!(
        "txIdx: {} time: {} height: {}",
        record.tx_idx.0, record.submitted_at_ms, height
    );
    if let Some(hash) = &record.tx_hash {
        line.push_str(" hash: ");
        line.push_str(hash);
    }
    line
}

/// Default text identifying a state-commit line in node logs.
pub const DEFAULT_COMMIT_MARKER: &str = "committed state";

/// Shape of a block-commit line in node logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitPattern {
    /// Text a line must contain to count as a commit event.
    /// `None` accepts any line carrying a timestamp and a height.
    marker: Option<String>,
}

impl CommitPattern {
    /// Match lines containing `marker`.
    pub fn with_marker(marker: impl Into<String>) -> Self {
        Self {
            marker: Some(marker.into()),
        }
    }

    /// Match any line with a timestamp and `height=`.
    pub fn any_line() -> Self {
        Self { marker: None }
    }

    pub fn marker(&self) -> Option<&str> {
        self.marker.as_deref()
    }
}

impl Default for CommitPattern {
    fn default() -> Self {
        Self::with_marker(DEFAULT_COMMIT_MARKER)
    }
}

impl LineParser for CommitPattern {
    type Record = BlockRecord;

    fn parse(&self, line: &str) -> LineMatch<BlockRecord> {
        parse_commit_line(line, self)
    }
}

/// Parse a node log line into a block record if it is a commit event.
///
/// The timestamp is the first token made only of decimal digits.
pub fn parse_commit_line(line: &str, pattern: &CommitPattern) -> LineMatch<BlockRecord> {
    let line = strip_ansi(line);

    if let Some(marker) = pattern.marker() {
        if !line.contains(marker) {
            return LineMatch::NoMatch;
        }
    }

    let Some(timestamp) = line
        .split_whitespace()
        .find(|t| t.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|t| t.parse::<i64>().ok())
    else {
        return LineMatch::NoMatch;
    };

    let Some(height) = key_value(&line, "height=") else {
        return LineMatch::NoMatch;
    };
    let num_txs = key_value(&line, "num_txs=");

    LineMatch::Record(BlockRecord::new(BlockHeight(height), timestamp, num_txs))
}

/// Find the first `key<digits>` token and parse its leading digits.
pub(crate) fn key_value(line: &str, key: &str) -> Option<u64> {
    line.split_whitespace()
        .filter_map(|t| t.strip_prefix(key))
        .find_map(|v| {
            let end = v.bytes().take_while(u8::is_ascii_digit).count();
            v[..end].parse().ok()
        })
}
