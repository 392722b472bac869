//! Log record extraction.
//!
//! Turns raw text from benchmark logs into structured records:
//!
//! - **Submission log**: one `txIdx: .. time: .. height: ..` line per
//!   dispatch attempt, written by the spammer.
//! - **Node logs**: colorized node output; only state-commit lines are
//!   turned into [`BlockRecord`](cosmbench_types::BlockRecord)s.
//!
//! Terminal escape sequences are stripped before any matching. Readers are
//! lazy and single-pass; reading the same bytes again yields the same records.

mod ansi;
mod error;
mod line;
mod reader;
mod tail;

pub use ansi::strip_ansi;
pub use error::ExtractError;
pub use line::{
    format_submission_line, parse_commit_line, parse_submission_line, CommitPattern, LineMatch,
    LineParser, SubmissionLineParser, DEFAULT_COMMIT_MARKER, UNKNOWN_HEIGHT,
};
pub use reader::{
    find_node_logs, read_commit_logs, read_submission_log, CommitLogReader, LogReader,
    SubmissionLogReader,
};
pub use tail::{latest_height_in_tail, read_tail_lines, DEFAULT_TAIL_LINES};
