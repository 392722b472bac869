//! Submission-to-block correlation.
//!
//! Joins each submission with the block at its recorded height. Only exact
//! height matches count; a submission whose height is unknown, or whose
//! height never shows up in any node log, is unconfirmed.

use crate::latency::LatencySummary;
use crate::throughput::{Throughput, Window};
use cosmbench_types::{
    BlockHeight, BlockTable, HeightConflict, LatencyRecord, SubmissionRecord, TxIndex,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use tracing::{debug, warn};

/// Data fault found while correlating. Never aborts correlation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityWarning {
    /// Block committed before the transaction was submitted.
    NegativeLatency {
        tx_idx: TxIndex,
        height: BlockHeight,
        latency_ms: i64,
    },
    /// Submit and commit timestamps too far apart to subtract; the
    /// submission is left out.
    TimestampOverflow {
        tx_idx: TxIndex,
        height: BlockHeight,
        submitted_at_ms: i64,
        committed_at_ms: i64,
    },
    /// The confirmed window is inverted or unrepresentable, so no
    /// throughput is reported.
    InvalidWindow {
        first_submit_ms: i64,
        last_commit_ms: i64,
    },
    /// The same sequence index appears more than once; the first is kept.
    DuplicateSubmission { tx_idx: TxIndex },
    /// Node logs disagree on a block's transaction count.
    HeightConflict(HeightConflict),
}

impl fmt::Display for IntegrityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityWarning::NegativeLatency {
                tx_idx,
                height,
                latency_ms,
            } => write!(
                f,
                "negative latency {latency_ms}ms for {tx_idx} at {height}"
            ),
            IntegrityWarning::TimestampOverflow {
                tx_idx,
                height,
                submitted_at_ms,
                committed_at_ms,
            } => write!(
                f,
                "unusable timestamps for {tx_idx} at {height}: \
                 submitted {submitted_at_ms}, committed {committed_at_ms}"
            ),
            IntegrityWarning::InvalidWindow {
                first_submit_ms,
                last_commit_ms,
            } => write!(
                f,
                "invalid confirmed window: first submission {first_submit_ms}, \
                 last commit {last_commit_ms}"
            ),
            IntegrityWarning::DuplicateSubmission { tx_idx } => {
                write!(f, "duplicate submission record for {tx_idx}")
            }
            IntegrityWarning::HeightConflict(conflict) => write!(
                f,
                "conflicting records for {}: kept num_txs={:?}, dropped num_txs={:?}",
                conflict.retained.height, conflict.retained.num_txs, conflict.discarded.num_txs
            ),
        }
    }
}

/// Confirmed transactions grouped by block.
///
/// Every committed block has one, including blocks none of the submissions
/// landed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockSummary {
    pub height: BlockHeight,
    pub committed_at_ms: i64,
    /// Submissions joined to this block.
    pub confirmed_txs: u64,
    /// Transaction count the node logged for the block, if any.
    pub reported_num_txs: Option<u64>,
    /// Largest latency among the joined submissions.
    pub max_latency_ms: Option<i64>,
}

/// Result of [`correlate`].
#[derive(Debug, Clone, Default)]
pub struct Correlation {
    /// Distinct submissions considered.
    pub attempted: usize,
    /// One record per confirmed submission, in submission-log order.
    pub latencies: Vec<LatencyRecord>,
    /// Every committed block, ordered by height.
    pub blocks: Vec<BlockSummary>,
    /// Submissions whose commit height was never resolved.
    pub no_height: usize,
    /// Submissions whose height is absent from every node log.
    pub missing_block: usize,
    /// Submissions dropped because their latency could not be computed.
    pub invalid_timestamps: usize,
    pub warnings: Vec<IntegrityWarning>,
}

impl Correlation {
    pub fn confirmed(&self) -> usize {
        self.latencies.len()
    }

    pub fn unconfirmed(&self) -> usize {
        self.no_height + self.missing_block + self.invalid_timestamps
    }

    /// Number of negative latencies among the confirmed submissions.
    pub fn negative_latencies(&self) -> usize {
        self.latencies.iter().filter(|r| r.is_negative()).count()
    }

    /// Confirmed transactions per second, first submission to last commit.
    pub fn throughput(&self) -> Throughput {
        Throughput::from_latencies(&self.latencies)
    }

    /// Distribution of the non-negative latencies.
    pub fn latency_summary(&self) -> Option<LatencySummary> {
        LatencySummary::from_records(&self.latencies)
    }
}

/// Join `submissions` with `blocks` on exact commit height.
pub fn correlate(submissions: &[SubmissionRecord], blocks: &BlockTable) -> Correlation {
    let mut result = Correlation::default();
    let mut seen = HashSet::with_capacity(submissions.len());
    let mut per_block: BTreeMap<BlockHeight, BlockSummary> = blocks
        .iter()
        .map(|block| {
            let summary = BlockSummary {
                height: block.height,
                committed_at_ms: block.committed_at_ms,
                confirmed_txs: 0,
                reported_num_txs: block.num_txs,
                max_latency_ms: None,
            };
            (block.height, summary)
        })
        .collect();

    for conflict in blocks.conflicts() {
        result
            .warnings
            .push(IntegrityWarning::HeightConflict(conflict.clone()));
    }

    for submission in submissions {
        if !seen.insert(submission.tx_idx) {
            warn!(tx_idx = %submission.tx_idx, "Duplicate submission record, keeping first");
            result.warnings.push(IntegrityWarning::DuplicateSubmission {
                tx_idx: submission.tx_idx,
            });
            continue;
        }
        result.attempted += 1;

        let Some(height) = submission.height else {
            result.no_height += 1;
            continue;
        };
        let Some(block) = blocks.get(height) else {
            debug!(tx_idx = %submission.tx_idx, %height, "No commit record for height");
            result.missing_block += 1;
            continue;
        };

        let Some(latency) = LatencyRecord::join(submission, block) else {
            warn!(
                tx_idx = %submission.tx_idx,
                %height,
                submitted_at_ms = submission.submitted_at_ms,
                committed_at_ms = block.committed_at_ms,
                "Latency out of range"
            );
            result.invalid_timestamps += 1;
            result.warnings.push(IntegrityWarning::TimestampOverflow {
                tx_idx: submission.tx_idx,
                height,
                submitted_at_ms: submission.submitted_at_ms,
                committed_at_ms: block.committed_at_ms,
            });
            continue;
        };
        if latency.is_negative() {
            warn!(
                tx_idx = %latency.tx_idx,
                %height,
                latency_ms = latency.latency_ms,
                "Block committed before submission"
            );
            result.warnings.push(IntegrityWarning::NegativeLatency {
                tx_idx: latency.tx_idx,
                height,
                latency_ms: latency.latency_ms,
            });
        }

        if let Some(summary) = per_block.get_mut(&height) {
            summary.confirmed_txs += 1;
            summary.max_latency_ms = Some(
                summary
                    .max_latency_ms
                    .map_or(latency.latency_ms, |max| max.max(latency.latency_ms)),
            );
        }
        result.latencies.push(latency);
    }

    if let Some(window) = Window::of(&result.latencies) {
        if window.elapsed_ms().is_none() {
            result.warnings.push(IntegrityWarning::InvalidWindow {
                first_submit_ms: window.first_submit_ms,
                last_commit_ms: window.last_commit_ms,
            });
        }
    }

    result.blocks = per_block.into_values().collect();
    result
}
