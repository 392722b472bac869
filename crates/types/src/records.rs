//! Submission, block-commit and derived latency records.

use crate::{BlockHeight, TxIndex};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// One dispatch attempt, as written to the submission log.
///
/// Created once per attempt by the submission that owns it and never
/// modified after it has been appended to a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    /// Sequence index assigned by the dispatcher.
    pub tx_idx: TxIndex,

    /// Unix timestamp (milliseconds) taken right before the request was sent.
    pub submitted_at_ms: i64,

    /// Commit height, if one could be resolved.
    pub height: Option<BlockHeight>,

    /// Transaction hash reported by the node, if any.
    pub tx_hash: Option<String>,
}

impl SubmissionRecord {
    /// Create an unresolved record.
    pub fn new(tx_idx: TxIndex, submitted_at_ms: i64) -> Self {
        Self {
            tx_idx,
            submitted_at_ms,
            height: None,
            tx_hash: None,
        }
    }

    /// Set the resolved commit height.
    pub fn with_height(mut self, height: Option<BlockHeight>) -> Self {
        self.height = height;
        self
    }

    /// Set the transaction hash.
    pub fn with_tx_hash(mut self, tx_hash: Option<String>) -> Self {
        self.tx_hash = tx_hash;
        self
    }

    /// Whether a commit height was resolved for this attempt.
    pub fn is_resolved(&self) -> bool {
        self.height.is_some()
    }
}

/// A block-commit event observed in a node log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    /// Committed height (unique key).
    pub height: BlockHeight,

    /// Unix timestamp (milliseconds) of the commit line.
    pub committed_at_ms: i64,

    /// Number of transactions the node reported for this block.
    pub num_txs: Option<u64>,
}

impl BlockRecord {
    pub fn new(height: BlockHeight, committed_at_ms: i64, num_txs: Option<u64>) -> Self {
        Self {
            height,
            committed_at_ms,
            num_txs,
        }
    }

    /// Whether `other` describes the same block with incompatible contents.
    ///
    /// Commit timestamps legitimately differ between nodes; the reported
    /// transaction count must not.
    pub fn conflicts_with(&self, other: &BlockRecord) -> bool {
        self.height == other.height
            && matches!((self.num_txs, other.num_txs), (Some(a), Some(b)) if a != b)
    }
}

/// Commit latency of one confirmed submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyRecord {
    pub tx_idx: TxIndex,
    pub submitted_at_ms: i64,
    pub height: BlockHeight,
    /// `committed_at_ms - submitted_at_ms`. Negative values indicate clock
    /// skew or a mismatched join and are kept as-is.
    pub latency_ms: i64,
}

impl LatencyRecord {
    /// Join a submission with the block it committed in.
    ///
    /// Returns `None` when the latency does not fit in an `i64`, which only
    /// happens with corrupt timestamps.
    pub fn join(submission: &SubmissionRecord, block: &BlockRecord) -> Option<Self> {
        let latency_ms = block
            .committed_at_ms
            .checked_sub(submission.submitted_at_ms)?;
        Some(Self {
            tx_idx: submission.tx_idx,
            submitted_at_ms: submission.submitted_at_ms,
            height: block.height,
            latency_ms,
        })
    }

    /// Commit timestamp of the joined block.
    pub fn committed_at_ms(&self) -> Option<i64> {
        self.submitted_at_ms.checked_add(self.latency_ms)
    }

    pub fn is_negative(&self) -> bool {
        self.latency_ms < 0
    }
}

/// Milliseconds since the Unix epoch for `time`.
pub fn unix_millis(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_millis() as i64,
        Err(e) => -(e.duration().as_millis() as i64),
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    unix_millis(SystemTime::now())
}
