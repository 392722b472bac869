//! Types for REST gateway communication.

use crate::config::BroadcastMode;
use cosmbench_types::BlockHeight;
use serde::de::{Deserializer, Error as _};
use serde::{Deserialize, Serialize};

/// Request to broadcast a transaction.
#[derive(Debug, Serialize)]
pub struct BroadcastTxRequest<'a> {
    /// Encoded transaction bytes, passed through unchanged.
    pub tx_bytes: &'a str,
    pub mode: BroadcastMode,
}

/// Response from the broadcast endpoint.
#[derive(Debug, Deserialize)]
pub struct BroadcastTxResponse {
    pub tx_response: TxResponse,
}

/// Response from the transaction query endpoint.
#[derive(Debug, Deserialize)]
pub struct GetTxResponse {
    pub tx_response: TxResponse,
}

/// Acknowledgment fields the spammer cares about.
///
/// Fields a given broadcast mode does not populate come back as zero or
/// empty; the gateway encodes 64-bit integers as strings.
#[derive(Debug, Default, Deserialize)]
pub struct TxResponse {
    #[serde(default, deserialize_with = "u64_from_str_or_int")]
    pub height: u64,
    #[serde(default)]
    pub txhash: String,
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub codespace: String,
    #[serde(default)]
    pub raw_log: String,
}

impl TxResponse {
    /// Whether the node rejected the transaction at the application level.
    pub fn is_rejected(&self) -> bool {
        self.code != 0
    }

    pub fn height(&self) -> Option<BlockHeight> {
        BlockHeight::from_reported(self.height)
    }

    pub fn tx_hash(&self) -> Option<String> {
        (!self.txhash.is_empty()).then(|| self.txhash.clone())
    }
}

fn u64_from_str_or_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u64),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(n) => Ok(n),
        Raw::Str(s) if s.is_empty() => Ok(0),
        Raw::Str(s) => s.parse().map_err(D::Error::custom),
    }
}

/// Where a submission's commit height came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeightSource {
    /// The broadcast acknowledgment carried the height.
    Ack,
    /// A follow-up query by transaction hash.
    Lookup,
    /// The latest height in the node's log at submission time.
    LogTail,
}

/// Result of one submission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// Accepted, with a commit height.
    Resolved {
        height: BlockHeight,
        source: HeightSource,
    },
    /// Accepted, but no height could be resolved.
    Unresolved,
    /// The node returned a non-zero result code.
    Rejected { code: u32, reason: String },
    /// Transport or decoding failure.
    Failed(String),
}
