//! JSON and CSV result files.
//!
//! Each result set is written twice into the output directory, as
//! `<name>.json` (pretty-printed, camelCase keys) and `<name>.csv`
//! (header row first):
//!
//! | name                 | rows                                   |
//! |----------------------|----------------------------------------|
//! | `latency`            | one per confirmed submission           |
//! | `block_transactions` | one per committed block                |
//! | `tps`                | a single throughput row                |
//! | `tx_log`             | one per submission record              |

use crate::correlate::{BlockSummary, Correlation};
use crate::throughput::Throughput;
use cosmbench_types::{LatencyRecord, SubmissionRecord};
use serde::Serialize;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub const LATENCY: &str = "latency";
pub const BLOCK_TRANSACTIONS: &str = "block_transactions";
pub const TPS: &str = "tps";
pub const TX_LOG: &str = "tx_log";

/// Errors while writing result files.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to create output directory {}: {source}", .path.display())]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("Failed to write {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("Failed to encode {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to write {}: {source}", .path.display())]
    Csv { path: PathBuf, source: csv::Error },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LatencyRow {
    tx_idx: u64,
    timestamp: i64,
    height: u64,
    latency: i64,
}

impl From<&LatencyRecord> for LatencyRow {
    fn from(r: &LatencyRecord) -> Self {
        Self {
            tx_idx: r.tx_idx.0,
            timestamp: r.submitted_at_ms,
            height: r.height.0,
            latency: r.latency_ms,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BlockRow {
    height: u64,
    transaction_count: u64,
    reported_num_txs: Option<u64>,
    committed_at: i64,
    max_latency: Option<i64>,
}

impl From<&BlockSummary> for BlockRow {
    fn from(b: &BlockSummary) -> Self {
        Self {
            height: b.height.0,
            transaction_count: b.confirmed_txs,
            reported_num_txs: b.reported_num_txs,
            committed_at: b.committed_at_ms,
            max_latency: b.max_latency_ms,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TpsRow {
    status: &'static str,
    total_txs: u64,
    first_tx_timestamp: Option<i64>,
    last_tx_timestamp: Option<i64>,
    total_elapsed_time: Option<i64>,
    tps: Option<f64>,
}

impl From<&Throughput> for TpsRow {
    fn from(t: &Throughput) -> Self {
        match *t {
            Throughput::NoData => Self {
                status: "no_data",
                total_txs: 0,
                first_tx_timestamp: None,
                last_tx_timestamp: None,
                total_elapsed_time: None,
                tps: None,
            },
            Throughput::Unbounded { confirmed } => Self {
                status: "unbounded",
                total_txs: confirmed,
                first_tx_timestamp: None,
                last_tx_timestamp: None,
                total_elapsed_time: Some(0),
                tps: None,
            },
            Throughput::Measured {
                confirmed,
                first_submit_ms,
                last_commit_ms,
                elapsed_ms,
                tps,
            } => Self {
                status: "measured",
                total_txs: confirmed,
                first_tx_timestamp: Some(first_submit_ms),
                last_tx_timestamp: Some(last_commit_ms),
                total_elapsed_time: Some(elapsed_ms),
                tps: Some(tps),
            },
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TxLogRow<'a> {
    tx_idx: u64,
    timestamp: i64,
    height: Option<u64>,
    tx_hash: Option<&'a str>,
}

impl<'a> From<&'a SubmissionRecord> for TxLogRow<'a> {
    fn from(r: &'a SubmissionRecord) -> Self {
        Self {
            tx_idx: r.tx_idx.0,
            timestamp: r.submitted_at_ms,
            height: r.height.map(|h| h.0),
            tx_hash: r.tx_hash.as_deref(),
        }
    }
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ExportError> {
    let json = serde_json::to_string_pretty(value).map_err(|source| ExportError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_csv<I>(path: &Path, headers: &[&str], rows: I) -> Result<(), ExportError>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let csv_err = |source| ExportError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = csv::Writer::from_writer(file);

    writer.write_record(headers).map_err(csv_err)?;
    for row in rows {
        writer.write_record(&row).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes result files into one directory.
pub struct Exporter {
    out_dir: PathBuf,
}

impl Exporter {
    /// Create the output directory if needed.
    pub fn new(out_dir: impl Into<PathBuf>) -> Result<Self, ExportError> {
        let out_dir = out_dir.into();
        fs::create_dir_all(&out_dir).map_err(|source| ExportError::CreateDir {
            path: out_dir.clone(),
            source,
        })?;
        Ok(Self { out_dir })
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    fn paths(&self, name: &str) -> (PathBuf, PathBuf) {
        (
            self.out_dir.join(format!("{name}.json")),
            self.out_dir.join(format!("{name}.csv")),
        )
    }

    /// Per-transaction latencies.
    pub fn latency(&self, records: &[LatencyRecord]) -> Result<(), ExportError> {
        let (json, csv) = self.paths(LATENCY);
        let rows: Vec<LatencyRow> = records.iter().map(LatencyRow::from).collect();
        write_json(&json, &rows)?;
        write_csv(
            &csv,
            &["TxIdx", "Timestamp", "Height", "Latency"],
            rows.iter().map(|r| {
                vec![
                    r.tx_idx.to_string(),
                    r.timestamp.to_string(),
                    r.height.to_string(),
                    r.latency.to_string(),
                ]
            }),
        )
    }

    /// Confirmed transactions per block.
    pub fn block_transactions(&self, blocks: &[BlockSummary]) -> Result<(), ExportError> {
        let (json, csv) = self.paths(BLOCK_TRANSACTIONS);
        let rows: Vec<BlockRow> = blocks.iter().map(BlockRow::from).collect();
        write_json(&json, &rows)?;
        write_csv(
            &csv,
            &[
                "Height",
                "TransactionCount",
                "ReportedNumTxs",
                "CommittedAt",
                "MaxLatency",
            ],
            rows.iter().map(|r| {
                vec![
                    r.height.to_string(),
                    r.transaction_count.to_string(),
                    opt(r.reported_num_txs),
                    r.committed_at.to_string(),
                    opt(r.max_latency),
                ]
            }),
        )
    }

    /// Aggregate throughput.
    pub fn tps(&self, throughput: &Throughput) -> Result<(), ExportError> {
        let (json, csv) = self.paths(TPS);
        let row = TpsRow::from(throughput);
        write_json(&json, &row)?;
        write_csv(
            &csv,
            &[
                "Status",
                "TotalTxs",
                "FirstTxTimestamp",
                "LastTxTimestamp",
                "TotalElapsedTime",
                "TPS",
            ],
            [vec![
                row.status.to_string(),
                row.total_txs.to_string(),
                opt(row.first_tx_timestamp),
                opt(row.last_tx_timestamp),
                opt(row.total_elapsed_time),
                row.tps.map(|t| format!("{t:.2}")).unwrap_or_default(),
            ]],
        )
    }

    /// Every submission record as parsed from the submission log.
    pub fn tx_log(&self, submissions: &[SubmissionRecord]) -> Result<(), ExportError> {
        let (json, csv) = self.paths(TX_LOG);
        let rows: Vec<TxLogRow<'_>> = submissions.iter().map(TxLogRow::from).collect();
        write_json(&json, &rows)?;
        write_csv(
            &csv,
            &["TxIdx", "Timestamp", "Height", "TxHash"],
            rows.iter().map(|r| {
                vec![
                    r.tx_idx.to_string(),
                    r.timestamp.to_string(),
                    opt(r.height),
                    r.tx_hash.unwrap_or_default().to_string(),
                ]
            }),
        )
    }

    /// Write all four result sets.
    pub fn write_all(
        &self,
        submissions: &[SubmissionRecord],
        correlation: &Correlation,
    ) -> Result<(), ExportError> {
        self.latency(&correlation.latencies)?;
        self.block_transactions(&correlation.blocks)?;
        self.tps(&correlation.throughput())?;
        self.tx_log(submissions)?;
        info!(dir = %self.out_dir.display(), "Wrote result files");
        Ok(())
    }
}
