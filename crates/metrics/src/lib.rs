//! Cosmbench Metrics
//!
//! Reconstructs per-transaction commit latency and aggregate throughput from
//! the spammer's submission log and the nodes' commit logs.
//!
//! # Pipeline
//!
//! 1. Extract [`SubmissionRecord`]s and a height-keyed [`BlockTable`] with
//!    `cosmbench-extract`.
//! 2. [`correlate`] joins them on exact commit height.
//! 3. [`Throughput`] and [`LatencySummary`] aggregate the joined records.
//! 4. [`Exporter`] writes JSON and CSV result files; [`MetricsReport`]
//!    prints a summary.
//!
//! [`SubmissionRecord`]: cosmbench_types::SubmissionRecord
//! [`BlockTable`]: cosmbench_types::BlockTable

pub mod correlate;
pub mod export;
pub mod latency;
pub mod report;
pub mod throughput;

pub use correlate::{correlate, BlockSummary, Correlation, IntegrityWarning};
pub use export::{ExportError, Exporter};
pub use latency::LatencySummary;
pub use report::MetricsReport;
pub use throughput::Throughput;
