//! Cosmbench Transaction Spammer
//!
//! Submits pre-encoded transactions to a cluster of nodes at a fixed rate and
//! records one line per attempt in a submission log, for later correlation
//! with node commit logs by `cosmbench-metrics`.
//!
//! # Example
//!
//! ```ignore
//! use cosmbench_spammer::{BenchConfig, Dispatcher, NodeClient, NodeEndpoint, SubmissionSink};
//! use std::sync::Arc;
//!
//! let config = BenchConfig::new(vec![NodeEndpoint::new("http://127.0.0.1:1317")])
//!     .with_rate(200);
//! let sink = Arc::new(SubmissionSink::create("tx_log.txt".as_ref())?);
//! let client = Arc::new(NodeClient::new(&config, sink)?);
//!
//! let report = Dispatcher::new(client, &config).run(txs).await;
//! report.print();
//! ```

pub mod client;
pub mod config;
pub mod loader;
pub mod report;
pub mod runner;
pub mod sink;

pub use client::{ClientError, HeightSource, NodeClient, SubmissionOutcome, Submitter};
pub use config::{BenchConfig, BroadcastMode, ConfigError, FileConfig, NodeEndpoint};
pub use loader::{load_transactions, LoadError};
pub use report::CampaignReport;
pub use runner::Dispatcher;
pub use sink::{SinkError, SubmissionSink};
