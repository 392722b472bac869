//! Cosmbench Metrics CLI
//!
//! Correlates a submission log with node commit logs and reports latency and
//! throughput.

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use cosmbench_extract::{
    find_node_logs, read_commit_logs, read_submission_log, CommitPattern, DEFAULT_COMMIT_MARKER,
};
use cosmbench_metrics::{correlate, Exporter, MetricsReport};
use cosmbench_types::MergePolicy;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, ValueEnum)]
enum MergeArg {
    /// Keep the first commit line seen for a height
    FirstSeen,
    /// Keep the last commit line seen for a height
    LastWrite,
}

impl From<MergeArg> for MergePolicy {
    fn from(arg: MergeArg) -> Self {
        match arg {
            MergeArg::FirstSeen => MergePolicy::FirstSeenWins,
            MergeArg::LastWrite => MergePolicy::LastWriteWins,
        }
    }
}

#[derive(Parser)]
#[command(name = "cosmbench-metrics")]
#[command(about = "Compute commit latency and throughput from benchmark logs")]
#[command(version)]
struct Cli {
    /// Submission log written by the spammer
    #[arg(long, default_value = "tx_log.txt")]
    tx_log: PathBuf,

    /// Node log file (repeatable; read in the given order)
    #[arg(long = "node-log")]
    node_logs: Vec<PathBuf>,

    /// Directory to scan for node logs
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// File name prefix of node logs in --log-dir
    #[arg(long, default_value = "output")]
    log_prefix: String,

    /// Substring identifying commit lines
    #[arg(long, default_value = DEFAULT_COMMIT_MARKER)]
    commit_marker: String,

    /// Treat every line with a height as a commit line
    #[arg(long, conflicts_with = "commit_marker")]
    any_line: bool,

    /// How to resolve repeated commit lines for one height
    #[arg(long, value_enum, default_value = "first-seen")]
    merge_policy: MergeArg,

    /// Directory for JSON and CSV results
    #[arg(short, long, default_value = "results")]
    out_dir: PathBuf,

    /// Print the summary only
    #[arg(long)]
    no_export: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut node_logs = cli.node_logs;
    if let Some(dir) = &cli.log_dir {
        let found = find_node_logs(dir, &cli.log_prefix)?;
        info!(dir = %dir.display(), logs = found.len(), "Found node logs");
        node_logs.extend(found);
    }
    if node_logs.is_empty() {
        bail!("no node logs given; use --node-log or --log-dir");
    }

    let pattern = if cli.any_line {
        CommitPattern::any_line()
    } else {
        CommitPattern::with_marker(cli.commit_marker)
    };

    let submissions = read_submission_log(&cli.tx_log)
        .with_context(|| format!("reading submission log {}", cli.tx_log.display()))?;
    let blocks = read_commit_logs(&node_logs, &pattern, cli.merge_policy.into())
        .context("reading node logs")?;

    let correlation = correlate(&submissions, &blocks);
    let report = MetricsReport::new(
        &correlation,
        submissions.len(),
        blocks.len(),
        blocks.duplicates(),
    );

    if !cli.no_export {
        let exporter = Exporter::new(&cli.out_dir)?;
        exporter.write_all(&submissions, &correlation)?;
        println!("Results written to {}", exporter.out_dir().display());
    }

    report.print();
    Ok(())
}
