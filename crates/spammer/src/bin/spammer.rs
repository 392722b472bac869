//! Cosmbench Transaction Spammer CLI
//!
//! Sends pre-encoded transactions to a set of nodes at a fixed rate.

use anyhow::Context;
use clap::{Parser, Subcommand};
use cosmbench_spammer::{
    load_transactions, BenchConfig, BroadcastMode, Dispatcher, FileConfig, NodeClient,
    NodeEndpoint, SubmissionSink,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cosmbench-spammer")]
#[command(about = "Rate-controlled transaction spammer for Cosmos-SDK benchmark clusters")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit encoded transactions to the network
    Run {
        /// Directory with one encoded transaction per file
        #[arg(long)]
        tx_dir: PathBuf,

        /// Node configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// REST endpoints (comma-separated); overrides the config file
        #[arg(short, long, value_delimiter = ',')]
        endpoints: Vec<String>,

        /// Node log files (comma-separated), matched to endpoints by position
        #[arg(long, value_delimiter = ',')]
        node_logs: Vec<PathBuf>,

        /// Target transactions per second
        #[arg(long)]
        tps: Option<u64>,

        /// Duration to run (e.g., "30s", "5m")
        #[arg(short, long)]
        duration: Option<humantime::Duration>,

        /// Broadcast mode (async, sync, block)
        #[arg(long)]
        mode: Option<BroadcastMode>,

        /// Per-request timeout (e.g., "10s")
        #[arg(long)]
        request_timeout: Option<humantime::Duration>,

        /// Skip the follow-up height query by transaction hash
        #[arg(long)]
        no_lookup: bool,

        /// Submission log to write
        #[arg(short, long, default_value = "tx_log.txt")]
        output: PathBuf,

        /// Wait for nodes to be ready before starting
        #[arg(long)]
        wait_ready: bool,
    },

    /// Check that every node answers
    Probe {
        /// Node configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// REST endpoints (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        endpoints: Vec<String>,

        /// How long to keep trying
        #[arg(long, default_value = "10s")]
        timeout: humantime::Duration,
    },
}

fn base_config(config: Option<PathBuf>, endpoints: Vec<String>) -> anyhow::Result<BenchConfig> {
    let mut bench = match config {
        Some(path) => FileConfig::load(&path)?.into_config()?,
        None => BenchConfig::new(Vec::new()),
    };
    if !endpoints.is_empty() {
        bench.nodes = endpoints.into_iter().map(NodeEndpoint::new).collect();
    }
    Ok(bench)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            tx_dir,
            config,
            endpoints,
            node_logs,
            tps,
            duration,
            mode,
            request_timeout,
            no_lookup,
            output,
            wait_ready,
        } => {
            let mut bench = base_config(config, endpoints)?;
            for (node, log) in bench.nodes.iter_mut().zip(node_logs) {
                node.log_path = Some(log);
            }
            if let Some(tps) = tps {
                bench.rate = tps;
            }
            if let Some(duration) = duration {
                bench.duration = *duration;
            }
            if let Some(mode) = mode {
                bench.broadcast_mode = mode;
            }
            if let Some(timeout) = request_timeout {
                bench.request_timeout = *timeout;
            }
            if no_lookup {
                bench.lookup_height = false;
            }
            bench.validate()?;

            let txs = load_transactions(&tx_dir)?;
            println!("Loaded {} transactions", txs.len());

            let sink = Arc::new(
                SubmissionSink::create(&output)
                    .with_context(|| format!("opening {}", output.display()))?,
            );
            let client = Arc::new(NodeClient::new(&bench, sink.clone())?);

            if wait_ready {
                println!("Waiting for nodes to be ready...");
                client.wait_for_ready(Duration::from_secs(60)).await?;
                println!("All nodes ready.");
            }

            let shutdown = CancellationToken::new();
            let on_signal = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, finishing current tick");
                    on_signal.cancel();
                }
            });

            info!(
                nodes = bench.nodes.len(),
                tps = bench.rate,
                duration = ?bench.duration,
                mode = %bench.broadcast_mode,
                "Starting spammer"
            );
            let report = Dispatcher::new(client, &bench)
                .with_shutdown(shutdown)
                .run(txs)
                .await;

            report.print();
            println!(
                "\nSubmission log: {} ({} records)",
                output.display(),
                sink.len()
            );
        }

        Commands::Probe {
            config,
            endpoints,
            timeout,
        } => {
            let bench = base_config(config, endpoints)?;
            bench.validate()?;
            let sink = Arc::new(SubmissionSink::from_writer(std::io::sink()));
            let client = NodeClient::new(&bench, sink)?;
            client.wait_for_ready(*timeout).await?;
            println!("All {} nodes ready.", bench.nodes.len());
        }
    }

    Ok(())
}
