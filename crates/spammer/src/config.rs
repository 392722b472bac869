//! Spammer configuration.

use cosmbench_extract::DEFAULT_TAIL_LINES;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// How long the node waits before acknowledging a broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BroadcastMode {
    /// Return immediately after the node accepts the bytes.
    #[default]
    #[serde(rename = "BROADCAST_MODE_ASYNC", alias = "async")]
    Async,

    /// Return after the local mempool check.
    #[serde(rename = "BROADCAST_MODE_SYNC", alias = "sync")]
    Sync,

    /// Return after the transaction is committed.
    #[serde(rename = "BROADCAST_MODE_BLOCK", alias = "block")]
    Block,
}

impl BroadcastMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BroadcastMode::Async => "BROADCAST_MODE_ASYNC",
            BroadcastMode::Sync => "BROADCAST_MODE_SYNC",
            BroadcastMode::Block => "BROADCAST_MODE_BLOCK",
        }
    }
}

impl fmt::Display for BroadcastMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BroadcastMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "async" | "broadcast_mode_async" => Ok(BroadcastMode::Async),
            "sync" | "broadcast_mode_sync" => Ok(BroadcastMode::Sync),
            "block" | "commit" | "broadcast_mode_block" => Ok(BroadcastMode::Block),
            _ => Err(ConfigError::UnknownBroadcastMode(s.to_string())),
        }
    }
}

/// A node the spammer submits to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEndpoint {
    /// Base URL of the node's REST gateway, e.g. `http://127.0.0.1:1317`.
    pub rest_url: String,

    /// The node's own log, used as a last resort to resolve commit heights.
    #[serde(default)]
    pub log_path: Option<PathBuf>,
}

impl NodeEndpoint {
    pub fn new(rest_url: impl Into<String>) -> Self {
        Self {
            rest_url: rest_url.into().trim_end_matches('/').to_string(),
            log_path: None,
        }
    }

    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }
}

/// Configuration for a spam campaign.
///
/// Built once and shared read-only by the dispatcher and the client.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Nodes to submit to, selected round-robin by transaction index.
    pub nodes: Vec<NodeEndpoint>,

    /// Transactions launched per tick.
    pub rate: u64,

    /// Overall time budget of the campaign.
    pub duration: Duration,

    /// Length of one scheduling tick.
    pub tick_interval: Duration,

    /// Broadcast mode sent with every transaction.
    pub broadcast_mode: BroadcastMode,

    /// Timeout for each HTTP request.
    pub request_timeout: Duration,

    /// Query the node by hash when the acknowledgment carries no height.
    pub lookup_height: bool,

    /// Number of node log lines inspected for the fallback height.
    pub tail_lines: usize,
}

impl BenchConfig {
    /// Create a configuration with defaults for everything but the node list.
    pub fn new(nodes: Vec<NodeEndpoint>) -> Self {
        Self {
            nodes,
            rate: 100,
            duration: Duration::from_secs(60),
            tick_interval: Duration::from_secs(1),
            broadcast_mode: BroadcastMode::default(),
            request_timeout: Duration::from_secs(30),
            lookup_height: true,
            tail_lines: DEFAULT_TAIL_LINES,
        }
    }

    /// Set the target rate (transactions per tick).
    pub fn with_rate(mut self, rate: u64) -> Self {
        self.rate = rate;
        self
    }

    /// Set the campaign duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Set the tick length.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Set the broadcast mode.
    pub fn with_broadcast_mode(mut self, mode: BroadcastMode) -> Self {
        self.broadcast_mode = mode;
        self
    }

    /// Set the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Enable or disable the follow-up height lookup.
    pub fn with_height_lookup(mut self, enabled: bool) -> Self {
        self.lookup_height = enabled;
        self
    }

    /// Set how many node log lines the fallback inspects.
    pub fn with_tail_lines(mut self, lines: usize) -> Self {
        self.tail_lines = lines;
        self
    }

    /// Number of ticks that fit in the campaign duration (rounded up).
    pub fn max_ticks(&self) -> u64 {
        let tick = self.tick_interval.as_nanos();
        if tick == 0 {
            return 0;
        }
        self.duration.as_nanos().div_ceil(tick) as u64
    }

    /// Reject configurations that cannot run a campaign.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nodes.is_empty() {
            return Err(ConfigError::NoNodes);
        }
        if let Some(node) = self.nodes.iter().find(|n| n.rest_url.is_empty()) {
            return Err(ConfigError::InvalidNode(node.rest_url.clone()));
        }
        if self.rate == 0 {
            return Err(ConfigError::ZeroRate);
        }
        if self.duration.is_zero() {
            return Err(ConfigError::ZeroDuration);
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::ZeroTickInterval);
        }
        Ok(())
    }
}

/// On-disk configuration (TOML).
///
/// ```toml
/// rate = 200
/// duration = "2m"
/// broadcast_mode = "async"
///
/// [[nodes]]
/// rest_url = "http://127.0.0.1:22200"
/// log_path = "output0.log"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub nodes: Vec<NodeEndpoint>,
    pub rate: Option<u64>,
    pub duration: Option<String>,
    pub tick_interval: Option<String>,
    pub broadcast_mode: Option<BroadcastMode>,
    pub request_timeout: Option<String>,
    pub lookup_height: Option<bool>,
    pub tail_lines: Option<usize>,
}

impl FileConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parse TOML text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Apply file values on top of the defaults.
    pub fn into_config(self) -> Result<BenchConfig, ConfigError> {
        let nodes = self
            .nodes
            .into_iter()
            .map(|n| NodeEndpoint {
                rest_url: n.rest_url.trim_end_matches('/').to_string(),
                log_path: n.log_path,
            })
            .collect();
        let mut config = BenchConfig::new(nodes);

        if let Some(rate) = self.rate {
            config.rate = rate;
        }
        if let Some(d) = self.duration {
            config.duration = parse_duration(&d)?;
        }
        if let Some(d) = self.tick_interval {
            config.tick_interval = parse_duration(&d)?;
        }
        if let Some(mode) = self.broadcast_mode {
            config.broadcast_mode = mode;
        }
        if let Some(d) = self.request_timeout {
            config.request_timeout = parse_duration(&d)?;
        }
        if let Some(lookup) = self.lookup_height {
            config.lookup_height = lookup;
        }
        if let Some(lines) = self.tail_lines {
            config.tail_lines = lines;
        }
        Ok(config)
    }
}

fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(s).map_err(|e| ConfigError::InvalidDuration(s.to_string(), e))
}

/// Configuration errors. All of them abort before any dispatch.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No nodes configured")]
    NoNodes,

    #[error("Invalid node endpoint: {0:?}")]
    InvalidNode(String),

    #[error("Rate must be greater than zero")]
    ZeroRate,

    #[error("Duration must be greater than zero")]
    ZeroDuration,

    #[error("Tick interval must be greater than zero")]
    ZeroTickInterval,

    #[error("Unknown broadcast mode: {0}")]
    UnknownBroadcastMode(String),

    #[error("Invalid duration {0:?}: {1}")]
    InvalidDuration(String, humantime::DurationError),

    #[error("Failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
