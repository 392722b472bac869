//! Node-facing submission client.
//!
//! Each submission goes to one node, chosen round-robin by sequence index,
//! and resolves a commit height in priority order:
//!
//! 1. the height embedded in the broadcast acknowledgment,
//! 2. a query by transaction hash,
//! 3. the latest height in the node's own log (approximate).
//!
//! Every call appends exactly one record to the shared [`SubmissionSink`],
//! whatever the outcome.

mod types;

pub use types::{
    BroadcastTxRequest, BroadcastTxResponse, GetTxResponse, HeightSource, SubmissionOutcome,
    TxResponse,
};

use crate::config::{BenchConfig, BroadcastMode, NodeEndpoint};
use crate::sink::SubmissionSink;
use async_trait::async_trait;
use cosmbench_extract::latest_height_in_tail;
use cosmbench_types::{now_millis, BlockHeight, SubmissionRecord, TxIndex};
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

const BROADCAST_PATH: &str = "/cosmos/tx/v1beta1/txs";
const LATEST_BLOCK_PATH: &str = "/cosmos/base/tendermint/v1beta1/blocks/latest";

/// Errors talking to a node.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("No nodes configured")]
    NoNodes,

    #[error("Failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("Request to {url} failed: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("Malformed response from {url}: {source}")]
    Decode { url: String, source: reqwest::Error },

    #[error("Nodes not ready: {}", .0.join(", "))]
    NotReady(Vec<String>),
}

/// Performs one submission for a sequence index.
///
/// Implementations must not fail: problems are reported through the
/// returned [`SubmissionOutcome`].
#[async_trait]
pub trait Submitter: Send + Sync + 'static {
    async fn submit(&self, tx_idx: TxIndex, payload: &str) -> SubmissionOutcome;
}

/// HTTP client for a set of REST gateways.
pub struct NodeClient {
    http: reqwest::Client,
    nodes: Vec<NodeEndpoint>,
    mode: BroadcastMode,
    lookup_height: bool,
    tail_lines: usize,
    sink: Arc<SubmissionSink>,
}

impl NodeClient {
    /// Create a client for the configured nodes, logging to `sink`.
    pub fn new(config: &BenchConfig, sink: Arc<SubmissionSink>) -> Result<Self, ClientError> {
        if config.nodes.is_empty() {
            return Err(ClientError::NoNodes);
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(config.rate as usize)
            .build()
            .map_err(ClientError::Build)?;

        Ok(Self {
            http,
            nodes: config.nodes.clone(),
            mode: config.broadcast_mode,
            lookup_height: config.lookup_height,
            tail_lines: config.tail_lines,
            sink,
        })
    }

    /// The node assigned to a sequence index.
    pub fn node_for(&self, tx_idx: TxIndex) -> &NodeEndpoint {
        &self.nodes[tx_idx.slot(self.nodes.len()).unwrap_or_default()]
    }

    pub fn sink(&self) -> &Arc<SubmissionSink> {
        &self.sink
    }

    /// Submit a transaction and resolve its height, without logging it.
    pub async fn submit_and_resolve(
        &self,
        tx_idx: TxIndex,
        payload: &str,
    ) -> (SubmissionRecord, SubmissionOutcome) {
        let node = self.node_for(tx_idx);
        let record = SubmissionRecord::new(tx_idx, now_millis());

        let ack = match self.broadcast(node, payload).await {
            Ok(ack) => ack,
            Err(e) => {
                warn!(tx = %tx_idx, node = %node.rest_url, error = %e, "Submission failed");
                return (record, SubmissionOutcome::Failed(e.to_string()));
            }
        };

        let tx_hash = ack.tx_hash();
        let record = record.with_tx_hash(tx_hash.clone());

        if ack.is_rejected() {
            warn!(
                tx = %tx_idx,
                node = %node.rest_url,
                code = ack.code,
                codespace = %ack.codespace,
                reason = %ack.raw_log,
                "Transaction rejected"
            );
            let outcome = SubmissionOutcome::Rejected {
                code: ack.code,
                reason: ack.raw_log,
            };
            return (record, outcome);
        }

        if let Some(height) = ack.height() {
            return resolved(record, height, HeightSource::Ack);
        }

        if self.lookup_height {
            if let Some(hash) = &tx_hash {
                match self.lookup(node, hash).await {
                    Ok(Some(height)) => return resolved(record, height, HeightSource::Lookup),
                    Ok(None) => debug!(tx = %tx_idx, %hash, "Transaction not indexed yet"),
                    Err(e) => debug!(tx = %tx_idx, %hash, error = %e, "Height lookup failed"),
                }
            }
        }

        if let Some(height) = self.tail_height(node).await {
            return resolved(record, height, HeightSource::LogTail);
        }

        debug!(tx = %tx_idx, "No height resolved");
        (record, SubmissionOutcome::Unresolved)
    }

    async fn broadcast(
        &self,
        node: &NodeEndpoint,
        payload: &str,
    ) -> Result<TxResponse, ClientError> {
        let url = format!("{}{}", node.rest_url, BROADCAST_PATH);
        let request = BroadcastTxRequest {
            tx_bytes: payload,
            mode: self.mode,
        };

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|source| ClientError::Http {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status { url, status, body });
        }

        let body: BroadcastTxResponse = response
            .json()
            .await
            .map_err(|source| ClientError::Decode { url, source })?;
        Ok(body.tx_response)
    }

    /// Query a transaction's commit height by hash.
    ///
    /// Returns `Ok(None)` while the node does not know the transaction yet.
    pub async fn lookup(
        &self,
        node: &NodeEndpoint,
        hash: &str,
    ) -> Result<Option<BlockHeight>, ClientError> {
        let url = format!("{}{}/{}", node.rest_url, BROADCAST_PATH, hash);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| ClientError::Http {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status { url, status, body });
        }

        let body: GetTxResponse = response
            .json()
            .await
            .map_err(|source| ClientError::Decode { url, source })?;
        Ok(body.tx_response.height())
    }

    async fn tail_height(&self, node: &NodeEndpoint) -> Option<BlockHeight> {
        let path = node.log_path.clone()?;
        let lines = self.tail_lines;

        let result =
            tokio::task::spawn_blocking(move || latest_height_in_tail(&path, lines)).await;
        match result {
            Ok(Ok(height)) => height,
            Ok(Err(e)) => {
                warn!(node = %node.rest_url, error = %e, "Failed to read node log");
                None
            }
            Err(e) => {
                warn!(node = %node.rest_url, error = %e, "Node log reader panicked");
                None
            }
        }
    }

    /// Wait until every node answers its latest-block endpoint.
    pub async fn wait_for_ready(&self, timeout: Duration) -> Result<(), ClientError> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut pending: Vec<&NodeEndpoint> = self.nodes.iter().collect();

        loop {
            let mut still_pending = Vec::new();
            for node in pending {
                let url = format!("{}{}", node.rest_url, LATEST_BLOCK_PATH);
                match self.http.get(&url).send().await {
                    Ok(resp) if resp.status().is_success() => {
                        debug!(node = %node.rest_url, "Node ready");
                    }
                    Ok(resp) => {
                        debug!(node = %node.rest_url, status = %resp.status(), "Node not ready");
                        still_pending.push(node);
                    }
                    Err(e) => {
                        debug!(node = %node.rest_url, error = %e, "Node not reachable");
                        still_pending.push(node);
                    }
                }
            }

            if still_pending.is_empty() {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ClientError::NotReady(
                    still_pending.iter().map(|n| n.rest_url.clone()).collect(),
                ));
            }
            pending = still_pending;
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }
}

fn resolved(
    record: SubmissionRecord,
    height: BlockHeight,
    source: HeightSource,
) -> (SubmissionRecord, SubmissionOutcome) {
    (
        record.with_height(Some(height)),
        SubmissionOutcome::Resolved { height, source },
    )
}

#[async_trait]
impl Submitter for NodeClient {
    async fn submit(&self, tx_idx: TxIndex, payload: &str) -> SubmissionOutcome {
        let (record, outcome) = self.submit_and_resolve(tx_idx, payload).await;
        debug!(tx = %tx_idx, height = ?record.height, "Submitted");

        let sink = self.sink.clone();
        match tokio::task::spawn_blocking(move || sink.append(record)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(tx = %tx_idx, error = %e, "Failed to append submission record");
            }
            Err(e) => error!(tx = %tx_idx, error = %e, "Submission log writer panicked"),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ack(height: &str, hash: &str, code: u32) -> serde_json::Value {
        let (codespace, raw_log) = if code == 0 {
            ("", "")
        } else {
            ("sdk", "insufficient fees")
        };
        json!({
            "tx_response": {
                "height": height,
                "txhash": hash,
                "codespace": codespace,
                "code": code,
                "raw_log": raw_log,
            }
        })
    }

    struct Harness {
        client: NodeClient,
        _dir: TempDir,
        log: std::path::PathBuf,
    }

    fn harness(nodes: Vec<NodeEndpoint>) -> Harness {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("tx_log.txt");
        let sink = Arc::new(SubmissionSink::create(&log).unwrap());
        let config = BenchConfig::new(nodes).with_request_timeout(Duration::from_secs(2));
        Harness {
            client: NodeClient::new(&config, sink).unwrap(),
            _dir: dir,
            log,
        }
    }

    #[tokio::test]
    async fn test_height_from_ack() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(BROADCAST_PATH))
            .and(body_partial_json(json!({"tx_bytes": "AAAA", "mode": "BROADCAST_MODE_ASYNC"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(ack("15", "H1", 0)))
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(vec![NodeEndpoint::new(server.uri())]);
        let outcome = h.client.submit(TxIndex(0), "AAAA").await;

        assert_eq!(
            outcome,
            SubmissionOutcome::Resolved {
                height: BlockHeight(15),
                source: HeightSource::Ack
            }
        );
        let text = std::fs::read_to_string(&h.log).unwrap();
        assert!(text.starts_with("txIdx: 0 time: "));
        assert!(text.trim_end().ends_with("height: 15 hash: H1"));
    }

    #[tokio::test]
    async fn test_height_from_lookup() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(BROADCAST_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(ack("0", "ABC", 0)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{BROADCAST_PATH}/ABC")))
            .respond_with(ResponseTemplate::new(200).set_body_json(ack("42", "ABC", 0)))
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(vec![NodeEndpoint::new(server.uri())]);
        let (record, outcome) = h.client.submit_and_resolve(TxIndex(3), "AAAA").await;

        assert_eq!(record.height, Some(BlockHeight(42)));
        assert_eq!(record.tx_hash.as_deref(), Some("ABC"));
        assert_eq!(
            outcome,
            SubmissionOutcome::Resolved {
                height: BlockHeight(42),
                source: HeightSource::Lookup
            }
        );
    }

    #[tokio::test]
    async fn test_height_from_log_tail_when_lookup_misses() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(BROADCAST_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(ack("0", "ABC", 0)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{BROADCAST_PATH}/ABC")))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let mut node_log = NamedTempFile::new().unwrap();
        writeln!(node_log, "1000 INF committed state height=16 num_txs=3").unwrap();
        writeln!(node_log, "1001 INF \x1b[36mheight=\x1b[0m17 executed block").unwrap();

        let h = harness(vec![
            NodeEndpoint::new(server.uri()).with_log_path(node_log.path())
        ]);
        let outcome = h.client.submit(TxIndex(0), "AAAA").await;

        assert_eq!(
            outcome,
            SubmissionOutcome::Resolved {
                height: BlockHeight(17),
                source: HeightSource::LogTail
            }
        );
    }

    #[tokio::test]
    async fn test_zero_height_in_log_tail_is_unresolved() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(BROADCAST_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(ack("0", "", 0)))
            .mount(&server)
            .await;

        let mut node_log = NamedTempFile::new().unwrap();
        writeln!(node_log, "1000 INF starting state sync height=0").unwrap();

        let h = harness(vec![
            NodeEndpoint::new(server.uri()).with_log_path(node_log.path())
        ]);
        let outcome = h.client.submit(TxIndex(0), "AAAA").await;

        assert_eq!(outcome, SubmissionOutcome::Unresolved);
        let text = std::fs::read_to_string(&h.log).unwrap();
        assert!(text.trim_end().ends_with("height: unknown"));
    }

    #[tokio::test]
    async fn test_unresolved_without_fallbacks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ack("0", "", 0)))
            .mount(&server)
            .await;

        let h = harness(vec![NodeEndpoint::new(server.uri())]);
        let outcome = h.client.submit(TxIndex(0), "AAAA").await;

        assert_eq!(outcome, SubmissionOutcome::Unresolved);
        assert_eq!(h.client.sink().len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_transaction_recorded_unresolved() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ack("9", "BAD", 13)))
            .mount(&server)
            .await;

        let h = harness(vec![NodeEndpoint::new(server.uri())]);
        let outcome = h.client.submit(TxIndex(4), "AAAA").await;

        assert_eq!(
            outcome,
            SubmissionOutcome::Rejected {
                code: 13,
                reason: "insufficient fees".into()
            }
        );
        let store = h.client.sink().snapshot();
        assert_eq!(store.as_slice()[0].height, None);
        assert_eq!(store.as_slice()[0].tx_hash.as_deref(), Some("BAD"));
    }

    #[tokio::test]
    async fn test_http_error_still_records_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let h = harness(vec![NodeEndpoint::new(server.uri())]);
        let outcome = h.client.submit(TxIndex(7), "AAAA").await;

        assert!(matches!(outcome, SubmissionOutcome::Failed(ref msg) if msg.contains("500")));
        let text = std::fs::read_to_string(&h.log).unwrap();
        assert!(text.contains("txIdx: 7 "));
        assert!(text.contains("height: unknown"));
    }

    #[tokio::test]
    async fn test_malformed_ack_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let h = harness(vec![NodeEndpoint::new(server.uri())]);
        let outcome = h.client.submit(TxIndex(0), "AAAA").await;

        assert!(matches!(outcome, SubmissionOutcome::Failed(_)));
        assert_eq!(h.client.sink().len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_node_is_failure() {
        let h = harness(vec![NodeEndpoint::new("http://127.0.0.1:1")]);
        let outcome = h.client.submit(TxIndex(0), "AAAA").await;

        assert!(matches!(outcome, SubmissionOutcome::Failed(_)));
        assert_eq!(h.client.sink().len(), 1);
    }

    #[tokio::test]
    async fn test_round_robin_node_selection() {
        let first = MockServer::start().await;
        let second = MockServer::start().await;
        for server in [&first, &second] {
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(200).set_body_json(ack("3", "H", 0)))
                .expect(2)
                .mount(server)
                .await;
        }

        let h = harness(vec![
            NodeEndpoint::new(first.uri()),
            NodeEndpoint::new(second.uri()),
        ]);
        assert_eq!(h.client.node_for(TxIndex(5)).rest_url, second.uri());

        for i in 0..4 {
            h.client.submit(TxIndex(i), "AAAA").await;
        }
    }

    #[tokio::test]
    async fn test_wait_for_ready() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(LATEST_BLOCK_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"block": {}})))
            .mount(&server)
            .await;

        let h = harness(vec![NodeEndpoint::new(server.uri())]);
        h.client
            .wait_for_ready(Duration::from_secs(1))
            .await
            .unwrap();

        let down = harness(vec![NodeEndpoint::new("http://127.0.0.1:1")]);
        let err = down
            .client
            .wait_for_ready(Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NotReady(ref nodes) if nodes.len() == 1));
    }
}
