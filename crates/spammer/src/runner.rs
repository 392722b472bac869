//! Rate-controlled dispatcher.
//!
//! Time is divided into fixed ticks. Each tick launches up to `rate`
//! submissions concurrently, waits for all of them, then sleeps for whatever
//! is left of the tick. A batch that overruns its tick is followed
//! immediately by the next one; missed capacity is never made up, so the
//! rate degrades under overload instead of bursting.

use crate::client::{SubmissionOutcome, Submitter};
use crate::config::BenchConfig;
use crate::report::CampaignReport;
use cosmbench_types::TxIndex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Drives a campaign against a [`Submitter`].
pub struct Dispatcher<S> {
    submitter: Arc<S>,
    rate: usize,
    max_ticks: u64,
    tick_interval: Duration,
    shutdown: CancellationToken,
}

impl<S: Submitter> Dispatcher<S> {
    /// Create a dispatcher using the rate and timing from `config`.
    pub fn new(submitter: Arc<S>, config: &BenchConfig) -> Self {
        Self {
            submitter,
            rate: config.rate as usize,
            max_ticks: config.max_ticks(),
            tick_interval: config.tick_interval,
            shutdown: CancellationToken::new(),
        }
    }

    /// Stop at the next tick boundary once `token` is cancelled.
    ///
    /// In-flight submissions always run to completion.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Submit `txs` in input order until they run out or the time budget ends.
    pub async fn run(&self, txs: Vec<String>) -> CampaignReport {
        let total = txs.len();
        let txs = Arc::new(txs);
        let mut report = CampaignReport::new(total);
        let started = Instant::now();

        info!(
            txs = total,
            rate = self.rate,
            max_ticks = self.max_ticks,
            "Starting campaign"
        );

        for tick in 0..self.max_ticks {
            if self.shutdown.is_cancelled() {
                info!(tick, "Shutdown requested, stopping campaign");
                report.cancelled = true;
                break;
            }

            let batch = self.rate.min(total - report.sent);
            if batch == 0 {
                break;
            }

            let tick_start = Instant::now();
            let first = report.sent;
            self.run_batch(&txs, first..first + batch, &mut report).await;
            report.sent += batch;
            report.ticks += 1;

            let elapsed = tick_start.elapsed();
            debug!(tick, batch, first, ?elapsed, "Tick complete");

            if elapsed > self.tick_interval {
                report.overloaded_ticks += 1;
                warn!(tick, ?elapsed, interval = ?self.tick_interval, "Batch overran tick");
            }

            if report.sent == total || tick + 1 == self.max_ticks {
                break;
            }

            if elapsed < self.tick_interval {
                tokio::select! {
                    _ = tokio::time::sleep(self.tick_interval - elapsed) => {}
                    _ = self.shutdown.cancelled() => {}
                }
            }
        }

        report.elapsed = started.elapsed();
        info!(
            sent = report.sent,
            input = total,
            ticks = report.ticks,
            resolved = report.resolved(),
            unconfirmed = report.unconfirmed(),
            "Campaign finished"
        );
        report
    }

    /// Launch one submission per index and wait for all of them.
    async fn run_batch(
        &self,
        txs: &Arc<Vec<String>>,
        indices: std::ops::Range<usize>,
        report: &mut CampaignReport,
    ) {
        let mut tasks = JoinSet::new();
        for i in indices {
            let submitter = self.submitter.clone();
            let txs = txs.clone();
            tasks.spawn(async move { submitter.submit(TxIndex(i as u64), &txs[i]).await });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => report.record(&outcome),
                Err(e) => {
                    warn!(error = %e, "Submission task aborted");
                    report.record(&SubmissionOutcome::Failed(e.to_string()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::HeightSource;
    use crate::config::NodeEndpoint;
    use async_trait::async_trait;
    use cosmbench_types::BlockHeight;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records calls; optionally slow or failing.
    #[derive(Default)]
    struct FakeSubmitter {
        calls: Mutex<Vec<(u64, String, Instant)>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        delay: Duration,
        fail_every: Option<u64>,
    }

    #[async_trait]
    impl Submitter for FakeSubmitter {
        async fn submit(&self, tx_idx: TxIndex, payload: &str) -> SubmissionOutcome {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.calls
                .lock()
                .push((tx_idx.0, payload.to_string(), Instant::now()));

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match self.fail_every {
                Some(n) if tx_idx.0 % n == 0 => {
                    SubmissionOutcome::Failed("connection reset".into())
                }
                _ => SubmissionOutcome::Resolved {
                    height: BlockHeight(tx_idx.0 + 1),
                    source: HeightSource::Ack,
                },
            }
        }
    }

    fn config(rate: u64, secs: u64) -> BenchConfig {
        BenchConfig::new(vec![NodeEndpoint::new("http://node")])
            .with_rate(rate)
            .with_duration(Duration::from_secs(secs))
    }

    fn pool(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("tx-{i}")).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_pool_exhausted() {
        let fake = Arc::new(FakeSubmitter::default());
        let dispatcher = Dispatcher::new(fake.clone(), &config(5, 3));

        let report = dispatcher.run(pool(10)).await;

        assert_eq!(report.sent, 10);
        assert_eq!(report.ticks, 2);
        assert_eq!(report.resolved(), 10);
        assert!(report.elapsed >= Duration::from_secs(1));
        assert!(report.elapsed < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_time_budget_exhausted() {
        let fake = Arc::new(FakeSubmitter::default());
        let dispatcher = Dispatcher::new(fake.clone(), &config(5, 3));

        let report = dispatcher.run(pool(100)).await;

        assert_eq!(report.sent, 15);
        assert_eq!(report.ticks, 3);
        assert_eq!(report.not_sent(), 85);
        assert!(report.elapsed >= Duration::from_secs(2));
        assert!(report.elapsed < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_indices_follow_input_order() {
        let fake = Arc::new(FakeSubmitter::default());
        let dispatcher = Dispatcher::new(fake.clone(), &config(4, 10));

        dispatcher.run(pool(10)).await;

        let mut calls = fake.calls.lock().clone();
        calls.sort_by_key(|(idx, _, _)| *idx);
        for (i, (idx, payload, _)) in calls.iter().enumerate() {
            assert_eq!(*idx, i as u64);
            assert_eq!(payload, &format!("tx-{i}"));
        }
        assert_eq!(calls.len(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_are_paced_and_never_overlap() {
        let fake = Arc::new(FakeSubmitter {
            delay: Duration::from_millis(300),
            ..Default::default()
        });
        let dispatcher = Dispatcher::new(fake.clone(), &config(3, 5));
        let start = Instant::now();

        let report = dispatcher.run(pool(9)).await;

        assert_eq!(report.ticks, 3);
        assert_eq!(report.overloaded_ticks, 0);
        assert!(fake.max_in_flight.load(Ordering::SeqCst) <= 3);

        // batches start one tick apart
        let calls = fake.calls.lock().clone();
        for (idx, _, at) in calls {
            let tick = idx / 3;
            let offset = at.duration_since(start);
            assert!(offset >= Duration::from_secs(tick));
            assert!(offset < Duration::from_secs(tick) + Duration::from_millis(100));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_overloaded_tick_has_no_catch_up() {
        let fake = Arc::new(FakeSubmitter {
            delay: Duration::from_millis(1_500),
            ..Default::default()
        });
        let dispatcher = Dispatcher::new(fake.clone(), &config(2, 3));

        let report = dispatcher.run(pool(100)).await;

        assert_eq!(report.sent, 6);
        assert_eq!(report.ticks, 3);
        assert_eq!(report.overloaded_ticks, 3);
        assert!(report.elapsed >= Duration::from_millis(4_500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_abort_campaign() {
        let fake = Arc::new(FakeSubmitter {
            fail_every: Some(2),
            ..Default::default()
        });
        let dispatcher = Dispatcher::new(fake.clone(), &config(4, 5));

        let report = dispatcher.run(pool(8)).await;

        assert_eq!(report.sent, 8);
        assert_eq!(report.failed, 4);
        assert_eq!(report.resolved(), 4);
        assert_eq!(report.unconfirmed(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_pool_is_noop() {
        let fake = Arc::new(FakeSubmitter::default());
        let dispatcher = Dispatcher::new(fake.clone(), &config(5, 3));

        let report = dispatcher.run(Vec::new()).await;

        assert_eq!(report.sent, 0);
        assert_eq!(report.ticks, 0);
        assert!(fake.calls.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_at_tick_boundary() {
        let fake = Arc::new(FakeSubmitter::default());
        let token = CancellationToken::new();
        let dispatcher = Dispatcher::new(fake.clone(), &config(5, 10)).with_shutdown(token.clone());

        token.cancel();
        let report = dispatcher.run(pool(20)).await;

        assert!(report.cancelled);
        assert_eq!(report.sent, 0);
    }
}
