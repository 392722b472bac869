//! Confirmed-transaction throughput.

use cosmbench_types::LatencyRecord;
use serde::Serialize;
use std::fmt;
use tracing::warn;

/// Throughput over the confirmed window.
///
/// The window runs from the earliest confirmed submission to the latest
/// commit of a confirmed submission.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Throughput {
    /// Nothing was confirmed.
    NoData,
    /// Confirmed transactions exist but the window has zero length.
    Unbounded { confirmed: u64 },
    /// A finite rate.
    Measured {
        confirmed: u64,
        first_submit_ms: i64,
        last_commit_ms: i64,
        elapsed_ms: i64,
        tps: f64,
    },
}

/// Bounds of the confirmed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub first_submit_ms: i64,
    pub last_commit_ms: i64,
}

impl Window {
    /// Earliest submission and latest commit among `records`.
    pub fn of(records: &[LatencyRecord]) -> Option<Self> {
        let first_submit_ms = records.iter().map(|r| r.submitted_at_ms).min()?;
        let last_commit_ms = records.iter().filter_map(|r| r.committed_at_ms()).max()?;
        Some(Self {
            first_submit_ms,
            last_commit_ms,
        })
    }

    /// Length of the window, or `None` when it is inverted or does not fit
    /// in an `i64`.
    pub fn elapsed_ms(&self) -> Option<i64> {
        self.last_commit_ms
            .checked_sub(self.first_submit_ms)
            .filter(|elapsed| *elapsed >= 0)
    }
}

impl Throughput {
    /// Compute throughput from joined latency records.
    ///
    /// An inverted window means every commit precedes the first submission,
    /// a clock fault; it yields [`Throughput::NoData`].
    pub fn from_latencies(records: &[LatencyRecord]) -> Self {
        let Some(window) = Window::of(records) else {
            return Throughput::NoData;
        };
        let confirmed = records.len() as u64;

        match window.elapsed_ms() {
            None => {
                warn!(
                    first_submit_ms = window.first_submit_ms,
                    last_commit_ms = window.last_commit_ms,
                    "Invalid throughput window"
                );
                Throughput::NoData
            }
            Some(0) => Throughput::Unbounded { confirmed },
            Some(elapsed_ms) => Throughput::Measured {
                confirmed,
                first_submit_ms: window.first_submit_ms,
                last_commit_ms: window.last_commit_ms,
                elapsed_ms,
                tps: confirmed as f64 / (elapsed_ms as f64 / 1000.0),
            },
        }
    }

    /// Transactions per second, when finite.
    pub fn tps(&self) -> Option<f64> {
        match self {
            Throughput::Measured { tps, .. } => Some(*tps),
            _ => None,
        }
    }
}

impl fmt::Display for Throughput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Throughput::NoData => write!(f, "no confirmed transactions"),
            Throughput::Unbounded { confirmed } => {
                write!(f, "unbounded ({confirmed} txs in a zero-length window)")
            }
            Throughput::Measured {
                confirmed,
                elapsed_ms,
                tps,
                ..
            } => write!(f, "{tps:.2} tx/s ({confirmed} txs over {elapsed_ms} ms)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmbench_types::{BlockHeight, TxIndex};

    fn latency(idx: u64, submitted: i64, committed: i64) -> LatencyRecord {
        LatencyRecord {
            tx_idx: TxIndex(idx),
            submitted_at_ms: submitted,
            height: BlockHeight(1),
            latency_ms: committed - submitted,
        }
    }

    #[test]
    fn test_measured() {
        let records = vec![latency(0, 1000, 1050), latency(1, 1200, 1500)];

        let throughput = Throughput::from_latencies(&records);

        assert_eq!(
            throughput,
            Throughput::Measured {
                confirmed: 2,
                first_submit_ms: 1000,
                last_commit_ms: 1500,
                elapsed_ms: 500,
                tps: 4.0,
            }
        );
        assert_eq!(throughput.tps(), Some(4.0));
    }

    #[test]
    fn test_no_data() {
        assert_eq!(Throughput::from_latencies(&[]), Throughput::NoData);
        assert_eq!(Throughput::NoData.tps(), None);
    }

    #[test]
    fn test_identical_timestamps_are_unbounded() {
        let records = vec![latency(0, 1000, 1000), latency(1, 1000, 1000)];

        let throughput = Throughput::from_latencies(&records);

        assert_eq!(throughput, Throughput::Unbounded { confirmed: 2 });
        assert_eq!(throughput.tps(), None);
    }

    #[test]
    fn test_window_uses_latest_commit_not_latest_submit() {
        // The later submission commits first.
        let records = vec![latency(0, 1000, 3000), latency(1, 2000, 2100)];

        match Throughput::from_latencies(&records) {
            Throughput::Measured {
                elapsed_ms, tps, ..
            } => {
                assert_eq!(elapsed_ms, 2000);
                assert_eq!(tps, 1.0);
            }
            other => panic!("expected measured throughput, got {other:?}"),
        }
    }

    #[test]
    fn test_inverted_window_is_no_data() {
        // Every block committed before the first submission.
        let records = vec![latency(0, 2000, 1500), latency(1, 2100, 1900)];

        let window = Window::of(&records).unwrap();
        assert_eq!(window.elapsed_ms(), None);
        assert_eq!(Throughput::from_latencies(&records), Throughput::NoData);
    }

    #[test]
    fn test_overflowing_window_is_no_data() {
        let records = vec![latency(0, i64::MIN, i64::MIN), latency(1, 0, i64::MAX)];

        assert_eq!(Window::of(&records).unwrap().elapsed_ms(), None);
        assert_eq!(Throughput::from_latencies(&records), Throughput::NoData);
    }

    #[test]
    fn test_display() {
        let records = vec![latency(0, 0, 1000)];
        assert_eq!(
            Throughput::from_latencies(&records).to_string(),
            "1.00 tx/s (1 txs over 1000 ms)"
        );
    }
}
