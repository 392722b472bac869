//! Commit latency distribution.

use cosmbench_types::LatencyRecord;
use hdrhistogram::Histogram;
use serde::Serialize;
use tracing::warn;

/// Significant figures kept by the latency histogram.
const HISTOGRAM_SIGFIGS: u8 = 3;

/// Latency statistics in milliseconds.
///
/// Min, max and mean are exact; percentiles come from an HDR histogram and
/// are accurate to three significant figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencySummary {
    pub count: u64,
    pub min_ms: u64,
    pub mean_ms: f64,
    pub p50_ms: u64,
    pub p90_ms: u64,
    pub p99_ms: u64,
    pub max_ms: u64,
}

impl LatencySummary {
    /// Summarize the non-negative latencies in `records`.
    ///
    /// Negative latencies are integrity faults and are left out. Returns
    /// `None` when nothing remains.
    pub fn from_records(records: &[LatencyRecord]) -> Option<Self> {
        Self::from_values(
            records
                .iter()
                .filter(|r| !r.is_negative())
                .map(|r| r.latency_ms as u64),
        )
    }

    /// Summarize raw latency values.
    pub fn from_values(values: impl IntoIterator<Item = u64>) -> Option<Self> {
        let mut histogram = match Histogram::<u64>::new(HISTOGRAM_SIGFIGS) {
            Ok(h) => h,
            Err(e) => {
                warn!(error = ?e, "Failed to create latency histogram");
                return None;
            }
        };

        let mut count = 0u64;
        let mut sum = 0u128;
        let mut min_ms = u64::MAX;
        let mut max_ms = 0u64;
        for value in values {
            if let Err(e) = histogram.record(value) {
                warn!(value, error = ?e, "Latency out of histogram range");
                continue;
            }
            count += 1;
            sum += u128::from(value);
            min_ms = min_ms.min(value);
            max_ms = max_ms.max(value);
        }

        if count == 0 {
            return None;
        }

        Some(Self {
            count,
            min_ms,
            mean_ms: sum as f64 / count as f64,
            p50_ms: histogram.value_at_quantile(0.50),
            p90_ms: histogram.value_at_quantile(0.90),
            p99_ms: histogram.value_at_quantile(0.99),
            max_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmbench_types::{BlockHeight, TxIndex};

    fn record(idx: u64, latency_ms: i64) -> LatencyRecord {
        LatencyRecord {
            tx_idx: TxIndex(idx),
            submitted_at_ms: 0,
            height: BlockHeight(1),
            latency_ms,
        }
    }

    #[test]
    fn test_two_values() {
        let summary = LatencySummary::from_records(&[record(0, 50), record(1, 300)]).unwrap();

        assert_eq!(summary.count, 2);
        assert_eq!(summary.min_ms, 50);
        assert_eq!(summary.max_ms, 300);
        assert_eq!(summary.mean_ms, 175.0);
        assert_eq!(summary.p50_ms, 50);
        assert_eq!(summary.p99_ms, 300);
    }

    #[test]
    fn test_percentiles_over_uniform_range() {
        let summary = LatencySummary::from_values(1..=1000).unwrap();

        assert_eq!(summary.count, 1000);
        assert_eq!(summary.min_ms, 1);
        assert_eq!(summary.max_ms, 1000);
        assert_eq!(summary.p50_ms, 500);
        assert_eq!(summary.p90_ms, 900);
        assert_eq!(summary.p99_ms, 990);
        assert_eq!(summary.mean_ms, 500.5);
    }

    #[test]
    fn test_negative_latencies_excluded() {
        let summary = LatencySummary::from_records(&[record(0, -20), record(1, 80)]).unwrap();

        assert_eq!(summary.count, 1);
        assert_eq!(summary.min_ms, 80);
    }

    #[test]
    fn test_empty_is_none() {
        assert!(LatencySummary::from_records(&[]).is_none());
        assert!(LatencySummary::from_records(&[record(0, -1)]).is_none());
    }
}
