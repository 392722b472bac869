//! Human-readable metrics summary.

use crate::correlate::Correlation;
use crate::latency::LatencySummary;
use crate::throughput::Throughput;

/// Headline numbers of one correlation run.
#[derive(Debug, Clone)]
pub struct MetricsReport {
    pub submission_records: usize,
    pub blocks_seen: usize,
    pub duplicate_commit_lines: usize,
    pub attempted: usize,
    pub confirmed: usize,
    pub no_height: usize,
    pub missing_block: usize,
    pub invalid_timestamps: usize,
    pub negative_latencies: usize,
    pub throughput: Throughput,
    pub latency: Option<LatencySummary>,
    pub warnings: Vec<String>,
}

impl MetricsReport {
    pub fn new(
        correlation: &Correlation,
        submission_records: usize,
        blocks_seen: usize,
        duplicate_commit_lines: usize,
    ) -> Self {
        Self {
            submission_records,
            blocks_seen,
            duplicate_commit_lines,
            attempted: correlation.attempted,
            confirmed: correlation.confirmed(),
            no_height: correlation.no_height,
            missing_block: correlation.missing_block,
            invalid_timestamps: correlation.invalid_timestamps,
            negative_latencies: correlation.negative_latencies(),
            throughput: correlation.throughput(),
            latency: correlation.latency_summary(),
            warnings: correlation.warnings.iter().map(|w| w.to_string()).collect(),
        }
    }

    pub fn unconfirmed(&self) -> usize {
        self.no_height + self.missing_block + self.invalid_timestamps
    }

    /// Confirmed share of attempted submissions, in percent.
    pub fn confirmation_rate(&self) -> Option<f64> {
        (self.attempted > 0).then(|| self.confirmed as f64 / self.attempted as f64 * 100.0)
    }

    /// Print a summary to stdout.
    ///
    /// Counts and warnings are always printed, whatever else is missing.
    pub fn print(&self) {
        println!("\n=== Benchmark Metrics ===");
        println!("Submission records: {}", self.submission_records);
        println!("Blocks in logs:     {}", self.blocks_seen);
        if self.duplicate_commit_lines > 0 {
            println!("Duplicate commits:  {}", self.duplicate_commit_lines);
        }
        println!();
        println!("Attempted:          {}", self.attempted);
        match self.confirmation_rate() {
            Some(rate) => println!("Confirmed:          {} ({:.1}%)", self.confirmed, rate),
            None => println!("Confirmed:          {}", self.confirmed),
        }
        println!("Unconfirmed:        {}", self.unconfirmed());
        println!("  no height:        {}", self.no_height);
        println!("  block not logged: {}", self.missing_block);
        if self.invalid_timestamps > 0 {
            println!("  bad timestamps:   {}", self.invalid_timestamps);
        }
        println!();
        println!("Throughput:         {}", self.throughput);

        if let Some(latency) = &self.latency {
            println!("\nLatency (ms):");
            println!("  Count: {}", latency.count);
            println!("  Min:   {}", latency.min_ms);
            println!("  Mean:  {:.1}", latency.mean_ms);
            println!("  P50:   {}", latency.p50_ms);
            println!("  P90:   {}", latency.p90_ms);
            println!("  P99:   {}", latency.p99_ms);
            println!("  Max:   {}", latency.max_ms);
        } else {
            println!("\nLatency:            n/a");
        }

        println!("\nWarnings:           {}", self.warnings.len());
        if self.negative_latencies > 0 {
            println!(
                "  {} negative latencies excluded from latency stats",
                self.negative_latencies
            );
        }
        for warning in &self.warnings {
            println!("  - {warning}");
        }
    }
}
