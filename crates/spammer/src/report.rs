//! End-of-campaign summary.

use crate::client::{HeightSource, SubmissionOutcome};
use std::time::Duration;

/// Counters collected by the dispatcher over one campaign.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CampaignReport {
    /// Transactions available in the input pool.
    pub input_txs: usize,
    /// Transactions launched.
    pub sent: usize,
    /// Ticks that launched a batch.
    pub ticks: u64,
    /// Ticks whose batch took longer than the tick interval.
    pub overloaded_ticks: u64,

    pub resolved_by_ack: usize,
    pub resolved_by_lookup: usize,
    pub resolved_by_log_tail: usize,
    pub unresolved: usize,
    pub rejected: usize,
    pub failed: usize,

    /// Stopped early by a shutdown request.
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl CampaignReport {
    pub fn new(input_txs: usize) -> Self {
        Self {
            input_txs,
            ..Default::default()
        }
    }

    /// Count one finished submission.
    pub fn record(&mut self, outcome: &SubmissionOutcome) {
        match outcome {
            SubmissionOutcome::Resolved { source, .. } => match source {
                HeightSource::Ack => self.resolved_by_ack += 1,
                HeightSource::Lookup => self.resolved_by_lookup += 1,
                HeightSource::LogTail => self.resolved_by_log_tail += 1,
            },
            SubmissionOutcome::Unresolved => self.unresolved += 1,
            SubmissionOutcome::Rejected { .. } => self.rejected += 1,
            SubmissionOutcome::Failed(_) => self.failed += 1,
        }
    }

    /// Submissions with a commit height.
    pub fn resolved(&self) -> usize {
        self.resolved_by_ack + self.resolved_by_lookup + self.resolved_by_log_tail
    }

    /// Submissions without a commit height, for any reason.
    pub fn unconfirmed(&self) -> usize {
        self.unresolved + self.rejected + self.failed
    }

    /// Input transactions never launched.
    pub fn not_sent(&self) -> usize {
        self.input_txs.saturating_sub(self.sent)
    }

    /// Launched transactions per second over the whole campaign.
    pub fn achieved_rate(&self) -> Option<f64> {
        let secs = self.elapsed.as_secs_f64();
        (secs > 0.0).then(|| self.sent as f64 / secs)
    }

    /// Print a summary to stdout.
    pub fn print(&self) {
        println!("\n=== Spam Campaign Report ===");
        println!("Duration:        {:.2?}", self.elapsed);
        println!("Ticks:           {}", self.ticks);
        if self.overloaded_ticks > 0 {
            println!("Overloaded:      {} ticks", self.overloaded_ticks);
        }
        println!("Input:           {}", self.input_txs);
        println!("Sent:            {}", self.sent);
        if self.not_sent() > 0 {
            println!("Not sent:        {}", self.not_sent());
        }
        match self.achieved_rate() {
            Some(rate) => println!("Achieved rate:   {:.2} tx/s", rate),
            None => println!("Achieved rate:   n/a"),
        }
        println!();
        println!("Height resolved: {}", self.resolved());
        println!("  from ack:      {}", self.resolved_by_ack);
        println!("  from lookup:   {}", self.resolved_by_lookup);
        println!("  from log tail: {}", self.resolved_by_log_tail);
        println!("Unconfirmed:     {}", self.unconfirmed());
        println!("  unresolved:    {}", self.unresolved);
        println!("  rejected:      {}", self.rejected);
        println!("  failed:        {}", self.failed);
        if self.cancelled {
            println!("\nCampaign stopped early by shutdown request.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmbench_types::BlockHeight;

    #[test]
    fn test_record_outcomes() {
        let mut report = CampaignReport::new(10);
        report.sent = 5;
        report.record(&SubmissionOutcome::Resolved {
            height: BlockHeight(1),
            source: HeightSource::Ack,
        });
        report.record(&SubmissionOutcome::Resolved {
            height: BlockHeight(1),
            source: HeightSource::LogTail,
        });
        report.record(&SubmissionOutcome::Unresolved);
        report.record(&SubmissionOutcome::Rejected {
            code: 5,
            reason: "x".into(),
        });
        report.record(&SubmissionOutcome::Failed("timeout".into()));

        assert_eq!(report.resolved(), 2);
        assert_eq!(report.unconfirmed(), 3);
        assert_eq!(report.not_sent(), 5);
    }

    #[test]
    fn test_achieved_rate() {
        let mut report = CampaignReport::new(10);
        assert_eq!(report.achieved_rate(), None);

        report.sent = 10;
        report.elapsed = Duration::from_secs(2);
        assert_eq!(report.achieved_rate(), Some(5.0));
    }
}
