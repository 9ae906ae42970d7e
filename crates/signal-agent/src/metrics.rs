use std::time::Instant;

use decision_core::{ApprovalStatus, TradeProposal};

/// Running counters for the agent, logged every `log_interval` evaluations
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    pub evaluated: u64,
    pub approved: u64,
    pub rejected: u64,
    pub failed: u64,
    pub malformed_lines: u64,
    pub outcomes_recorded: u64,
    pub outcomes_skipped: u64,

    // Last batch timing
    pub last_batch_size: usize,
    pub last_evaluation_ms: u64,

    log_interval: u64,
}

impl PipelineMetrics {
    pub fn new(log_interval: u64) -> Self {
        Self {
            log_interval,
            ..Self::default()
        }
    }

    pub fn record_batch(&mut self, proposals: &[TradeProposal], started: Instant) {
        self.last_evaluation_ms = started.elapsed().as_millis() as u64;
        self.last_batch_size = proposals.len();

        for proposal in proposals {
            self.evaluated += 1;
            match proposal.status {
                ApprovalStatus::Approved => self.approved += 1,
                ApprovalStatus::Rejected => self.rejected += 1,
                ApprovalStatus::Failed => self.failed += 1,
            }
            if self.log_interval > 0 && self.evaluated % self.log_interval == 0 {
                self.log_metrics();
            }
        }
    }

    /// Approved share of evaluations (0-100%)
    pub fn approval_rate(&self) -> f64 {
        if self.evaluated == 0 {
            return 0.0;
        }
        (self.approved as f64 / self.evaluated as f64) * 100.0
    }

    /// Emit structured telemetry via tracing
    pub fn log_metrics(&self) {
        tracing::info!(
            evaluated = self.evaluated,
            approved = self.approved,
            rejected = self.rejected,
            failed = self.failed,
            approval_rate = format!("{:.1}%", self.approval_rate()),
            malformed_lines = self.malformed_lines,
            outcomes_recorded = self.outcomes_recorded,
            outcomes_skipped = self.outcomes_skipped,
            last_batch_size = self.last_batch_size,
            last_evaluation_ms = self.last_evaluation_ms,
            "Pipeline metrics summary"
        );
    }
}
