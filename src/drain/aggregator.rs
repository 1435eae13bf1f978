//! Per-run accumulation of unit outcomes.

use crate::model::report::{ReportDetail, RunReport};
use crate::model::work::SubjectId;

/// Accumulates outcomes for one drain run.
///
/// Owned by exactly one drain invocation; concurrent drains each get
/// their own.
#[derive(Debug, Default)]
pub struct Aggregator {
    processed: u64,
    failed: u64,
    details: Vec<ReportDetail>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one unit's outcome. Ledger order is call order.
    pub fn record(&mut self, subject_id: SubjectId, success: bool, message: impl Into<String>) {
        if success {
            self.processed += 1;
        } else {
            self.failed += 1;
        }
        self.details.push(ReportDetail {
            subject_id,
            success,
            message: message.into(),
        });
    }

    /// Current totals and ledger. Never carries a run-level error.
    pub fn snapshot(&self) -> RunReport {
        RunReport {
            processed_count: self.processed,
            failed_count: self.failed,
            details: self.details.clone(),
            error: None,
        }
    }

    /// Consume the aggregator into its report.
    pub fn into_report(self) -> RunReport {
        RunReport {
            processed_count: self.processed,
            failed_count: self.failed,
            details: self.details,
            error: None,
        }
    }
}
