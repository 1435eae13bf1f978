//! The summary returned after one drain invocation.

use serde::{Deserialize, Serialize};

use super::work::SubjectId;

/// Outcome of one drain run. Built fresh per invocation, never persisted.
///
/// `error` is set only when the run itself stopped on a store-level
/// failure; the counts still reflect everything processed before it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub processed_count: u64,
    pub failed_count: u64,
    pub details: Vec<ReportDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunReport {
    /// Did the run itself fail, independent of per-item failures?
    pub fn is_fatal(&self) -> bool {
        self.error.is_some()
    }

    /// Subjects in the order they were claimed.
    pub fn subjects(&self) -> Vec<&SubjectId> {
        self.details.iter().map(|d| &d.subject_id).collect()
    }
}

/// One ledger line: what happened to one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDetail {
    pub subject_id: SubjectId,
    pub success: bool,
    pub message: String,
}
