//! Drain span helpers.
//!
//! One `drain.run` span per invocation, one `drain.unit` span per claimed
//! unit nested inside it.

use crate::model::work::{SubjectId, WorkKind};
use tracing::Span;
use uuid::Uuid;

/// Start a span covering one drain invocation.
pub fn start_drain_span(kind: WorkKind, run_id: &Uuid) -> Span {
    tracing::info_span!(
        "drain.run",
        "drain.kind" = %kind,
        "drain.run_id" = %run_id,
    )
}

/// Start a span for one claimed unit.
///
/// `unit.success` is declared empty and filled by [`record_unit_outcome`].
pub fn start_unit_span(kind: WorkKind, subject_id: &SubjectId, receipt: i64) -> Span {
    tracing::info_span!(
        "drain.unit",
        "drain.kind" = %kind,
        "unit.subject_id" = %subject_id,
        "unit.receipt" = receipt,
        "unit.success" = tracing::field::Empty,
    )
}

/// Record a unit's outcome on its span and emit an event inside it.
pub fn record_unit_outcome(span: &Span, success: bool, message: &str) {
    span.record("unit.success", success);
    span.in_scope(|| {
        if success {
            tracing::debug!(detail = message, "unit applied");
        } else {
            tracing::warn!(detail = message, "unit failed");
        }
    });
}
