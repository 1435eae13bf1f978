//! The queue drain loop: claim, apply, record, repeat until empty.
//!
//! A drain is one pass over one kind's queue. It never retries a unit
//! within a run and never stops on a per-unit failure; only an empty
//! queue or a failing claim ends it. Delivery is at-least-once: a crash
//! between apply and mark means the unit is claimed again next run, which
//! is why store effects must be idempotent.

pub mod aggregator;

use crate::error::Result;
use crate::model::report::RunReport;
use crate::model::work::{WorkKind, WorkUnit};
use crate::store::WorkStore;
use crate::telemetry::drain::{record_unit_outcome, start_drain_span, start_unit_span};
use crate::telemetry::metrics;
use opentelemetry::KeyValue;
use std::time::{Duration, Instant};
use tracing::{Instrument, info, warn};
use uuid::Uuid;

pub use aggregator::Aggregator;

/// Drain `kind` until the store reports it empty.
///
/// Always returns a report. If a claim fails, the report carries the
/// error alongside whatever was processed before it.
pub async fn drain<S>(store: &S, kind: WorkKind) -> RunReport
where
    S: WorkStore + ?Sized,
{
    let span = start_drain_span(kind, &Uuid::new_v4());
    let start = Instant::now();
    let mut agg = Aggregator::new();

    let error = drain_into(store, kind, &mut agg)
        .instrument(span.clone())
        .await
        .err()
        .map(|e| e.to_string());

    span.in_scope(|| finish(kind, agg, error, start))
}

/// Drain `kind`, giving up after `timeout`.
///
/// On timeout the unit in progress is abandoned (its claim lapses in the
/// store) and the partial report is returned with an error.
pub async fn drain_with_timeout<S>(store: &S, kind: WorkKind, timeout: Duration) -> RunReport
where
    S: WorkStore + ?Sized,
{
    let span = start_drain_span(kind, &Uuid::new_v4());
    let start = Instant::now();
    let mut agg = Aggregator::new();

    let error = match tokio::time::timeout(timeout, drain_into(store, kind, &mut agg))
        .instrument(span.clone())
        .await
    {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(_) => Some(format!("drain timed out after {}ms", timeout.as_millis())),
    };

    span.in_scope(|| finish(kind, agg, error, start))
}

/// The loop itself. Returns `Err` only for store-level failures.
async fn drain_into<S>(store: &S, kind: WorkKind, agg: &mut Aggregator) -> Result<()>
where
    S: WorkStore + ?Sized,
{
    while let Some(unit) = store.claim_next(kind).await? {
        let span = start_unit_span(kind, &unit.subject_id, unit.receipt);
        let (success, message) = apply_one(store, &unit).instrument(span.clone()).await;
        record_unit_outcome(&span, success, &message);

        metrics::drain_units().add(
            1,
            &[
                KeyValue::new("kind", kind.to_string()),
                KeyValue::new("result", if success { "success" } else { "failure" }),
            ],
        );
        agg.record(unit.subject_id, success, message);
    }
    Ok(())
}

/// Apply one unit and retire it if the effect took. Never fails: every
/// outcome becomes a ledger line.
async fn apply_one<S>(store: &S, unit: &WorkUnit) -> (bool, String)
where
    S: WorkStore + ?Sized,
{
    match store.apply_effect(unit).await {
        Ok(outcome) if outcome.success => match store.mark_applied(unit).await {
            Ok(()) => (true, outcome.message),
            Err(e) => (false, format!("applied but not retired: {e}")),
        },
        Ok(outcome) => (false, outcome.message),
        Err(e) => (false, e.to_string()),
    }
}

fn finish(kind: WorkKind, agg: Aggregator, error: Option<String>, start: Instant) -> RunReport {
    let mut report = agg.into_report();
    report.error = error;

    let duration_ms = start.elapsed().as_millis() as u64;
    match report.error {
        Some(ref error) => warn!(
            %kind,
            processed = report.processed_count,
            failed = report.failed_count,
            duration_ms,
            %error,
            "drain stopped early"
        ),
        None => info!(
            %kind,
            processed = report.processed_count,
            failed = report.failed_count,
            duration_ms,
            "drain complete"
        ),
    }

    metrics::drain_runs().add(
        1,
        &[
            KeyValue::new("kind", kind.to_string()),
            KeyValue::new("result", if report.is_fatal() { "error" } else { "ok" }),
        ],
    );
    metrics::operation_duration_ms().record(
        duration_ms as f64,
        &[KeyValue::new("operation", "drain.run")],
    );

    report
}
