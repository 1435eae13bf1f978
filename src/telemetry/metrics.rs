//! Metric instrument factories for avatar-core.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"avatar-core"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("avatar-core")
}

/// Counter: completed drain invocations.
/// Labels: `kind`, `result` ("ok" | "error").
pub fn drain_runs() -> Counter<u64> {
    meter()
        .u64_counter("avatar.drain.runs")
        .with_description("Number of drain invocations")
        .build()
}

/// Counter: units processed by drains.
/// Labels: `kind`, `result` ("success" | "failure").
pub fn drain_units() -> Counter<u64> {
    meter()
        .u64_counter("avatar.drain.units")
        .with_description("Number of work units processed")
        .build()
}

/// Counter: queue-level operations (create, send, read, archive).
/// Labels: `queue`, `operation`.
pub fn queue_operations() -> Counter<u64> {
    meter()
        .u64_counter("avatar.queue.operations")
        .with_description("Number of queue operations")
        .build()
}

/// Counter: transcription fragments seen by the sequencer.
/// Labels: `result` ("accepted" | "dropped").
pub fn sequencer_fragments() -> Counter<u64> {
    meter()
        .u64_counter("avatar.sequencer.fragments")
        .with_description("Transcribed fragments accepted or dropped")
        .build()
}

/// Histogram: operation duration in milliseconds.
/// Labels: `operation`.
pub fn operation_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("avatar.operation.duration_ms")
        .with_description("Operation duration in milliseconds")
        .with_unit("ms")
        .build()
}
