//! Metric instrument factories for supervisor-rs.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"supervisor-rs"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for supervisor-rs instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("supervisor-rs")
}

/// Counter: tasks submitted to the dispatcher.
/// Labels: `result` ("dispatched" | "already_processed" | "not_dispatched").
pub fn tasks_submitted() -> Counter<u64> {
    meter()
        .u64_counter("supervisor.tasks.submitted")
        .with_description("Number of tasks submitted")
        .build()
}

/// Counter: tasks published to a worker.
/// Labels: `worker`.
pub fn tasks_dispatched() -> Counter<u64> {
    meter()
        .u64_counter("supervisor.tasks.dispatched")
        .with_description("Number of tasks published to a task channel")
        .build()
}

/// Counter: tasks handled by a worker runtime.
/// Labels: `worker`, `result` ("completed" | "failed" | "timed_out" | "skipped" | "malformed").
pub fn tasks_processed() -> Counter<u64> {
    meter()
        .u64_counter("supervisor.tasks.processed")
        .with_description("Number of task messages handled by workers")
        .build()
}

/// Counter: result messages consumed by the collector.
/// Labels: `result` ("stored" | "store_failed" | "malformed").
pub fn results_collected() -> Counter<u64> {
    meter()
        .u64_counter("supervisor.results.collected")
        .with_description("Number of result messages consumed")
        .build()
}

/// Counter: result lookups.
/// Labels: `result` ("hit" | "miss" | "error").
pub fn result_lookups() -> Counter<u64> {
    meter()
        .u64_counter("supervisor.results.lookups")
        .with_description("Number of result lookups")
        .build()
}

/// Counter: queue-level operations (create, send, read, delete).
/// Labels: `queue`, `operation`.
pub fn queue_operations() -> Counter<u64> {
    meter()
        .u64_counter("supervisor.queue.operations")
        .with_description("Number of queue operations")
        .build()
}

/// Histogram: operation duration in milliseconds.
/// Labels: `operation`.
pub fn operation_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("supervisor.operation.duration_ms")
        .with_description("Operation duration in milliseconds")
        .with_unit("ms")
        .build()
}
