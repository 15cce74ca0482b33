//! Task span helpers.
//!
//! Provides span creation for tasks as they pass through the dispatcher
//! and the worker runtime.

use crate::model::{TaskId, WorkerId};
use tracing::Span;

/// Start a span covering one `submit` call.
///
/// `worker.id` is declared empty and filled via [`record_assignment`] once
/// the selector has picked a worker.
pub fn start_dispatch_span(task_id: &TaskId) -> Span {
    tracing::info_span!(
        "task.dispatch",
        "task.id" = %task_id,
        "worker.id" = tracing::field::Empty,
    )
}

/// Record the worker a task was assigned to on a dispatch span.
pub fn record_assignment(span: &Span, worker: WorkerId) {
    span.record("worker.id", worker.0);
}

/// Start a span for one task execution inside a worker runtime.
pub fn start_execute_span(worker: WorkerId, task_id: &TaskId) -> Span {
    tracing::info_span!(
        "task.execute",
        "worker.id" = worker.0,
        "task.id" = %task_id,
        "task.outcome" = tracing::field::Empty,
    )
}

/// Record how an execution ended ("completed", "failed", "timed_out").
pub fn record_outcome(span: &Span, outcome: &str) {
    span.record("task.outcome", outcome);
    span.in_scope(|| {
        tracing::info!(outcome = outcome, "task_outcome");
    });
}
