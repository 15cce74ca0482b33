//! Dispatcher: dedup against cached results, pick a worker, enqueue.

use crate::config::Channels;
use crate::error::Result;
use crate::model::{NewTask, Task, TaskId, WorkerId};
use crate::queue::QueueTransport;
use crate::store::KvStore;
use crate::telemetry::metrics;
use crate::telemetry::task::{record_assignment, start_dispatch_span};
use opentelemetry::KeyValue;
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, error, info, warn};

use super::selector::WorkerSelector;

/// What happened to a submission.
///
/// Submission is best effort: failures are reported here and in the logs,
/// never as an `Err`.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitResult {
    /// Published on the task channel for `worker_id`.
    Dispatched { id: TaskId, worker_id: WorkerId },
    /// A result is already cached under this id; nothing was published.
    AlreadyProcessed { id: TaskId },
    /// Worker selection or the publish failed, or the id is reserved;
    /// nothing was published.
    NotDispatched { id: TaskId, reason: String },
}

impl SubmitResult {
    pub fn id(&self) -> &TaskId {
        match self {
            SubmitResult::Dispatched { id, .. }
            | SubmitResult::AlreadyProcessed { id }
            | SubmitResult::NotDispatched { id, .. } => id,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            SubmitResult::Dispatched { .. } => "dispatched",
            SubmitResult::AlreadyProcessed { .. } => "already_processed",
            SubmitResult::NotDispatched { .. } => "not_dispatched",
        }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn KvStore>,
    selector: WorkerSelector,
    transport: Arc<dyn QueueTransport>,
    channels: Channels,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn KvStore>,
        transport: Arc<dyn QueueTransport>,
        worker_count: u32,
        channels: Channels,
    ) -> Result<Self> {
        Ok(Self {
            selector: WorkerSelector::new(Arc::clone(&store), worker_count)?,
            store,
            transport,
            channels,
        })
    }

    /// Replace the default selector, e.g. to use a custom cursor key.
    pub fn with_selector(mut self, selector: WorkerSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn selector(&self) -> &WorkerSelector {
        &self.selector
    }

    /// Submit a task for processing.
    ///
    /// Only tasks whose result is already cached are suppressed. Two
    /// submissions of the same id that race before either completes are
    /// both dispatched.
    pub async fn submit(&self, new: NewTask) -> SubmitResult {
        let task = new.into_task();
        let span = start_dispatch_span(&task.id);
        let start = Instant::now();

        let result = self.dispatch(task, &span).instrument(span.clone()).await;

        metrics::tasks_submitted().add(1, &[KeyValue::new("result", result.label())]);
        metrics::operation_duration_ms().record(
            start.elapsed().as_secs_f64() * 1000.0,
            &[KeyValue::new("operation", "task.submit")],
        );
        result
    }

    async fn dispatch(&self, mut task: Task, span: &tracing::Span) -> SubmitResult {
        if task.id.as_str() == self.selector.cursor_key() {
            warn!(task.id = %task.id, "task id collides with the rotation cursor key");
            return SubmitResult::NotDispatched {
                reason: format!("task id {} is reserved", task.id),
                id: task.id,
            };
        }

        info!(task.id = %task.id, "checking whether task was already processed");

        // Presence alone marks the task processed; the value is not decoded.
        match self.store.get(task.id.as_str()).await {
            Ok(Some(_)) => {
                info!(task.id = %task.id, "task already processed, skipping dispatch");
                return SubmitResult::AlreadyProcessed { id: task.id };
            }
            Ok(None) => {}
            Err(e) => {
                // Fail open: an unreadable cache must not block new work.
                warn!(task.id = %task.id, error = %e, "dedup check failed, dispatching anyway");
            }
        }

        let worker_id = match self.selector.next().await {
            Ok(w) => w,
            Err(e) => {
                error!(task.id = %task.id, error = %e, "worker selection failed");
                return SubmitResult::NotDispatched {
                    id: task.id,
                    reason: format!("worker selection failed: {e}"),
                };
            }
        };
        record_assignment(span, worker_id);
        task.worker_id = Some(worker_id);

        let channel = self.channels.task_channel(worker_id);
        match self.publish(&channel, &task).await {
            Ok(msg_id) => {
                metrics::tasks_dispatched()
                    .add(1, &[KeyValue::new("worker", i64::from(worker_id.0))]);
                info!(
                    task.id = %task.id,
                    worker.id = worker_id.0,
                    channel = %channel,
                    msg_id,
                    "task sent for processing"
                );
                SubmitResult::Dispatched {
                    id: task.id,
                    worker_id,
                }
            }
            Err(e) => {
                error!(task.id = %task.id, channel = %channel, error = %e, "failed to publish task");
                SubmitResult::NotDispatched {
                    id: task.id,
                    reason: format!("publish failed: {e}"),
                }
            }
        }
    }

    async fn publish(&self, channel: &str, task: &Task) -> Result<i64> {
        let body = task.to_bytes()?;
        self.transport.publish(channel, &body).await
    }
}
