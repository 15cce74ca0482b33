//! Worker runtime: consume tasks addressed to one worker, emit results.

use crate::config::Channels;
use crate::error::{Error, Result};
use crate::model::{Task, TaskResult, WorkerId};
use crate::queue::QueueTransport;
use crate::telemetry::metrics;
use crate::telemetry::task::{record_outcome, start_execute_span};
use async_trait::async_trait;
use opentelemetry::KeyValue;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{Instrument, error, info, warn};

/// The work itself. Implementations may take arbitrarily long.
#[async_trait]
pub trait TaskProcessor: Send + Sync {
    async fn process(&self, task: &Task) -> Result<serde_json::Value>;
}

/// Placeholder processor: waits, then echoes the payload.
#[derive(Debug, Clone)]
pub struct DelayProcessor {
    pub delay: Duration,
}

impl DelayProcessor {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl TaskProcessor for DelayProcessor {
    async fn process(&self, task: &Task) -> Result<serde_json::Value> {
        tokio::time::sleep(self.delay).await;
        Ok(serde_json::json!({
            "processedBy": task.worker_id,
            "payload": task.payload,
        }))
    }
}

/// Configuration for a worker runtime.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Sleep between polls when the task channel is empty.
    pub poll_interval: Duration,
    /// Give up on a task after this long. `None` waits forever.
    pub processing_timeout: Option<Duration>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            processing_timeout: None,
        }
    }
}

/// How one task message was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    /// Processed and a result was published.
    Completed,
    /// The processor returned an error; no result was published.
    Failed,
    /// The processing timeout elapsed; no result was published.
    TimedOut,
    /// Addressed to another worker; dropped.
    Skipped,
    /// Not a task record; dropped.
    Malformed,
}

impl Handled {
    fn label(self) -> &'static str {
        match self {
            Handled::Completed => "completed",
            Handled::Failed => "failed",
            Handled::TimedOut => "timed_out",
            Handled::Skipped => "skipped",
            Handled::Malformed => "malformed",
        }
    }
}

#[derive(Clone)]
pub struct WorkerRuntime {
    id: WorkerId,
    transport: Arc<dyn QueueTransport>,
    channels: Channels,
    processor: Arc<dyn TaskProcessor>,
    config: WorkerConfig,
    shutdown: Arc<Notify>,
}

impl WorkerRuntime {
    pub fn new(
        id: WorkerId,
        transport: Arc<dyn QueueTransport>,
        channels: Channels,
        processor: Arc<dyn TaskProcessor>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            id,
            transport,
            channels,
            processor,
            config,
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// The channel this worker consumes.
    pub fn task_channel(&self) -> String {
        self.channels.task_channel(self.id)
    }

    /// Signal the worker loop to stop.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Consume tasks until shutdown. Shutdown is honoured between messages
    /// and also interrupts a task in progress.
    pub async fn run(&self) -> Result<()> {
        let channel = self.task_channel();
        self.transport.declare(&channel).await?;
        self.transport.declare(&self.channels.result_queue).await?;
        info!(worker.id = self.id.0, channel = %channel, "worker listening for tasks");

        loop {
            // A task interrupted here is unacked and gets redelivered.
            let step = tokio::select! {
                biased;
                _ = self.shutdown.notified() => {
                    info!(worker.id = self.id.0, "worker shutting down");
                    return Ok(());
                }
                step = self.process_next() => step,
            };

            let drained = match step {
                Ok(Some(_)) => false,
                Ok(None) => true,
                Err(e) => {
                    error!(worker.id = self.id.0, error = %e, "worker error");
                    true
                }
            };

            if drained {
                tokio::select! {
                    _ = self.shutdown.notified() => {
                        info!(worker.id = self.id.0, "worker shutting down");
                        return Ok(());
                    }
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                }
            }
        }
    }

    /// Handle at most one task message. `Ok(None)` when the channel is empty.
    ///
    /// The message is acked once handled. If publishing the result fails the
    /// message is left unacked and the error returned, so the transport
    /// redelivers it after its visibility timeout.
    pub async fn process_next(&self) -> Result<Option<Handled>> {
        let channel = self.task_channel();
        let Some(delivery) = self.transport.receive(&channel).await? else {
            return Ok(None);
        };

        let handled = match Task::from_bytes(&delivery.body) {
            Ok(task) => self.handle(task).await?,
            Err(e) => {
                warn!(worker.id = self.id.0, msg_id = delivery.tag, error = %e, "dropping malformed task message");
                Handled::Malformed
            }
        };

        metrics::tasks_processed().add(
            1,
            &[
                KeyValue::new("worker", i64::from(self.id.0)),
                KeyValue::new("result", handled.label()),
            ],
        );
        self.transport.ack(&channel, delivery.tag).await?;
        Ok(Some(handled))
    }

    async fn handle(&self, task: Task) -> Result<Handled> {
        if task.worker_id != Some(self.id) {
            info!(
                worker.id = self.id.0,
                task.id = %task.id,
                assigned = ?task.worker_id,
                "task is not for this worker, ignoring"
            );
            return Ok(Handled::Skipped);
        }

        let span = start_execute_span(self.id, &task.id);
        async {
            info!(task.id = %task.id, "received task for processing");
            let start = Instant::now();

            let value = match self.execute(&task).await {
                Ok(value) => value,
                Err(Error::Timeout(_)) => {
                    record_outcome(&span, "timed_out");
                    warn!(task.id = %task.id, "processing timed out, no result emitted");
                    return Ok(Handled::TimedOut);
                }
                Err(e) => {
                    record_outcome(&span, "failed");
                    error!(task.id = %task.id, error = %e, "processing failed, no result emitted");
                    return Ok(Handled::Failed);
                }
            };

            metrics::operation_duration_ms().record(
                start.elapsed().as_secs_f64() * 1000.0,
                &[KeyValue::new("operation", "task.execute")],
            );

            let result = TaskResult {
                task_id: task.id.clone(),
                value,
            };
            self.transport
                .publish(&self.channels.result_queue, &result.to_bytes()?)
                .await?;
            record_outcome(&span, "completed");
            info!(task.id = %task.id, "task processed, result published");
            Ok(Handled::Completed)
        }
        .instrument(span.clone())
        .await
    }

    async fn execute(&self, task: &Task) -> Result<serde_json::Value> {
        match self.config.processing_timeout {
            Some(limit) => tokio::time::timeout(limit, self.processor.process(task))
                .await
                .map_err(|_| Error::Timeout(limit))?,
            None => self.processor.process(task).await,
        }
    }
}
