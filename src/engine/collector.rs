//! Result collector: drains the result channel into the store.

use crate::error::Result;
use crate::model::TaskResult;
use crate::queue::{Delivery, QueueTransport};
use crate::store::KvStore;
use crate::telemetry::metrics;
use opentelemetry::KeyValue;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use super::selector::DEFAULT_CURSOR_KEY;

/// Configuration for the result collector.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Sleep between polls when the result channel is empty.
    pub poll_interval: Duration,
    /// Expire cached results after this long. `None` keeps them forever.
    pub result_ttl: Option<Duration>,
    /// How often expired results are purged when a TTL is set.
    pub purge_interval: Duration,
    /// Rotation cursor key sharing the store. Results under it are refused.
    pub cursor_key: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            result_ttl: None,
            purge_interval: Duration::from_secs(60),
            cursor_key: DEFAULT_CURSOR_KEY.to_string(),
        }
    }
}

/// How one result message was handled. The message is acked in every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collected {
    Stored,
    /// The store write failed; the result is lost.
    StoreFailed,
    /// The body was not a result record.
    Malformed,
    /// The task id is the rotation cursor key; storing it would reset the rotation.
    Reserved,
}

impl Collected {
    fn label(self) -> &'static str {
        match self {
            Collected::Stored => "stored",
            Collected::StoreFailed => "store_failed",
            Collected::Malformed => "malformed",
            Collected::Reserved => "reserved",
        }
    }
}

/// Consumes `{taskId, value}` messages and caches each value under its task id.
#[derive(Clone)]
pub struct ResultCollector {
    store: Arc<dyn KvStore>,
    transport: Arc<dyn QueueTransport>,
    result_queue: String,
    config: CollectorConfig,
    shutdown: Arc<Notify>,
}

impl ResultCollector {
    pub fn new(
        store: Arc<dyn KvStore>,
        transport: Arc<dyn QueueTransport>,
        result_queue: impl Into<String>,
        config: CollectorConfig,
    ) -> Self {
        Self {
            store,
            transport,
            result_queue: result_queue.into(),
            config,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Signal the collector loop to stop.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Consume results until shutdown.
    pub async fn run(&self) -> Result<()> {
        self.transport.declare(&self.result_queue).await?;
        info!(queue = %self.result_queue, "collector listening for results");

        let mut last_purge = Instant::now();
        loop {
            // Shutdown wins over a busy channel.
            let step = tokio::select! {
                biased;
                _ = self.shutdown.notified() => {
                    info!("collector shutting down");
                    return Ok(());
                }
                step = self.process_next() => step,
            };

            // Drain whatever is visible before sleeping.
            let drained = match step {
                Ok(Some(_)) => false,
                Ok(None) => true,
                Err(e) => {
                    error!(queue = %self.result_queue, error = %e, "collector error");
                    true
                }
            };

            if self.config.result_ttl.is_some()
                && last_purge.elapsed() >= self.config.purge_interval
            {
                self.purge().await;
                last_purge = Instant::now();
            }

            if drained {
                tokio::select! {
                    _ = self.shutdown.notified() => {
                        info!("collector shutting down");
                        return Ok(());
                    }
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                }
            }
        }
    }

    /// Handle at most one result message. `Ok(None)` when the channel is empty.
    ///
    /// Errors come only from the transport (receive or ack); store failures
    /// are absorbed and reported as [`Collected::StoreFailed`].
    pub async fn process_next(&self) -> Result<Option<Collected>> {
        let Some(delivery) = self.transport.receive(&self.result_queue).await? else {
            return Ok(None);
        };

        let outcome = self.persist(&delivery).await;
        metrics::results_collected().add(1, &[KeyValue::new("result", outcome.label())]);

        self.transport
            .ack(&self.result_queue, delivery.tag)
            .await?;
        debug!(msg_id = delivery.tag, outcome = outcome.label(), "result message acked");
        Ok(Some(outcome))
    }

    async fn persist(&self, delivery: &Delivery) -> Collected {
        let result = match TaskResult::from_bytes(&delivery.body) {
            Ok(r) => r,
            Err(e) => {
                warn!(msg_id = delivery.tag, error = %e, "dropping malformed result message");
                return Collected::Malformed;
            }
        };

        if result.task_id.as_str() == self.config.cursor_key {
            warn!(task.id = %result.task_id, "dropping result keyed by the rotation cursor");
            return Collected::Reserved;
        }

        let value = match serde_json::to_string(&result.value) {
            Ok(v) => v,
            Err(e) => {
                warn!(task.id = %result.task_id, error = %e, "result value not encodable");
                return Collected::Malformed;
            }
        };

        let written = match self.config.result_ttl {
            Some(ttl) => {
                self.store
                    .set_with_ttl(result.task_id.as_str(), &value, ttl)
                    .await
            }
            None => self.store.set(result.task_id.as_str(), &value).await,
        };

        match written {
            Ok(()) => {
                info!(task.id = %result.task_id, "result cached");
                Collected::Stored
            }
            Err(e) => {
                error!(task.id = %result.task_id, error = %e, "failed to cache result, dropping it");
                Collected::StoreFailed
            }
        }
    }

    async fn purge(&self) {
        match self.store.purge_expired().await {
            Ok(0) => {}
            Ok(n) => info!(purged = n, "expired results purged"),
            Err(e) => warn!(error = %e, "purging expired results failed"),
        }
    }
}
