//! Round-robin worker selection over a durable cursor.

use crate::error::{Error, Result};
use crate::model::WorkerId;
use crate::store::KvStore;
use std::sync::Arc;
use tracing::debug;

/// Store key holding the id of the most recently selected worker. Reserved:
/// no task may use it as its id.
pub const DEFAULT_CURSOR_KEY: &str = "supervisor:last_selected_worker";

/// Hands out worker ids `1, 2, ..., worker_count, 1, ...`.
///
/// The cursor lives in the store so the rotation survives restarts and is
/// shared by every dispatcher pointed at the same store. Each step is a
/// single atomic [`KvStore::rotate`], so concurrent callers get distinct,
/// sequential ids.
#[derive(Clone)]
pub struct WorkerSelector {
    store: Arc<dyn KvStore>,
    worker_count: u32,
    cursor_key: String,
}

impl WorkerSelector {
    pub fn new(store: Arc<dyn KvStore>, worker_count: u32) -> Result<Self> {
        if worker_count == 0 {
            return Err(Error::Config("worker_count must be at least 1".to_string()));
        }
        Ok(Self {
            store,
            worker_count,
            cursor_key: DEFAULT_CURSOR_KEY.to_string(),
        })
    }

    /// Keep the cursor under a different key, e.g. one per pool.
    pub fn with_cursor_key(mut self, key: impl Into<String>) -> Self {
        self.cursor_key = key.into();
        self
    }

    pub fn worker_count(&self) -> u32 {
        self.worker_count
    }

    pub fn cursor_key(&self) -> &str {
        &self.cursor_key
    }

    /// Advance the cursor and return the selected worker.
    pub async fn next(&self) -> Result<WorkerId> {
        let next = self
            .store
            .rotate(&self.cursor_key, self.worker_count)
            .await?;
        debug!(worker.id = next, "selected worker");
        Ok(WorkerId(next))
    }

    /// The most recently selected worker, without advancing.
    /// `None` on a cold cursor.
    pub async fn current(&self) -> Result<Option<WorkerId>> {
        let raw = self.store.get(&self.cursor_key).await?;
        Ok(raw
            .and_then(|v| v.trim().parse::<u32>().ok())
            .filter(|n| (1..=self.worker_count).contains(n))
            .map(WorkerId))
    }
}
