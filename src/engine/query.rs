//! Result lookup by task id.

use crate::error::{Error, Result};
use crate::model::TaskId;
use crate::store::KvStore;
use crate::telemetry::metrics;
use opentelemetry::KeyValue;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct ResultQuery {
    store: Arc<dyn KvStore>,
}

impl ResultQuery {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Fetch the cached result for `id`.
    ///
    /// Returns `Error::NotFound` when nothing has been collected for the id.
    /// Any other error is a failed store round trip and says nothing about
    /// whether a result exists.
    pub async fn lookup(&self, id: &TaskId) -> Result<serde_json::Value> {
        let raw = match self.store.get(id.as_str()).await {
            Ok(raw) => raw,
            Err(e) => {
                metrics::result_lookups().add(1, &[KeyValue::new("result", "error")]);
                return Err(e);
            }
        };

        match raw {
            Some(text) => {
                metrics::result_lookups().add(1, &[KeyValue::new("result", "hit")]);
                debug!(task.id = %id, "result found");
                Ok(serde_json::from_str(&text)?)
            }
            None => {
                metrics::result_lookups().add(1, &[KeyValue::new("result", "miss")]);
                debug!(task.id = %id, "result not found");
                Err(Error::NotFound(format!("result for task {id}")))
            }
        }
    }
}
