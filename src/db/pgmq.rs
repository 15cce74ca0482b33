//! pgmq queue transport via direct SQLx.
//!
//! Calls pgmq's SQL functions: pgmq.create, pgmq.send, pgmq.read,
//! pgmq.delete. pgmq stores messages as jsonb, so bodies must be JSON.

use crate::error::{Error, Result};
use crate::queue::{Delivery, QueueTransport};
use crate::telemetry::metrics;
use async_trait::async_trait;
use opentelemetry::KeyValue;

fn record(queue_name: &str, operation: &'static str) {
    metrics::queue_operations().add(
        1,
        &[
            KeyValue::new("queue", queue_name.to_string()),
            KeyValue::new("operation", operation),
        ],
    );
}

#[async_trait]
impl QueueTransport for super::Db {
    async fn declare(&self, queue_name: &str) -> Result<()> {
        sqlx::query("SELECT pgmq.create($1)")
            .bind(queue_name)
            .execute(self.pool())
            .await?;
        record(queue_name, "create");
        Ok(())
    }

    async fn publish(&self, queue_name: &str, body: &[u8]) -> Result<i64> {
        let payload: serde_json::Value = serde_json::from_slice(body)?;
        let row: (i64,) = sqlx::query_as("SELECT pgmq.send($1, $2, 0)")
            .bind(queue_name)
            .bind(&payload)
            .fetch_one(self.pool())
            .await?;
        record(queue_name, "send");
        Ok(row.0)
    }

    async fn receive(&self, queue_name: &str) -> Result<Option<Delivery>> {
        let row = sqlx::query_as::<
            _,
            (
                i64,
                i32,
                chrono::DateTime<chrono::Utc>,
                serde_json::Value,
            ),
        >("SELECT msg_id, read_ct, enqueued_at, message FROM pgmq.read($1, $2, 1)")
        .bind(queue_name)
        .bind(self.visibility_timeout)
        .fetch_optional(self.pool())
        .await?;

        let delivery = match row {
            Some((msg_id, read_ct, enqueued_at, message)) => Some(Delivery {
                tag: msg_id,
                read_count: read_ct,
                enqueued_at,
                body: serde_json::to_vec(&message)?,
            }),
            None => None,
        };

        record(
            queue_name,
            if delivery.is_some() { "read" } else { "read_empty" },
        );
        Ok(delivery)
    }

    async fn ack(&self, queue_name: &str, tag: i64) -> Result<()> {
        let deleted: (bool,) = sqlx::query_as("SELECT pgmq.delete($1, $2)")
            .bind(queue_name)
            .bind(tag)
            .fetch_one(self.pool())
            .await?;
        record(queue_name, "delete");
        if deleted.0 {
            Ok(())
        } else {
            Err(Error::Queue(format!(
                "message {tag} not found on queue {queue_name}"
            )))
        }
    }
}
