//! Queue transport contract.
//!
//! At-least-once delivery of opaque byte messages on named channels. A
//! received message stays invisible to other consumers until it is acked or
//! its visibility timeout lapses, after which it is delivered again. pgmq
//! implements it in [`crate::db::pgmq`]; [`MemoryTransport`] is the
//! in-process implementation used by tests.

pub mod memory;

pub use memory::MemoryTransport;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A message handed to a consumer, to be acked by `tag` once handled.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub tag: i64,
    /// How many times this message has been received, including this one.
    pub read_count: i32,
    pub enqueued_at: DateTime<Utc>,
    pub body: Vec<u8>,
}

#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Create the channel if it does not exist (idempotent).
    async fn declare(&self, channel: &str) -> Result<()>;

    /// Append a message. Returns the transport's message id.
    async fn publish(&self, channel: &str, body: &[u8]) -> Result<i64>;

    /// Take the next visible message, or `None` when the channel is empty.
    async fn receive(&self, channel: &str) -> Result<Option<Delivery>>;

    /// Remove a received message for good.
    async fn ack(&self, channel: &str, tag: i64) -> Result<()>;
}
