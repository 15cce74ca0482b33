//! In-process queue transport with visibility-timeout redelivery.

use super::{Delivery, QueueTransport};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Message {
    id: i64,
    read_count: i32,
    enqueued_at: DateTime<Utc>,
    body: Vec<u8>,
}

#[derive(Debug, Default)]
struct Channel {
    ready: VecDeque<Message>,
    in_flight: HashMap<i64, (Message, Instant)>,
}

impl Channel {
    /// Move messages whose visibility timeout lapsed back to the front.
    fn reclaim(&mut self, now: Instant) {
        let mut expired: Vec<i64> = self
            .in_flight
            .iter()
            .filter(|(_, (_, deadline))| *deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        expired.sort_unstable_by(|a, b| b.cmp(a));
        for id in expired {
            if let Some((msg, _)) = self.in_flight.remove(&id) {
                self.ready.push_front(msg);
            }
        }
    }
}

#[derive(Debug)]
struct State {
    next_id: i64,
    channels: HashMap<String, Channel>,
}

#[derive(Debug)]
pub struct MemoryTransport {
    state: Mutex<State>,
    visibility_timeout: Duration,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl MemoryTransport {
    pub fn new(visibility_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(State {
                next_id: 1,
                channels: HashMap::new(),
            }),
            visibility_timeout,
        }
    }

    /// Messages not yet acked on `channel`, whether visible or in flight.
    pub fn depth(&self, channel: &str) -> usize {
        self.lock()
            .ok()
            .and_then(|state| {
                state
                    .channels
                    .get(channel)
                    .map(|c| c.ready.len() + c.in_flight.len())
            })
            .unwrap_or(0)
    }

    /// Copies of the visible messages on `channel`, oldest first.
    pub fn peek(&self, channel: &str) -> Vec<Vec<u8>> {
        self.lock()
            .ok()
            .and_then(|state| {
                state
                    .channels
                    .get(channel)
                    .map(|c| c.ready.iter().map(|m| m.body.clone()).collect())
            })
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| Error::Queue("memory transport lock poisoned".to_string()))
    }
}

#[async_trait]
impl QueueTransport for MemoryTransport {
    async fn declare(&self, channel: &str) -> Result<()> {
        self.lock()?
            .channels
            .entry(channel.to_string())
            .or_default();
        Ok(())
    }

    async fn publish(&self, channel: &str, body: &[u8]) -> Result<i64> {
        let mut state = self.lock()?;
        let id = state.next_id;
        state.next_id += 1;
        state
            .channels
            .entry(channel.to_string())
            .or_default()
            .ready
            .push_back(Message {
                id,
                read_count: 0,
                enqueued_at: Utc::now(),
                body: body.to_vec(),
            });
        Ok(id)
    }

    async fn receive(&self, channel: &str) -> Result<Option<Delivery>> {
        let now = Instant::now();
        let mut state = self.lock()?;
        let Some(chan) = state.channels.get_mut(channel) else {
            return Ok(None);
        };
        chan.reclaim(now);
        let Some(mut msg) = chan.ready.pop_front() else {
            return Ok(None);
        };
        msg.read_count += 1;
        let delivery = Delivery {
            tag: msg.id,
            read_count: msg.read_count,
            enqueued_at: msg.enqueued_at,
            body: msg.body.clone(),
        };
        chan.in_flight
            .insert(msg.id, (msg, now + self.visibility_timeout));
        Ok(Some(delivery))
    }

    async fn ack(&self, channel: &str, tag: i64) -> Result<()> {
        let mut state = self.lock()?;
        let removed = state
            .channels
            .get_mut(channel)
            .and_then(|c| c.in_flight.remove(&tag));
        match removed {
            Some(_) => Ok(()),
            None => Err(Error::Queue(format!(
                "no in-flight message {tag} on channel {channel}"
            ))),
        }
    }
}
