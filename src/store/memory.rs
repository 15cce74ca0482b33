//! In-process key-value store.
//!
//! Every operation takes the map lock once, so `rotate` is atomic with
//! respect to concurrent callers in the same process.

use super::{KvStore, MAX_TTL, next_in_rotation};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock()
            .map(|map| map.values().filter(|e| e.is_live(now)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .lock()
            .map_err(|_| Error::Store("memory store lock poisoned".to_string()))
    }

    fn insert(&self, key: &str, value: &str, expires_at: Option<Instant>) -> Result<()> {
        self.lock()?.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        Ok(self
            .lock()?
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.insert(key, value, None)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let expires_at = if ttl > MAX_TTL {
            None
        } else {
            Instant::now().checked_add(ttl)
        };
        self.insert(key, value, expires_at)
    }

    async fn rotate(&self, key: &str, modulus: u32) -> Result<u32> {
        if modulus == 0 {
            return Err(Error::Config("rotation modulus must be at least 1".to_string()));
        }
        let now = Instant::now();
        let mut map = self.lock()?;
        let current = map
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.as_str());
        let next = next_in_rotation(current, modulus);
        map.insert(
            key.to_string(),
            Entry {
                value: next.to_string(),
                expires_at: None,
            },
        );
        Ok(next)
    }

    async fn purge_expired(&self) -> Result<u64> {
        let now = Instant::now();
        let mut map = self.lock()?;
        let before = map.len();
        map.retain(|_, e| e.is_live(now));
        Ok((before - map.len()) as u64)
    }
}
