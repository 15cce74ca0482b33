//! Key-value store contract.
//!
//! A flat string-key/string-value map that outlives the dispatcher process.
//! Holds cached results (whose presence doubles as the dedup marker) and the
//! worker rotation cursor. Postgres implements it in [`crate::db::kv`];
//! [`MemoryStore`] is the in-process implementation used by tests.

pub mod memory;

pub use memory::MemoryStore;

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Longest TTL honoured by [`KvStore::set_with_ttl`]. Anything longer is
/// stored without an expiry.
pub const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a key. `Ok(None)` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a key with no expiry, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Write a key that stops being visible after `ttl`. A `ttl` above
    /// [`MAX_TTL`] behaves like [`KvStore::set`].
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Atomically advance a cyclic counter and return the new value.
    ///
    /// Reads the integer under `key` (0 when absent or unparsable), stores
    /// `(current % modulus) + 1` and returns it, all as one operation, so two
    /// concurrent callers never observe the same value.
    async fn rotate(&self, key: &str, modulus: u32) -> Result<u32>;

    /// Delete expired entries. Returns how many were removed.
    async fn purge_expired(&self) -> Result<u64>;
}

/// The rotation step shared by every implementation.
pub(crate) fn next_in_rotation(current: Option<&str>, modulus: u32) -> u32 {
    let cursor = current
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .unwrap_or(0);
    ((cursor % u64::from(modulus)) + 1) as u32
}

#[cfg(test)]
mod tests {
    use super::next_in_rotation;

    #[test]
    fn rotation_wraps_and_tolerates_garbage() {
        assert_eq!(next_in_rotation(None, 3), 1);
        assert_eq!(next_in_rotation(Some("1"), 3), 2);
        assert_eq!(next_in_rotation(Some("3"), 3), 1);
        assert_eq!(next_in_rotation(Some("not a number"), 3), 1);
        assert_eq!(next_in_rotation(Some("7"), 3), 2);
    }
}
