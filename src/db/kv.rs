//! Key-value store on the `kv_entries` table.

use crate::error::{Error, Result};
use crate::store::{KvStore, MAX_TTL};
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
impl KvStore for super::Db {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT value FROM kv_entries
             WHERE key = $1 AND (expires_at IS NULL OR expires_at > now())",
        )
        .bind(key)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(|(value,)| value))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO kv_entries (key, value, expires_at, updated_at)
             VALUES ($1, $2, NULL, now())
             ON CONFLICT (key) DO UPDATE
             SET value = EXCLUDED.value, expires_at = NULL, updated_at = now()",
        )
        .bind(key)
        .bind(value)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        // make_interval overflows well before Duration does.
        if ttl > MAX_TTL {
            return self.set(key, value).await;
        }
        sqlx::query(
            "INSERT INTO kv_entries (key, value, expires_at, updated_at)
             VALUES ($1, $2, now() + make_interval(secs => $3), now())
             ON CONFLICT (key) DO UPDATE
             SET value = EXCLUDED.value, expires_at = EXCLUDED.expires_at, updated_at = now()",
        )
        .bind(key)
        .bind(value)
        .bind(ttl.as_secs_f64())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn rotate(&self, key: &str, modulus: u32) -> Result<u32> {
        if modulus == 0 {
            return Err(Error::Config("rotation modulus must be at least 1".to_string()));
        }
        // The upsert holds the row lock for the whole read-modify-write, so
        // concurrent callers serialize on it. Non-numeric or expired values
        // count as a cold cursor.
        let row: (String,) = sqlx::query_as(
            "INSERT INTO kv_entries (key, value, expires_at, updated_at)
             VALUES ($1, '1', NULL, now())
             ON CONFLICT (key) DO UPDATE
             SET value = (((CASE
                     WHEN kv_entries.value ~ '^[0-9]+$'
                      AND (kv_entries.expires_at IS NULL OR kv_entries.expires_at > now())
                     THEN kv_entries.value::numeric
                     ELSE 0
                 END) % $2) + 1)::bigint::text,
                 expires_at = NULL,
                 updated_at = now()
             RETURNING value",
        )
        .bind(key)
        .bind(i64::from(modulus))
        .fetch_one(self.pool())
        .await?;

        row.0
            .parse()
            .map_err(|_| Error::Store(format!("rotation cursor {key} holds '{}'", row.0)))
    }

    async fn purge_expired(&self) -> Result<u64> {
        let purged = sqlx::query("DELETE FROM kv_entries WHERE expires_at <= now()")
            .execute(self.pool())
            .await?
            .rows_affected();
        Ok(purged)
    }
}
