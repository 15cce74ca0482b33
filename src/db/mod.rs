//! Postgres backing for both external collaborators.
//!
//! One pool serves the key-value store (`kv_entries`, see [`kv`]) and the
//! queue transport (pgmq, see [`pgmq`]). The schema lives in `migrations/`.

pub mod kv;
pub mod pgmq;

use crate::config::{Config, secrets::redact_url};
use crate::error::{Error, Result};
use crate::queue::QueueTransport;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

/// Database handle. Implements [`crate::store::KvStore`] and [`QueueTransport`].
pub struct Db {
    pool: PgPool,
    /// Seconds a received pgmq message stays hidden before redelivery.
    visibility_timeout: i32,
}

impl Db {
    /// Connect to Postgres and create a connection pool.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;
        Ok(Self {
            pool,
            visibility_timeout: 60,
        })
    }

    /// Connect, migrate, and declare every channel the configured pool uses.
    pub async fn open(config: &Config) -> Result<Self> {
        info!(url = %redact_url(&config.database_url), "connecting to postgres");
        let db = Self::connect(config.database_url.expose_secret()).await?;
        db.migrate().await?;
        for channel in config.channels.all_task_channels(config.worker_count) {
            db.declare(&channel).await?;
        }
        db.declare(&config.channels.result_queue).await?;
        Ok(db)
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Other(format!("migration failed: {e}")))
    }

    /// Round trip a trivial query.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }
}
