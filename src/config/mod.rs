//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast if required vars are missing or malformed.
//! The database URL is wrapped in secrecy::SecretString to prevent log leaks.

pub mod secrets;

use crate::error::{Error, Result};
use crate::model::WorkerId;
use crate::store::MAX_TTL;
use secrecy::SecretString;
use std::str::FromStr;
use std::time::Duration;

/// How tasks are bound to task channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routing {
    /// One task channel per worker id (`tasks_1`, `tasks_2`, ...).
    PerWorker,
    /// One shared task channel; workers drop tasks addressed to someone else.
    Shared,
}

impl FromStr for Routing {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "per_worker" => Ok(Routing::PerWorker),
            "shared" => Ok(Routing::Shared),
            other => Err(Error::Config(format!(
                "unknown routing mode '{other}' (expected per_worker or shared)"
            ))),
        }
    }
}

/// Names of the channels shared by the dispatcher, the workers, and the collector.
#[derive(Debug, Clone)]
pub struct Channels {
    pub task_queue: String,
    pub result_queue: String,
    pub routing: Routing,
}

impl Default for Channels {
    fn default() -> Self {
        Self {
            task_queue: "tasks".to_string(),
            result_queue: "results".to_string(),
            routing: Routing::PerWorker,
        }
    }
}

impl Channels {
    /// The channel a task assigned to `worker` is published on.
    pub fn task_channel(&self, worker: WorkerId) -> String {
        match self.routing {
            Routing::PerWorker => format!("{}_{}", self.task_queue, worker.0),
            Routing::Shared => self.task_queue.clone(),
        }
    }

    /// Every task channel for a pool of `worker_count` workers.
    pub fn all_task_channels(&self, worker_count: u32) -> Vec<String> {
        match self.routing {
            Routing::PerWorker => (1..=worker_count)
                .map(|n| self.task_channel(WorkerId(n)))
                .collect(),
            Routing::Shared => vec![self.task_queue.clone()],
        }
    }
}

#[derive(Debug)]
pub struct Config {
    pub database_url: SecretString,
    pub worker_count: u32,
    pub channels: Channels,
    pub result_ttl: Option<Duration>,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let worker_count = match std::env::var("WORKER_COUNT") {
            Ok(raw) => parse_var::<u32>("WORKER_COUNT", &raw)?,
            Err(_) => 3,
        };
        if worker_count == 0 {
            return Err(Error::Config("WORKER_COUNT must be at least 1".to_string()));
        }

        let routing = match std::env::var("ROUTING") {
            Ok(raw) => raw.parse()?,
            Err(_) => Routing::PerWorker,
        };

        let result_ttl = match std::env::var("RESULT_TTL_SECS") {
            Ok(raw) => {
                let ttl = Duration::from_secs(parse_var::<u64>("RESULT_TTL_SECS", &raw)?);
                if ttl.is_zero() || ttl > MAX_TTL {
                    return Err(Error::Config(format!(
                        "RESULT_TTL_SECS must be between 1 and {}",
                        MAX_TTL.as_secs()
                    )));
                }
                Some(ttl)
            }
            Err(_) => None,
        };

        Ok(Self {
            database_url: SecretString::from(required_var("DATABASE_URL")?),
            worker_count,
            channels: Channels {
                task_queue: std::env::var("TASK_QUEUE").unwrap_or_else(|_| "tasks".to_string()),
                result_queue: std::env::var("RESULT_QUEUE")
                    .unwrap_or_else(|_| "results".to_string()),
                routing,
            },
            result_ttl,
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| Error::Config(format!("required environment variable {name} is not set")))
}

fn parse_var<T: FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| Error::Config(format!("{name} has an invalid value: '{raw}'")))
}
