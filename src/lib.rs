//! # supervisor-rs
//!
//! Round-robin task dispatch with a durable result cache.
//!
//! Submitted tasks are deduplicated against cached results, assigned to a
//! worker by a store-backed rotation cursor, and published on a queue. Workers
//! publish results that a collector caches by task id for later lookup. The
//! store and queue are traits with Postgres/pgmq and in-memory implementations.

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod model;
pub mod queue;
pub mod store;
pub mod telemetry;
