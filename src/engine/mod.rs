//! Dispatch engine: dedup, worker rotation, result collection, worker runtime.

pub mod collector;
pub mod dispatcher;
pub mod query;
pub mod selector;
pub mod worker;

pub use collector::{Collected, CollectorConfig, ResultCollector};
pub use dispatcher::{Dispatcher, SubmitResult};
pub use query::ResultQuery;
pub use selector::{DEFAULT_CURSOR_KEY, WorkerSelector};
pub use worker::{DelayProcessor, Handled, TaskProcessor, WorkerConfig, WorkerRuntime};
