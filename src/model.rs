//! Core data model.
//!
//! A task is a unit of work with a caller-visible id and an opaque payload.
//! The dispatcher stamps it with the worker that should run it; the worker
//! answers with a result keyed by the same id.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Task identifier. Also the key the result is cached under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// A fresh random id, used when the submitter did not provide one.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Worker identifier, `1..=worker_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub u32);

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// A task as it travels on the task channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,

    /// Arbitrary data for the worker. The dispatcher doesn't interpret it.
    #[serde(default)]
    pub payload: serde_json::Value,

    /// Assigned by the dispatcher right before the task is published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<WorkerId>,
}

impl Task {
    /// Encode for the task channel.
    pub fn to_bytes(&self) -> crate::error::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a task channel message.
    pub fn from_bytes(bytes: &[u8]) -> crate::error::Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Output of processing a task, as it travels on the result channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    pub task_id: TaskId,
    pub value: serde_json::Value,
}

impl TaskResult {
    pub fn to_bytes(&self) -> crate::error::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> crate::error::Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for submissions. The dispatcher's public API for new work.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub(crate) id: Option<TaskId>,
    pub(crate) payload: serde_json::Value,
}

impl NewTask {
    pub fn new(payload: serde_json::Value) -> Self {
        Self { id: None, payload }
    }

    /// Use a caller-supplied id instead of a generated one.
    pub fn id(mut self, id: impl Into<TaskId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Resolve the id, generating one when missing or empty.
    pub(crate) fn into_task(self) -> Task {
        let id = match self.id {
            Some(id) if !id.0.trim().is_empty() => id,
            _ => TaskId::generate(),
        };
        Task {
            id,
            payload: self.payload,
            worker_id: None,
        }
    }
}
