//! Judge task domain types
//!
//! A [`JudgeTask`] is the submission payload: a caller-supplied identity plus
//! an opaque executable action. The scheduler's registry owns the canonical
//! [`TaskRecord`]; `list` snapshots and the completion queue carry clones.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status of a judge task
///
/// Transitions are monotonic: pending -> running -> {done, failed}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for an execution slot
    #[default]
    Pending,
    /// Action currently executing
    Running,
    /// Action returned a result
    Done,
    /// Action returned an error or panicked
    Failed,
}

impl TaskStatus {
    /// Whether this status is terminal (no further transitions)
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// The executable body of a judge task
///
/// Invoked exactly once by the dispatch loop, outside any registry lock. A
/// returned error (or a panic) is captured into the task's record and never
/// propagates further.
#[async_trait]
pub trait JudgeAction: Send + Sync {
    async fn run(&self) -> eyre::Result<Value>;
}

struct FnAction<F>(F);

#[async_trait]
impl<F, Fut> JudgeAction for FnAction<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = eyre::Result<Value>> + Send,
{
    async fn run(&self) -> eyre::Result<Value> {
        (self.0)().await
    }
}

/// Submission payload: identity plus action, not yet assigned an id
#[derive(Clone)]
pub struct JudgeTask {
    /// Caller-supplied identity (e.g. a submission reference)
    pub name: String,
    /// Opaque executable unit
    pub action: Arc<dyn JudgeAction>,
}

impl JudgeTask {
    /// Create a new judge task from an action trait object
    pub fn new(name: impl Into<String>, action: Arc<dyn JudgeAction>) -> Self {
        Self {
            name: name.into(),
            action,
        }
    }

    /// Create a judge task from an async closure
    pub fn from_fn<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = eyre::Result<Value>> + Send + 'static,
    {
        Self {
            name: name.into(),
            action: Arc::new(FnAction(f)),
        }
    }
}

impl fmt::Debug for JudgeTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JudgeTask").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Canonical record of a scheduled task
///
/// `result` and `error` are mutually exclusive and written exactly once, at
/// the terminal transition together with `finished_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Unique identifier, assigned at schedule time
    pub id: String,

    /// Caller-supplied identity
    pub name: String,

    /// Current status
    pub status: TaskStatus,

    /// Action output, set only when status is done
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Captured failure, set only when status is failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// When the task was accepted
    pub submitted_at: DateTime<Utc>,

    /// When the dispatch loop started the action
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,

    /// When the task reached a terminal status
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    /// Create a pending record for a freshly scheduled task
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: TaskStatus::Pending,
            result: None,
            error: None,
            submitted_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }
}
