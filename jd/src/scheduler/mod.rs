//! Judge task scheduling
//!
//! [`TaskScheduler`] is the capability interface: admission query, completion
//! queue access, registry listing/cleaning, scheduling, and the dispatch
//! loop. Concrete variants are selected at construction time;
//! [`InMemoryScheduler`] is the bounded FIFO in-memory one.

use async_trait::async_trait;
use thiserror::Error;

mod config;
mod core;
mod queue;

pub use config::{AdmissionPolicy, SchedulerConfig};
pub use core::InMemoryScheduler;
pub use queue::{FinishedTaskQueue, QueueState, SchedulerStats};

use crate::domain::{JudgeTask, TaskRecord};

/// Errors from scheduler operations
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// `schedule` under [`AdmissionPolicy::RejectWhenFull`] with no capacity
    #[error("scheduler at capacity: {pending} pending + {running} running (limit {limit})")]
    CapacityExceeded {
        pending: usize,
        running: usize,
        limit: usize,
    },

    /// `start` was called a second time
    #[error("scheduler already started")]
    AlreadyStarted,

    /// `schedule` after shutdown
    #[error("scheduler is shut down")]
    ShutDown,
}

/// Capability interface for judge task schedulers
#[async_trait]
pub trait TaskScheduler: Send + Sync {
    /// Whether the scheduler currently has capacity for one more judge task
    ///
    /// Non-blocking and advisory: under the default accept-and-queue policy
    /// it does not gate [`schedule`](Self::schedule).
    fn can_accept_judge_task(&self) -> bool;

    /// Handle to the completion channel
    ///
    /// Every task lands there exactly once after reaching a terminal status,
    /// in finish order.
    fn finished_judge_tasks_queue(&self) -> FinishedTaskQueue;

    /// Remove every terminal (done or failed) task from the registry
    ///
    /// Idempotent; never touches pending or running tasks, nor the
    /// completion queue.
    async fn clean(&self) -> Result<(), SchedulerError>;

    /// Insertion-order snapshot of every known task
    async fn list(&self) -> Vec<TaskRecord>;

    /// Admit a task and return its assigned id without waiting for execution
    async fn schedule(&self, task: JudgeTask) -> Result<String, SchedulerError>;

    /// Run the dispatch loop until shutdown
    async fn start(&self) -> Result<(), SchedulerError>;
}
