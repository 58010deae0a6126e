//! Judged - In-process judge task scheduler
//!
//! Judged admits "judge" work items (units of work submitted for evaluation)
//! under a capacity policy, queues them FIFO, executes them on a bounded pool
//! of tokio tasks, and reports every completion exactly once over a single
//! completion channel.
//!
//! # Core Concepts
//!
//! - **Bounded admission**: `can_accept_judge_task` is an advisory, lock-free
//!   capacity query; admission policy decides what `schedule` does when full
//! - **FIFO dispatch**: tasks begin execution in submission order, bounded by
//!   the configured concurrency limit
//! - **Exactly-once completion**: every task lands on the completion queue
//!   once, after its terminal transition, in finish order
//! - **Failure isolation**: an action that errors or panics becomes a failed
//!   record; the dispatch loop never dies with it
//!
//! # Modules
//!
//! - [`domain`] - Task entity: submission payload, action trait, records
//! - [`scheduler`] - The capability trait and the in-memory implementation

pub mod domain;
pub mod scheduler;

// Re-export commonly used types
pub use domain::{JudgeAction, JudgeTask, TaskRecord, TaskStatus, generate_id};
pub use scheduler::{
    AdmissionPolicy, FinishedTaskQueue, InMemoryScheduler, QueueState, SchedulerConfig, SchedulerError,
    SchedulerStats, TaskScheduler,
};
