//! Domain types for Judged
//!
//! Core domain types: the JudgeTask submission payload, the JudgeAction
//! executable trait, and the canonical TaskRecord kept by the registry.

mod id;
mod task;

pub use id::generate_id;
pub use task::{JudgeAction, JudgeTask, TaskRecord, TaskStatus};
