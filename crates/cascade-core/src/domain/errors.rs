//! Errors - rejection and failure taxonomy.
//!
//! # Classes
//! - `DependencyError`: edge validation / storage. Returned synchronously,
//!   nothing is partially applied.
//! - `TaskError`: status changes on a single task.
//! - `CascadeStepError`: one successor failed during a cascade. Logged and
//!   collected, never returned as a failure of the triggering change.

use thiserror::Error;

use super::ids::{DependencyId, TaskId};
use super::readiness::BlockingReason;
use super::state::TaskStatus;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DependencyError {
    #[error("task {0} cannot depend on itself")]
    SelfDependency(TaskId),

    #[error("dependency {predecessor} -> {successor} already exists")]
    Duplicate {
        predecessor: TaskId,
        successor: TaskId,
    },

    #[error("dependency {predecessor} -> {successor} would create a cycle")]
    Cyclic {
        predecessor: TaskId,
        successor: TaskId,
    },

    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("dependency not found: {0}")]
    DependencyNotFound(DependencyId),

    #[error("lag_days={lag_days} is outside the allowed range 0..={max}")]
    InvalidLag { lag_days: i64, max: u32 },

    #[error("dependency storage error: {0}")]
    Storage(String),
}

impl DependencyError {
    /// Stable machine-readable code, one per rejection reason.
    pub fn code(&self) -> &'static str {
        match self {
            DependencyError::SelfDependency(_) => "self_dependency",
            DependencyError::Duplicate { .. } => "duplicate_dependency",
            DependencyError::Cyclic { .. } => "cyclic_dependency",
            DependencyError::TaskNotFound(_) => "task_not_found",
            DependencyError::DependencyNotFound(_) => "dependency_not_found",
            DependencyError::InvalidLag { .. } => "invalid_lag",
            DependencyError::Storage(_) => "storage",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("task not found: {0}")]
    NotFound(TaskId),

    #[error("task {task} cannot move from {from} to {to}")]
    InvalidTransition {
        task: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("task {task} was modified concurrently (expected version {expected}, found {actual})")]
    VersionConflict {
        task: TaskId,
        expected: u64,
        actual: u64,
    },

    #[error("task {task} is blocked by {} unsatisfied dependencies", .reasons.len())]
    Blocked {
        task: TaskId,
        reasons: Vec<BlockingReason>,
    },

    #[error(transparent)]
    Dependency(#[from] DependencyError),

    #[error("task storage error: {0}")]
    Storage(String),
}

/// What went wrong for one successor during a cascade.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CascadeCause {
    #[error("fetching task failed: {0}")]
    FetchTask(TaskError),

    #[error("fetching dependencies failed: {0}")]
    FetchEdges(DependencyError),

    #[error("transition failed: {0}")]
    Transition(TaskError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cascade step to {successor} failed: {cause}")]
pub struct CascadeStepError {
    pub successor: TaskId,
    #[source]
    pub cause: CascadeCause,
}

impl CascadeStepError {
    pub fn new(successor: TaskId, cause: CascadeCause) -> Self {
        Self { successor, cause }
    }
}
