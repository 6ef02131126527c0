//! TaskStore port - the collaborator that owns tasks and their status.
//!
//! # Contract
//! - `transition` is a compare-and-set on `version`: a stale version is
//!   rejected with `TaskError::VersionConflict`, so concurrent changes to one
//!   task serialize.
//! - The store validates the state machine (`TaskStatus::can_transition_to`).
//! - Deleted tasks are invisible to `get` and `list`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{NewTask, Task, TaskError, TaskId, TaskStatus};

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create(&self, task: NewTask) -> Result<Task, TaskError>;

    /// Fetch a live task. `TaskError::NotFound` when missing or deleted.
    async fn get(&self, id: TaskId) -> Result<Task, TaskError>;

    /// Fetch several live tasks; missing ids are skipped.
    async fn get_many(&self, ids: &[TaskId]) -> Result<Vec<Task>, TaskError>;

    async fn list(&self) -> Result<Vec<Task>, TaskError>;

    /// Move `id` to `to` if its version still equals `expected_version`.
    async fn transition(
        &self,
        id: TaskId,
        expected_version: u64,
        to: TaskStatus,
        at: DateTime<Utc>,
    ) -> Result<Task, TaskError>;

    /// Soft delete.
    async fn delete(&self, id: TaskId, at: DateTime<Utc>) -> Result<Task, TaskError>;
}
