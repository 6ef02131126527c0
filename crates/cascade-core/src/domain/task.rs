//! Task entity as seen by the engine.
//!
//! Tasks are owned by the `TaskStore` collaborator. The engine only reads
//! them and asks the store to transition their status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::TaskId;
use super::state::TaskStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub status: TaskStatus,
    pub due_date: Option<DateTime<Utc>>,

    /// Set on the first transition into `in_progress`.
    pub started_at: Option<DateTime<Utc>>,

    /// Set on the transition into `completed`.
    pub completed_at: Option<DateTime<Utc>>,

    /// Zero-work task that completes itself once its prerequisites allow it.
    #[serde(default)]
    pub milestone: bool,

    /// Optimistic concurrency token, bumped on every transition.
    pub version: u64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn has_started(&self) -> bool {
        self.started_at.is_some() && self.status != TaskStatus::Cancelled
    }

    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, TaskStatus::Pending | TaskStatus::InProgress)
            && self.due_date.is_some_and(|due| due < now)
    }

    /// Apply a status change in place. Callers validate the transition first.
    pub(crate) fn apply_transition(&mut self, to: TaskStatus, at: DateTime<Utc>) {
        if to == TaskStatus::InProgress && self.started_at.is_none() {
            self.started_at = Some(at);
        }
        if to == TaskStatus::Completed {
            // Overdue tasks may be completed without an explicit start.
            self.started_at.get_or_insert(at);
            self.completed_at = Some(at);
        }
        self.status = to;
        self.version += 1;
        self.updated_at = at;
    }
}

/// Input for creating a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub milestone: bool,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn due(mut self, due_date: DateTime<Utc>) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn milestone(mut self) -> Self {
        self.milestone = true;
        self
    }
}
