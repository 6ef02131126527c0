//! Events - domain events published by the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::actor::Actor;
use super::ids::TaskId;
use super::state::TaskStatus;

/// Why a status changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeReason {
    /// A client asked for it.
    Manual,
    /// Dependency cascade started from `triggered_by` completing.
    Cascade { triggered_by: TaskId },
    /// The due date passed without completion.
    DeadlineElapsed,
}

/// Published once per durable status transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatusChanged {
    pub task_id: TaskId,
    pub old_status: TaskStatus,
    pub new_status: TaskStatus,
    pub reason: ChangeReason,
    pub actor: Option<Actor>,
    pub occurred_at: DateTime<Utc>,
}

impl TaskStatusChanged {
    pub fn is_completion(&self) -> bool {
        self.new_status == TaskStatus::Completed
    }
}
