//! Dependency edges between tasks.
//!
//! An edge `predecessor -> successor` means the successor depends on the
//! predecessor. The edge type decides which gate of the successor (start or
//! finish) is held back, and by which condition of the predecessor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::actor::{Actor, ActorKind};
use super::ids::{DependencyId, TaskId};

/// Opaque key/value bag attached to an edge.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    FinishToStart,
    StartToStart,
    FinishToFinish,
    StartToFinish,
}

impl DependencyType {
    pub const ALL: [DependencyType; 4] = [
        DependencyType::FinishToStart,
        DependencyType::StartToStart,
        DependencyType::FinishToFinish,
        DependencyType::StartToFinish,
    ];

    /// Does this edge hold back the successor's start (vs. its finish)?
    pub fn gates_start(self) -> bool {
        matches!(
            self,
            DependencyType::FinishToStart | DependencyType::StartToStart
        )
    }

    /// Does the predecessor have to complete (vs. merely start)?
    pub fn requires_predecessor_completion(self) -> bool {
        matches!(
            self,
            DependencyType::FinishToStart | DependencyType::FinishToFinish
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DependencyType::FinishToStart => "finish_to_start",
            DependencyType::StartToStart => "start_to_start",
            DependencyType::FinishToFinish => "finish_to_finish",
            DependencyType::StartToFinish => "start_to_finish",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s.trim())
    }
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted dependency edge.
///
/// Serialized in the flat row shape used by the persistence layer
/// (`created_by` + `created_by_type` instead of a nested actor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "DependencyRecord", from = "DependencyRecord")]
pub struct TaskDependency {
    pub id: DependencyId,
    pub predecessor_task_id: TaskId,
    pub successor_task_id: TaskId,
    pub dependency_type: DependencyType,
    pub lag_days: u32,
    pub metadata: Metadata,
    pub created_by: Option<Actor>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TaskDependency {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn endpoints(&self) -> (TaskId, TaskId) {
        (self.predecessor_task_id, self.successor_task_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DependencyRecord {
    id: DependencyId,
    predecessor_task_id: TaskId,
    successor_task_id: TaskId,
    dependency_type: DependencyType,
    #[serde(default)]
    lag_days: u32,
    #[serde(default)]
    metadata: Metadata,
    created_by: Option<u64>,
    created_by_type: Option<ActorKind>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deleted_at: Option<DateTime<Utc>>,
}

impl From<TaskDependency> for DependencyRecord {
    fn from(dep: TaskDependency) -> Self {
        Self {
            id: dep.id,
            predecessor_task_id: dep.predecessor_task_id,
            successor_task_id: dep.successor_task_id,
            dependency_type: dep.dependency_type,
            lag_days: dep.lag_days,
            metadata: dep.metadata,
            created_by: dep.created_by.map(|a| a.id),
            created_by_type: dep.created_by.map(|a| a.kind),
            created_at: dep.created_at,
            updated_at: dep.updated_at,
            deleted_at: dep.deleted_at,
        }
    }
}

impl From<DependencyRecord> for TaskDependency {
    fn from(row: DependencyRecord) -> Self {
        let created_by = match (row.created_by, row.created_by_type) {
            (Some(id), Some(kind)) => Some(Actor::new(id, kind)),
            _ => None,
        };
        Self {
            id: row.id,
            predecessor_task_id: row.predecessor_task_id,
            successor_task_id: row.successor_task_id,
            dependency_type: row.dependency_type,
            lag_days: row.lag_days,
            metadata: row.metadata,
            created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

/// Input for `DependencyStore::add_edge`.
///
/// `lag_days` is signed so out-of-range input can be rejected instead of
/// silently wrapping.
#[derive(Debug, Clone)]
pub struct NewDependency {
    pub predecessor_task_id: TaskId,
    pub successor_task_id: TaskId,
    pub dependency_type: DependencyType,
    pub lag_days: i64,
    pub metadata: Metadata,
    pub created_by: Option<Actor>,
}

impl NewDependency {
    pub fn new(predecessor: TaskId, successor: TaskId, dependency_type: DependencyType) -> Self {
        Self {
            predecessor_task_id: predecessor,
            successor_task_id: successor,
            dependency_type,
            lag_days: 0,
            metadata: Metadata::new(),
            created_by: None,
        }
    }

    pub fn lag_days(mut self, lag_days: i64) -> Self {
        self.lag_days = lag_days;
        self
    }

    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn created_by(mut self, actor: Actor) -> Self {
        self.created_by = Some(actor);
        self
    }
}

/// Mutable fields of an existing edge. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct DependencyPatch {
    pub dependency_type: Option<DependencyType>,
    pub lag_days: Option<i64>,
    pub metadata: Option<Metadata>,
}
