//! Readiness - whether a task's prerequisites let it start or finish.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::dependency::DependencyType;
use super::ids::{DependencyId, TaskId};
use super::state::TaskStatus;

/// Why one inbound edge is not satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockingKind {
    /// The predecessor has to complete first.
    NotCompleted { status: TaskStatus },
    /// The predecessor has to start first.
    NotStarted { status: TaskStatus },
    /// The condition is met but the lag has not elapsed yet.
    LagPending { until: DateTime<Utc> },
    /// A cancelled predecessor can never satisfy the edge.
    PredecessorCancelled,
    /// The predecessor is deleted or could not be found.
    PredecessorMissing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockingReason {
    pub dependency_id: DependencyId,
    pub predecessor_id: TaskId,
    pub dependency_type: DependencyType,
    #[serde(flatten)]
    pub kind: BlockingKind,
}

impl fmt::Display for BlockingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let gate = if self.dependency_type.gates_start() {
            "start"
        } else {
            "finish"
        };
        match &self.kind {
            BlockingKind::NotCompleted { status } => write!(
                f,
                "cannot {gate}: predecessor {} is {status}, must be completed ({})",
                self.predecessor_id, self.dependency_type
            ),
            BlockingKind::NotStarted { status } => write!(
                f,
                "cannot {gate}: predecessor {} is {status}, must have started ({})",
                self.predecessor_id, self.dependency_type
            ),
            BlockingKind::LagPending { until } => write!(
                f,
                "cannot {gate}: lag after predecessor {} elapses at {} ({})",
                self.predecessor_id,
                until.to_rfc3339(),
                self.dependency_type
            ),
            BlockingKind::PredecessorCancelled => write!(
                f,
                "cannot {gate}: predecessor {} was cancelled ({})",
                self.predecessor_id, self.dependency_type
            ),
            BlockingKind::PredecessorMissing => write!(
                f,
                "cannot {gate}: predecessor {} no longer exists ({})",
                self.predecessor_id, self.dependency_type
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessResult {
    pub can_start: bool,
    pub can_finish: bool,
    /// Every unsatisfied edge, including ones that do not change the verdict.
    pub blocking_reasons: Vec<BlockingReason>,
}

impl ReadinessResult {
    /// A task without inbound edges.
    pub fn unconstrained() -> Self {
        Self {
            can_start: true,
            can_finish: true,
            blocking_reasons: Vec::new(),
        }
    }

    pub fn is_blocked_by(&self, predecessor: TaskId) -> bool {
        self.blocking_reasons
            .iter()
            .any(|r| r.predecessor_id == predecessor)
    }

    /// Human-readable reasons, for APIs that expect a list of strings.
    pub fn reason_messages(&self) -> Vec<String> {
        self.blocking_reasons.iter().map(ToString::to_string).collect()
    }
}
