//! ReadinessEvaluator - decides whether a task's predecessors let it start
//! or finish.
//!
//! # Rules (predecessor P, lag L days)
//! - finish_to_start: start gate, P completed and L days passed since
//! - start_to_start: start gate, P started and L days passed since
//! - finish_to_finish: finish gate, P completed and L days passed since
//! - start_to_finish: finish gate, P started and L days passed since
//!
//! All edges must hold (AND). A task may not finish before it may start.
//! Every unsatisfied edge is reported, even when another one already decides
//! the verdict.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::domain::{
    BlockingKind, BlockingReason, ReadinessResult, Task, TaskDependency, TaskId, TaskStatus,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct ReadinessEvaluator;

impl ReadinessEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate `task` against its inbound edges.
    ///
    /// `predecessors` maps predecessor ids to their current state; a missing
    /// entry means the predecessor is gone and the edge blocks.
    pub fn can_progress(
        &self,
        task: &Task,
        inbound: &[TaskDependency],
        predecessors: &HashMap<TaskId, Task>,
        now: DateTime<Utc>,
    ) -> ReadinessResult {
        let mut result = ReadinessResult::unconstrained();

        for edge in inbound
            .iter()
            .filter(|e| e.successor_task_id == task.id && !e.is_deleted())
        {
            let predecessor = predecessors
                .get(&edge.predecessor_task_id)
                .filter(|p| !p.is_deleted());
            let Err(kind) = Self::edge_satisfied(edge, predecessor, now) else {
                continue;
            };

            if edge.dependency_type.gates_start() {
                result.can_start = false;
            }
            result.can_finish = false;
            result.blocking_reasons.push(BlockingReason {
                dependency_id: edge.id,
                predecessor_id: edge.predecessor_task_id,
                dependency_type: edge.dependency_type,
                kind,
            });
        }

        result
    }

    /// `Ok(())` when the edge's condition holds at `now`.
    pub fn edge_satisfied(
        edge: &TaskDependency,
        predecessor: Option<&Task>,
        now: DateTime<Utc>,
    ) -> Result<(), BlockingKind> {
        let Some(p) = predecessor else {
            return Err(BlockingKind::PredecessorMissing);
        };
        if p.status == TaskStatus::Cancelled {
            return Err(BlockingKind::PredecessorCancelled);
        }

        let anchor = if edge.dependency_type.requires_predecessor_completion() {
            match (p.status, p.completed_at) {
                (TaskStatus::Completed, Some(at)) => at,
                (status, _) => return Err(BlockingKind::NotCompleted { status }),
            }
        } else {
            match p.started_at {
                Some(at) => at,
                None => return Err(BlockingKind::NotStarted { status: p.status }),
            }
        };

        // A lag past the representable range never elapses.
        let until = Duration::try_days(i64::from(edge.lag_days))
            .and_then(|lag| anchor.checked_add_signed(lag))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        if now < until {
            return Err(BlockingKind::LagPending { until });
        }
        Ok(())
    }
}
