//! StatusService - entry point for status changes.
//!
//! # Flow
//! 1. load the task, check the state machine
//! 2. gate `in_progress` on `can_start` and `completed` on `can_finish`,
//!    evaluated from current state rather than the cache
//! 3. compare-and-set transition in the TaskStore
//! 4. publish `TaskStatusChanged`
//! 5. run the cascade synchronously; its failures never fail this call

use std::sync::Arc;

use tracing::info;

use crate::app::cascade::{CascadeReport, StatusCascadeEngine};
use crate::app::dependencies::DependencyService;
use crate::domain::{
    Actor, ChangeReason, NewTask, Task, TaskError, TaskId, TaskStatus, TaskStatusChanged,
};
use crate::ports::{CacheInvalidator, Clock, DependencyStore, EventBus, TaskStore};

/// Result of a successful status change.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub task: Task,
    pub event: TaskStatusChanged,
    pub cascade: CascadeReport,
}

pub struct StatusService {
    tasks: Arc<dyn TaskStore>,
    dependencies: Arc<dyn DependencyStore>,
    readiness: Arc<DependencyService>,
    cascade: Arc<StatusCascadeEngine>,
    events: Arc<dyn EventBus>,
    invalidator: Arc<dyn CacheInvalidator>,
    clock: Arc<dyn Clock>,
}

impl StatusService {
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        dependencies: Arc<dyn DependencyStore>,
        readiness: Arc<DependencyService>,
        cascade: Arc<StatusCascadeEngine>,
        events: Arc<dyn EventBus>,
        invalidator: Arc<dyn CacheInvalidator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tasks,
            dependencies,
            readiness,
            cascade,
            events,
            invalidator,
            clock,
        }
    }

    pub async fn create_task(&self, task: NewTask) -> Result<Task, TaskError> {
        self.tasks.create(task).await
    }

    pub async fn get_task(&self, id: TaskId) -> Result<Task, TaskError> {
        self.tasks.get(id).await
    }

    pub async fn update_status(
        &self,
        id: TaskId,
        to: TaskStatus,
        actor: Option<Actor>,
    ) -> Result<StatusUpdate, TaskError> {
        self.change_status(id, to, actor, ChangeReason::Manual).await
    }

    pub(crate) async fn change_status(
        &self,
        id: TaskId,
        to: TaskStatus,
        actor: Option<Actor>,
        reason: ChangeReason,
    ) -> Result<StatusUpdate, TaskError> {
        let task = self.tasks.get(id).await?;
        if !task.status.can_transition_to(to) {
            return Err(TaskError::InvalidTransition {
                task: id,
                from: task.status,
                to,
            });
        }

        if matches!(to, TaskStatus::InProgress | TaskStatus::Completed) {
            // Gate on current state; a cached verdict may trail a concurrent
            // cascade.
            let readiness = self.readiness.evaluate(id).await?;
            let allowed = match to {
                TaskStatus::InProgress => readiness.can_start,
                _ => readiness.can_finish,
            };
            if !allowed {
                return Err(TaskError::Blocked {
                    task: id,
                    reasons: readiness.blocking_reasons,
                });
            }
        }

        let now = self.clock.now();
        let updated = self.tasks.transition(id, task.version, to, now).await?;
        let event = TaskStatusChanged {
            task_id: id,
            old_status: task.status,
            new_status: to,
            reason,
            actor,
            occurred_at: now,
        };
        info!(task = %id, from = %task.status, to = %to, "task status changed");
        self.events.publish(event.clone());

        let cascade = self.cascade.on_status_changed(&event).await;
        Ok(StatusUpdate {
            task: updated,
            event,
            cascade,
        })
    }

    /// Soft delete a task together with every edge touching it. Edges go
    /// first: a failure leaves the task in place.
    pub async fn delete_task(&self, id: TaskId) -> Result<Task, TaskError> {
        self.tasks.get(id).await?;
        let removed = self.dependencies.remove_edges_for_task(id).await?;
        let deleted = self.tasks.delete(id, self.clock.now()).await?;

        self.invalidator.invalidate(id).await;
        for edge in &removed {
            let (pred, succ) = edge.endpoints();
            let neighbour = if pred == id { succ } else { pred };
            self.invalidator.invalidate(neighbour).await;
        }
        info!(task = %id, edges = removed.len(), "task deleted");
        Ok(deleted)
    }
}
