//! OverdueSweeper - moves open tasks past their due date to `overdue`.
//!
//! # Flow
//! 1. list live tasks, keep `pending`/`in_progress` with `due_date < now`
//! 2. transition each through `StatusService` (`ChangeReason::DeadlineElapsed`)
//! 3. a conflicting concurrent change skips the task until the next sweep
//!
//! Overdue is not a completion, so no successor changes status; their cached
//! readiness is still dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::app::status::StatusService;
use crate::domain::{Actor, ChangeReason, TaskError, TaskStatus, TaskStatusChanged};
use crate::ports::{Clock, TaskStore};

pub struct OverdueSweeper {
    tasks: Arc<dyn TaskStore>,
    status: Arc<StatusService>,
    clock: Arc<dyn Clock>,
}

impl OverdueSweeper {
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        status: Arc<StatusService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tasks,
            status,
            clock,
        }
    }

    /// One pass over all live tasks.
    pub async fn sweep_once(&self) -> Result<Vec<TaskStatusChanged>, TaskError> {
        let now = self.clock.now();
        let due: Vec<_> = self
            .tasks
            .list()
            .await?
            .into_iter()
            .filter(|t| t.is_overdue_at(now))
            .collect();

        let mut changed = Vec::with_capacity(due.len());
        for task in due {
            match self
                .status
                .change_status(
                    task.id,
                    TaskStatus::Overdue,
                    Some(Actor::system()),
                    ChangeReason::DeadlineElapsed,
                )
                .await
            {
                Ok(update) => changed.push(update.event),
                Err(
                    e @ (TaskError::VersionConflict { .. } | TaskError::InvalidTransition { .. }),
                ) => {
                    debug!(task = %task.id, error = %e, "task changed during sweep, skipped");
                }
                Err(TaskError::NotFound(_)) => {}
                Err(e) => warn!(task = %task.id, error = %e, "marking task overdue failed"),
            }
        }

        if !changed.is_empty() {
            info!(count = changed.len(), "tasks marked overdue");
        }
        Ok(changed)
    }

    /// Sweep every `interval` until `shutdown` turns true.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            if let Err(e) = self.sweep_once().await {
                warn!(error = %e, "overdue sweep failed");
            }
        }
        debug!("overdue sweeper stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::builder::EngineBuilder;
    use crate::domain::NewTask;
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn sweep_marks_open_tasks_past_due() {
        let start = Utc.with_ymd_and_hms(2024, 12, 2, 8, 0, 0).unwrap();
        let clock = Arc::new(FixedClock::new(start));
        let engine = EngineBuilder::new().clock(clock.clone()).build().unwrap();
        let status = engine.status();

        let late = status
            .create_task(NewTask::new("essay").due(start + chrono::Duration::days(1)))
            .await
            .unwrap();
        let done = status
            .create_task(NewTask::new("quiz").due(start + chrono::Duration::days(1)))
            .await
            .unwrap();
        let open = status.create_task(NewTask::new("reading")).await.unwrap();
        status.update_status(done.id, TaskStatus::InProgress, None).await.unwrap();
        status.update_status(done.id, TaskStatus::Completed, None).await.unwrap();

        assert!(engine.sweeper().sweep_once().await.unwrap().is_empty());

        clock.advance(chrono::Duration::days(2));
        let changed = engine.sweeper().sweep_once().await.unwrap();

        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].task_id, late.id);
        assert_eq!(changed[0].reason, ChangeReason::DeadlineElapsed);
        assert_eq!(status.get_task(late.id).await.unwrap().status, TaskStatus::Overdue);
        assert_eq!(status.get_task(open.id).await.unwrap().status, TaskStatus::Pending);

        assert!(engine.sweeper().sweep_once().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let engine = EngineBuilder::new().build().unwrap();
        let sweeper = engine.sweeper().clone();
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(async move { sweeper.run(Duration::from_millis(5), rx).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
