//! In-memory TaskStore (development / tests / CLI).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::{NewTask, Task, TaskError, TaskId, TaskStatus};
use crate::ports::{Clock, IdGenerator, TaskStore};

pub struct InMemoryTaskStore {
    /// Single source of truth for tasks, deleted ones included.
    tasks: Mutex<HashMap<TaskId, Task>>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl InMemoryTaskStore {
    pub fn new(ids: Arc<dyn IdGenerator>, clock: Arc<dyn Clock>) -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            ids,
            clock,
        }
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create(&self, new: NewTask) -> Result<Task, TaskError> {
        let now = self.clock.now();
        let task = Task {
            id: self.ids.generate_task_id(),
            title: new.title,
            status: TaskStatus::Pending,
            due_date: new.due_date,
            started_at: None,
            completed_at: None,
            milestone: new.milestone,
            version: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.tasks.lock().await.insert(task.id, task.clone());
        debug!(task = %task.id, title = %task.title, "task created");
        Ok(task)
    }

    async fn get(&self, id: TaskId) -> Result<Task, TaskError> {
        let tasks = self.tasks.lock().await;
        tasks
            .get(&id)
            .filter(|t| !t.is_deleted())
            .cloned()
            .ok_or(TaskError::NotFound(id))
    }

    async fn get_many(&self, ids: &[TaskId]) -> Result<Vec<Task>, TaskError> {
        let tasks = self.tasks.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| tasks.get(id))
            .filter(|t| !t.is_deleted())
            .cloned()
            .collect())
    }

    async fn list(&self) -> Result<Vec<Task>, TaskError> {
        let tasks = self.tasks.lock().await;
        let mut live: Vec<Task> = tasks.values().filter(|t| !t.is_deleted()).cloned().collect();
        live.sort_by_key(|t| t.id);
        Ok(live)
    }

    async fn transition(
        &self,
        id: TaskId,
        expected_version: u64,
        to: TaskStatus,
        at: DateTime<Utc>,
    ) -> Result<Task, TaskError> {
        let mut tasks = self.tasks.lock().await;
        let task = tasks
            .get_mut(&id)
            .filter(|t| !t.is_deleted())
            .ok_or(TaskError::NotFound(id))?;

        if task.version != expected_version {
            return Err(TaskError::VersionConflict {
                task: id,
                expected: expected_version,
                actual: task.version,
            });
        }
        if !task.status.can_transition_to(to) {
            return Err(TaskError::InvalidTransition {
                task: id,
                from: task.status,
                to,
            });
        }

        task.apply_transition(to, at);
        Ok(task.clone())
    }

    async fn delete(&self, id: TaskId, at: DateTime<Utc>) -> Result<Task, TaskError> {
        let mut tasks = self.tasks.lock().await;
        let task = tasks
            .get_mut(&id)
            .filter(|t| !t.is_deleted())
            .ok_or(TaskError::NotFound(id))?;
        task.deleted_at = Some(at);
        task.updated_at = at;
        Ok(task.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, UlidGenerator};
    use chrono::TimeZone;

    fn store() -> InMemoryTaskStore {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 9, 1, 9, 0, 0).unwrap(),
        ));
        InMemoryTaskStore::new(Arc::new(UlidGenerator::new(clock.clone())), clock)
    }

    #[tokio::test]
    async fn create_starts_pending_at_version_zero() {
        let store = store();
        let task = store.create(NewTask::new("Grade essays")).await.unwrap();

        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.version, 0);
        assert_eq!(store.get(task.id).await.unwrap(), task);
    }

    #[tokio::test]
    async fn transition_checks_version() {
        let store = store();
        let task = store.create(NewTask::new("t")).await.unwrap();
        let at = task.created_at;

        let started = store
            .transition(task.id, 0, TaskStatus::InProgress, at)
            .await
            .unwrap();
        assert_eq!(started.version, 1);

        let stale = store
            .transition(task.id, 0, TaskStatus::Completed, at)
            .await;
        assert_eq!(
            stale,
            Err(TaskError::VersionConflict {
                task: task.id,
                expected: 0,
                actual: 1
            })
        );
    }

    #[tokio::test]
    async fn transition_checks_state_machine() {
        let store = store();
        let task = store.create(NewTask::new("t")).await.unwrap();

        let result = store
            .transition(task.id, 0, TaskStatus::Completed, task.created_at)
            .await;
        assert!(matches!(result, Err(TaskError::InvalidTransition { .. })));
        assert_eq!(store.get(task.id).await.unwrap().version, 0);
    }

    #[tokio::test]
    async fn deleted_tasks_are_invisible() {
        let store = store();
        let keep = store.create(NewTask::new("keep")).await.unwrap();
        let gone = store.create(NewTask::new("gone")).await.unwrap();

        store.delete(gone.id, gone.created_at).await.unwrap();

        assert_eq!(store.get(gone.id).await, Err(TaskError::NotFound(gone.id)));
        assert_eq!(store.list().await.unwrap(), vec![keep.clone()]);
        assert_eq!(
            store.get_many(&[keep.id, gone.id]).await.unwrap(),
            vec![keep]
        );
        assert!(store.delete(gone.id, gone.created_at).await.is_err());
    }
}
