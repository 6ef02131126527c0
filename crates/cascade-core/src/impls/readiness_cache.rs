//! ReadinessCache - per-task cache of computed readiness.
//!
//! Invalidated by exact task id through `CacheInvalidator`; there is no
//! pattern-based sweep. Entries are only ever derived data: dropping one is
//! always safe, the next read recomputes it.
//!
//! Every invalidation bumps the task's generation. A reader takes the
//! generation before loading state and stores its verdict with
//! `put_if_current`, so a verdict computed from state that was invalidated
//! mid-read is dropped instead of outliving the invalidation.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::trace;

use crate::domain::{ReadinessResult, TaskId};
use crate::ports::CacheInvalidator;

#[derive(Default)]
struct CacheState {
    entries: HashMap<TaskId, ReadinessResult>,
    generations: HashMap<TaskId, u64>,
}

#[derive(Default)]
pub struct ReadinessCache {
    state: Mutex<CacheState>,
}

impl ReadinessCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, task: TaskId) -> Option<ReadinessResult> {
        self.state.lock().await.entries.get(&task).cloned()
    }

    /// Current generation of `task`; take it before reading the state a
    /// verdict is computed from.
    pub async fn generation(&self, task: TaskId) -> u64 {
        self.state
            .lock()
            .await
            .generations
            .get(&task)
            .copied()
            .unwrap_or(0)
    }

    /// Store `result` unless `task` was invalidated since `generation` was
    /// taken. Returns whether it was stored.
    pub async fn put_if_current(
        &self,
        task: TaskId,
        generation: u64,
        result: ReadinessResult,
    ) -> bool {
        let mut state = self.state.lock().await;
        if state.generations.get(&task).copied().unwrap_or(0) != generation {
            trace!(task = %task, "readiness verdict went stale while computing, not cached");
            return false;
        }
        state.entries.insert(task, result);
        true
    }

    /// Unconditional store.
    pub async fn put(&self, task: TaskId, result: ReadinessResult) {
        self.state.lock().await.entries.insert(task, result);
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.entries.is_empty()
    }
}

#[async_trait]
impl CacheInvalidator for ReadinessCache {
    async fn invalidate(&self, task_id: TaskId) {
        let mut state = self.state.lock().await;
        *state.generations.entry(task_id).or_insert(0) += 1;
        if state.entries.remove(&task_id).is_some() {
            trace!(task = %task_id, "readiness cache entry dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    #[tokio::test]
    async fn invalidate_is_idempotent() {
        let cache = ReadinessCache::new();
        let task = TaskId::from_ulid(Ulid::new());
        cache.put(task, ReadinessResult::unconstrained()).await;
        assert_eq!(cache.get(task).await, Some(ReadinessResult::unconstrained()));

        cache.invalidate(task).await;
        cache.invalidate(task).await;

        assert_eq!(cache.get(task).await, None);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn verdict_from_before_an_invalidation_is_not_stored() {
        let cache = ReadinessCache::new();
        let task = TaskId::from_ulid(Ulid::new());

        let before = cache.generation(task).await;
        cache.invalidate(task).await;
        assert!(!cache.put_if_current(task, before, ReadinessResult::unconstrained()).await);
        assert_eq!(cache.get(task).await, None);

        let current = cache.generation(task).await;
        assert_ne!(current, before);
        assert!(cache.put_if_current(task, current, ReadinessResult::unconstrained()).await);
        assert!(cache.get(task).await.is_some());
    }
}
