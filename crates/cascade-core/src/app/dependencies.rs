//! DependencyService - link / unlink / query dependency edges.
//!
//! Adds the checks that need the task side (both endpoints must exist) on top
//! of the store's structural invariants, and keeps readiness caches in step
//! with edge changes.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::app::readiness::ReadinessEvaluator;
use crate::domain::{
    Actor, BlockingKind, DependencyError, DependencyId, DependencyPatch, DependencyType, Metadata,
    NewDependency, ReadinessResult, Task, TaskDependency, TaskError, TaskId,
};
use crate::impls::ReadinessCache;
use crate::ports::{CacheInvalidator, Clock, DependencyStore, TaskStore};

/// Create-dependency request as received from the outer API.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkRequest {
    pub predecessor_task_id: TaskId,
    pub successor_task_id: TaskId,
    pub dependency_type: DependencyType,
    /// Defaults to 0.
    #[serde(default)]
    pub lag_days: Option<i64>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
    #[serde(default)]
    pub created_by: Option<Actor>,
}

impl LinkRequest {
    pub fn new(predecessor: TaskId, successor: TaskId, dependency_type: DependencyType) -> Self {
        Self {
            predecessor_task_id: predecessor,
            successor_task_id: successor,
            dependency_type,
            lag_days: None,
            metadata: None,
            created_by: None,
        }
    }

    pub fn lag_days(mut self, lag_days: i64) -> Self {
        self.lag_days = Some(lag_days);
        self
    }

    pub fn created_by(mut self, actor: Actor) -> Self {
        self.created_by = Some(actor);
        self
    }
}

impl From<LinkRequest> for NewDependency {
    fn from(req: LinkRequest) -> Self {
        NewDependency {
            predecessor_task_id: req.predecessor_task_id,
            successor_task_id: req.successor_task_id,
            dependency_type: req.dependency_type,
            lag_days: req.lag_days.unwrap_or(0),
            metadata: req.metadata.unwrap_or_default(),
            created_by: req.created_by,
        }
    }
}

pub struct DependencyService {
    tasks: Arc<dyn TaskStore>,
    dependencies: Arc<dyn DependencyStore>,
    evaluator: ReadinessEvaluator,
    clock: Arc<dyn Clock>,
    invalidator: Arc<dyn CacheInvalidator>,
    cache: Option<Arc<ReadinessCache>>,
}

impl DependencyService {
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        dependencies: Arc<dyn DependencyStore>,
        clock: Arc<dyn Clock>,
        invalidator: Arc<dyn CacheInvalidator>,
    ) -> Self {
        Self {
            tasks,
            dependencies,
            evaluator: ReadinessEvaluator::new(),
            clock,
            invalidator,
            cache: None,
        }
    }

    /// Serve `readiness` from `cache`. The same cache has to be the engine's
    /// invalidator, otherwise entries go stale.
    pub fn with_cache(mut self, cache: Arc<ReadinessCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    async fn ensure_task(&self, id: TaskId) -> Result<Task, DependencyError> {
        match self.tasks.get(id).await {
            Ok(task) => Ok(task),
            Err(TaskError::NotFound(_)) => Err(DependencyError::TaskNotFound(id)),
            Err(e) => Err(DependencyError::Storage(e.to_string())),
        }
    }

    pub async fn link(&self, request: LinkRequest) -> Result<TaskDependency, DependencyError> {
        if request.predecessor_task_id == request.successor_task_id {
            return Err(DependencyError::SelfDependency(request.predecessor_task_id));
        }
        self.ensure_task(request.predecessor_task_id).await?;
        self.ensure_task(request.successor_task_id).await?;

        let edge = self.dependencies.add_edge(request.into()).await?;
        self.invalidator.invalidate(edge.successor_task_id).await;
        Ok(edge)
    }

    pub async fn update(
        &self,
        id: DependencyId,
        patch: DependencyPatch,
    ) -> Result<TaskDependency, DependencyError> {
        let edge = self.dependencies.update_edge(id, patch).await?;
        self.invalidator.invalidate(edge.successor_task_id).await;
        Ok(edge)
    }

    /// Move an edge to new endpoints (delete + recreate semantics).
    pub async fn relink(
        &self,
        id: DependencyId,
        predecessor: TaskId,
        successor: TaskId,
    ) -> Result<TaskDependency, DependencyError> {
        let old = self
            .dependencies
            .get(id)
            .await?
            .ok_or(DependencyError::DependencyNotFound(id))?;
        if predecessor == successor {
            return Err(DependencyError::SelfDependency(predecessor));
        }
        self.ensure_task(predecessor).await?;
        self.ensure_task(successor).await?;

        let edge = self.dependencies.relink(id, predecessor, successor).await?;
        self.invalidator.invalidate(old.successor_task_id).await;
        self.invalidator.invalidate(edge.successor_task_id).await;
        Ok(edge)
    }

    pub async fn unlink(&self, id: DependencyId) -> Result<bool, DependencyError> {
        let Some(edge) = self.dependencies.get(id).await? else {
            return Ok(false);
        };
        let removed = self.dependencies.remove_edge(id).await?;
        if removed {
            self.invalidator.invalidate(edge.successor_task_id).await;
        }
        Ok(removed)
    }

    pub async fn get(&self, id: DependencyId) -> Result<Option<TaskDependency>, DependencyError> {
        self.dependencies.get(id).await
    }

    /// Direct prerequisites of `task`.
    pub async fn prerequisites(
        &self,
        task: TaskId,
    ) -> Result<Vec<TaskDependency>, DependencyError> {
        self.dependencies.inbound_edges(task).await
    }

    /// Tasks that directly depend on `task`.
    pub async fn dependents(&self, task: TaskId) -> Result<Vec<TaskDependency>, DependencyError> {
        self.dependencies.outbound_edges(task).await
    }

    pub async fn chain(&self, task: TaskId) -> Result<Vec<TaskDependency>, DependencyError> {
        self.dependencies.dependency_chain(task).await
    }

    /// Readiness of `id`, served from the cache when one is attached.
    pub async fn readiness(&self, id: TaskId) -> Result<ReadinessResult, DependencyError> {
        let Some(cache) = &self.cache else {
            return self.evaluate(id).await;
        };
        if let Some(hit) = cache.get(id).await {
            return Ok(hit);
        }

        let generation = cache.generation(id).await;
        let result = self.evaluate(id).await?;

        // Lag windows expire on their own, so only lag-free verdicts are cached.
        let lag_pending = result
            .blocking_reasons
            .iter()
            .any(|r| matches!(r.kind, BlockingKind::LagPending { .. }));
        if !lag_pending {
            cache.put_if_current(id, generation, result.clone()).await;
        }
        Ok(result)
    }

    /// Readiness of `id` from current state, bypassing the cache.
    pub async fn evaluate(&self, id: TaskId) -> Result<ReadinessResult, DependencyError> {
        let task = self.ensure_task(id).await?;
        let inbound = self.dependencies.inbound_edges(id).await?;
        let predecessor_ids: Vec<TaskId> = inbound.iter().map(|e| e.predecessor_task_id).collect();
        let predecessors: HashMap<TaskId, Task> = self
            .tasks
            .get_many(&predecessor_ids)
            .await
            .map_err(|e| DependencyError::Storage(e.to_string()))?
            .into_iter()
            .map(|t| (t.id, t))
            .collect();

        let result = self
            .evaluator
            .can_progress(&task, &inbound, &predecessors, self.clock.now());
        debug!(
            task = %id,
            can_start = result.can_start,
            can_finish = result.can_finish,
            "readiness evaluated"
        );
        Ok(result)
    }

    pub async fn can_task_start(&self, id: TaskId) -> Result<bool, DependencyError> {
        Ok(self.readiness(id).await?.can_start)
    }
}
