//! DependencyStore port - persisted dependency edges.
//!
//! # Invariants enforced at write time
//! 1. no self-dependency
//! 2. at most one live edge per ordered (predecessor, successor) pair
//! 3. no directed cycle
//! 4. `0 <= lag_days <= max_lag_days`
//!
//! Writes are linearized: the cycle check and the insert happen atomically,
//! so two concurrent inserts cannot jointly close a cycle. A rejected write
//! leaves the store untouched.
//!
//! The store does not know about tasks; callers check that endpoints exist.

use async_trait::async_trait;

use crate::domain::{
    DependencyError, DependencyId, DependencyPatch, NewDependency, TaskDependency, TaskId,
};

#[async_trait]
pub trait DependencyStore: Send + Sync {
    async fn add_edge(&self, new: NewDependency) -> Result<TaskDependency, DependencyError>;

    /// Change type / lag / metadata. Endpoints are immutable here.
    async fn update_edge(
        &self,
        id: DependencyId,
        patch: DependencyPatch,
    ) -> Result<TaskDependency, DependencyError>;

    /// Replace both endpoints, re-running invariants 1-3 as if the edge were
    /// deleted and recreated. The edge keeps its id.
    async fn relink(
        &self,
        id: DependencyId,
        predecessor: TaskId,
        successor: TaskId,
    ) -> Result<TaskDependency, DependencyError>;

    /// Soft delete. `false` if there was no live edge with this id.
    async fn remove_edge(&self, id: DependencyId) -> Result<bool, DependencyError>;

    /// Remove every edge touching `task`; returns what was removed.
    async fn remove_edges_for_task(
        &self,
        task: TaskId,
    ) -> Result<Vec<TaskDependency>, DependencyError>;

    async fn get(&self, id: DependencyId) -> Result<Option<TaskDependency>, DependencyError>;

    /// Edges where `task` is the predecessor (tasks that depend on it).
    async fn outbound_edges(&self, task: TaskId) -> Result<Vec<TaskDependency>, DependencyError>;

    /// Edges where `task` is the successor (its prerequisites).
    async fn inbound_edges(&self, task: TaskId) -> Result<Vec<TaskDependency>, DependencyError>;

    /// Transitive prerequisites of `task`, nearest first, each edge once.
    async fn dependency_chain(&self, task: TaskId)
    -> Result<Vec<TaskDependency>, DependencyError>;
}
