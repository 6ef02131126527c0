//! In-memory DependencyStore.
//!
//! All edge state sits behind one mutex, so every write runs validation,
//! cycle check and commit in a single critical section.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::domain::{
    DependencyError, DependencyId, DependencyPatch, NewDependency, TaskDependency, TaskId,
};
use crate::graph::{DependencyGraph, EdgeRef, would_create_cycle};
use crate::ports::{Clock, DependencyStore, IdGenerator};

struct DependencyState {
    /// Every edge ever created; removed ones carry `deleted_at`.
    edges: HashMap<DependencyId, TaskDependency>,

    /// Index over live edges only.
    graph: DependencyGraph,
}

impl DependencyState {
    fn live(&self, id: DependencyId) -> Option<&TaskDependency> {
        self.edges.get(&id).filter(|e| !e.is_deleted())
    }

    fn resolve(&self, refs: Vec<EdgeRef>) -> Vec<TaskDependency> {
        refs.into_iter()
            .filter_map(|r| self.edges.get(&r.id).cloned())
            .collect()
    }

    /// Self, duplicate and cycle checks for a prospective `predecessor -> successor` edge.
    fn check_endpoints(
        &self,
        predecessor: TaskId,
        successor: TaskId,
    ) -> Result<(), DependencyError> {
        if predecessor == successor {
            return Err(DependencyError::SelfDependency(predecessor));
        }
        if self.graph.edge_between(predecessor, successor).is_some() {
            return Err(DependencyError::Duplicate {
                predecessor,
                successor,
            });
        }
        if would_create_cycle(&self.graph, predecessor, successor) {
            return Err(DependencyError::Cyclic {
                predecessor,
                successor,
            });
        }
        Ok(())
    }
}

pub struct InMemoryDependencyStore {
    state: Mutex<DependencyState>,
    max_lag_days: u32,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl InMemoryDependencyStore {
    pub fn new(max_lag_days: u32, ids: Arc<dyn IdGenerator>, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(DependencyState {
                edges: HashMap::new(),
                graph: DependencyGraph::new(),
            }),
            max_lag_days,
            ids,
            clock,
        }
    }

    fn check_lag(&self, lag_days: i64) -> Result<u32, DependencyError> {
        u32::try_from(lag_days)
            .ok()
            .filter(|&lag| lag <= self.max_lag_days)
            .ok_or(DependencyError::InvalidLag {
                lag_days,
                max: self.max_lag_days,
            })
    }

    /// Snapshot of the live graph, for diagnostics and invariant checks.
    pub async fn graph_snapshot(&self) -> DependencyGraph {
        self.state.lock().await.graph.clone()
    }
}

#[async_trait]
impl DependencyStore for InMemoryDependencyStore {
    async fn add_edge(&self, new: NewDependency) -> Result<TaskDependency, DependencyError> {
        let predecessor = new.predecessor_task_id;
        let successor = new.successor_task_id;

        let mut state = self.state.lock().await;
        if predecessor == successor {
            return Err(DependencyError::SelfDependency(predecessor));
        }
        let lag_days = self.check_lag(new.lag_days)?;
        state.check_endpoints(predecessor, successor)?;

        let now = self.clock.now();
        let edge = TaskDependency {
            id: self.ids.generate_dependency_id(),
            predecessor_task_id: predecessor,
            successor_task_id: successor,
            dependency_type: new.dependency_type,
            lag_days,
            metadata: new.metadata,
            created_by: new.created_by,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        state.graph.insert(predecessor, successor, edge.id);
        state.edges.insert(edge.id, edge.clone());

        info!(
            dependency = %edge.id,
            predecessor = %predecessor,
            successor = %successor,
            dependency_type = %edge.dependency_type,
            lag_days,
            "dependency added"
        );
        Ok(edge)
    }

    async fn update_edge(
        &self,
        id: DependencyId,
        patch: DependencyPatch,
    ) -> Result<TaskDependency, DependencyError> {
        let lag_days = patch.lag_days.map(|lag| self.check_lag(lag)).transpose()?;

        let mut state = self.state.lock().await;
        let edge = state
            .edges
            .get_mut(&id)
            .filter(|e| !e.is_deleted())
            .ok_or(DependencyError::DependencyNotFound(id))?;

        if let Some(dependency_type) = patch.dependency_type {
            edge.dependency_type = dependency_type;
        }
        if let Some(lag_days) = lag_days {
            edge.lag_days = lag_days;
        }
        if let Some(metadata) = patch.metadata {
            edge.metadata = metadata;
        }
        edge.updated_at = self.clock.now();

        debug!(dependency = %id, "dependency updated");
        Ok(edge.clone())
    }

    async fn relink(
        &self,
        id: DependencyId,
        predecessor: TaskId,
        successor: TaskId,
    ) -> Result<TaskDependency, DependencyError> {
        let mut state = self.state.lock().await;
        let (old_pred, old_succ) = state
            .live(id)
            .map(TaskDependency::endpoints)
            .ok_or(DependencyError::DependencyNotFound(id))?;

        if (old_pred, old_succ) == (predecessor, successor) {
            return Ok(state.edges[&id].clone());
        }

        // Check against the graph without the edge being replaced.
        state.graph.remove(old_pred, old_succ);
        if let Err(e) = state.check_endpoints(predecessor, successor) {
            state.graph.insert(old_pred, old_succ, id);
            return Err(e);
        }
        state.graph.insert(predecessor, successor, id);

        let now = self.clock.now();
        let edge = state
            .edges
            .get_mut(&id)
            .ok_or(DependencyError::DependencyNotFound(id))?;
        edge.predecessor_task_id = predecessor;
        edge.successor_task_id = successor;
        edge.updated_at = now;

        info!(
            dependency = %id,
            predecessor = %predecessor,
            successor = %successor,
            "dependency relinked"
        );
        Ok(edge.clone())
    }

    async fn remove_edge(&self, id: DependencyId) -> Result<bool, DependencyError> {
        let mut state = self.state.lock().await;
        let Some((pred, succ)) = state.live(id).map(TaskDependency::endpoints) else {
            return Ok(false);
        };
        state.graph.remove(pred, succ);

        let now = self.clock.now();
        if let Some(edge) = state.edges.get_mut(&id) {
            edge.deleted_at = Some(now);
            edge.updated_at = now;
        }
        info!(dependency = %id, predecessor = %pred, successor = %succ, "dependency removed");
        Ok(true)
    }

    async fn remove_edges_for_task(
        &self,
        task: TaskId,
    ) -> Result<Vec<TaskDependency>, DependencyError> {
        let mut state = self.state.lock().await;
        let now = self.clock.now();

        let mut removed = Vec::new();
        for r in state.graph.incident(task) {
            state.graph.remove(r.predecessor, r.successor);
            if let Some(edge) = state.edges.get_mut(&r.id) {
                edge.deleted_at = Some(now);
                edge.updated_at = now;
                removed.push(edge.clone());
            }
        }
        if !removed.is_empty() {
            info!(task = %task, removed = removed.len(), "dependencies removed with task");
        }
        Ok(removed)
    }

    async fn get(&self, id: DependencyId) -> Result<Option<TaskDependency>, DependencyError> {
        Ok(self.state.lock().await.live(id).cloned())
    }

    async fn outbound_edges(&self, task: TaskId) -> Result<Vec<TaskDependency>, DependencyError> {
        let state = self.state.lock().await;
        Ok(state.resolve(state.graph.outbound(task)))
    }

    async fn inbound_edges(&self, task: TaskId) -> Result<Vec<TaskDependency>, DependencyError> {
        let state = self.state.lock().await;
        Ok(state.resolve(state.graph.inbound(task)))
    }

    async fn dependency_chain(
        &self,
        task: TaskId,
    ) -> Result<Vec<TaskDependency>, DependencyError> {
        let state = self.state.lock().await;
        Ok(state.resolve(state.graph.prerequisite_chain(task)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Actor, DependencyType, Metadata};
    use crate::ports::{FixedClock, UlidGenerator};
    use chrono::{TimeZone, Utc};
    use rstest::rstest;
    use ulid::Ulid;

    fn store() -> InMemoryDependencyStore {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 9, 1, 9, 0, 0).unwrap(),
        ));
        InMemoryDependencyStore::new(365, Arc::new(UlidGenerator::new(clock.clone())), clock)
    }

    fn task() -> TaskId {
        TaskId::from_ulid(Ulid::new())
    }

    fn fs(pred: TaskId, succ: TaskId) -> NewDependency {
        NewDependency::new(pred, succ, DependencyType::FinishToStart)
    }

    #[tokio::test]
    async fn add_edge_is_visible_from_both_ends() {
        let store = store();
        let (a, b) = (task(), task());

        let edge = store
            .add_edge(fs(a, b).lag_days(3).created_by(Actor::lecturer(7)))
            .await
            .unwrap();

        assert_eq!(edge.lag_days, 3);
        assert_eq!(edge.created_by, Some(Actor::lecturer(7)));
        assert_eq!(store.outbound_edges(a).await.unwrap(), vec![edge.clone()]);
        assert_eq!(store.inbound_edges(b).await.unwrap(), vec![edge.clone()]);
        assert!(store.inbound_edges(a).await.unwrap().is_empty());
        assert_eq!(store.get(edge.id).await.unwrap(), Some(edge));
    }

    #[tokio::test]
    async fn self_dependency_is_rejected() {
        let store = store();
        let a = task();

        assert_eq!(
            store.add_edge(fs(a, a)).await,
            Err(DependencyError::SelfDependency(a))
        );
    }

    #[tokio::test]
    async fn duplicate_pair_is_rejected() {
        let store = store();
        let (a, b) = (task(), task());
        store.add_edge(fs(a, b)).await.unwrap();

        let again = NewDependency::new(a, b, DependencyType::StartToStart);
        assert_eq!(
            store.add_edge(again).await,
            Err(DependencyError::Duplicate {
                predecessor: a,
                successor: b
            })
        );
        assert_eq!(store.outbound_edges(a).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cycle_is_rejected_and_graph_unchanged() {
        let store = store();
        let (a, b, c) = (task(), task(), task());
        store.add_edge(fs(a, b)).await.unwrap();
        store.add_edge(fs(b, c)).await.unwrap();
        let before: Vec<_> = store.graph_snapshot().await.edges().collect();

        assert_eq!(
            store.add_edge(fs(c, a)).await,
            Err(DependencyError::Cyclic {
                predecessor: c,
                successor: a
            })
        );
        let after: Vec<_> = store.graph_snapshot().await.edges().collect();
        assert_eq!(before, after);
    }

    #[rstest]
    #[case(-1)]
    #[case(366)]
    #[case(400)]
    #[tokio::test]
    async fn lag_out_of_range_is_rejected(#[case] lag: i64) {
        let store = store();
        let (a, b) = (task(), task());

        assert_eq!(
            store.add_edge(fs(a, b).lag_days(lag)).await,
            Err(DependencyError::InvalidLag {
                lag_days: lag,
                max: 365
            })
        );
        assert!(store.outbound_edges(a).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_changes_only_mutable_fields() {
        let store = store();
        let (a, b) = (task(), task());
        let edge = store.add_edge(fs(a, b)).await.unwrap();

        let mut metadata = Metadata::new();
        metadata.insert("room".into(), serde_json::json!("B12"));
        let updated = store
            .update_edge(
                edge.id,
                DependencyPatch {
                    dependency_type: Some(DependencyType::FinishToFinish),
                    lag_days: Some(5),
                    metadata: Some(metadata.clone()),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.endpoints(), (a, b));
        assert_eq!(updated.dependency_type, DependencyType::FinishToFinish);
        assert_eq!(updated.lag_days, 5);
        assert_eq!(updated.metadata, metadata);

        let bad = DependencyPatch {
            lag_days: Some(1000),
            ..Default::default()
        };
        assert!(matches!(
            store.update_edge(edge.id, bad).await,
            Err(DependencyError::InvalidLag { .. })
        ));
        assert_eq!(store.get(edge.id).await.unwrap().unwrap().lag_days, 5);
    }

    #[tokio::test]
    async fn relink_reruns_invariants() {
        let store = store();
        let (a, b, c) = (task(), task(), task());
        let ab = store.add_edge(fs(a, b)).await.unwrap();
        store.add_edge(fs(b, c)).await.unwrap();

        // c -> b would close b -> c -> b.
        assert_eq!(
            store.relink(ab.id, c, b).await,
            Err(DependencyError::Cyclic {
                predecessor: c,
                successor: b
            })
        );
        assert_eq!(store.get(ab.id).await.unwrap().unwrap().endpoints(), (a, b));

        // c -> a is fine once a -> b is gone.
        let moved = store.relink(ab.id, c, a).await.unwrap();
        assert_eq!(moved.endpoints(), (c, a));
        assert_eq!(moved.id, ab.id);
        assert!(store.outbound_edges(a).await.unwrap().is_empty());
        assert_eq!(store.inbound_edges(a).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn removed_edges_disappear_and_pair_can_be_relinked() {
        let store = store();
        let (a, b) = (task(), task());
        let edge = store.add_edge(fs(a, b)).await.unwrap();

        assert!(store.remove_edge(edge.id).await.unwrap());
        assert!(!store.remove_edge(edge.id).await.unwrap());
        assert_eq!(store.get(edge.id).await.unwrap(), None);
        assert!(store.inbound_edges(b).await.unwrap().is_empty());

        let again = store.add_edge(fs(a, b)).await.unwrap();
        assert_ne!(again.id, edge.id);
    }

    #[tokio::test]
    async fn removing_a_task_drops_incident_edges() {
        let store = store();
        let (a, b, c) = (task(), task(), task());
        store.add_edge(fs(a, b)).await.unwrap();
        store.add_edge(fs(b, c)).await.unwrap();
        let ac = store.add_edge(fs(a, c)).await.unwrap();

        let removed = store.remove_edges_for_task(b).await.unwrap();

        assert_eq!(removed.len(), 2);
        assert!(removed.iter().all(TaskDependency::is_deleted));
        assert_eq!(store.outbound_edges(a).await.unwrap(), vec![ac]);
    }

    #[tokio::test]
    async fn chain_covers_transitive_prerequisites() {
        let store = store();
        let (a, b, c, d) = (task(), task(), task(), task());
        store.add_edge(fs(a, b)).await.unwrap();
        store.add_edge(fs(b, c)).await.unwrap();
        store.add_edge(fs(d, c)).await.unwrap();

        let chain = store.dependency_chain(c).await.unwrap();
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.last().unwrap().endpoints(), (a, b));
        assert!(store.dependency_chain(a).await.unwrap().is_empty());
    }
}
