//! Adjacency index over live dependency edges.
//!
//! Design:
//! - Outbound: predecessor -> successors (who depends on me)
//! - Inbound: successor -> predecessors (whom I depend on)
//! - Invariant: outbound and inbound are kept in sync, both carry the edge id
//!
//! BTreeMaps keep every traversal deterministic (ids sort by creation time).

pub mod cycle;

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashSet, VecDeque};

use crate::domain::{DependencyId, TaskId};

pub use cycle::{find_cycle, would_create_cycle};

/// One edge as seen by the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeRef {
    pub id: DependencyId,
    pub predecessor: TaskId,
    pub successor: TaskId,
}

#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    /// predecessor -> (successor -> edge)
    outbound: BTreeMap<TaskId, BTreeMap<TaskId, DependencyId>>,

    /// successor -> (predecessor -> edge)
    inbound: BTreeMap<TaskId, BTreeMap<TaskId, DependencyId>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `predecessor -> successor`. Returns the previous edge id for the
    /// pair if one was already present.
    pub fn insert(
        &mut self,
        predecessor: TaskId,
        successor: TaskId,
        id: DependencyId,
    ) -> Option<DependencyId> {
        self.inbound
            .entry(successor)
            .or_default()
            .insert(predecessor, id);
        self.outbound
            .entry(predecessor)
            .or_default()
            .insert(successor, id)
    }

    /// Drop `predecessor -> successor`, keeping both maps in sync.
    pub fn remove(&mut self, predecessor: TaskId, successor: TaskId) -> Option<DependencyId> {
        let removed = match self.outbound.entry(predecessor) {
            Entry::Occupied(mut e) => {
                let removed = e.get_mut().remove(&successor);
                if e.get().is_empty() {
                    e.remove_entry();
                }
                removed
            }
            Entry::Vacant(_) => None,
        };
        if let Entry::Occupied(mut e) = self.inbound.entry(successor) {
            e.get_mut().remove(&predecessor);
            if e.get().is_empty() {
                e.remove_entry();
            }
        }
        removed
    }

    pub fn edge_between(&self, predecessor: TaskId, successor: TaskId) -> Option<DependencyId> {
        self.outbound
            .get(&predecessor)
            .and_then(|succ| succ.get(&successor))
            .copied()
    }

    /// Tasks that depend on `task`.
    pub fn successors(&self, task: TaskId) -> impl Iterator<Item = TaskId> + '_ {
        self.outbound
            .get(&task)
            .into_iter()
            .flat_map(|succ| succ.keys().copied())
    }

    /// Tasks `task` depends on.
    pub fn predecessors(&self, task: TaskId) -> impl Iterator<Item = TaskId> + '_ {
        self.inbound
            .get(&task)
            .into_iter()
            .flat_map(|pred| pred.keys().copied())
    }

    pub fn outbound(&self, task: TaskId) -> Vec<EdgeRef> {
        self.outbound
            .get(&task)
            .map(|succ| {
                succ.iter()
                    .map(|(&successor, &id)| EdgeRef {
                        id,
                        predecessor: task,
                        successor,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn inbound(&self, task: TaskId) -> Vec<EdgeRef> {
        self.inbound
            .get(&task)
            .map(|pred| {
                pred.iter()
                    .map(|(&predecessor, &id)| EdgeRef {
                        id,
                        predecessor,
                        successor: task,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All edges touching `task`, either direction.
    pub fn incident(&self, task: TaskId) -> Vec<EdgeRef> {
        let mut edges = self.inbound(task);
        edges.extend(self.outbound(task));
        edges
    }

    /// Every live edge, predecessor-major order.
    pub fn edges(&self) -> impl Iterator<Item = EdgeRef> + '_ {
        self.outbound.iter().flat_map(|(&predecessor, succ)| {
            succ.iter().map(move |(&successor, &id)| EdgeRef {
                id,
                predecessor,
                successor,
            })
        })
    }

    pub fn edge_count(&self) -> usize {
        self.outbound.values().map(BTreeMap::len).sum()
    }

    /// Every node that appears in at least one edge.
    pub fn nodes(&self) -> impl Iterator<Item = TaskId> + '_ {
        let mut seen = HashSet::new();
        self.outbound
            .keys()
            .chain(self.inbound.keys())
            .copied()
            .filter(move |t| seen.insert(*t))
    }

    /// Transitive prerequisites of `task`, nearest first.
    ///
    /// Breadth-first over inbound edges. Each node is expanded once, each
    /// edge reported once; terminates even if the graph were cyclic.
    pub fn prerequisite_chain(&self, task: TaskId) -> Vec<EdgeRef> {
        let mut chain = Vec::new();
        let mut visited: HashSet<TaskId> = HashSet::from([task]);
        let mut queue: VecDeque<TaskId> = VecDeque::from([task]);

        while let Some(node) = queue.pop_front() {
            for edge in self.inbound(node) {
                chain.push(edge);
                if visited.insert(edge.predecessor) {
                    queue.push_back(edge.predecessor);
                }
            }
        }
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn ids<const N: usize>() -> [TaskId; N] {
        let mut out: Vec<TaskId> = (0..N).map(|_| TaskId::from_ulid(Ulid::new())).collect();
        out.sort();
        out.try_into().unwrap()
    }

    fn edge_id() -> DependencyId {
        DependencyId::from_ulid(Ulid::new())
    }

    #[test]
    fn new_graph_is_empty() {
        let graph = DependencyGraph::new();
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.nodes().count(), 0);
    }

    #[test]
    fn insert_creates_both_directions() {
        let mut graph = DependencyGraph::new();
        let [a, b] = ids();
        let id = edge_id();

        assert_eq!(graph.insert(a, b, id), None);

        assert_eq!(graph.successors(a).collect::<Vec<_>>(), vec![b]);
        assert_eq!(graph.predecessors(b).collect::<Vec<_>>(), vec![a]);
        assert_eq!(graph.edge_between(a, b), Some(id));
        assert_eq!(graph.edge_between(b, a), None);
    }

    #[test]
    fn remove_clears_both_directions() {
        let mut graph = DependencyGraph::new();
        let [a, b] = ids();
        let id = edge_id();

        graph.insert(a, b, id);
        assert_eq!(graph.remove(a, b), Some(id));

        assert_eq!(graph.successors(a).count(), 0);
        assert_eq!(graph.predecessors(b).count(), 0);
        assert_eq!(graph.nodes().count(), 0);
        assert_eq!(graph.remove(a, b), None);
    }

    #[test]
    fn incident_covers_both_sides() {
        let mut graph = DependencyGraph::new();
        let [a, b, c] = ids();
        graph.insert(a, b, edge_id());
        graph.insert(b, c, edge_id());

        let incident = graph.incident(b);
        assert_eq!(incident.len(), 2);
        assert!(incident.iter().any(|e| e.predecessor == a));
        assert!(incident.iter().any(|e| e.successor == c));
    }

    #[test]
    fn chain_lists_nearest_prerequisites_first() {
        let mut graph = DependencyGraph::new();
        let [a, b, c, d] = ids();
        // a -> b -> d, c -> d
        graph.insert(a, b, edge_id());
        graph.insert(b, d, edge_id());
        graph.insert(c, d, edge_id());

        let chain = graph.prerequisite_chain(d);
        let pairs: Vec<_> = chain.iter().map(|e| (e.predecessor, e.successor)).collect();
        assert_eq!(pairs, vec![(b, d), (c, d), (a, b)]);
    }

    #[test]
    fn chain_expands_shared_prerequisite_once() {
        let mut graph = DependencyGraph::new();
        let [a, b, c, d, root] = ids();
        // Diamond with a shared ancestor: root -> a -> b -> d, a -> c -> d
        graph.insert(root, a, edge_id());
        graph.insert(a, b, edge_id());
        graph.insert(a, c, edge_id());
        graph.insert(b, d, edge_id());
        graph.insert(c, d, edge_id());

        let chain = graph.prerequisite_chain(d);
        assert_eq!(chain.len(), 5);
        let root_edges = chain.iter().filter(|e| e.predecessor == root).count();
        assert_eq!(root_edges, 1);
    }
}
