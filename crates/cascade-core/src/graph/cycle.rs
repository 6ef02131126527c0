//! Cycle detection.
//!
//! `would_create_cycle` is the single gate that keeps the graph acyclic: it
//! runs on every edge insert, before anything is written.

use std::collections::{HashMap, HashSet};

use super::DependencyGraph;
use crate::domain::TaskId;

/// Would adding `predecessor -> successor` close a cycle?
///
/// Iterative DFS from `successor` along outbound edges; reaching
/// `predecessor` means a path `successor ~> predecessor` exists, so the new
/// edge would close it. O(V + E), read-only.
pub fn would_create_cycle(graph: &DependencyGraph, predecessor: TaskId, successor: TaskId) -> bool {
    if predecessor == successor {
        return true;
    }

    let mut visited: HashSet<TaskId> = HashSet::from([successor]);
    let mut stack = vec![successor];

    while let Some(node) = stack.pop() {
        for next in graph.successors(node) {
            if next == predecessor {
                return true;
            }
            if visited.insert(next) {
                stack.push(next);
            }
        }
    }
    false
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// On the current DFS path.
    Gray,
    /// Fully explored.
    Black,
}

/// Find any directed cycle. Returns the nodes along it, first node repeated
/// at the end, or `None` for a DAG.
///
/// Three-colour DFS with an explicit stack. Used for diagnostics and to
/// verify the acyclicity invariant; the write path only needs
/// `would_create_cycle`.
pub fn find_cycle(graph: &DependencyGraph) -> Option<Vec<TaskId>> {
    let mut color: HashMap<TaskId, Color> = HashMap::new();
    let mut roots: Vec<TaskId> = graph.nodes().collect();
    roots.sort();

    for root in roots {
        if color.contains_key(&root) {
            continue;
        }

        // (node, successors not yet explored)
        let mut stack: Vec<(TaskId, Vec<TaskId>)> = Vec::new();
        let mut path: Vec<TaskId> = Vec::new();
        color.insert(root, Color::Gray);
        path.push(root);
        stack.push((root, graph.successors(root).collect()));

        while let Some((node, pending)) = stack.last_mut() {
            let node = *node;
            let Some(next) = pending.pop() else {
                color.insert(node, Color::Black);
                path.pop();
                stack.pop();
                continue;
            };

            match color.get(&next) {
                Some(Color::Gray) => {
                    let start = path.iter().position(|&n| n == next).unwrap_or(0);
                    let mut cycle = path[start..].to_vec();
                    cycle.push(next);
                    return Some(cycle);
                }
                Some(Color::Black) => {}
                None => {
                    color.insert(next, Color::Gray);
                    path.push(next);
                    stack.push((next, graph.successors(next).collect()));
                }
            }
        }
    }
    None
}
