//! Graph topology analysis algorithms
//!
//! Dependency depth and dependency ordering over a directed graph where an
//! edge `u -> v` reads "u depends on v".

use super::common::{GraphView, NodeId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    /// The dependency graph contains a cycle through the listed nodes
    #[error("Dependency cycle detected through nodes {0:?}")]
    CycleDetected(Vec<NodeId>),
}

pub type TopologyResult<T> = Result<T, TopologyError>;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Longest dependency chain below each node, indexed like `view.index_to_node`.
///
/// A node with no dependencies has depth 0; otherwise its depth is one more than
/// the deepest node it depends on. Any cycle is an error.
pub fn dependency_depths(view: &GraphView) -> TopologyResult<Vec<usize>> {
    let n = view.node_count;
    let mut depth = vec![0usize; n];
    let mut mark = vec![Mark::Unvisited; n];

    for root in 0..n {
        if mark[root] != Mark::Unvisited {
            continue;
        }

        // Iterative post-order DFS: (node, next successor position)
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
        mark[root] = Mark::InProgress;

        while let Some(&(u, pos)) = stack.last() {
            let successors = view.successors(u);
            if pos < successors.len() {
                let v = successors[pos];
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }
                match mark[v] {
                    Mark::Unvisited => {
                        mark[v] = Mark::InProgress;
                        stack.push((v, 0));
                    }
                    Mark::InProgress => {
                        let start = stack.iter().position(|&(w, _)| w == v).unwrap_or(0);
                        let cycle = stack[start..]
                            .iter()
                            .map(|&(w, _)| view.index_to_node[w])
                            .collect();
                        return Err(TopologyError::CycleDetected(cycle));
                    }
                    Mark::Done => {}
                }
            } else {
                depth[u] = successors.iter().map(|&v| depth[v] + 1).max().unwrap_or(0);
                mark[u] = Mark::Done;
                stack.pop();
            }
        }
    }

    Ok(depth)
}

/// Dependency order: every node appears after all the nodes it depends on.
///
/// Ties are broken by dependency depth and then by ascending node id, so the
/// result does not depend on the order the nodes were supplied in.
pub fn dependency_order(view: &GraphView) -> TopologyResult<Vec<NodeId>> {
    let depths = dependency_depths(view)?;
    let mut order: Vec<(usize, NodeId)> = view
        .index_to_node
        .iter()
        .enumerate()
        .map(|(idx, &node)| (depths[idx], node))
        .collect();
    order.sort_unstable();
    Ok(order.into_iter().map(|(_, node)| node).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_dependency() {
        let view = GraphView::from_edges(&[2, -1], &[(2, -1)]);
        assert_eq!(dependency_order(&view).unwrap(), vec![-1, 2]);
    }

    #[test]
    fn test_shared_leaf_dependency() {
        // -4 -> -6 -> -2
        // -3 -> -5 -> -2
        let view = GraphView::from_edges(
            &[-3, -5, -2, -4, -6],
            &[(-4, -6), (-6, -2), (-3, -5), (-5, -2)],
        );
        assert_eq!(dependency_order(&view).unwrap(), vec![-2, -6, -5, -4, -3]);
    }

    #[test]
    fn test_diamond_dependency() {
        // -6 -> -5 -> -4 -> -2
        // -6 -> -3 -> -2
        // -5 -> -3
        let view = GraphView::from_edges(
            &[-6, -5, -4, -3, -2],
            &[(-6, -5), (-5, -4), (-4, -2), (-6, -3), (-3, -2), (-5, -3)],
        );
        assert_eq!(dependency_depths(&view).unwrap(), vec![3, 2, 1, 1, 0]);
        assert_eq!(dependency_order(&view).unwrap(), vec![-2, -4, -3, -5, -6]);
    }

    #[test]
    fn test_two_node_cycle() {
        let view = GraphView::from_edges(&[-1, -2], &[(-1, -2), (-2, -1)]);
        assert!(matches!(
            dependency_order(&view),
            Err(TopologyError::CycleDetected(_))
        ));
    }

    #[test]
    fn test_longer_cycle_reports_members() {
        // -1 -> -2 -> -3 -> -1, with -4 hanging off -3
        let view = GraphView::from_edges(
            &[-1, -2, -3, -4],
            &[(-1, -2), (-2, -3), (-4, -3), (-3, -1)],
        );
        match dependency_depths(&view) {
            Err(TopologyError::CycleDetected(cycle)) => {
                assert_eq!(cycle.len(), 3);
                assert!(cycle.contains(&-1) && cycle.contains(&-2) && cycle.contains(&-3));
            }
            other => panic!("expected a cycle, got {:?}", other),
        }
    }
}
