//! Prerequisite DAG over the units of one section.
//!
//! An edge `(prereq, unit)` means `unit` needs `prereq` completed first.
//! Traversal order is deterministic: among the units that are ready at any
//! moment, the one with the lowest `(sort_order, id)` goes first.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphNode {
    pub id: i64,
    pub sort_order: i32,
}

#[derive(Debug, Clone, Default)]
pub struct PrerequisiteGraph {
    sort_orders: BTreeMap<i64, i32>,
    edges: BTreeSet<(i64, i64)>,
    prerequisites: BTreeMap<i64, Vec<i64>>,
    dependents: BTreeMap<i64, Vec<i64>>,
}

impl PrerequisiteGraph {
    /// Builds the graph, silently dropping edges whose endpoints are not in
    /// `nodes` and collapsing duplicates.
    pub fn new<N, E>(nodes: N, edges: E) -> Self
    where
        N: IntoIterator<Item = GraphNode>,
        E: IntoIterator<Item = (i64, i64)>,
    {
        let sort_orders: BTreeMap<i64, i32> =
            nodes.into_iter().map(|n| (n.id, n.sort_order)).collect();

        let edges: BTreeSet<(i64, i64)> = edges
            .into_iter()
            .filter(|(p, u)| sort_orders.contains_key(p) && sort_orders.contains_key(u))
            .collect();

        let mut prerequisites: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
        let mut dependents: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
        for &(prereq, unit) in &edges {
            prerequisites.entry(unit).or_default().push(prereq);
            dependents.entry(prereq).or_default().push(unit);
        }

        Self {
            sort_orders,
            edges,
            prerequisites,
            dependents,
        }
    }

    pub fn len(&self) -> usize {
        self.sort_orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sort_orders.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Direct prerequisites of `unit_id`, ascending by id.
    pub fn prerequisites_of(&self, unit_id: i64) -> &[i64] {
        self.prerequisites
            .get(&unit_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every node exactly once. Prerequisites precede their dependents when the
    /// graph is acyclic; nodes stuck on a cycle are appended at the end in
    /// `(sort_order, id)` order.
    pub fn topological_order(&self) -> Vec<i64> {
        let (mut order, resolved) = self.kahn();
        if order.len() < self.sort_orders.len() {
            let mut rest: Vec<(i32, i64)> = self
                .sort_orders
                .iter()
                .filter(|(id, _)| !resolved.contains(id))
                .map(|(&id, &sort)| (sort, id))
                .collect();
            rest.sort_unstable();
            order.extend(rest.into_iter().map(|(_, id)| id));
        }
        order
    }

    pub fn has_cycle(&self) -> bool {
        let (order, _) = self.kahn();
        order.len() < self.sort_orders.len()
    }

    fn kahn(&self) -> (Vec<i64>, BTreeSet<i64>) {
        let mut in_degree: BTreeMap<i64, usize> = self
            .sort_orders
            .keys()
            .map(|&id| (id, self.prerequisites_of(id).len()))
            .collect();

        let mut ready: BinaryHeap<Reverse<(i32, i64)>> = in_degree
            .iter()
            .filter(|(_, deg)| **deg == 0)
            .map(|(&id, _)| Reverse((self.sort_orders[&id], id)))
            .collect();

        let mut order = Vec::with_capacity(self.sort_orders.len());
        let mut resolved = BTreeSet::new();

        while let Some(Reverse((_, id))) = ready.pop() {
            order.push(id);
            resolved.insert(id);
            for &next in self.dependents.get(&id).map(Vec::as_slice).unwrap_or(&[]) {
                if let Some(deg) = in_degree.get_mut(&next) {
                    *deg -= 1;
                    if *deg == 0 {
                        ready.push(Reverse((self.sort_orders[&next], next)));
                    }
                }
            }
        }

        (order, resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(pairs: &[(i64, i32)]) -> Vec<GraphNode> {
        pairs
            .iter()
            .map(|&(id, sort_order)| GraphNode { id, sort_order })
            .collect()
    }

    #[test]
    fn independent_units_follow_sort_order_then_id() {
        let graph = PrerequisiteGraph::new(nodes(&[(3, 2), (1, 5), (2, 2)]), []);
        assert_eq!(graph.topological_order(), vec![2, 3, 1]);
        assert!(!graph.has_cycle());
    }

    #[test]
    fn prerequisites_come_first() {
        // 10 -> 30 -> 20, with 20 sorted before everything else.
        let graph = PrerequisiteGraph::new(
            nodes(&[(10, 1), (20, 0), (30, 2)]),
            [(10, 30), (30, 20)],
        );
        assert_eq!(graph.topological_order(), vec![10, 30, 20]);
        assert_eq!(graph.prerequisites_of(20), &[30]);
        assert!(graph.prerequisites_of(10).is_empty());
    }

    #[test]
    fn foreign_and_duplicate_edges_are_ignored() {
        let graph = PrerequisiteGraph::new(
            nodes(&[(1, 0), (2, 1)]),
            [(1, 2), (1, 2), (99, 2), (2, 77)],
        );
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.prerequisites_of(2), &[1]);
        assert_eq!(graph.topological_order(), vec![1, 2]);
    }

    #[test]
    fn cycle_still_yields_every_node_once() {
        let graph = PrerequisiteGraph::new(
            nodes(&[(1, 0), (2, 1), (3, 2), (4, 3)]),
            [(2, 3), (3, 2), (1, 4)],
        );
        assert!(graph.has_cycle());
        assert_eq!(graph.topological_order(), vec![1, 4, 2, 3]);
    }

    #[test]
    fn empty_graph() {
        let graph = PrerequisiteGraph::new([], []);
        assert!(graph.is_empty());
        assert!(graph.topological_order().is_empty());
        assert!(!graph.has_cycle());
    }
}
