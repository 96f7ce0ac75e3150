//! Topological ordering of conflict ids.
//!
//! Builds a DAG with an edge `A -> B` whenever any node of conflict id `A`
//! has a child of conflict id `B`, then orders the ids so that parents come
//! before children. Cycles are recovered from by forcing the most shallow
//! survivor into the order; the concrete cycle sets are enumerated
//! afterwards so consumers can tell which part of the order is approximate.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

use aether_core::node::DependencyNode;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

/// The outputs of the sort, stored on the transformation context.
#[derive(Debug, Clone, Default)]
pub struct ConflictIdSort {
    /// Every conflict id exactly once, parents before children where the
    /// edge is not part of a cycle.
    pub sorted: Vec<String>,
    /// The conflict id sets that form cycles.
    pub cycles: Vec<Vec<String>>,
}

/// Sort the conflict ids of a marked graph.
pub fn sort_ids(root: &DependencyNode, ids: &HashMap<usize, String>) -> ConflictIdSort {
    let mut graph: DiGraph<String, ()> = DiGraph::new();
    let mut indices: HashMap<&str, NodeIndex> = HashMap::new();
    let mut edges: HashSet<(NodeIndex, NodeIndex)> = HashSet::new();

    // One graph node per conflict id, edges from the node graph.
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(root.clone());
    visited.insert(root.id());
    let mut min_depths: HashMap<NodeIndex, usize> = HashMap::new();
    let mut depths: VecDeque<usize> = VecDeque::new();
    depths.push_back(0);

    while let Some(node) = queue.pop_front() {
        let depth = depths.pop_front().unwrap_or(0);
        let Some(id) = ids.get(&node.id()) else {
            continue;
        };
        let index = *indices
            .entry(id.as_str())
            .or_insert_with(|| graph.add_node(id.clone()));
        let entry = min_depths.entry(index).or_insert(depth);
        *entry = (*entry).min(depth);

        for child in node.children() {
            if let Some(child_id) = ids.get(&child.id()) {
                let child_index = *indices
                    .entry(child_id.as_str())
                    .or_insert_with(|| graph.add_node(child_id.clone()));
                if child_index != index && edges.insert((index, child_index)) {
                    graph.add_edge(index, child_index, ());
                }
            }
            if visited.insert(child.id()) {
                queue.push_back(child);
                depths.push_back(depth + 1);
            }
        }
    }

    let mut in_degree: HashMap<NodeIndex, usize> = graph
        .node_indices()
        .map(|ix| (ix, graph.neighbors_directed(ix, Direction::Incoming).count()))
        .collect();

    // Priority queue ordered by (min depth, insertion order) ascending.
    let mut heap: BinaryHeap<Reverse<(usize, usize)>> = BinaryHeap::new();
    for ix in graph.node_indices() {
        if in_degree[&ix] == 0 {
            heap.push(Reverse((min_depths[&ix], ix.index())));
        }
    }

    let mut sorted = Vec::with_capacity(graph.node_count());
    let mut emitted: HashSet<NodeIndex> = HashSet::new();
    loop {
        while let Some(Reverse((_, raw_index))) = heap.pop() {
            let ix = NodeIndex::new(raw_index);
            if !emitted.insert(ix) {
                continue;
            }
            sorted.push(graph[ix].clone());
            for child in graph.neighbors_directed(ix, Direction::Outgoing) {
                let degree = in_degree.get_mut(&child).map(|d| {
                    *d = d.saturating_sub(1);
                    *d
                });
                if degree == Some(0) && !emitted.contains(&child) {
                    heap.push(Reverse((min_depths[&child], child.index())));
                }
            }
        }
        if sorted.len() == graph.node_count() {
            break;
        }
        // Cycle recovery: force the remaining id with the smallest
        // (min depth, in-degree) pair into the order and resume.
        let survivor = graph
            .node_indices()
            .filter(|ix| !emitted.contains(ix))
            .min_by_key(|ix| (min_depths[&*ix], in_degree[&*ix], ix.index()));
        match survivor {
            Some(ix) => {
                tracing::debug!("conflict id cycle broken at {}", graph[ix]);
                in_degree.insert(ix, 0);
                heap.push(Reverse((min_depths[&ix], ix.index())));
            }
            None => break,
        }
    }

    // Enumerate the concrete cycle sets.
    let cycles: Vec<Vec<String>> = tarjan_scc(&graph)
        .into_iter()
        .filter(|component| component.len() > 1)
        .map(|component| component.into_iter().map(|ix| graph[ix].clone()).collect())
        .collect();

    ConflictIdSort { sorted, cycles }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aether_core::artifact::Artifact;
    use aether_core::dependency::Dependency;
    use crate::marker;

    fn node(coords: &str) -> DependencyNode {
        DependencyNode::new(Dependency::compile(Artifact::parse(coords).unwrap()))
    }

    fn id(artifact_id: &str) -> String {
        format!("g:{artifact_id}::jar")
    }

    #[test]
    fn parents_precede_children() {
        // root -> a -> c, root -> b -> c
        let root = DependencyNode::root();
        let a = node("g:a:1");
        let b = node("g:b:1");
        a.add_child(node("g:c:1"));
        b.add_child(node("g:c:2"));
        root.add_child(a);
        root.add_child(b);

        let ids = marker::mark(&root);
        let sort = sort_ids(&root, &ids);
        assert!(sort.cycles.is_empty());

        let pos = |name: &str| {
            sort.sorted
                .iter()
                .position(|s| *s == id(name))
                .unwrap_or_else(|| panic!("{name} missing from {:?}", sort.sorted))
        };
        assert!(pos("a") < pos("c"));
        assert!(pos("b") < pos("c"));
        assert_eq!(sort.sorted.len(), 4); // <root>, a, b, c
    }

    #[test]
    fn cycle_recovery_covers_every_id() {
        // Conflict-id edges: x -> y, y -> x (via two versions), z -> x.
        let root = DependencyNode::root();
        let x1 = node("g:x:1");
        let y1 = node("g:y:1");
        let x2 = node("g:x:2");
        let z = node("g:z:1");
        y1.add_child(x2);
        x1.add_child(y1);
        z.add_child(node("g:x:3"));
        root.add_child(x1);
        root.add_child(z);

        let ids = marker::mark(&root);
        let sort = sort_ids(&root, &ids);

        // Every id appears exactly once.
        let expected = [id("x"), id("y"), id("z")];
        for name in &expected {
            assert_eq!(sort.sorted.iter().filter(|s| *s == name).count(), 1);
        }
        assert_eq!(sort.sorted.len(), 4);

        // The x/y cycle is reported.
        assert_eq!(sort.cycles.len(), 1);
        let cycle: HashSet<String> = sort.cycles[0].iter().cloned().collect();
        assert_eq!(cycle, HashSet::from([id("x"), id("y")]));
    }

    #[test]
    fn shallow_ids_sort_first_on_ties() {
        let root = DependencyNode::root();
        let a = node("g:a:1");
        a.add_child(node("g:deep:1"));
        root.add_child(a);
        root.add_child(node("g:b:1"));

        let ids = marker::mark(&root);
        let sort = sort_ids(&root, &ids);
        let pos = |name: &str| sort.sorted.iter().position(|s| *s == id(name)).unwrap();
        assert!(pos("a") < pos("deep"));
        assert!(pos("b") < pos("deep"));
    }
}
