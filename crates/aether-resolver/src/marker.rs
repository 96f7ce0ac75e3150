//! Conflict id assignment.
//!
//! Two nodes share a conflict id iff they could substitute for one another:
//! same group, artifact, classifier and extension, version ignored. Aliases
//! declared by a descriptor merge the groups they connect, so a node known
//! under several coordinates conflicts under all of them.

use std::collections::{HashMap, HashSet};

use aether_core::node::DependencyNode;
use indexmap::IndexMap;

/// Assign a conflict id to every node below (and including) `root`.
///
/// Returns a map from node identity to conflict id. Ids are the versionless
/// coordinates of the group representative, which is the first coordinate
/// encountered in pre-order.
pub fn mark(root: &DependencyNode) -> HashMap<usize, String> {
    let mut keys = UnionFind::default();
    let mut node_keys: HashMap<usize, usize> = HashMap::new();
    let mut visited = HashSet::new();
    collect(root, &mut keys, &mut node_keys, &mut visited);

    node_keys
        .into_iter()
        .map(|(node_id, slot)| (node_id, keys.representative(slot)))
        .collect()
}

fn collect(
    node: &DependencyNode,
    keys: &mut UnionFind,
    node_keys: &mut HashMap<usize, usize>,
    visited: &mut HashSet<usize>,
) {
    if !visited.insert(node.id()) {
        return;
    }
    let base = match node.artifact() {
        Some(artifact) => keys.slot(&artifact.versionless_id()),
        None => keys.slot("<root>"),
    };
    node_keys.insert(node.id(), base);
    for alias in node.aliases() {
        let alias_slot = keys.slot(&alias.versionless_id());
        keys.union(base, alias_slot);
    }
    for child in node.children() {
        collect(&child, keys, node_keys, visited);
    }
}

/// Union-find over coordinate strings. Unions keep the earliest-inserted
/// key as the representative, so ids are deterministic across runs.
#[derive(Default)]
struct UnionFind {
    slots: IndexMap<String, ()>,
    parent: Vec<usize>,
}

impl UnionFind {
    fn slot(&mut self, key: &str) -> usize {
        if let Some(index) = self.slots.get_index_of(key) {
            return self.find(index);
        }
        let index = self.slots.len();
        self.slots.insert(key.to_string(), ());
        self.parent.push(index);
        index
    }

    fn find(&mut self, slot: usize) -> usize {
        let mut root = slot;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        // Path compression.
        let mut cursor = slot;
        while self.parent[cursor] != root {
            let next = self.parent[cursor];
            self.parent[cursor] = root;
            cursor = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let a = self.find(a);
        let b = self.find(b);
        if a == b {
            return;
        }
        // The earlier insertion wins the representative role.
        let (keep, merge) = if a < b { (a, b) } else { (b, a) };
        self.parent[merge] = keep;
    }

    fn representative(&mut self, slot: usize) -> String {
        let root = self.find(slot);
        self.slots
            .get_index(root)
            .map(|(key, _)| key.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aether_core::artifact::Artifact;
    use aether_core::dependency::Dependency;

    fn node(coords: &str) -> DependencyNode {
        DependencyNode::new(Dependency::compile(Artifact::parse(coords).unwrap()))
    }

    #[test]
    fn gace_ignores_version() {
        let root = DependencyNode::root();
        let c1 = node("g:c:1");
        let c2 = node("g:c:2");
        let other = node("g:d:1");
        root.add_child(c1.clone());
        root.add_child(c2.clone());
        root.add_child(other.clone());

        let ids = mark(&root);
        assert_eq!(ids[&c1.id()], ids[&c2.id()]);
        assert_ne!(ids[&c1.id()], ids[&other.id()]);
    }

    #[test]
    fn classifier_and_extension_split_groups() {
        let root = DependencyNode::root();
        let plain = node("g:c:1");
        let sources = node("g:c:jar:sources:1");
        root.add_child(plain.clone());
        root.add_child(sources.clone());

        let ids = mark(&root);
        assert_ne!(ids[&plain.id()], ids[&sources.id()]);
    }

    #[test]
    fn aliases_merge_groups() {
        let root = DependencyNode::root();
        let old_name = node("g:old:1");
        let new_name = node("g:new:1");
        new_name.set_aliases(vec![Artifact::parse("g:old:1").unwrap()]);
        root.add_child(old_name.clone());
        root.add_child(new_name.clone());

        let ids = mark(&root);
        assert_eq!(ids[&old_name.id()], ids[&new_name.id()]);
        // The first-encountered coordinate names the group.
        assert_eq!(ids[&old_name.id()], "g:old::jar");
    }
}
