//! Node list generators and the flat outputs derived from them.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::artifact::Artifact;
use crate::dependency::Dependency;
use crate::node::DependencyNode;
use crate::visit::DependencyVisitor;

/// Dependencies of the listed nodes, in list order. Nodes without a
/// dependency (the root) are skipped; unresolved dependencies (no backing
/// file) are skipped unless requested.
pub fn dependencies_of(nodes: &[DependencyNode], include_unresolved: bool) -> Vec<Dependency> {
    nodes
        .iter()
        .filter_map(|node| node.dependency())
        .filter(|dependency| include_unresolved || dependency.artifact().is_resolved())
        .collect()
}

/// Artifacts of the listed nodes, in list order.
pub fn artifacts_of(nodes: &[DependencyNode], include_unresolved: bool) -> Vec<Artifact> {
    dependencies_of(nodes, include_unresolved)
        .into_iter()
        .map(|dependency| dependency.artifact().clone())
        .collect()
}

/// Files of the resolved artifacts among the listed nodes.
pub fn files_of(nodes: &[DependencyNode]) -> Vec<PathBuf> {
    artifacts_of(nodes, false)
        .iter()
        .filter_map(|artifact| artifact.path().map(PathBuf::from))
        .collect()
}

/// The resolved files joined with the platform path separator.
pub fn class_path_of(nodes: &[DependencyNode]) -> String {
    files_of(nodes)
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(class_path_separator())
}

fn class_path_separator() -> &'static str {
    if cfg!(windows) {
        ";"
    } else {
        ":"
    }
}

macro_rules! derived_outputs {
    () => {
        pub fn nodes(&self) -> &[DependencyNode] {
            &self.nodes
        }

        pub fn dependencies(&self, include_unresolved: bool) -> Vec<Dependency> {
            dependencies_of(&self.nodes, include_unresolved)
        }

        pub fn artifacts(&self, include_unresolved: bool) -> Vec<Artifact> {
            artifacts_of(&self.nodes, include_unresolved)
        }

        pub fn files(&self) -> Vec<PathBuf> {
            files_of(&self.nodes)
        }

        pub fn class_path(&self) -> String {
            class_path_of(&self.nodes)
        }
    };
}

/// Collects nodes in pre-order: a node is consumed on first entry and never
/// again, however many parents share it.
#[derive(Default)]
pub struct PreorderNodeListGenerator {
    nodes: Vec<DependencyNode>,
    visited: HashSet<usize>,
}

impl PreorderNodeListGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    derived_outputs!();
}

impl DependencyVisitor for PreorderNodeListGenerator {
    fn visit_enter(&mut self, node: &DependencyNode) -> bool {
        if !self.visited.insert(node.id()) {
            return false;
        }
        self.nodes.push(node.clone());
        true
    }

    fn visit_leave(&mut self, _node: &DependencyNode) -> bool {
        true
    }
}

/// Collects nodes in post-order: a node is consumed after all its
/// descendants, on its first leave.
#[derive(Default)]
pub struct PostorderNodeListGenerator {
    nodes: Vec<DependencyNode>,
    visited: HashSet<usize>,
    emitted: HashSet<usize>,
}

impl PostorderNodeListGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    derived_outputs!();
}

impl DependencyVisitor for PostorderNodeListGenerator {
    fn visit_enter(&mut self, node: &DependencyNode) -> bool {
        self.visited.insert(node.id())
    }

    fn visit_leave(&mut self, node: &DependencyNode) -> bool {
        if self.emitted.insert(node.id()) {
            self.nodes.push(node.clone());
        }
        true
    }
}

/// Collects nodes into per-depth buckets during the traversal and emits the
/// buckets in increasing depth once the traversal is complete.
#[derive(Default)]
pub struct LevelOrderNodeListGenerator {
    buckets: Vec<Vec<DependencyNode>>,
    visited: HashSet<usize>,
    /// Ids of the nodes actually entered, innermost last.
    stack: Vec<usize>,
    nodes: Vec<DependencyNode>,
}

impl LevelOrderNodeListGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    derived_outputs!();
}

impl DependencyVisitor for LevelOrderNodeListGenerator {
    fn visit_enter(&mut self, node: &DependencyNode) -> bool {
        if !self.visited.insert(node.id()) {
            return false;
        }
        let depth = self.stack.len();
        if self.buckets.len() <= depth {
            self.buckets.resize_with(depth + 1, Vec::new);
        }
        self.buckets[depth].push(node.clone());
        self.stack.push(node.id());
        true
    }

    fn visit_leave(&mut self, node: &DependencyNode) -> bool {
        // Leaves fire even for re-entered nodes whose enter was refused;
        // only pop when this leave matches the entered node on top.
        if self.stack.last() == Some(&node.id()) {
            self.stack.pop();
        }
        if self.stack.is_empty() {
            // The root's leave: flatten the buckets into the final order.
            self.nodes = self.buckets.iter().flatten().cloned().collect();
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::Artifact;

    fn node(coords: &str) -> DependencyNode {
        DependencyNode::new(Dependency::compile(Artifact::parse(coords).unwrap()))
    }

    /// root -> a -> c, root -> b -> c (c shared)
    fn diamond() -> (DependencyNode, DependencyNode) {
        let root = node("g:root:1");
        let a = node("g:a:1");
        let b = node("g:b:1");
        let c = node("g:c:1");
        a.add_child(c.clone());
        b.add_child(c.clone());
        root.add_child(a);
        root.add_child(b);
        (root, c)
    }

    fn ids(nodes: &[DependencyNode]) -> Vec<String> {
        nodes
            .iter()
            .map(|n| n.artifact().unwrap().artifact_id().to_string())
            .collect()
    }

    #[test]
    fn preorder_dedupes_shared_nodes() {
        let (root, _) = diamond();
        let mut gen = PreorderNodeListGenerator::new();
        root.accept(&mut gen);
        assert_eq!(ids(gen.nodes()), ["root", "a", "c", "b"]);
    }

    #[test]
    fn postorder_consumes_after_descendants() {
        let (root, _) = diamond();
        let mut gen = PostorderNodeListGenerator::new();
        root.accept(&mut gen);
        assert_eq!(ids(gen.nodes()), ["c", "a", "b", "root"]);
    }

    #[test]
    fn level_order_buckets_by_depth() {
        let (root, _) = diamond();
        let mut gen = LevelOrderNodeListGenerator::new();
        root.accept(&mut gen);
        assert_eq!(ids(gen.nodes()), ["root", "a", "b", "c"]);
    }

    #[test]
    fn derived_outputs_skip_unresolved() {
        let root = node("g:root:1");
        let resolved = DependencyNode::new(Dependency::compile(
            Artifact::parse("g:a:1")
                .unwrap()
                .with_path(Some(PathBuf::from("/repo/a-1.jar"))),
        ));
        root.add_child(resolved);
        root.add_child(node("g:b:1"));

        let mut gen = PreorderNodeListGenerator::new();
        root.accept(&mut gen);

        assert_eq!(gen.dependencies(true).len(), 3);
        assert_eq!(gen.dependencies(false).len(), 1);
        assert_eq!(gen.artifacts(false)[0].artifact_id(), "a");
        assert_eq!(gen.files(), [PathBuf::from("/repo/a-1.jar")]);
        assert_eq!(gen.class_path(), "/repo/a-1.jar");
    }

    #[test]
    fn filtered_traversal_skips_scopes_but_keeps_descending() {
        use crate::visit::{FilteringVisitor, ScopeDependencyFilter};

        let root = DependencyNode::from_artifact(Artifact::parse("g:root:1").unwrap());
        let test_dep = DependencyNode::new(Dependency::new(
            Artifact::parse("g:t:1").unwrap(),
            "test",
        ));
        // A compile-scoped child below the filtered node must still appear.
        test_dep.add_child(node("g:under-test:1"));
        root.add_child(test_dep);
        root.add_child(node("g:a:1"));

        let filter = ScopeDependencyFilter::excluding(["test"]);
        let mut visitor = FilteringVisitor::new(&filter, PreorderNodeListGenerator::new());
        root.accept(&mut visitor);
        let gen = visitor.into_inner();
        assert_eq!(ids(gen.nodes()), ["root", "under-test", "a"]);
    }

    #[test]
    fn class_path_joins_with_separator() {
        let root = DependencyNode::root();
        for (name, file) in [("a", "/repo/a.jar"), ("b", "/repo/b.jar")] {
            root.add_child(DependencyNode::new(Dependency::compile(
                Artifact::parse(&format!("g:{name}:1"))
                    .unwrap()
                    .with_path(Some(PathBuf::from(file))),
            )));
        }
        let mut gen = PreorderNodeListGenerator::new();
        root.accept(&mut gen);
        let sep = if cfg!(windows) { ";" } else { ":" };
        assert_eq!(gen.class_path(), format!("/repo/a.jar{sep}/repo/b.jar"));
    }
}
