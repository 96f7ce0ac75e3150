//! Graph traversal: visitors, filters, node list generators, and dumpers.

use crate::node::DependencyNode;

pub mod dumper;
pub mod nodes;

pub use dumper::{CycleAwareDumper, GraphDumper};
pub use nodes::{
    artifacts_of, class_path_of, dependencies_of, files_of, LevelOrderNodeListGenerator,
    PostorderNodeListGenerator, PreorderNodeListGenerator,
};

/// Visitor over a dependency graph.
///
/// `visit_enter` is called before a node's children; returning `false` skips
/// the children. `visit_leave` is called afterwards either way; returning
/// `false` stops the traversal of the remaining siblings.
pub trait DependencyVisitor {
    fn visit_enter(&mut self, node: &DependencyNode) -> bool;
    fn visit_leave(&mut self, node: &DependencyNode) -> bool;
}

/// Predicate over nodes, consulted with the current ancestor stack (root
/// first, parent last).
pub trait DependencyFilter: Send + Sync {
    fn accept(&self, node: &DependencyNode, parents: &[DependencyNode]) -> bool;
}

impl DependencyNode {
    /// Drive a visitor over the graph below this node in depth-first order.
    pub fn accept(&self, visitor: &mut dyn DependencyVisitor) -> bool {
        if visitor.visit_enter(self) {
            for child in self.children() {
                if !child.accept(visitor) {
                    break;
                }
            }
        }
        visitor.visit_leave(self)
    }
}

/// Applies a filter in front of another visitor. Filtered nodes are not
/// consumed but their children are still traversed.
pub struct FilteringVisitor<'a, V> {
    filter: &'a dyn DependencyFilter,
    visitor: V,
    parents: Vec<DependencyNode>,
}

impl<'a, V: DependencyVisitor> FilteringVisitor<'a, V> {
    pub fn new(filter: &'a dyn DependencyFilter, visitor: V) -> Self {
        Self {
            filter,
            visitor,
            parents: Vec::new(),
        }
    }

    pub fn into_inner(self) -> V {
        self.visitor
    }
}

impl<V: DependencyVisitor> DependencyVisitor for FilteringVisitor<'_, V> {
    fn visit_enter(&mut self, node: &DependencyNode) -> bool {
        let result = if self.filter.accept(node, &self.parents) {
            self.visitor.visit_enter(node)
        } else {
            true
        };
        self.parents.push(node.clone());
        result
    }

    fn visit_leave(&mut self, node: &DependencyNode) -> bool {
        self.parents.pop();
        if self.filter.accept(node, &self.parents) {
            self.visitor.visit_leave(node)
        } else {
            true
        }
    }
}

/// Filter accepting only dependencies outside the given scopes. The root
/// (dependency-less) node is always accepted.
pub struct ScopeDependencyFilter {
    excluded: Vec<String>,
}

impl ScopeDependencyFilter {
    pub fn excluding(excluded: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            excluded: excluded.into_iter().map(Into::into).collect(),
        }
    }
}

impl DependencyFilter for ScopeDependencyFilter {
    fn accept(&self, node: &DependencyNode, _parents: &[DependencyNode]) -> bool {
        match node.dependency() {
            Some(dependency) => !self.excluded.iter().any(|s| s == dependency.scope()),
            None => true,
        }
    }
}
