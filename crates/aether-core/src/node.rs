//! Mutable dependency graph nodes.
//!
//! A node is a shared handle: cloning the handle aliases the same node, so a
//! node reached through several parents is one object. Each node exclusively
//! owns its children vector; siblings never share child vectors, and reusing
//! a cached child list always goes through a shallow copy of the vector.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::artifact::Artifact;
use crate::dependency::{Dependency, Exclusion};
use crate::repository::RemoteRepository;
use crate::version::{Version, VersionConstraint};

/// Management bit: the dependency version was overridden.
pub const MANAGED_VERSION: u8 = 0x01;
/// Management bit: the dependency scope was overridden.
pub const MANAGED_SCOPE: u8 = 0x02;
/// Management bit: the dependency optionality was overridden.
pub const MANAGED_OPTIONAL: u8 = 0x04;
/// Management bit: the artifact properties were overridden.
pub const MANAGED_PROPERTIES: u8 = 0x08;
/// Management bit: the exclusion set was extended.
pub const MANAGED_EXCLUSIONS: u8 = 0x10;

/// Well-known keys for the open `data` map of a node.
pub mod key {
    /// Version before dependency management was applied.
    pub const PREMANAGED_VERSION: &str = "premanaged.version";
    /// Scope before dependency management was applied.
    pub const PREMANAGED_SCOPE: &str = "premanaged.scope";
    /// Optionality before dependency management was applied.
    pub const PREMANAGED_OPTIONAL: &str = "premanaged.optional";
    /// Exclusions before dependency management was applied.
    pub const PREMANAGED_EXCLUSIONS: &str = "premanaged.exclusions";
    /// Artifact properties before dependency management was applied.
    pub const PREMANAGED_PROPERTIES: &str = "premanaged.properties";
    /// On a conflict loser, the node that won its conflict group.
    pub const CONFLICT_WINNER: &str = "conflict.winner";
    /// On a conflict loser, the scope it carried before resolution.
    pub const CONFLICT_ORIGINAL_SCOPE: &str = "conflict.originalScope";
    /// On a conflict loser, the optionality it carried before resolution.
    pub const CONFLICT_ORIGINAL_OPTIONALITY: &str = "conflict.originalOptionality";
}

/// A value stored in the open keyed `data` map of a node.
#[derive(Debug, Clone)]
pub enum DataValue {
    Bool(bool),
    Str(String),
    Node(DependencyNode),
    Exclusions(Vec<Exclusion>),
    Properties(BTreeMap<String, String>),
}

impl DataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DataValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&DependencyNode> {
        match self {
            DataValue::Node(n) => Some(n),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct NodeInner {
    dependency: Option<Dependency>,
    /// Artifact of a dependency-less root node.
    root_artifact: Option<Artifact>,
    children: Vec<DependencyNode>,
    aliases: Vec<Artifact>,
    relocations: Vec<Artifact>,
    repositories: Vec<RemoteRepository>,
    version_constraint: Option<VersionConstraint>,
    version: Option<Version>,
    managed_bits: u8,
    data: HashMap<String, DataValue>,
}

/// A node in the dependency graph. Cheap to clone; clones alias the node.
#[derive(Clone, Default)]
pub struct DependencyNode {
    inner: Arc<Mutex<NodeInner>>,
}

impl DependencyNode {
    /// A node carrying a dependency.
    pub fn new(dependency: Dependency) -> Self {
        let node = Self::default();
        node.lock().dependency = Some(dependency);
        node
    }

    /// A dependency-less root node for the given artifact.
    pub fn from_artifact(artifact: Artifact) -> Self {
        let node = Self::default();
        node.lock().root_artifact = Some(artifact);
        node
    }

    /// A dependency-less, artifact-less root.
    pub fn root() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, NodeInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Stable identity of this node, usable as a map key.
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    /// Whether two handles alias the same node.
    pub fn same_node(&self, other: &DependencyNode) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn dependency(&self) -> Option<Dependency> {
        self.lock().dependency.clone()
    }

    /// The node's artifact: the dependency artifact, or the root artifact of
    /// a dependency-less root.
    pub fn artifact(&self) -> Option<Artifact> {
        let inner = self.lock();
        inner
            .dependency
            .as_ref()
            .map(|d| d.artifact().clone())
            .or_else(|| inner.root_artifact.clone())
    }

    pub fn set_dependency(&self, dependency: Dependency) {
        self.lock().dependency = Some(dependency);
    }

    /// Rewrite the dependency in place, e.g. to adjust scope or optionality.
    /// No-op on a dependency-less root.
    pub fn update_dependency(&self, f: impl FnOnce(&Dependency) -> Dependency) {
        let mut inner = self.lock();
        if let Some(dependency) = inner.dependency.take() {
            inner.dependency = Some(f(&dependency));
        }
    }

    pub fn set_root_artifact(&self, artifact: Artifact) {
        self.lock().root_artifact = Some(artifact);
    }

    pub fn children(&self) -> Vec<DependencyNode> {
        self.lock().children.clone()
    }

    pub fn child_count(&self) -> usize {
        self.lock().children.len()
    }

    pub fn has_children(&self) -> bool {
        !self.lock().children.is_empty()
    }

    pub fn set_children(&self, children: Vec<DependencyNode>) {
        self.lock().children = children;
    }

    pub fn add_child(&self, child: DependencyNode) {
        self.lock().children.push(child);
    }

    /// Drop children not accepted by the predicate, preserving order.
    pub fn retain_children(&self, mut keep: impl FnMut(&DependencyNode) -> bool) {
        self.lock().children.retain(|c| keep(c));
    }

    pub fn aliases(&self) -> Vec<Artifact> {
        self.lock().aliases.clone()
    }

    pub fn set_aliases(&self, aliases: Vec<Artifact>) {
        self.lock().aliases = aliases;
    }

    pub fn relocations(&self) -> Vec<Artifact> {
        self.lock().relocations.clone()
    }

    pub fn set_relocations(&self, relocations: Vec<Artifact>) {
        self.lock().relocations = relocations;
    }

    pub fn repositories(&self) -> Vec<RemoteRepository> {
        self.lock().repositories.clone()
    }

    pub fn set_repositories(&self, repositories: Vec<RemoteRepository>) {
        self.lock().repositories = repositories;
    }

    pub fn version_constraint(&self) -> Option<VersionConstraint> {
        self.lock().version_constraint.clone()
    }

    pub fn set_version_constraint(&self, constraint: Option<VersionConstraint>) {
        self.lock().version_constraint = constraint;
    }

    pub fn version(&self) -> Option<Version> {
        self.lock().version.clone()
    }

    pub fn set_version(&self, version: Option<Version>) {
        self.lock().version = version;
    }

    pub fn managed_bits(&self) -> u8 {
        self.lock().managed_bits
    }

    pub fn add_managed_bits(&self, bits: u8) {
        self.lock().managed_bits |= bits;
    }

    pub fn data(&self, key: &str) -> Option<DataValue> {
        self.lock().data.get(key).cloned()
    }

    pub fn set_data(&self, key: impl Into<String>, value: DataValue) {
        self.lock().data.insert(key.into(), value);
    }

    pub fn remove_data(&self, key: &str) -> Option<DataValue> {
        self.lock().data.remove(key)
    }

    /// Deep-copy the graph below (and including) this node, preserving the
    /// sharing structure: a node reached through several parents is cloned
    /// once. Returns the clone and a map from clone identity to the original
    /// handle, which reconciliation uses to walk both graphs in lockstep.
    pub fn clone_deep(&self) -> (DependencyNode, HashMap<usize, DependencyNode>) {
        let mut memo: HashMap<usize, DependencyNode> = HashMap::new();
        let mut clone_to_original: HashMap<usize, DependencyNode> = HashMap::new();
        let clone = clone_node(self, &mut memo, &mut clone_to_original);
        (clone, clone_to_original)
    }
}

fn clone_node(
    node: &DependencyNode,
    memo: &mut HashMap<usize, DependencyNode>,
    clone_to_original: &mut HashMap<usize, DependencyNode>,
) -> DependencyNode {
    if let Some(existing) = memo.get(&node.id()) {
        return existing.clone();
    }
    let clone = DependencyNode::default();
    memo.insert(node.id(), clone.clone());
    clone_to_original.insert(clone.id(), node.clone());

    let children: Vec<DependencyNode> = node
        .children()
        .iter()
        .map(|child| clone_node(child, memo, clone_to_original))
        .collect();

    {
        let source = node.lock();
        let mut inner = clone.lock();
        inner.dependency = source.dependency.clone();
        inner.root_artifact = source.root_artifact.clone();
        inner.aliases = source.aliases.clone();
        inner.relocations = source.relocations.clone();
        inner.repositories = source.repositories.clone();
        inner.version_constraint = source.version_constraint.clone();
        inner.version = source.version.clone();
        inner.managed_bits = source.managed_bits;
        inner.data = source.data.clone();
    }
    clone.set_children(children);
    clone
}

impl fmt::Debug for DependencyNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.artifact() {
            Some(artifact) => write!(f, "DependencyNode({artifact})"),
            None => write!(f, "DependencyNode(<root>)"),
        }
    }
}

impl fmt::Display for DependencyNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.dependency(), self.artifact()) {
            (Some(dependency), _) => dependency.fmt(f),
            (None, Some(artifact)) => artifact.fmt(f),
            (None, None) => f.write_str("<root>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::Artifact;

    fn node(coords: &str) -> DependencyNode {
        DependencyNode::new(Dependency::compile(Artifact::parse(coords).unwrap()))
    }

    #[test]
    fn handles_alias_the_same_node() {
        let a = node("g:a:1");
        let b = a.clone();
        b.add_child(node("g:c:1"));
        assert_eq!(a.child_count(), 1);
        assert!(a.same_node(&b));
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn root_forms() {
        let bare = DependencyNode::root();
        assert!(bare.dependency().is_none());
        assert!(bare.artifact().is_none());

        let with_artifact = DependencyNode::from_artifact(Artifact::parse("g:r:1").unwrap());
        assert!(with_artifact.dependency().is_none());
        assert_eq!(with_artifact.artifact().unwrap().artifact_id(), "r");
    }

    #[test]
    fn update_dependency_rewrites_in_place() {
        let n = node("g:a:1");
        n.update_dependency(|d| d.with_scope("test"));
        assert_eq!(n.dependency().unwrap().scope(), "test");
    }

    #[test]
    fn managed_bits_accumulate() {
        let n = node("g:a:1");
        n.add_managed_bits(MANAGED_VERSION);
        n.add_managed_bits(MANAGED_SCOPE);
        assert_eq!(n.managed_bits(), MANAGED_VERSION | MANAGED_SCOPE);
    }

    #[test]
    fn data_round_trip() {
        let n = node("g:a:1");
        n.set_data(key::PREMANAGED_VERSION, DataValue::Str("1".into()));
        assert_eq!(
            n.data(key::PREMANAGED_VERSION).unwrap().as_str(),
            Some("1")
        );
        assert!(n.data(key::CONFLICT_WINNER).is_none());
    }

    #[test]
    fn deep_clone_preserves_sharing() {
        let root = node("g:root:1");
        let shared = node("g:shared:1");
        let a = node("g:a:1");
        let b = node("g:b:1");
        a.add_child(shared.clone());
        b.add_child(shared.clone());
        root.add_child(a);
        root.add_child(b);

        let (clone, back) = root.clone_deep();
        let clone_children = clone.children();
        assert_eq!(clone_children.len(), 2);
        let shared_via_a = clone_children[0].children()[0].clone();
        let shared_via_b = clone_children[1].children()[0].clone();
        assert!(shared_via_a.same_node(&shared_via_b));
        assert!(!shared_via_a.same_node(&shared));
        assert!(back.get(&shared_via_a.id()).unwrap().same_node(&shared));
        assert!(back.get(&clone.id()).unwrap().same_node(&root));
    }

    #[test]
    fn deep_clone_is_detached() {
        let root = node("g:root:1");
        root.add_child(node("g:a:1"));
        let (clone, _) = root.clone_deep();
        clone.set_children(Vec::new());
        assert_eq!(root.child_count(), 1);
    }
}
