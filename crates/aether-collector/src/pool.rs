//! Interning pools and per-collection caches.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use aether_core::artifact::Artifact;
use aether_core::dependency::Dependency;
use aether_core::node::DependencyNode;
use aether_core::repository::RemoteRepository;
use aether_core::request::{ArtifactDescriptor, VersionRangeResult};
use aether_core::session::{config, Session};
use aether_util::errors::AetherError;

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

enum DescriptorEntry {
    Strong(Arc<ArtifactDescriptor>),
    Weak(Weak<ArtifactDescriptor>),
    /// The shared bad-descriptor marker: replays always yield the empty
    /// stub together with the original error.
    Bad(Arc<AetherError>),
}

/// A descriptor cache lookup outcome.
pub enum DescriptorHit {
    Descriptor(Arc<ArtifactDescriptor>),
    Bad(Arc<AetherError>),
}

/// Session-scoped interner for artifacts, dependencies and descriptors.
///
/// Interning preserves value equality: `intern(x) == x` always, and equal
/// values come back sharing one canonical backing. The descriptor pool can
/// be backed weakly (`aether.dependencyCollector.pool.weak`), in which case
/// descriptors survive only while some collection still references them; a
/// lookup that finds a stale holder drops it and reports a miss, and the
/// subsequent put transparently re-inserts.
pub struct DataPool {
    weak_descriptors: bool,
    artifacts: RwLock<HashSet<Artifact>>,
    dependencies: RwLock<HashSet<Dependency>>,
    descriptors: RwLock<HashMap<Artifact, DescriptorEntry>>,
}

impl DataPool {
    const SESSION_KEY: &'static str = "aether.collector.DataPool";

    pub fn new(weak_descriptors: bool) -> Self {
        Self {
            weak_descriptors,
            artifacts: RwLock::new(HashSet::new()),
            dependencies: RwLock::new(HashSet::new()),
            descriptors: RwLock::new(HashMap::new()),
        }
    }

    /// The pool of the given session, created and registered on first use.
    /// Concurrent collections racing here agree on one pool.
    pub fn from_session(session: &Session) -> Arc<DataPool> {
        if let Some(existing) = session.data().get(Self::SESSION_KEY) {
            if let Ok(pool) = existing.downcast::<DataPool>() {
                return pool;
            }
        }
        let pool = Arc::new(DataPool::new(
            session.config_bool(config::POOL_WEAK, false),
        ));
        let stored: Arc<dyn Any + Send + Sync> = pool.clone();
        if session
            .data()
            .compare_and_set(Self::SESSION_KEY, None, stored)
        {
            return pool;
        }
        session
            .data()
            .get(Self::SESSION_KEY)
            .and_then(|existing| existing.downcast::<DataPool>().ok())
            .unwrap_or(pool)
    }

    pub fn intern_artifact(&self, artifact: Artifact) -> Artifact {
        if let Some(canonical) = read(&self.artifacts).get(&artifact) {
            return canonical.clone();
        }
        let mut artifacts = write(&self.artifacts);
        match artifacts.get(&artifact) {
            Some(canonical) => canonical.clone(),
            None => {
                artifacts.insert(artifact.clone());
                artifact
            }
        }
    }

    pub fn intern_dependency(&self, dependency: Dependency) -> Dependency {
        if let Some(canonical) = read(&self.dependencies).get(&dependency) {
            return canonical.clone();
        }
        let mut dependencies = write(&self.dependencies);
        match dependencies.get(&dependency) {
            Some(canonical) => canonical.clone(),
            None => {
                dependencies.insert(dependency.clone());
                dependency
            }
        }
    }

    pub fn get_descriptor(&self, artifact: &Artifact) -> Option<DescriptorHit> {
        {
            let descriptors = read(&self.descriptors);
            match descriptors.get(artifact) {
                Some(DescriptorEntry::Strong(descriptor)) => {
                    return Some(DescriptorHit::Descriptor(descriptor.clone()))
                }
                Some(DescriptorEntry::Weak(holder)) => {
                    if let Some(descriptor) = holder.upgrade() {
                        return Some(DescriptorHit::Descriptor(descriptor));
                    }
                    // stale holder, cleaned up below
                }
                Some(DescriptorEntry::Bad(error)) => {
                    return Some(DescriptorHit::Bad(error.clone()))
                }
                None => return None,
            }
        }
        // The holder went stale; drop it under the write lock and report a
        // miss so the caller re-reads and re-inserts.
        let mut descriptors = write(&self.descriptors);
        if let Some(DescriptorEntry::Weak(holder)) = descriptors.get(artifact) {
            if holder.upgrade().is_none() {
                descriptors.remove(artifact);
            }
        }
        None
    }

    pub fn put_descriptor(&self, artifact: Artifact, descriptor: Arc<ArtifactDescriptor>) {
        let entry = if self.weak_descriptors {
            DescriptorEntry::Weak(Arc::downgrade(&descriptor))
        } else {
            DescriptorEntry::Strong(descriptor)
        };
        write(&self.descriptors).insert(artifact, entry);
    }

    /// Remember a failed descriptor read; replays are flagged as cached.
    pub fn put_bad_descriptor(&self, artifact: Artifact, error: Arc<AetherError>) {
        write(&self.descriptors).insert(artifact, DescriptorEntry::Bad(error));
    }
}

/// Key of the constraint cache: the artifact plus the repositories, where
/// repository policies count only through their enabled flags.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConstraintKey {
    artifact: Artifact,
    repositories: Vec<(String, String, bool, bool)>,
}

impl ConstraintKey {
    pub fn new(artifact: Artifact, repositories: &[RemoteRepository]) -> Self {
        Self {
            artifact,
            repositories: repositories
                .iter()
                .map(|r| {
                    (
                        r.id().to_string(),
                        r.url().to_string(),
                        r.release_policy().enabled,
                        r.snapshot_policy().enabled,
                    )
                })
                .collect(),
        }
    }
}

/// Key of the child-list cache: artifact, repositories, and the identity of
/// the four derived policies. Policy identity is `Arc` pointer identity;
/// `derive_child` returning the same `Arc` is what makes entries reusable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GraphKey {
    artifact: Artifact,
    repositories: Vec<(String, String)>,
    selector: usize,
    manager: usize,
    traverser: usize,
    filter: usize,
}

impl GraphKey {
    pub fn new(
        artifact: Artifact,
        repositories: &[RemoteRepository],
        selector: usize,
        manager: usize,
        traverser: usize,
        filter: usize,
    ) -> Self {
        Self {
            artifact,
            repositories: repositories
                .iter()
                .map(|r| (r.id().to_string(), r.url().to_string()))
                .collect(),
            selector,
            manager,
            traverser,
            filter,
        }
    }
}

/// A memoized child list together with the position it was computed at.
#[derive(Clone)]
pub struct ChildrenEntry {
    pub children: Vec<DependencyNode>,
    /// Depth of the node the list was computed for.
    pub depth: usize,
    /// The ancestor coordinates of that node, root first.
    pub ancestors: Vec<String>,
}

/// Caches scoped to one collect invocation: version-range results and
/// computed child lists. Always strongly referenced and dropped with the
/// invocation.
#[derive(Default)]
pub struct CollectionCaches {
    constraints: RwLock<HashMap<ConstraintKey, VersionRangeResult>>,
    children: RwLock<HashMap<GraphKey, ChildrenEntry>>,
}

impl CollectionCaches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_constraint(&self, key: &ConstraintKey) -> Option<VersionRangeResult> {
        read(&self.constraints).get(key).cloned()
    }

    pub fn put_constraint(&self, key: ConstraintKey, result: VersionRangeResult) {
        write(&self.constraints).insert(key, result);
    }

    pub fn get_children(&self, key: &GraphKey) -> Option<ChildrenEntry> {
        read(&self.children).get(key).cloned()
    }

    pub fn put_children(&self, key: GraphKey, entry: ChildrenEntry) {
        write(&self.children).insert(key, entry);
    }

    /// Drop entries the reconciliation pass found to be tainted.
    pub fn evict_children(&self, mut tainted: impl FnMut(&GraphKey, &ChildrenEntry) -> bool) {
        write(&self.children).retain(|key, entry| !tainted(key, entry));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aether_core::version::{Version, VersionConstraint};

    fn artifact(coords: &str) -> Artifact {
        Artifact::parse(coords).unwrap()
    }

    #[test]
    fn interning_preserves_equality() {
        let pool = DataPool::new(false);
        let a = artifact("g:a:1");
        let b = artifact("g:a:1");
        let canonical_a = pool.intern_artifact(a.clone());
        let canonical_b = pool.intern_artifact(b);
        assert_eq!(canonical_a, a);
        assert_eq!(canonical_a, canonical_b);

        let dep = Dependency::compile(artifact("g:d:1"));
        assert_eq!(pool.intern_dependency(dep.clone()), dep);
    }

    #[test]
    fn strong_descriptor_pool_round_trip() {
        let pool = DataPool::new(false);
        let a = artifact("g:a:1");
        assert!(pool.get_descriptor(&a).is_none());
        pool.put_descriptor(a.clone(), Arc::new(ArtifactDescriptor::new(a.clone())));
        match pool.get_descriptor(&a) {
            Some(DescriptorHit::Descriptor(d)) => {
                assert_eq!(d.artifact.as_ref().unwrap(), &a);
            }
            _ => panic!("expected a descriptor hit"),
        }
    }

    #[test]
    fn weak_descriptor_pool_forgets_unreferenced_entries() {
        let pool = DataPool::new(true);
        let a = artifact("g:a:1");
        let descriptor = Arc::new(ArtifactDescriptor::new(a.clone()));
        pool.put_descriptor(a.clone(), descriptor.clone());

        // Still referenced: hit.
        assert!(matches!(
            pool.get_descriptor(&a),
            Some(DescriptorHit::Descriptor(_))
        ));

        drop(descriptor);
        // The weak holder is stale now; the pool reports a miss and accepts
        // a re-insert.
        assert!(pool.get_descriptor(&a).is_none());
        let fresh = Arc::new(ArtifactDescriptor::new(a.clone()));
        pool.put_descriptor(a.clone(), fresh.clone());
        assert!(matches!(
            pool.get_descriptor(&a),
            Some(DescriptorHit::Descriptor(_))
        ));
    }

    #[test]
    fn bad_descriptors_replay() {
        let pool = DataPool::new(false);
        let a = artifact("g:a:1");
        pool.put_bad_descriptor(
            a.clone(),
            Arc::new(AetherError::DescriptorMissing {
                artifact: a.to_string(),
            }),
        );
        match pool.get_descriptor(&a) {
            Some(DescriptorHit::Bad(error)) => {
                assert!(matches!(&*error, AetherError::DescriptorMissing { .. }));
            }
            _ => panic!("expected a bad-descriptor hit"),
        }
    }

    #[test]
    fn session_pool_is_shared() {
        let session = Session::new();
        let first = DataPool::from_session(&session);
        let second = DataPool::from_session(&session);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn constraint_key_ignores_policy_details() {
        let a = artifact("g:a:[1,2)");
        let central = RemoteRepository::central();
        let mut relaxed = RemoteRepository::central();
        relaxed = relaxed.with_release_policy({
            let mut p = aether_core::repository::RepositoryPolicy::enabled();
            p.checksum_policy = "fail".to_string();
            p
        });
        // Same enabled flags, different checksum policy: same key.
        assert_eq!(
            ConstraintKey::new(a.clone(), &[central.clone()]),
            ConstraintKey::new(a.clone(), &[relaxed])
        );
        let disabled = central
            .clone()
            .with_release_policy(aether_core::repository::RepositoryPolicy::disabled());
        assert_ne!(
            ConstraintKey::new(a.clone(), &[central]),
            ConstraintKey::new(a, &[disabled])
        );
    }

    #[test]
    fn collection_caches_round_trip() {
        let caches = CollectionCaches::new();
        let key = ConstraintKey::new(artifact("g:a:[1,2)"), &[]);
        assert!(caches.get_constraint(&key).is_none());
        caches.put_constraint(
            key.clone(),
            VersionRangeResult::new(VersionConstraint::parse("[1,2)"), vec![Version::new("1.0")]),
        );
        assert_eq!(caches.get_constraint(&key).unwrap().versions.len(), 1);

        let graph_key = GraphKey::new(artifact("g:a:1"), &[], 1, 2, 3, 0);
        caches.put_children(
            graph_key.clone(),
            ChildrenEntry {
                children: vec![],
                depth: 2,
                ancestors: vec!["g:root:jar:1".to_string()],
            },
        );
        assert_eq!(caches.get_children(&graph_key).unwrap().depth, 2);
        caches.evict_children(|_, entry| entry.depth == 2);
        assert!(caches.get_children(&graph_key).is_none());
    }
}
