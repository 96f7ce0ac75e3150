//! Request and result shapes of a collection.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use aether_util::cancel::CancellationToken;
use aether_util::errors::AetherError;

use crate::artifact::Artifact;
use crate::dependency::Dependency;
use crate::node::DependencyNode;
use crate::repository::RemoteRepository;
use crate::version::{Version, VersionConstraint};

/// What to collect: a root dependency or root artifact (whose descriptor
/// supplies the direct dependencies), explicit direct dependencies, the
/// managed dependencies of the requesting project, and the repositories to
/// resolve against.
#[derive(Debug, Clone, Default)]
pub struct CollectRequest {
    pub root: Option<Dependency>,
    pub root_artifact: Option<Artifact>,
    pub dependencies: Vec<Dependency>,
    pub managed_dependencies: Vec<Dependency>,
    pub repositories: Vec<RemoteRepository>,
    pub trace: Option<String>,
    pub cancel: CancellationToken,
}

impl CollectRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(mut self, root: Dependency) -> Self {
        self.root = Some(root);
        self
    }

    pub fn with_root_artifact(mut self, artifact: Artifact) -> Self {
        self.root_artifact = Some(artifact);
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<Dependency>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_managed_dependencies(mut self, managed: Vec<Dependency>) -> Self {
        self.managed_dependencies = managed;
        self
    }

    pub fn with_repositories(mut self, repositories: Vec<RemoteRepository>) -> Self {
        self.repositories = repositories;
        self
    }

    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// A non-fatal failure recorded during collection.
#[derive(Debug, Clone)]
pub struct CollectError {
    /// The dependency whose processing failed, if any.
    pub dependency: Option<Dependency>,
    /// The first ancestor path that reached the failure, as a
    /// `" -> "`-joined artifact list.
    pub path: String,
    pub error: Arc<AetherError>,
    /// Whether this failure was replayed from the descriptor cache rather
    /// than produced fresh.
    pub from_cache: bool,
}

impl fmt::Display for CollectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.error)
        } else {
            write!(f, "{} (via {})", self.error, self.path)
        }
    }
}

/// A detected dependency cycle: the chain from the repeated coordinate down
/// to the artifact that closed the cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    pub path: Vec<Artifact>,
}

impl Cycle {
    pub fn new(path: Vec<Artifact>) -> Self {
        Self { path }
    }

    pub fn contains(&self, artifact: &Artifact) -> bool {
        let id = artifact.versionless_id();
        self.path.iter().any(|a| a.versionless_id() == id)
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for artifact in &self.path {
            if !first {
                write!(f, " -> ")?;
            }
            write!(f, "{artifact}")?;
            first = false;
        }
        Ok(())
    }
}

/// The assembled graph plus everything non-fatal that went wrong on the way.
#[derive(Debug)]
pub struct CollectResult {
    pub request: CollectRequest,
    pub root: DependencyNode,
    pub exceptions: Vec<CollectError>,
    pub cycles: Vec<Cycle>,
}

/// Asks a descriptor source about one artifact.
#[derive(Debug, Clone)]
pub struct DescriptorRequest {
    pub artifact: Artifact,
    pub repositories: Vec<RemoteRepository>,
    pub trace: Option<String>,
}

impl DescriptorRequest {
    pub fn new(artifact: Artifact, repositories: Vec<RemoteRepository>) -> Self {
        Self {
            artifact,
            repositories,
            trace: None,
        }
    }
}

/// What a descriptor source knows about an artifact: its direct and managed
/// dependencies, coordinate aliases, where it was relocated from, and the
/// repositories its descriptor declares.
#[derive(Debug, Clone, Default)]
pub struct ArtifactDescriptor {
    /// The artifact the descriptor actually describes (differs from the
    /// requested one after a relocation).
    pub artifact: Option<Artifact>,
    pub relocations: Vec<Artifact>,
    pub aliases: Vec<Artifact>,
    pub dependencies: Vec<Dependency>,
    pub managed_dependencies: Vec<Dependency>,
    pub repositories: Vec<RemoteRepository>,
}

impl ArtifactDescriptor {
    pub fn new(artifact: Artifact) -> Self {
        Self {
            artifact: Some(artifact),
            ..Self::default()
        }
    }

    /// The substitute used when a missing or unreadable descriptor is
    /// demoted instead of failing the collection: no dependencies, no
    /// relocations, nothing.
    pub fn empty_stub(artifact: Artifact) -> Self {
        Self::new(artifact)
    }

    pub fn with_dependencies(mut self, dependencies: Vec<Dependency>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_managed_dependencies(mut self, managed: Vec<Dependency>) -> Self {
        self.managed_dependencies = managed;
        self
    }

    pub fn with_aliases(mut self, aliases: Vec<Artifact>) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn with_relocations(mut self, relocations: Vec<Artifact>) -> Self {
        self.relocations = relocations;
        self
    }

    pub fn with_repositories(mut self, repositories: Vec<RemoteRepository>) -> Self {
        self.repositories = repositories;
        self
    }
}

/// Asks a version range source for the versions matching a constraint.
#[derive(Debug, Clone)]
pub struct VersionRangeRequest {
    pub artifact: Artifact,
    pub repositories: Vec<RemoteRepository>,
    pub trace: Option<String>,
}

impl VersionRangeRequest {
    pub fn new(artifact: Artifact, repositories: Vec<RemoteRepository>) -> Self {
        Self {
            artifact,
            repositories,
            trace: None,
        }
    }
}

/// Matching versions in ascending order, with the repository each version
/// came from.
#[derive(Debug, Clone)]
pub struct VersionRangeResult {
    pub constraint: VersionConstraint,
    pub versions: Vec<Version>,
    repositories: HashMap<String, RemoteRepository>,
}

impl VersionRangeResult {
    pub fn new(constraint: VersionConstraint, versions: Vec<Version>) -> Self {
        Self {
            constraint,
            versions,
            repositories: HashMap::new(),
        }
    }

    pub fn set_repository(&mut self, version: &Version, repository: RemoteRepository) {
        self.repositories
            .insert(version.as_str().to_string(), repository);
    }

    pub fn repository(&self, version: &Version) -> Option<&RemoteRepository> {
        self.repositories.get(version.as_str())
    }

    /// The highest matching version, if any.
    pub fn highest(&self) -> Option<&Version> {
        self.versions.iter().max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_display_and_membership() {
        let a = Artifact::parse("g:a:1").unwrap();
        let b = Artifact::parse("g:b:1").unwrap();
        let cycle = Cycle::new(vec![a.clone(), b.clone(), a.clone()]);
        assert_eq!(cycle.to_string(), "g:a:jar:1 -> g:b:jar:1 -> g:a:jar:1");
        assert!(cycle.contains(&a.with_version("9")));
        assert!(!cycle.contains(&Artifact::parse("g:c:1").unwrap()));
    }

    #[test]
    fn empty_stub_has_nothing() {
        let stub = ArtifactDescriptor::empty_stub(Artifact::parse("g:a:1").unwrap());
        assert!(stub.dependencies.is_empty());
        assert!(stub.relocations.is_empty());
        assert!(stub.managed_dependencies.is_empty());
    }

    #[test]
    fn range_result_tracks_repositories() {
        let constraint = VersionConstraint::parse("[1,2)");
        let v1 = Version::new("1.0");
        let v2 = Version::new("1.5");
        let mut result = VersionRangeResult::new(constraint, vec![v1.clone(), v2.clone()]);
        result.set_repository(&v2, RemoteRepository::central());
        assert!(result.repository(&v1).is_none());
        assert_eq!(result.repository(&v2).unwrap().id(), "central");
        assert_eq!(result.highest().unwrap().as_str(), "1.5");
    }
}
