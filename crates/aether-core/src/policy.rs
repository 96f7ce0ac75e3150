//! Policies steering the collector: selection, management, traversal, and
//! version filtering.
//!
//! Each policy is consulted for the dependencies at one graph level and then
//! asked to derive the policy for the level below via `derive_child`. A
//! derivation that changes nothing returns the same `Arc`; the child-list
//! cache keys on that identity, so implementations should only allocate a
//! new value when their state actually differs.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock};

use aether_util::errors::Result;
use indexmap::IndexSet;

use crate::artifact::property;
use crate::dependency::{Dependency, Exclusion};
use crate::scope;
use crate::version::{Version, VersionConstraint};

/// Context handed to `derive_child`: the dependency whose children are about
/// to be collected and the dependency management its descriptor declares.
pub struct DependencyContext<'a> {
    pub dependency: Option<&'a Dependency>,
    pub managed_dependencies: &'a [Dependency],
}

impl<'a> DependencyContext<'a> {
    pub fn new(
        dependency: Option<&'a Dependency>,
        managed_dependencies: &'a [Dependency],
    ) -> Self {
        Self {
            dependency,
            managed_dependencies,
        }
    }
}

/// Decides which dependencies enter the graph at all.
pub trait DependencySelector: Send + Sync {
    fn select(&self, dependency: &Dependency) -> bool;
    fn derive_child(self: Arc<Self>, context: &DependencyContext<'_>) -> Arc<dyn DependencySelector>;
}

/// The attribute overrides a manager applies to one dependency, together
/// with which subjects it actually touched (the `Some`s).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyManagement {
    pub version: Option<String>,
    pub scope: Option<String>,
    pub optional: Option<bool>,
    pub exclusions: Option<Vec<Exclusion>>,
    pub properties: Option<BTreeMap<String, String>>,
}

impl DependencyManagement {
    pub fn is_empty(&self) -> bool {
        self.version.is_none()
            && self.scope.is_none()
            && self.optional.is_none()
            && self.exclusions.is_none()
            && self.properties.is_none()
    }
}

/// Applies dependency management (version pinning, scope, optionality,
/// exclusions, properties) as the graph is collected.
pub trait DependencyManager: Send + Sync {
    /// Overrides for the given dependency, or `None` when unmanaged.
    fn manage(&self, dependency: &Dependency) -> Option<DependencyManagement>;
    fn derive_child(self: Arc<Self>, context: &DependencyContext<'_>) -> Arc<dyn DependencyManager>;
}

/// Decides whether the children of a dependency are worth collecting.
pub trait DependencyTraverser: Send + Sync {
    fn traverse(&self, dependency: &Dependency) -> bool;
    fn derive_child(self: Arc<Self>, context: &DependencyContext<'_>)
        -> Arc<dyn DependencyTraverser>;
}

/// Mutable view over the candidate versions of one constraint resolution.
pub struct VersionFilterContext<'a> {
    pub dependency: &'a Dependency,
    pub constraint: &'a VersionConstraint,
    versions: Vec<Version>,
}

impl<'a> VersionFilterContext<'a> {
    pub fn new(
        dependency: &'a Dependency,
        constraint: &'a VersionConstraint,
        versions: Vec<Version>,
    ) -> Self {
        Self {
            dependency,
            constraint,
            versions,
        }
    }

    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    pub fn retain(&mut self, keep: impl FnMut(&Version) -> bool) {
        self.versions.retain(keep);
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn into_versions(self) -> Vec<Version> {
        self.versions
    }
}

/// Thins out the candidate versions of a range before nodes are created.
pub trait VersionFilter: Send + Sync {
    fn filter(&self, context: &mut VersionFilterContext<'_>) -> Result<()>;
    fn derive_child(self: Arc<Self>, context: &DependencyContext<'_>) -> Arc<dyn VersionFilter>;
}

/// Drops transitive dependencies of unwanted scopes. Direct dependencies are
/// always selected; the scope check starts one level down.
///
/// The transitive variant is derived once and shared, so sibling branches
/// agree on the derived instance (which keeps the child-list cache keys
/// equal across branches).
#[derive(Debug)]
pub struct ScopeDependencySelector {
    transitive: bool,
    excluded: Vec<String>,
    derived: OnceLock<Arc<ScopeDependencySelector>>,
}

impl ScopeDependencySelector {
    pub fn new(excluded: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            transitive: false,
            excluded: excluded.into_iter().map(Into::into).collect(),
            derived: OnceLock::new(),
        }
    }

    /// The conventional exclusion set: `test` and `provided`.
    pub fn from_defaults() -> Self {
        Self::new([scope::TEST, scope::PROVIDED])
    }
}

impl DependencySelector for ScopeDependencySelector {
    fn select(&self, dependency: &Dependency) -> bool {
        !self.transitive || !self.excluded.iter().any(|s| s == dependency.scope())
    }

    fn derive_child(
        self: Arc<Self>,
        context: &DependencyContext<'_>,
    ) -> Arc<dyn DependencySelector> {
        // Deriving for the root keeps the selector lenient: its children are
        // the direct dependencies.
        if self.transitive || context.dependency.is_none() {
            self
        } else {
            self.derived
                .get_or_init(|| {
                    Arc::new(Self {
                        transitive: true,
                        excluded: self.excluded.clone(),
                        derived: OnceLock::new(),
                    })
                })
                .clone()
        }
    }
}

/// Drops optional transitive dependencies. A directly declared optional
/// dependency is still selected.
#[derive(Debug, Default)]
pub struct OptionalDependencySelector {
    transitive: bool,
    derived: OnceLock<Arc<OptionalDependencySelector>>,
}

impl OptionalDependencySelector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DependencySelector for OptionalDependencySelector {
    fn select(&self, dependency: &Dependency) -> bool {
        !self.transitive || !dependency.is_optional()
    }

    fn derive_child(
        self: Arc<Self>,
        context: &DependencyContext<'_>,
    ) -> Arc<dyn DependencySelector> {
        if self.transitive || context.dependency.is_none() {
            self
        } else {
            self.derived
                .get_or_init(|| {
                    Arc::new(Self {
                        transitive: true,
                        derived: OnceLock::new(),
                    })
                })
                .clone()
        }
    }
}

/// Applies the exclusions accumulated along the path to the current node.
#[derive(Debug, Default)]
pub struct ExclusionDependencySelector {
    exclusions: IndexSet<Exclusion>,
}

impl ExclusionDependencySelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exclusions(exclusions: impl IntoIterator<Item = Exclusion>) -> Self {
        Self {
            exclusions: exclusions.into_iter().collect(),
        }
    }
}

impl DependencySelector for ExclusionDependencySelector {
    fn select(&self, dependency: &Dependency) -> bool {
        !self
            .exclusions
            .iter()
            .any(|e| e.matches(dependency.artifact()))
    }

    fn derive_child(
        self: Arc<Self>,
        context: &DependencyContext<'_>,
    ) -> Arc<dyn DependencySelector> {
        let extra = context.dependency.filter(|d| d.has_exclusions());
        match extra {
            None => self,
            Some(dependency) => {
                let mut merged = self.exclusions.clone();
                let before = merged.len();
                merged.extend(dependency.exclusions().cloned());
                if merged.len() == before {
                    self
                } else {
                    Arc::new(Self { exclusions: merged })
                }
            }
        }
    }
}

/// Conjunction of selectors; a dependency must pass all of them.
pub struct AndDependencySelector {
    selectors: Vec<Arc<dyn DependencySelector>>,
    derived: OnceLock<Arc<AndDependencySelector>>,
}

impl AndDependencySelector {
    pub fn new(selectors: Vec<Arc<dyn DependencySelector>>) -> Self {
        Self {
            selectors,
            derived: OnceLock::new(),
        }
    }

    /// The conventional stack: scope, optionality, exclusions.
    pub fn from_defaults() -> Self {
        Self::new(vec![
            Arc::new(ScopeDependencySelector::from_defaults()),
            Arc::new(OptionalDependencySelector::new()),
            Arc::new(ExclusionDependencySelector::new()),
        ])
    }
}

impl DependencySelector for AndDependencySelector {
    fn select(&self, dependency: &Dependency) -> bool {
        self.selectors.iter().all(|s| s.select(dependency))
    }

    fn derive_child(
        self: Arc<Self>,
        context: &DependencyContext<'_>,
    ) -> Arc<dyn DependencySelector> {
        let derived: Vec<Arc<dyn DependencySelector>> = self
            .selectors
            .iter()
            .map(|s| Arc::clone(s).derive_child(context))
            .collect();
        let unchanged = derived
            .iter()
            .zip(&self.selectors)
            .all(|(a, b)| Arc::ptr_eq(a, b));
        if unchanged {
            return self;
        }
        // Sibling branches usually derive to the same component stack; hand
        // them the same instance when they do.
        if let Some(cached) = self.derived.get() {
            let same = cached.selectors.len() == derived.len()
                && cached
                    .selectors
                    .iter()
                    .zip(&derived)
                    .all(|(a, b)| Arc::ptr_eq(a, b));
            if same {
                return cached.clone();
            }
        }
        let fresh = Arc::new(Self {
            selectors: derived,
            derived: OnceLock::new(),
        });
        let _ = self.derived.set(fresh.clone());
        fresh
    }
}

/// A manager that never manages anything.
#[derive(Debug, Default)]
pub struct NoopDependencyManager;

impl DependencyManager for NoopDependencyManager {
    fn manage(&self, _dependency: &Dependency) -> Option<DependencyManagement> {
        None
    }

    fn derive_child(
        self: Arc<Self>,
        _context: &DependencyContext<'_>,
    ) -> Arc<dyn DependencyManager> {
        self
    }
}

/// Rule maps keyed by versionless artifact id. Rules declared nearer the
/// root win over deeper declarations; management only applies from the
/// second transitive level down, so a project's direct dependencies keep
/// their declared coordinates.
#[derive(Debug, Default)]
pub struct DefaultDependencyManager {
    depth: u8,
    versions: HashMap<String, String>,
    scopes: HashMap<String, String>,
    optionals: HashMap<String, bool>,
    exclusions: HashMap<String, Vec<Exclusion>>,
    properties: HashMap<String, BTreeMap<String, String>>,
    derived: OnceLock<Arc<DefaultDependencyManager>>,
}

impl DefaultDependencyManager {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DependencyManager for DefaultDependencyManager {
    fn manage(&self, dependency: &Dependency) -> Option<DependencyManagement> {
        if self.depth < 2 {
            return None;
        }
        let key = dependency.artifact().versionless_id();
        let management = DependencyManagement {
            version: self.versions.get(&key).cloned(),
            scope: self.scopes.get(&key).cloned(),
            optional: self.optionals.get(&key).copied(),
            exclusions: self.exclusions.get(&key).cloned(),
            properties: self.properties.get(&key).cloned(),
        };
        if management.is_empty() {
            None
        } else {
            Some(management)
        }
    }

    fn derive_child(
        self: Arc<Self>,
        context: &DependencyContext<'_>,
    ) -> Arc<dyn DependencyManager> {
        // Depth saturates at 2: beyond that only the rule maps matter, which
        // keeps the derived manager shareable (and the child-list cache
        // effective) once no new rules appear.
        if self.depth >= 2 && context.managed_dependencies.is_empty() {
            return self;
        }
        if context.managed_dependencies.is_empty() {
            // Pure depth bump; share it across sibling branches.
            return self
                .derived
                .get_or_init(|| {
                    Arc::new(Self {
                        depth: (self.depth + 1).min(2),
                        versions: self.versions.clone(),
                        scopes: self.scopes.clone(),
                        optionals: self.optionals.clone(),
                        exclusions: self.exclusions.clone(),
                        properties: self.properties.clone(),
                        derived: OnceLock::new(),
                    })
                })
                .clone();
        }

        let mut derived = Self {
            depth: (self.depth + 1).min(2),
            versions: self.versions.clone(),
            scopes: self.scopes.clone(),
            optionals: self.optionals.clone(),
            exclusions: self.exclusions.clone(),
            properties: self.properties.clone(),
            derived: OnceLock::new(),
        };
        for managed in context.managed_dependencies {
            let key = managed.artifact().versionless_id();
            if !managed.artifact().version().is_empty() {
                derived
                    .versions
                    .entry(key.clone())
                    .or_insert_with(|| managed.artifact().version().to_string());
            }
            if !managed.scope().is_empty() {
                derived
                    .scopes
                    .entry(key.clone())
                    .or_insert_with(|| managed.scope().to_string());
            }
            if let Some(optional) = managed.optional() {
                derived.optionals.entry(key.clone()).or_insert(optional);
            }
            if managed.has_exclusions() {
                derived
                    .exclusions
                    .entry(key.clone())
                    .or_default()
                    .extend(managed.exclusions().cloned());
            }
            if !managed.artifact().properties().is_empty() {
                derived
                    .properties
                    .entry(key)
                    .or_insert_with(|| managed.artifact().properties().clone());
            }
        }
        Arc::new(derived)
    }
}

/// Traverses everything or nothing, unconditionally.
#[derive(Debug)]
pub struct StaticDependencyTraverser {
    traverse: bool,
}

impl StaticDependencyTraverser {
    pub fn new(traverse: bool) -> Self {
        Self { traverse }
    }
}

impl DependencyTraverser for StaticDependencyTraverser {
    fn traverse(&self, _dependency: &Dependency) -> bool {
        self.traverse
    }

    fn derive_child(
        self: Arc<Self>,
        _context: &DependencyContext<'_>,
    ) -> Arc<dyn DependencyTraverser> {
        self
    }
}

/// Stops below artifacts that already embed their own dependencies
/// (uber-jars and the like), as flagged by their type properties.
#[derive(Debug, Default)]
pub struct FatArtifactTraverser;

impl DependencyTraverser for FatArtifactTraverser {
    fn traverse(&self, dependency: &Dependency) -> bool {
        dependency
            .artifact()
            .property(property::INCLUDES_DEPENDENCIES)
            != Some("true")
    }

    fn derive_child(
        self: Arc<Self>,
        _context: &DependencyContext<'_>,
    ) -> Arc<dyn DependencyTraverser> {
        self
    }
}

/// Removes snapshot versions from range resolutions.
#[derive(Debug, Default)]
pub struct SnapshotVersionFilter;

impl VersionFilter for SnapshotVersionFilter {
    fn filter(&self, context: &mut VersionFilterContext<'_>) -> Result<()> {
        context.retain(|v| !v.is_snapshot());
        Ok(())
    }

    fn derive_child(self: Arc<Self>, _context: &DependencyContext<'_>) -> Arc<dyn VersionFilter> {
        self
    }
}

/// Applies several version filters in order.
pub struct ChainedVersionFilter {
    filters: Vec<Arc<dyn VersionFilter>>,
}

impl ChainedVersionFilter {
    pub fn new(filters: Vec<Arc<dyn VersionFilter>>) -> Self {
        Self { filters }
    }
}

impl VersionFilter for ChainedVersionFilter {
    fn filter(&self, context: &mut VersionFilterContext<'_>) -> Result<()> {
        for filter in &self.filters {
            filter.filter(context)?;
            if context.is_empty() {
                break;
            }
        }
        Ok(())
    }

    fn derive_child(self: Arc<Self>, context: &DependencyContext<'_>) -> Arc<dyn VersionFilter> {
        let derived: Vec<Arc<dyn VersionFilter>> = self
            .filters
            .iter()
            .map(|f| Arc::clone(f).derive_child(context))
            .collect();
        let unchanged = derived
            .iter()
            .zip(&self.filters)
            .all(|(a, b)| Arc::ptr_eq(a, b));
        if unchanged {
            self
        } else {
            Arc::new(Self { filters: derived })
        }
    }
}
