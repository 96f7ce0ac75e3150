//! The depth-first dependency collector.

use std::collections::BTreeMap;
use std::sync::Arc;

use aether_core::artifact::Artifact;
use aether_core::dependency::{Dependency, Exclusion};
use aether_core::node::{self, DataValue, DependencyNode};
use aether_core::policy::{
    DependencyContext, DependencyManager, DependencySelector, DependencyTraverser,
    VersionFilter, VersionFilterContext,
};
use aether_core::repository::RemoteRepository;
use aether_core::request::{
    ArtifactDescriptor, CollectError, CollectRequest, CollectResult, Cycle, DescriptorRequest,
    VersionRangeRequest, VersionRangeResult,
};
use aether_core::session::{config, Session};
use aether_core::source::{DescriptorSource, VersionRangeSource};
use aether_core::version::{is_range_syntax, Version, VersionConstraint};
use aether_util::cancel::CancellationToken;
use aether_util::errors::{AetherError, Result};
use aether_util::workers::WorkerPool;

use crate::pool::{
    ChildrenEntry, CollectionCaches, ConstraintKey, DataPool, DescriptorHit, GraphKey,
};
use crate::skipper::{self, SkipRecord};

/// The derived policy stack and repositories in effect at one graph level.
#[derive(Clone)]
pub(crate) struct Policies {
    pub selector: Arc<dyn DependencySelector>,
    pub manager: Arc<dyn DependencyManager>,
    pub traverser: Arc<dyn DependencyTraverser>,
    pub filter: Option<Arc<dyn VersionFilter>>,
    pub repositories: Vec<RemoteRepository>,
}

impl Policies {
    fn from_session(session: &Session, repositories: Vec<RemoteRepository>) -> Self {
        Self {
            selector: session.selector().clone(),
            manager: session.manager().clone(),
            traverser: session.traverser().clone(),
            filter: session.version_filter().cloned(),
            repositories,
        }
    }

    pub(crate) fn derive(
        &self,
        context: &DependencyContext<'_>,
        repositories: Vec<RemoteRepository>,
    ) -> Self {
        Self {
            selector: self.selector.clone().derive_child(context),
            manager: self.manager.clone().derive_child(context),
            traverser: self.traverser.clone().derive_child(context),
            filter: self.filter.as_ref().map(|f| f.clone().derive_child(context)),
            repositories,
        }
    }

    pub(crate) fn graph_key(&self, artifact: Artifact) -> GraphKey {
        GraphKey::new(
            artifact,
            &self.repositories,
            arc_id(&self.selector),
            arc_id(&self.manager),
            arc_id(&self.traverser),
            self.filter.as_ref().map(arc_id).unwrap_or(0),
        )
    }
}

fn arc_id<T: ?Sized>(arc: &Arc<T>) -> usize {
    Arc::as_ptr(arc).cast::<()>() as usize
}

pub(crate) struct CollectState {
    pub session: Arc<Session>,
    pub pool: Arc<DataPool>,
    pub caches: CollectionCaches,
    pub errors: Vec<CollectError>,
    pub cycles: Vec<Cycle>,
    pub records: Vec<SkipRecord>,
    max_errors: i64,
    max_cycles: i64,
    verbose_premanaged: bool,
    cancel: CancellationToken,
    cancelled_recorded: bool,
    fatal: Option<AetherError>,
    skip_enabled: bool,
}

impl CollectState {
    fn push_error(
        &mut self,
        dependency: Option<Dependency>,
        ancestors: &[Artifact],
        error: Arc<AetherError>,
        from_cache: bool,
    ) {
        if self.max_errors >= 0 && self.errors.len() as i64 >= self.max_errors {
            return;
        }
        let path = ancestors
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(" -> ");
        self.errors.push(CollectError {
            dependency,
            path,
            error,
            from_cache,
        });
    }

    fn record_cycle(&mut self, ancestors: &[Artifact], closing: &Artifact) {
        if self.max_cycles >= 0 && self.cycles.len() as i64 >= self.max_cycles {
            return;
        }
        let mut path = ancestors.to_vec();
        path.push(closing.clone());
        tracing::debug!("dependency cycle: {}", Cycle::new(path.clone()));
        self.cycles.push(Cycle::new(path));
    }

    /// Record the cancellation once; further checks just halt expansion.
    fn check_cancelled(&mut self, ancestors: &[Artifact]) -> bool {
        if !self.cancel.is_cancelled() {
            return false;
        }
        if !self.cancelled_recorded {
            self.cancelled_recorded = true;
            self.push_error(None, ancestors, Arc::new(AetherError::Cancelled), false);
        }
        true
    }
}

enum DescriptorOutcome {
    Found(Arc<ArtifactDescriptor>),
    /// Error attached (or demoted); the node must not be emitted.
    Skip,
    /// Fatal error stored; unwind the whole collection.
    Abort,
}

/// Expands a root dependency set into a dependency graph.
pub struct DependencyCollector {
    descriptor_source: Arc<dyn DescriptorSource>,
    version_source: Arc<dyn VersionRangeSource>,
    skip_enabled: bool,
    prefetch: Option<WorkerPool>,
}

impl DependencyCollector {
    /// A collector without the skip optimizer and without prefetching.
    pub fn new(
        descriptor_source: Arc<dyn DescriptorSource>,
        version_source: Arc<dyn VersionRangeSource>,
    ) -> Self {
        Self {
            descriptor_source,
            version_source,
            skip_enabled: false,
            prefetch: None,
        }
    }

    /// Enable the skip-and-reconcile optimizer.
    pub fn with_skipper(mut self, enabled: bool) -> Self {
        self.skip_enabled = enabled;
        self
    }

    /// Warm the descriptor pool for upcoming children through a worker
    /// pool. Graph assembly itself stays single-threaded.
    pub fn with_prefetch(mut self, pool: WorkerPool) -> Self {
        self.prefetch = Some(pool);
        self
    }

    /// Collect the complete dependency graph for the request.
    ///
    /// Non-fatal failures (missing descriptors, empty ranges, cycles) are
    /// recorded on the result; fatal failures abort with an error.
    pub fn collect(&self, session: &Arc<Session>, request: CollectRequest) -> Result<CollectResult> {
        let pool = DataPool::from_session(session);
        let mut state = CollectState {
            session: session.clone(),
            pool,
            caches: CollectionCaches::new(),
            errors: Vec::new(),
            cycles: Vec::new(),
            records: Vec::new(),
            max_errors: session.config_int(config::MAX_EXCEPTIONS, config::DEFAULT_MAX_EXCEPTIONS),
            max_cycles: session.config_int(config::MAX_CYCLES, config::DEFAULT_MAX_CYCLES),
            verbose_premanaged: session.config_bool(config::MANAGER_VERBOSE, false),
            cancel: request.cancel.clone(),
            cancelled_recorded: false,
            fatal: None,
            skip_enabled: self.skip_enabled,
        };

        let repositories = request.repositories.clone();
        let mut managed = request.managed_dependencies.clone();
        let mut direct = request.dependencies.clone();

        let root_node = if let Some(root_dependency) = &request.root {
            let descriptor = self.read_root_descriptor(
                &mut state,
                root_dependency.artifact(),
                &repositories,
            )?;
            let (effective, relocated_from) =
                relocate(root_dependency.clone(), descriptor.as_ref());
            let root = DependencyNode::new(effective);
            decorate_from_descriptor(&root, descriptor.as_ref(), relocated_from);
            direct = merge_dependencies(&direct, &descriptor.dependencies);
            managed.extend(descriptor.managed_dependencies.iter().cloned());
            root
        } else if let Some(root_artifact) = &request.root_artifact {
            let descriptor =
                self.read_root_descriptor(&mut state, root_artifact, &repositories)?;
            let effective = descriptor
                .artifact
                .clone()
                .unwrap_or_else(|| root_artifact.clone());
            let root = DependencyNode::from_artifact(effective.clone());
            let relocated_from =
                (effective.versionless_id() != root_artifact.versionless_id())
                    .then(|| root_artifact.clone());
            decorate_from_descriptor(&root, descriptor.as_ref(), relocated_from);
            direct = merge_dependencies(&direct, &descriptor.dependencies);
            managed.extend(descriptor.managed_dependencies.iter().cloned());
            root
        } else {
            DependencyNode::root()
        };
        root_node.set_repositories(repositories.clone());

        let root_dependency = root_node.dependency();
        let root_context = DependencyContext::new(root_dependency.as_ref(), &managed);
        let policies =
            Policies::from_session(session, repositories).derive(&root_context, request.repositories.clone());

        let mut ancestors: Vec<Artifact> = root_node.artifact().into_iter().collect();
        self.process_dependencies(&mut state, &root_node, &direct, &policies, &mut ancestors, 1);

        if let Some(fatal) = state.fatal.take() {
            return Err(fatal);
        }

        if !state.records.is_empty() {
            skipper::reconcile(self, &mut state, &root_node);
        }

        Ok(CollectResult {
            request,
            root: root_node,
            exceptions: state.errors,
            cycles: state.cycles,
        })
    }

    /// Root descriptors are load-bearing; a failure that the session policy
    /// does not demote aborts the collection.
    fn read_root_descriptor(
        &self,
        state: &mut CollectState,
        artifact: &Artifact,
        repositories: &[RemoteRepository],
    ) -> Result<Arc<ArtifactDescriptor>> {
        match self.read_descriptor(state, artifact, repositories, &[]) {
            DescriptorOutcome::Found(descriptor) => Ok(descriptor),
            DescriptorOutcome::Abort => Err(state
                .fatal
                .take()
                .unwrap_or(AetherError::Cancelled)),
            DescriptorOutcome::Skip => {
                let error = state
                    .errors
                    .pop()
                    .map(|e| e.error)
                    .unwrap_or_else(|| {
                        Arc::new(AetherError::DescriptorMissing {
                            artifact: artifact.to_string(),
                        })
                    });
                Err(AetherError::DescriptorInvalid {
                    artifact: artifact.to_string(),
                    message: error.to_string(),
                })
            }
        }
    }

    /// Expand one level: process `dependencies` as children of `parent`,
    /// which sits at `depth - 1`. Returns `false` when expansion must stop
    /// (cancellation or a fatal error).
    pub(crate) fn process_dependencies(
        &self,
        state: &mut CollectState,
        parent: &DependencyNode,
        dependencies: &[Dependency],
        policies: &Policies,
        ancestors: &mut Vec<Artifact>,
        depth: usize,
    ) -> bool {
        for dependency in dependencies {
            if state.check_cancelled(ancestors) {
                return false;
            }
            if !policies.selector.select(dependency) {
                continue;
            }
            let dependency = state.pool.intern_dependency(dependency.clone());

            let (managed, premanaged) = apply_management(policies.manager.as_ref(), &dependency);

            // Ancestor-path cycle check, version ignored.
            let versionless = managed.artifact().versionless_id();
            if let Some(position) = ancestors
                .iter()
                .position(|a| a.versionless_id() == versionless)
            {
                state.record_cycle(&ancestors[position..], managed.artifact());
                let version = Version::new(managed.artifact().version());
                let child = self.new_node(state, &managed, policies, Some(version));
                premanaged.apply(&child, state.verbose_premanaged);
                parent.add_child(child);
                continue;
            }

            // Version constraint resolution, through the per-collection
            // constraint cache.
            let range = match self.resolve_versions(state, &managed, policies, ancestors) {
                Ok(range) => range,
                Err(()) => {
                    if state.fatal.is_some() {
                        return false;
                    }
                    let child = self.new_node(state, &managed, policies, None);
                    premanaged.apply(&child, state.verbose_premanaged);
                    parent.add_child(child);
                    continue;
                }
            };

            // Version filtering over the candidate set.
            let mut versions = range.versions.clone();
            if let Some(filter) = &policies.filter {
                let mut context =
                    VersionFilterContext::new(&managed, &range.constraint, versions);
                if let Err(error) = filter.filter(&mut context) {
                    state.push_error(Some(managed.clone()), ancestors, Arc::new(error), false);
                    let child = self.new_node(state, &managed, policies, None);
                    premanaged.apply(&child, state.verbose_premanaged);
                    parent.add_child(child);
                    continue;
                }
                versions = context.into_versions();
            }
            if versions.is_empty() {
                state.push_error(
                    Some(managed.clone()),
                    ancestors,
                    Arc::new(AetherError::NoMatchingVersion {
                        artifact: managed.artifact().to_string(),
                        constraint: range.constraint.to_string(),
                    }),
                    false,
                );
                let child = self.new_node(state, &managed, policies, None);
                child.set_version_constraint(Some(range.constraint.clone()));
                premanaged.apply(&child, state.verbose_premanaged);
                parent.add_child(child);
                continue;
            }

            // One node per candidate version, ascending.
            for version in &versions {
                if state.check_cancelled(ancestors) {
                    return false;
                }
                let artifact = state
                    .pool
                    .intern_artifact(managed.artifact().with_version(version.as_str()));
                let candidate = managed.with_artifact(artifact.clone());

                let descriptor =
                    match self.read_descriptor(state, &artifact, &policies.repositories, ancestors)
                    {
                        DescriptorOutcome::Found(descriptor) => descriptor,
                        DescriptorOutcome::Skip => continue,
                        DescriptorOutcome::Abort => return false,
                    };

                let (effective, relocated_from) = relocate(candidate, descriptor.as_ref());
                let child = self.new_node(state, &effective, policies, Some(version.clone()));
                child.set_version_constraint(Some(range.constraint.clone()));
                decorate_from_descriptor(&child, descriptor.as_ref(), relocated_from);
                child.set_repositories(policies.repositories.clone());
                premanaged.apply(&child, state.verbose_premanaged);
                parent.add_child(child.clone());

                if !policies.traverser.traverse(&effective) {
                    continue;
                }

                let child_repositories = if state.session.ignores_descriptor_repositories() {
                    policies.repositories.clone()
                } else {
                    merge_repositories(&policies.repositories, &descriptor.repositories)
                };
                let context =
                    DependencyContext::new(Some(&effective), &descriptor.managed_dependencies);
                let child_policies = policies.derive(&context, child_repositories);

                // Skip rule: reuse a child list computed at an equal or
                // shallower position.
                let key = child_policies.graph_key(artifact.clone());
                if state.skip_enabled {
                    if let Some(entry) = state.caches.get_children(&key) {
                        if entry.depth <= depth {
                            tracing::debug!("skipping re-expansion of {artifact}");
                            child.set_children(entry.children.clone());
                            state.records.push(SkipRecord {
                                node: child.clone(),
                                key: key.clone(),
                                children: entry.children.clone(),
                                ancestors: ancestors.clone(),
                                cached_ancestors: entry.ancestors.clone(),
                                depth: depth + 1,
                                policies: child_policies.clone(),
                            });
                            continue;
                        }
                    }
                }

                self.prefetch_children(state, descriptor.as_ref(), &child_policies);

                ancestors.push(effective.artifact().clone());
                let proceed = self.process_dependencies(
                    state,
                    &child,
                    &descriptor.dependencies,
                    &child_policies,
                    ancestors,
                    depth + 1,
                );
                let path: Vec<String> = ancestors.iter().map(|a| a.to_string()).collect();
                ancestors.pop();
                if state.skip_enabled {
                    state.caches.put_children(
                        key,
                        ChildrenEntry {
                            children: child.children(),
                            depth,
                            ancestors: path,
                        },
                    );
                }
                if !proceed {
                    return false;
                }
            }
        }
        true
    }

    /// Re-expand a node whose skipped subtree turned out to matter after
    /// conflict resolution.
    pub(crate) fn expand_reconciled(
        &self,
        state: &mut CollectState,
        node: &DependencyNode,
        policies: &Policies,
        ancestors: &mut Vec<Artifact>,
        depth: usize,
    ) {
        let Some(dependency) = node.dependency() else {
            return;
        };
        let Some(artifact) = node.artifact() else {
            return;
        };
        let descriptor =
            match self.read_descriptor(state, &artifact, &policies.repositories, ancestors) {
                DescriptorOutcome::Found(descriptor) => descriptor,
                DescriptorOutcome::Skip | DescriptorOutcome::Abort => return,
            };
        if !policies.traverser.traverse(&dependency) {
            return;
        }
        let repositories = if state.session.ignores_descriptor_repositories() {
            policies.repositories.clone()
        } else {
            merge_repositories(&policies.repositories, &descriptor.repositories)
        };
        let context = DependencyContext::new(Some(&dependency), &descriptor.managed_dependencies);
        let child_policies = policies.derive(&context, repositories);
        ancestors.push(artifact);
        self.process_dependencies(
            state,
            node,
            &descriptor.dependencies,
            &child_policies,
            ancestors,
            depth,
        );
        ancestors.pop();
    }

    fn new_node(
        &self,
        _state: &CollectState,
        dependency: &Dependency,
        policies: &Policies,
        version: Option<Version>,
    ) -> DependencyNode {
        let child = DependencyNode::new(dependency.clone());
        child.set_repositories(policies.repositories.clone());
        child.set_version(version);
        child
    }

    fn read_descriptor(
        &self,
        state: &mut CollectState,
        artifact: &Artifact,
        repositories: &[RemoteRepository],
        ancestors: &[Artifact],
    ) -> DescriptorOutcome {
        if state.check_cancelled(ancestors) {
            return DescriptorOutcome::Abort;
        }
        let policy = state.session.descriptor_policy();

        if let Some(hit) = state.pool.get_descriptor(artifact) {
            return match hit {
                DescriptorHit::Descriptor(descriptor) => DescriptorOutcome::Found(descriptor),
                DescriptorHit::Bad(error) => {
                    // Replay of a known failure: the empty stub when the
                    // policy demotes it, otherwise the cached error.
                    let ignored = match &*error {
                        AetherError::DescriptorMissing { .. } => policy.ignore_missing,
                        _ => policy.ignore_invalid,
                    };
                    if ignored {
                        DescriptorOutcome::Found(Arc::new(ArtifactDescriptor::empty_stub(
                            artifact.clone(),
                        )))
                    } else {
                        state.push_error(None, ancestors, error, true);
                        DescriptorOutcome::Skip
                    }
                }
            };
        }

        let request = DescriptorRequest::new(artifact.clone(), repositories.to_vec());
        match self
            .descriptor_source
            .read_descriptor(&state.session, &request)
        {
            Ok(descriptor) => {
                let descriptor = Arc::new(descriptor);
                state
                    .pool
                    .put_descriptor(artifact.clone(), descriptor.clone());
                DescriptorOutcome::Found(descriptor)
            }
            Err(error) => {
                if error.is_fatal() {
                    state.fatal = Some(error);
                    return DescriptorOutcome::Abort;
                }
                let (ignored, missing) = match &error {
                    AetherError::DescriptorMissing { .. } => (policy.ignore_missing, true),
                    _ => (policy.ignore_invalid, false),
                };
                if let Some(listener) = state.session.repository_listener() {
                    if missing {
                        listener.artifact_descriptor_missing(artifact);
                    } else {
                        listener.artifact_descriptor_invalid(artifact, &error);
                    }
                }
                let error = Arc::new(error);
                state.pool.put_bad_descriptor(artifact.clone(), error.clone());
                if ignored {
                    tracing::debug!("substituting empty descriptor for {artifact}");
                    DescriptorOutcome::Found(Arc::new(ArtifactDescriptor::empty_stub(
                        artifact.clone(),
                    )))
                } else {
                    state.push_error(None, ancestors, error, false);
                    DescriptorOutcome::Skip
                }
            }
        }
    }

    /// Resolve the version constraint of a dependency. Soft versions
    /// resolve to themselves without consulting the source; ranges go
    /// through the range source behind the constraint cache. On failure the
    /// error has been recorded (or stored as fatal) and `Err(())` says
    /// "emit an unresolved node".
    fn resolve_versions(
        &self,
        state: &mut CollectState,
        dependency: &Dependency,
        policies: &Policies,
        ancestors: &[Artifact],
    ) -> std::result::Result<VersionRangeResult, ()> {
        let artifact = dependency.artifact();
        let key = ConstraintKey::new(artifact.clone(), &policies.repositories);
        if let Some(cached) = state.caches.get_constraint(&key) {
            return Ok(cached);
        }

        let spec = artifact.version();
        let result = if is_range_syntax(spec) {
            let request =
                VersionRangeRequest::new(artifact.clone(), policies.repositories.to_vec());
            match self.version_source.resolve_range(&state.session, &request) {
                Ok(result) => result,
                Err(error) => {
                    if error.is_fatal() {
                        state.fatal = Some(error);
                        return Err(());
                    }
                    if let Some(listener) = state.session.repository_listener() {
                        listener.version_range_failed(artifact, &error);
                    }
                    state.push_error(
                        Some(dependency.clone()),
                        ancestors,
                        Arc::new(error),
                        false,
                    );
                    return Err(());
                }
            }
        } else {
            VersionRangeResult::new(
                VersionConstraint::parse(spec),
                vec![Version::new(spec)],
            )
        };
        state.caches.put_constraint(key, result.clone());
        Ok(result)
    }

    /// Warm the descriptor pool for the children about to be processed.
    fn prefetch_children(
        &self,
        state: &CollectState,
        descriptor: &ArtifactDescriptor,
        child_policies: &Policies,
    ) {
        let Some(workers) = &self.prefetch else {
            return;
        };
        for dependency in &descriptor.dependencies {
            if !child_policies.selector.select(dependency) {
                continue;
            }
            let mut artifact = dependency.artifact().clone();
            if let Some(management) = child_policies.manager.manage(dependency) {
                if let Some(version) = management.version {
                    artifact = artifact.with_version(version);
                }
            }
            // Ranges need the full resolution path; only plain versions are
            // worth warming up.
            if is_range_syntax(artifact.version()) {
                continue;
            }
            if state.pool.get_descriptor(&artifact).is_some() {
                continue;
            }
            let source = self.descriptor_source.clone();
            let session = state.session.clone();
            let pool = state.pool.clone();
            let repositories = child_policies.repositories.clone();
            let cancel = state.cancel.clone();
            workers.submit(move || {
                if cancel.is_cancelled() || pool.get_descriptor(&artifact).is_some() {
                    return;
                }
                let request = DescriptorRequest::new(artifact.clone(), repositories);
                match source.read_descriptor(&session, &request) {
                    Ok(descriptor) => pool.put_descriptor(artifact, Arc::new(descriptor)),
                    Err(error) => {
                        if !error.is_fatal() {
                            pool.put_bad_descriptor(artifact, Arc::new(error));
                        }
                    }
                }
            });
        }
    }
}

/// The pre-management attribute snapshot of one dependency, together with
/// the subjects that were actually changed.
struct Premanaged {
    bits: u8,
    version: Option<String>,
    scope: Option<String>,
    optional: Option<bool>,
    exclusions: Option<Vec<Exclusion>>,
    properties: Option<BTreeMap<String, String>>,
}

impl Premanaged {
    fn untouched() -> Self {
        Self {
            bits: 0,
            version: None,
            scope: None,
            optional: None,
            exclusions: None,
            properties: None,
        }
    }

    /// Store the managed-subject bits, and the snapshots when verbose
    /// management recording is on.
    fn apply(&self, target: &DependencyNode, verbose: bool) {
        if self.bits == 0 {
            return;
        }
        target.add_managed_bits(self.bits);
        if !verbose {
            return;
        }
        if let Some(version) = &self.version {
            target.set_data(node::key::PREMANAGED_VERSION, DataValue::Str(version.clone()));
        }
        if let Some(scope) = &self.scope {
            target.set_data(node::key::PREMANAGED_SCOPE, DataValue::Str(scope.clone()));
        }
        if let Some(optional) = self.optional {
            target.set_data(node::key::PREMANAGED_OPTIONAL, DataValue::Bool(optional));
        }
        if let Some(exclusions) = &self.exclusions {
            target.set_data(
                node::key::PREMANAGED_EXCLUSIONS,
                DataValue::Exclusions(exclusions.clone()),
            );
        }
        if let Some(properties) = &self.properties {
            target.set_data(
                node::key::PREMANAGED_PROPERTIES,
                DataValue::Properties(properties.clone()),
            );
        }
    }
}

/// Apply a manager's rules to a dependency, recording what changed.
fn apply_management(
    manager: &dyn DependencyManager,
    dependency: &Dependency,
) -> (Dependency, Premanaged) {
    let Some(management) = manager.manage(dependency) else {
        return (dependency.clone(), Premanaged::untouched());
    };
    let mut premanaged = Premanaged::untouched();
    let mut managed = dependency.clone();

    if let Some(version) = management.version {
        premanaged.bits |= node::MANAGED_VERSION;
        premanaged.version = Some(managed.artifact().version().to_string());
        let artifact = managed.artifact().with_version(version);
        managed = managed.with_artifact(artifact);
    }
    if let Some(scope) = management.scope {
        premanaged.bits |= node::MANAGED_SCOPE;
        premanaged.scope = Some(managed.scope().to_string());
        managed = managed.with_scope(scope);
    }
    if let Some(optional) = management.optional {
        premanaged.bits |= node::MANAGED_OPTIONAL;
        premanaged.optional = Some(managed.is_optional());
        managed = managed.with_optional(Some(optional));
    }
    if let Some(exclusions) = management.exclusions {
        premanaged.bits |= node::MANAGED_EXCLUSIONS;
        premanaged.exclusions = Some(managed.exclusions().cloned().collect());
        let merged: Vec<Exclusion> = managed
            .exclusions()
            .cloned()
            .chain(exclusions)
            .collect();
        managed = managed.with_exclusions(merged);
    }
    if let Some(properties) = management.properties {
        premanaged.bits |= node::MANAGED_PROPERTIES;
        premanaged.properties = Some(managed.artifact().properties().clone());
        let artifact = managed.artifact().with_properties(properties);
        managed = managed.with_artifact(artifact);
    }
    (managed, premanaged)
}

/// Swap a dependency onto the descriptor's artifact when the descriptor
/// says the coordinates were relocated.
fn relocate(
    dependency: Dependency,
    descriptor: &ArtifactDescriptor,
) -> (Dependency, Option<Artifact>) {
    let Some(described) = &descriptor.artifact else {
        return (dependency, None);
    };
    if described.versionless_id() == dependency.artifact().versionless_id() {
        return (dependency, None);
    }
    let original = dependency.artifact().clone();
    tracing::debug!("relocated {original} to {described}");
    (dependency.with_artifact(described.clone()), Some(original))
}

fn decorate_from_descriptor(
    node: &DependencyNode,
    descriptor: &ArtifactDescriptor,
    relocated_from: Option<Artifact>,
) {
    node.set_aliases(descriptor.aliases.clone());
    match relocated_from {
        Some(original) => {
            let mut relocations = descriptor.relocations.clone();
            relocations.push(original);
            node.set_relocations(relocations);
        }
        None => node.set_relocations(descriptor.relocations.clone()),
    }
}

/// Merge two dependency lists, dominant entries first, recessive entries
/// appended unless their versionless coordinates are already present.
fn merge_dependencies(dominant: &[Dependency], recessive: &[Dependency]) -> Vec<Dependency> {
    let mut merged = dominant.to_vec();
    let present: Vec<String> = dominant
        .iter()
        .map(|d| d.artifact().versionless_id())
        .collect();
    for dependency in recessive {
        if !present.contains(&dependency.artifact().versionless_id()) {
            merged.push(dependency.clone());
        }
    }
    merged
}

/// Inherited repositories first, descriptor-declared ones appended unless
/// their id is already taken.
fn merge_repositories(
    inherited: &[RemoteRepository],
    declared: &[RemoteRepository],
) -> Vec<RemoteRepository> {
    let mut merged = inherited.to_vec();
    for repository in declared {
        if !merged.iter().any(|r| r.id() == repository.id()) {
            merged.push(repository.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep(coords: &str) -> Dependency {
        Dependency::compile(Artifact::parse(coords).unwrap())
    }

    #[test]
    fn merge_dependencies_dominant_wins() {
        let merged = merge_dependencies(&[dep("g:a:1")], &[dep("g:a:9"), dep("g:b:1")]);
        let versions: Vec<String> = merged
            .iter()
            .map(|d| d.artifact().version().to_string())
            .collect();
        assert_eq!(versions, ["1", "1"]);
        assert_eq!(merged[1].artifact().artifact_id(), "b");
    }

    #[test]
    fn merge_repositories_keeps_inherited_ids() {
        let inherited = [RemoteRepository::central()];
        let declared = [
            RemoteRepository::new("central", "https://evil.example.com/maven"),
            RemoteRepository::new("project", "https://repo.example.com/maven"),
        ];
        let merged = merge_repositories(&inherited, &declared);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].url(), aether_core::repository::CENTRAL_URL);
        assert_eq!(merged[1].id(), "project");
    }

    #[test]
    fn relocation_swaps_artifact_and_keeps_original() {
        let descriptor = ArtifactDescriptor::new(Artifact::parse("g:new:1").unwrap());
        let (relocated, original) = relocate(dep("g:old:1"), &descriptor);
        assert_eq!(relocated.artifact().artifact_id(), "new");
        assert_eq!(original.unwrap().artifact_id(), "old");

        let same = ArtifactDescriptor::new(Artifact::parse("g:old:1").unwrap());
        let (unchanged, none) = relocate(dep("g:old:1"), &same);
        assert_eq!(unchanged.artifact().artifact_id(), "old");
        assert!(none.is_none());
    }
}
