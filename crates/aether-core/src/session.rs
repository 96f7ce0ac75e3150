//! The session: configuration, component bindings, and an open keyed store.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::listener::RepositoryListener;
use crate::policy::{
    AndDependencySelector, DefaultDependencyManager, DependencyManager, DependencySelector,
    DependencyTraverser, FatArtifactTraverser, VersionFilter,
};

/// Configuration keys understood by the engine.
pub mod config {
    /// Back the descriptor pool with weak references instead of retaining
    /// every descriptor for the session lifetime.
    pub const POOL_WEAK: &str = "aether.dependencyCollector.pool.weak";
    /// Record premanaged attribute snapshots on managed nodes.
    pub const MANAGER_VERBOSE: &str = "aether.dependencyManager.verbose";
    /// Conflict resolver output mode: `NONE`, `STANDARD` or `FULL`.
    pub const RESOLVER_VERBOSE: &str = "aether.conflictResolver.verbose";
    /// Conflict resolver strategy: `path` or `classic`.
    pub const RESOLVER_IMPL: &str = "aether.conflictResolver.impl";
    /// Cap on recorded exceptions per collect; negative means unlimited.
    pub const MAX_EXCEPTIONS: &str = "aether.dependencyCollector.maxExceptions";
    /// Cap on recorded cycles per collect; negative means unlimited.
    pub const MAX_CYCLES: &str = "aether.dependencyCollector.maxCycles";
    /// Treat artifacts found in the tail of a chained local repository as
    /// available. Consumed by the local repository chain, not the engine.
    pub const CHAINED_IGNORE_TAIL_AVAILABILITY: &str =
        "aether.chainedLocalRepository.ignoreTailAvailability";

    pub const DEFAULT_MAX_EXCEPTIONS: i64 = 50;
    pub const DEFAULT_MAX_CYCLES: i64 = 10;
}

/// How descriptor read failures are handled during collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DescriptorPolicy {
    /// Substitute an empty descriptor when none is found.
    pub ignore_missing: bool,
    /// Substitute an empty descriptor when one cannot be read.
    pub ignore_invalid: bool,
}

impl DescriptorPolicy {
    pub fn lenient() -> Self {
        Self {
            ignore_missing: true,
            ignore_invalid: true,
        }
    }
}

/// Thread-safe open keyed store attached to a session. Not a cache: entries
/// live until overwritten, and components key their data by their own type
/// or module path.
#[derive(Default)]
pub struct SessionData {
    map: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl SessionData {
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<dyn Any + Send + Sync>>> {
        match self.map.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<dyn Any + Send + Sync>>> {
        match self.map.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn Any + Send + Sync>> {
        self.read().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: Arc<dyn Any + Send + Sync>) {
        self.write().insert(key.into(), value);
    }

    /// Store `value` only if the current entry is still `expected` (compared
    /// by identity; `None` means "no entry"). Returns whether the store
    /// happened.
    pub fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&Arc<dyn Any + Send + Sync>>,
        value: Arc<dyn Any + Send + Sync>,
    ) -> bool {
        let mut map = self.write();
        let current = map.get(key);
        let matches = match (current, expected) {
            (None, None) => true,
            (Some(current), Some(expected)) => Arc::ptr_eq(current, expected),
            _ => false,
        };
        if matches {
            map.insert(key.to_string(), value);
        }
        matches
    }
}

/// Request-scoped configuration and component bindings, plus the open keyed
/// data store. Shared by reference across concurrent collections.
pub struct Session {
    config: HashMap<String, String>,
    data: SessionData,
    selector: Arc<dyn DependencySelector>,
    manager: Arc<dyn DependencyManager>,
    traverser: Arc<dyn DependencyTraverser>,
    version_filter: Option<Arc<dyn VersionFilter>>,
    descriptor_policy: DescriptorPolicy,
    ignore_descriptor_repositories: bool,
    repository_listener: Option<Arc<dyn RepositoryListener>>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            config: HashMap::new(),
            data: SessionData::default(),
            selector: Arc::new(AndDependencySelector::from_defaults()),
            manager: Arc::new(DefaultDependencyManager::new()),
            traverser: Arc::new(FatArtifactTraverser),
            version_filter: None,
            descriptor_policy: DescriptorPolicy::default(),
            ignore_descriptor_repositories: false,
            repository_listener: None,
        }
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    pub fn with_selector(mut self, selector: Arc<dyn DependencySelector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_manager(mut self, manager: Arc<dyn DependencyManager>) -> Self {
        self.manager = manager;
        self
    }

    pub fn with_traverser(mut self, traverser: Arc<dyn DependencyTraverser>) -> Self {
        self.traverser = traverser;
        self
    }

    pub fn with_version_filter(mut self, filter: Arc<dyn VersionFilter>) -> Self {
        self.version_filter = Some(filter);
        self
    }

    pub fn with_descriptor_policy(mut self, policy: DescriptorPolicy) -> Self {
        self.descriptor_policy = policy;
        self
    }

    pub fn with_ignore_descriptor_repositories(mut self, ignore: bool) -> Self {
        self.ignore_descriptor_repositories = ignore;
        self
    }

    pub fn with_repository_listener(mut self, listener: Arc<dyn RepositoryListener>) -> Self {
        self.repository_listener = Some(listener);
        self
    }

    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).map(String::as_str)
    }

    pub fn config_bool(&self, key: &str, default: bool) -> bool {
        match self.config_str(key) {
            Some(value) => value.eq_ignore_ascii_case("true"),
            None => default,
        }
    }

    pub fn config_int(&self, key: &str, default: i64) -> i64 {
        match self.config_str(key) {
            Some(value) => match value.parse() {
                Ok(parsed) => parsed,
                Err(_) => {
                    tracing::warn!("ignoring malformed value {value} for {key}");
                    default
                }
            },
            None => default,
        }
    }

    pub fn data(&self) -> &SessionData {
        &self.data
    }

    pub fn selector(&self) -> &Arc<dyn DependencySelector> {
        &self.selector
    }

    pub fn manager(&self) -> &Arc<dyn DependencyManager> {
        &self.manager
    }

    pub fn traverser(&self) -> &Arc<dyn DependencyTraverser> {
        &self.traverser
    }

    pub fn version_filter(&self) -> Option<&Arc<dyn VersionFilter>> {
        self.version_filter.as_ref()
    }

    pub fn descriptor_policy(&self) -> DescriptorPolicy {
        self.descriptor_policy
    }

    pub fn ignores_descriptor_repositories(&self) -> bool {
        self.ignore_descriptor_repositories
    }

    pub fn repository_listener(&self) -> Option<&Arc<dyn RepositoryListener>> {
        self.repository_listener.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_getters_with_defaults() {
        let session = Session::new()
            .with_config(config::MANAGER_VERBOSE, "true")
            .with_config(config::MAX_EXCEPTIONS, "-1");
        assert!(session.config_bool(config::MANAGER_VERBOSE, false));
        assert!(!session.config_bool(config::POOL_WEAK, false));
        assert_eq!(session.config_int(config::MAX_EXCEPTIONS, 50), -1);
        assert_eq!(session.config_int(config::MAX_CYCLES, 10), 10);
        assert_eq!(session.config_str(config::RESOLVER_IMPL), None);
    }

    #[test]
    fn data_store_round_trip() {
        let session = Session::new();
        session.data().set("k", Arc::new(42usize));
        let value = session.data().get("k").unwrap();
        assert_eq!(value.downcast_ref::<usize>(), Some(&42));
        assert!(session.data().get("missing").is_none());
    }

    #[test]
    fn compare_and_set_semantics() {
        let session = Session::new();
        let first: Arc<dyn Any + Send + Sync> = Arc::new(1usize);
        let second: Arc<dyn Any + Send + Sync> = Arc::new(2usize);

        // Insert only when absent.
        assert!(session.data().compare_and_set("k", None, first.clone()));
        assert!(!session.data().compare_and_set("k", None, second.clone()));

        // Replace only when the current value matches.
        assert!(session
            .data()
            .compare_and_set("k", Some(&first), second.clone()));
        assert!(!session.data().compare_and_set("k", Some(&first), second));
    }

    #[test]
    fn default_descriptor_policy_is_strict() {
        let session = Session::new();
        assert!(!session.descriptor_policy().ignore_missing);
        assert!(!session.descriptor_policy().ignore_invalid);
        let lenient = Session::new().with_descriptor_policy(DescriptorPolicy::lenient());
        assert!(lenient.descriptor_policy().ignore_invalid);
    }
}
