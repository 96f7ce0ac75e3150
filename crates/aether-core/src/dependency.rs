//! Dependencies and transitive exclusions.

use std::fmt;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::artifact::Artifact;
use crate::scope;

/// A pattern excluding transitive dependencies. Any field may be the `*`
/// wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Exclusion {
    group_id: String,
    artifact_id: String,
    classifier: String,
    extension: String,
}

impl Exclusion {
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        classifier: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            classifier: classifier.into(),
            extension: extension.into(),
        }
    }

    /// Exclusion of `groupId:artifactId` with wildcard classifier/extension.
    pub fn of(group_id: impl Into<String>, artifact_id: impl Into<String>) -> Self {
        Self::new(group_id, artifact_id, "*", "*")
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn artifact_id(&self) -> &str {
        &self.artifact_id
    }

    pub fn classifier(&self) -> &str {
        &self.classifier
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Whether this pattern excludes the given artifact.
    pub fn matches(&self, artifact: &Artifact) -> bool {
        matches_part(&self.group_id, artifact.group_id())
            && matches_part(&self.artifact_id, artifact.artifact_id())
            && matches_part(&self.classifier, artifact.classifier())
            && matches_part(&self.extension, artifact.extension())
    }
}

fn matches_part(pattern: &str, value: &str) -> bool {
    pattern == "*" || pattern == value
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.group_id, self.artifact_id, self.classifier, self.extension
        )
    }
}

/// An artifact together with the role it plays in a dependency graph.
///
/// Immutable; the `with_*` methods return a new value, or an identical clone
/// when nothing would change. The optionality is tri-state: `None` means the
/// declaring descriptor left it unspecified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    artifact: Artifact,
    scope: String,
    optional: Option<bool>,
    exclusions: IndexSet<Exclusion>,
}

impl Dependency {
    pub fn new(artifact: Artifact, scope: impl Into<String>) -> Self {
        Self {
            artifact,
            scope: scope.into(),
            optional: None,
            exclusions: IndexSet::new(),
        }
    }

    /// A compile-scoped dependency with no exclusions.
    pub fn compile(artifact: Artifact) -> Self {
        Self::new(artifact, scope::COMPILE)
    }

    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Effective optionality; unspecified counts as mandatory.
    pub fn is_optional(&self) -> bool {
        self.optional.unwrap_or(false)
    }

    pub fn optional(&self) -> Option<bool> {
        self.optional
    }

    /// Exclusions in declaration order, duplicates removed.
    pub fn exclusions(&self) -> impl Iterator<Item = &Exclusion> {
        self.exclusions.iter()
    }

    pub fn has_exclusions(&self) -> bool {
        !self.exclusions.is_empty()
    }

    pub fn with_artifact(&self, artifact: Artifact) -> Self {
        if artifact == self.artifact && artifact.path() == self.artifact.path() {
            return self.clone();
        }
        Self {
            artifact,
            ..self.clone()
        }
    }

    pub fn with_scope(&self, scope: impl Into<String>) -> Self {
        let scope = scope.into();
        if scope == self.scope {
            return self.clone();
        }
        Self {
            scope,
            ..self.clone()
        }
    }

    pub fn with_optional(&self, optional: Option<bool>) -> Self {
        if optional == self.optional {
            return self.clone();
        }
        Self {
            optional,
            ..self.clone()
        }
    }

    pub fn with_exclusions(&self, exclusions: impl IntoIterator<Item = Exclusion>) -> Self {
        let exclusions: IndexSet<Exclusion> = exclusions.into_iter().collect();
        if exclusions == self.exclusions {
            return self.clone();
        }
        Self {
            exclusions,
            ..self.clone()
        }
    }
}

impl std::hash::Hash for Dependency {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::Hasher;

        self.artifact.hash(state);
        self.scope.hash(state);
        self.optional.hash(state);
        // Exclusion sets compare order-insensitively, so the hash must too.
        let mut combined = 0u64;
        for exclusion in &self.exclusions {
            let mut hasher = DefaultHasher::new();
            exclusion.hash(&mut hasher);
            combined ^= hasher.finish();
        }
        combined.hash(state);
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}", self.artifact, self.scope)?;
        if self.is_optional() {
            write!(f, "?")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(coords: &str) -> Artifact {
        Artifact::parse(coords).unwrap()
    }

    #[test]
    fn exclusion_wildcards() {
        let excl = Exclusion::of("org.example", "*");
        assert!(excl.matches(&artifact("org.example:anything:1.0")));
        assert!(!excl.matches(&artifact("com.other:anything:1.0")));

        let exact = Exclusion::new("org.example", "lib", "", "jar");
        assert!(exact.matches(&artifact("org.example:lib:1.0")));
        assert!(!exact.matches(&artifact("org.example:lib:jar:sources:1.0")));
    }

    #[test]
    fn exclusions_are_ordered_and_unique() {
        let dep = Dependency::compile(artifact("g:a:1")).with_exclusions([
            Exclusion::of("z", "z"),
            Exclusion::of("a", "a"),
            Exclusion::of("z", "z"),
        ]);
        let seen: Vec<String> = dep.exclusions().map(|e| e.group_id().to_string()).collect();
        assert_eq!(seen, ["z", "a"]);
    }

    #[test]
    fn unchanged_setters_return_equal_values() {
        let dep = Dependency::new(artifact("g:a:1"), "runtime");
        assert_eq!(dep.with_scope("runtime"), dep);
        assert_eq!(dep.with_optional(None), dep);
        let changed = dep.with_optional(Some(true));
        assert!(changed.is_optional());
        assert!(!dep.is_optional());
    }

    #[test]
    fn unspecified_optionality_is_mandatory() {
        let dep = Dependency::compile(artifact("g:a:1"));
        assert_eq!(dep.optional(), None);
        assert!(!dep.is_optional());
    }

    #[test]
    fn display_marks_optional() {
        let dep = Dependency::new(artifact("g:a:1"), "test").with_optional(Some(true));
        assert_eq!(dep.to_string(), "g:a:jar:1 (test?)");
    }
}
