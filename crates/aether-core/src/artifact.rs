//! Immutable artifact coordinates.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use aether_util::errors::{AetherError, Result};
use serde::{Deserialize, Serialize};

/// Well-known artifact property keys.
pub mod property {
    /// The type id the artifact was created from, if any.
    pub const TYPE: &str = "type";
    /// The programming language this artifact is relevant for.
    pub const LANGUAGE: &str = "language";
    /// Whether the artifact already embeds its own dependencies.
    pub const INCLUDES_DEPENDENCIES: &str = "includesDependencies";
    /// Whether the artifact should be part of the build path.
    pub const CONSTITUTES_BUILD_PATH: &str = "constitutesBuildPath";
}

/// An immutable artifact coordinate, optionally bound to a local file.
///
/// All fields are reference-counted so clones are cheap and interned
/// artifacts share their backing storage. The `with_*` methods return a new
/// value, or an identical clone when nothing would change.
///
/// Equality and hashing cover the coordinate fields and properties but not
/// the file binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    group_id: Arc<str>,
    artifact_id: Arc<str>,
    version: Arc<str>,
    classifier: Arc<str>,
    extension: Arc<str>,
    properties: Arc<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<PathBuf>,
}

impl Artifact {
    /// Create an artifact with an empty classifier and no properties.
    pub fn new(
        group_id: impl Into<Arc<str>>,
        artifact_id: impl Into<Arc<str>>,
        extension: impl Into<Arc<str>>,
        version: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: version.into(),
            classifier: Arc::from(""),
            extension: extension.into(),
            properties: Arc::new(BTreeMap::new()),
            path: None,
        }
    }

    /// Parse `groupId:artifactId[:extension[:classifier]]:version`.
    ///
    /// An empty extension segment defaults to `jar`.
    pub fn parse(coordinates: &str) -> Result<Self> {
        let segments: Vec<&str> = coordinates.split(':').collect();
        let invalid = || AetherError::InvalidCoordinate {
            input: coordinates.to_string(),
        };

        let (group, artifact, extension, classifier, version) = match segments.as_slice() {
            [g, a, v] => (*g, *a, "jar", "", *v),
            [g, a, e, v] => (*g, *a, *e, "", *v),
            [g, a, e, c, v] => (*g, *a, *e, *c, *v),
            _ => return Err(invalid()),
        };
        if group.is_empty() || artifact.is_empty() || version.is_empty() {
            return Err(invalid());
        }

        let extension = if extension.is_empty() { "jar" } else { extension };
        let mut parsed = Artifact::new(group, artifact, extension, version);
        if !classifier.is_empty() {
            parsed.classifier = Arc::from(classifier);
        }
        Ok(parsed)
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn artifact_id(&self) -> &str {
        &self.artifact_id
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// The version with any timestamped snapshot suffix normalized back to
    /// `-SNAPSHOT`.
    pub fn base_version(&self) -> String {
        match timestamped_snapshot_base(&self.version) {
            Some(base) => base,
            None => self.version.to_string(),
        }
    }

    pub fn is_snapshot(&self) -> bool {
        self.base_version().ends_with("-SNAPSHOT")
    }

    pub fn classifier(&self) -> &str {
        &self.classifier
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether the artifact is backed by a local file.
    pub fn is_resolved(&self) -> bool {
        self.path.is_some()
    }

    /// The `(groupId, artifactId, classifier, extension)` tuple as a string,
    /// used wherever nodes are compared ignoring their version.
    pub fn versionless_id(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.group_id, self.artifact_id, self.classifier, self.extension
        )
    }

    pub fn with_version(&self, version: impl Into<Arc<str>>) -> Self {
        let version = version.into();
        if *version == *self.version {
            return self.clone();
        }
        Self {
            version,
            ..self.clone()
        }
    }

    pub fn with_classifier(&self, classifier: impl Into<Arc<str>>) -> Self {
        let classifier = classifier.into();
        if *classifier == *self.classifier {
            return self.clone();
        }
        Self {
            classifier,
            ..self.clone()
        }
    }

    pub fn with_extension(&self, extension: impl Into<Arc<str>>) -> Self {
        let extension = extension.into();
        if *extension == *self.extension {
            return self.clone();
        }
        Self {
            extension,
            ..self.clone()
        }
    }

    /// Replace the property map. The map is copied defensively.
    pub fn with_properties(&self, properties: BTreeMap<String, String>) -> Self {
        if properties == *self.properties {
            return self.clone();
        }
        Self {
            properties: Arc::new(properties),
            ..self.clone()
        }
    }

    pub fn with_path(&self, path: Option<PathBuf>) -> Self {
        if path == self.path {
            return self.clone();
        }
        Self {
            path,
            ..self.clone()
        }
    }

    /// Merge type-derived defaults into this artifact: the type supplies
    /// extension, classifier and properties, and explicitly set values win
    /// over type-derived ones.
    pub fn with_type(&self, artifact_type: &ArtifactType) -> Self {
        let mut merged = artifact_type.properties().clone();
        for (key, value) in self.properties.iter() {
            merged.insert(key.clone(), value.clone());
        }
        let mut out = self.with_properties(merged);
        let default_extension = out.extension.is_empty() || &*out.extension == "jar";
        if default_extension && !artifact_type.extension().is_empty() {
            out = out.with_extension(artifact_type.extension());
        }
        if out.classifier.is_empty() && !artifact_type.classifier().is_empty() {
            out = out.with_classifier(artifact_type.classifier());
        }
        out
    }
}

impl PartialEq for Artifact {
    fn eq(&self, other: &Self) -> bool {
        self.group_id == other.group_id
            && self.artifact_id == other.artifact_id
            && self.version == other.version
            && self.classifier == other.classifier
            && self.extension == other.extension
            && self.properties == other.properties
    }
}

impl Eq for Artifact {}

impl Hash for Artifact {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.group_id.hash(state);
        self.artifact_id.hash(state);
        self.version.hash(state);
        self.classifier.hash(state);
        self.extension.hash(state);
        self.properties.hash(state);
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.extension)?;
        if !self.classifier.is_empty() {
            write!(f, ":{}", self.classifier)?;
        }
        write!(f, ":{}", self.version)
    }
}

impl FromStr for Artifact {
    type Err = AetherError;

    fn from_str(s: &str) -> Result<Self> {
        Artifact::parse(s)
    }
}

/// Recognize `1.0-20230101.123456-7` style versions and return the
/// `1.0-SNAPSHOT` base they belong to.
fn timestamped_snapshot_base(version: &str) -> Option<String> {
    let (rest, build) = version.rsplit_once('-')?;
    if build.is_empty() || !build.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let (base, stamp) = rest.rsplit_once('-')?;
    let bytes = stamp.as_bytes();
    let shaped = bytes.len() == 15
        && bytes[8] == b'.'
        && bytes[..8].iter().all(u8::is_ascii_digit)
        && bytes[9..].iter().all(u8::is_ascii_digit);
    if shaped {
        Some(format!("{base}-SNAPSHOT"))
    } else {
        None
    }
}

/// A named bundle of artifact defaults: extension, classifier, and the
/// properties describing how artifacts of this type take part in a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactType {
    id: String,
    extension: String,
    classifier: String,
    properties: BTreeMap<String, String>,
}

impl ArtifactType {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let mut properties = BTreeMap::new();
        properties.insert(property::TYPE.to_string(), id.clone());
        properties.insert(property::LANGUAGE.to_string(), "none".to_string());
        properties.insert(
            property::INCLUDES_DEPENDENCIES.to_string(),
            "false".to_string(),
        );
        properties.insert(
            property::CONSTITUTES_BUILD_PATH.to_string(),
            "false".to_string(),
        );
        Self {
            extension: id.clone(),
            classifier: String::new(),
            id,
            properties,
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = classifier.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.properties
            .insert(property::LANGUAGE.to_string(), language.into());
        self
    }

    pub fn with_flags(mut self, includes_dependencies: bool, constitutes_build_path: bool) -> Self {
        self.properties.insert(
            property::INCLUDES_DEPENDENCIES.to_string(),
            includes_dependencies.to_string(),
        );
        self.properties.insert(
            property::CONSTITUTES_BUILD_PATH.to_string(),
            constitutes_build_path.to_string(),
        );
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn classifier(&self) -> &str {
        &self.classifier
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }
}

/// The artifact types a plain build knows about out of the box.
pub fn well_known_type(id: &str) -> Option<ArtifactType> {
    let java = |t: ArtifactType| t.with_language("java");
    match id {
        "pom" => Some(ArtifactType::new("pom")),
        "jar" => Some(java(ArtifactType::new("jar")).with_flags(false, true)),
        "maven-plugin" => Some(
            java(ArtifactType::new("maven-plugin"))
                .with_extension("jar")
                .with_flags(false, true),
        ),
        "test-jar" => Some(
            java(ArtifactType::new("test-jar"))
                .with_extension("jar")
                .with_classifier("tests")
                .with_flags(false, true),
        ),
        "javadoc" => Some(
            java(ArtifactType::new("javadoc"))
                .with_extension("jar")
                .with_classifier("javadoc"),
        ),
        "java-source" => Some(
            java(ArtifactType::new("java-source"))
                .with_extension("jar")
                .with_classifier("sources"),
        ),
        "war" => Some(java(ArtifactType::new("war")).with_flags(true, false)),
        "ear" => Some(java(ArtifactType::new("ear")).with_flags(true, false)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_three_segments() {
        let a = Artifact::parse("org.example:lib:1.0").unwrap();
        assert_eq!(a.group_id(), "org.example");
        assert_eq!(a.artifact_id(), "lib");
        assert_eq!(a.extension(), "jar");
        assert_eq!(a.classifier(), "");
        assert_eq!(a.version(), "1.0");
    }

    #[test]
    fn parse_four_segments() {
        let a = Artifact::parse("org.example:lib:war:1.0").unwrap();
        assert_eq!(a.extension(), "war");
        assert_eq!(a.classifier(), "");
    }

    #[test]
    fn parse_five_segments() {
        let a = Artifact::parse("org.example:lib:jar:sources:1.0").unwrap();
        assert_eq!(a.classifier(), "sources");
    }

    #[test]
    fn parse_empty_extension_defaults_to_jar() {
        let a = Artifact::parse("org.example:lib::sources:1.0").unwrap();
        assert_eq!(a.extension(), "jar");
        assert_eq!(a.classifier(), "sources");
    }

    #[test]
    fn parse_rejects_short_forms() {
        assert!(Artifact::parse("org.example:lib").is_err());
        assert!(Artifact::parse("lib").is_err());
        assert!(Artifact::parse("").is_err());
    }

    #[test]
    fn display_round_trip() {
        for coords in [
            "org.example:lib:jar:1.0",
            "org.example:lib:war:2.0",
            "org.example:lib:jar:sources:1.0",
        ] {
            let a = Artifact::parse(coords).unwrap();
            assert_eq!(Artifact::parse(&a.to_string()).unwrap(), a);
        }
    }

    #[test]
    fn equality_ignores_path() {
        let a = Artifact::parse("org.example:lib:1.0").unwrap();
        let b = a.with_path(Some(PathBuf::from("/tmp/lib-1.0.jar")));
        assert_eq!(a, b);
        assert!(b.is_resolved());
        assert!(!a.is_resolved());
    }

    #[test]
    fn with_version_unchanged_is_equal() {
        let a = Artifact::parse("org.example:lib:1.0").unwrap();
        let b = a.with_version("1.0");
        assert_eq!(a, b);
        let c = a.with_version("2.0");
        assert_eq!(c.version(), "2.0");
        assert_eq!(a.version(), "1.0");
    }

    #[test]
    fn properties_are_copied_defensively() {
        let mut props = BTreeMap::new();
        props.insert("k".to_string(), "v".to_string());
        let a = Artifact::parse("org.example:lib:1.0")
            .unwrap()
            .with_properties(props.clone());
        props.insert("k2".to_string(), "v2".to_string());
        assert_eq!(a.properties().len(), 1);
    }

    #[test]
    fn type_properties_are_overridden_by_explicit_ones() {
        let mut props = BTreeMap::new();
        props.insert(
            property::INCLUDES_DEPENDENCIES.to_string(),
            "true".to_string(),
        );
        let a = Artifact::parse("org.example:lib:1.0")
            .unwrap()
            .with_properties(props)
            .with_type(&well_known_type("jar").unwrap());
        assert_eq!(a.property(property::INCLUDES_DEPENDENCIES), Some("true"));
        assert_eq!(a.property(property::LANGUAGE), Some("java"));
    }

    #[test]
    fn test_jar_type_supplies_classifier() {
        let a = Artifact::parse("org.example:lib:1.0")
            .unwrap()
            .with_type(&well_known_type("test-jar").unwrap());
        assert_eq!(a.classifier(), "tests");
        assert_eq!(a.extension(), "jar");
    }

    #[test]
    fn base_version_normalizes_timestamped_snapshots() {
        let a = Artifact::parse("org.example:lib:1.0-20230101.123456-7").unwrap();
        assert_eq!(a.base_version(), "1.0-SNAPSHOT");
        assert!(a.is_snapshot());

        let b = Artifact::parse("org.example:lib:1.0-SNAPSHOT").unwrap();
        assert_eq!(b.base_version(), "1.0-SNAPSHOT");

        let c = Artifact::parse("org.example:lib:1.0").unwrap();
        assert_eq!(c.base_version(), "1.0");
        assert!(!c.is_snapshot());
    }

    #[test]
    fn versionless_id_covers_gace() {
        let a = Artifact::parse("org.example:lib:jar:sources:1.0").unwrap();
        let b = Artifact::parse("org.example:lib:jar:sources:9.9").unwrap();
        assert_eq!(a.versionless_id(), b.versionless_id());
        assert_eq!(a.versionless_id(), "org.example:lib:sources:jar");
    }
}
