use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for the aether resolution engine.
#[derive(Debug, Error, Diagnostic)]
pub enum AetherError {
    /// An artifact coordinate string did not match
    /// `groupId:artifactId[:extension[:classifier]]:version`.
    #[error("Invalid artifact coordinates: {input}")]
    #[diagnostic(help(
        "Expected <groupId>:<artifactId>[:<extension>[:<classifier>]]:<version>"
    ))]
    InvalidCoordinate { input: String },

    /// The descriptor source could not find a descriptor for the artifact.
    #[error("Missing descriptor for {artifact}")]
    DescriptorMissing { artifact: String },

    /// The descriptor source found a descriptor but could not read it.
    #[error("Invalid descriptor for {artifact}: {message}")]
    DescriptorInvalid { artifact: String, message: String },

    /// A version filter emptied the candidate set for a constraint.
    #[error("No versions of {artifact} match {constraint}")]
    NoMatchingVersion { artifact: String, constraint: String },

    /// The version range source failed to resolve a constraint.
    #[error("Version range resolution failed for {artifact}: {message}")]
    VersionRangeFailure { artifact: String, message: String },

    /// Downloaded data did not match its sidecar checksum.
    ///
    /// `expected`/`actual` are `None` when the corresponding value could not
    /// be determined; the mismatch is only worth retrying when both are known.
    #[error("Checksum mismatch for {resource}")]
    ChecksumMismatch {
        resource: String,
        expected: Option<String>,
        actual: Option<String>,
    },

    /// The collection request was cancelled by its caller.
    #[error("Collection was cancelled")]
    Cancelled,

    /// No connector implementation is available for a remote repository.
    #[error("No connector available for repository {repository}")]
    NoConnector { repository: String },

    /// No transporter implementation is available for a remote repository.
    #[error("No transporter available for repository {repository}")]
    NoTransporter { repository: String },

    /// No layout implementation is available for a remote repository.
    #[error("No repository layout available for repository {repository}")]
    NoLayout { repository: String },

    /// Remote access was requested while the session is offline.
    #[error("Cannot access {repository} in offline mode")]
    #[diagnostic(help("Leave offline mode or work from the local repository"))]
    Offline { repository: String },

    /// A conflict-resolution selector failed for a conflict group.
    #[error("Could not resolve conflict group {conflict_id}: {message}")]
    UnsolvableConflict { conflict_id: String, message: String },

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AetherError {
    /// Whether this error aborts a whole collect invocation.
    ///
    /// Non-fatal kinds are attached to the result and skip only the
    /// offending subtree.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AetherError::Cancelled
                | AetherError::NoConnector { .. }
                | AetherError::NoTransporter { .. }
                | AetherError::NoLayout { .. }
                | AetherError::Offline { .. }
                | AetherError::UnsolvableConflict { .. }
        )
    }

    /// A checksum mismatch is only worth retrying when both the expected and
    /// the actual value are known; anything else points at a broken sidecar.
    pub fn is_retry_worthy(&self) -> bool {
        match self {
            AetherError::ChecksumMismatch {
                expected, actual, ..
            } => expected.is_some() && actual.is_some(),
            _ => false,
        }
    }
}

/// Convenience alias used throughout the aether crates.
pub type Result<T> = std::result::Result<T, AetherError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_kinds() {
        assert!(AetherError::Cancelled.is_fatal());
        assert!(AetherError::Offline {
            repository: "central".into()
        }
        .is_fatal());
        assert!(!AetherError::DescriptorMissing {
            artifact: "g:a:1".into()
        }
        .is_fatal());
    }

    #[test]
    fn checksum_retry_needs_both_values() {
        let both = AetherError::ChecksumMismatch {
            resource: "a.jar".into(),
            expected: Some("aa".into()),
            actual: Some("bb".into()),
        };
        assert!(both.is_retry_worthy());

        let missing_actual = AetherError::ChecksumMismatch {
            resource: "a.jar".into(),
            expected: Some("aa".into()),
            actual: None,
        };
        assert!(!missing_actual.is_retry_worthy());
        assert!(!AetherError::Cancelled.is_retry_worthy());
    }

    #[test]
    fn display_includes_coordinates() {
        let err = AetherError::NoMatchingVersion {
            artifact: "org.example:lib".into(),
            constraint: "[1.0,2.0)".into(),
        };
        assert_eq!(
            err.to_string(),
            "No versions of org.example:lib match [1.0,2.0)"
        );
    }
}
