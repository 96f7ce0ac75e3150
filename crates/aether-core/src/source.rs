//! External source interfaces the collector consumes.
//!
//! Descriptor reading and version range resolution are the only blocking
//! points of a collection; everything behind these traits (repository
//! transport, local caches, metadata parsing) lives outside this engine.

use aether_util::errors::Result;

use crate::request::{ArtifactDescriptor, DescriptorRequest, VersionRangeRequest, VersionRangeResult};
use crate::session::Session;

/// Produces the descriptor of an artifact: its direct and managed
/// dependencies, aliases, relocations, and declared repositories.
///
/// Failure kinds matter: `DescriptorMissing` and `DescriptorInvalid` are
/// demotable per session policy, anything else aborts the subtree.
pub trait DescriptorSource: Send + Sync {
    fn read_descriptor(
        &self,
        session: &Session,
        request: &DescriptorRequest,
    ) -> Result<ArtifactDescriptor>;
}

/// Resolves a version constraint to the concrete versions available across
/// the given repositories, in ascending order.
pub trait VersionRangeSource: Send + Sync {
    fn resolve_range(
        &self,
        session: &Session,
        request: &VersionRangeRequest,
    ) -> Result<VersionRangeResult>;
}
