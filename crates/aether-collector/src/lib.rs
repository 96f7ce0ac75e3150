//! Dependency collection: expanding a root dependency set into a full
//! dependency graph.
//!
//! The collector drives a depth-first expansion over the descriptor and
//! version-range sources, honoring the session's selection, management,
//! traversal and version-filter policies. Artifacts, dependencies and
//! descriptors are interned against a session-scoped [`pool::DataPool`];
//! child lists are memoized per collection so repeated subtrees can be
//! skipped and later reconciled.

pub mod collector;
pub mod pool;
mod skipper;

pub use collector::DependencyCollector;
pub use pool::{CollectionCaches, DataPool, GraphKey};
