//! Conflict resolution for collected dependency graphs.
//!
//! The resolver transforms a collected graph in phases: every node is
//! assigned a conflict id (coordinates ignoring the version), the ids are
//! topologically ordered with cycle recovery, one winner is selected per
//! conflict group in that order, effective scopes and optionality are
//! derived, and finally the graph is materialized according to the requested
//! verbosity.

pub mod context;
pub mod marker;
pub mod resolver;
pub mod scope;
pub mod sorter;

pub use context::{ConflictContext, ConflictItem, SEEN_MANDATORY, SEEN_OPTIONAL};
pub use resolver::{ConflictResolver, Strategy, TransformContext, Verbosity};
pub use scope::{
    NearestVersionSelector, OptionalitySelector, ScopeDeriver, ScopeSelector,
    StandardOptionalitySelector, StandardScopeDeriver, StandardScopeSelector, VersionSelector,
};
