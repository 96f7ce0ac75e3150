//! Winner, scope and optionality selection policies.

use aether_util::errors::{AetherError, Result};

use aether_core::scope;

use crate::context::ConflictContext;

/// Picks the winning node of a conflict group.
pub trait VersionSelector: Send + Sync {
    /// Index into `ctx.items` of the winner.
    fn select_version(&self, ctx: &ConflictContext<'_>) -> Result<usize>;
}

/// Picks the effective scope of a conflict group once the winner is known.
pub trait ScopeSelector: Send + Sync {
    fn select_scope(&self, ctx: &ConflictContext<'_>) -> Result<String>;
}

/// Picks the effective optionality of a conflict group once the winner is
/// known.
pub trait OptionalitySelector: Send + Sync {
    fn select_optionality(&self, ctx: &ConflictContext<'_>) -> Result<bool>;
}

/// Computes a child's scope from its parent's effective scope and its own
/// declared scope, invoked during graph walks.
pub trait ScopeDeriver: Send + Sync {
    fn derive_scope(&self, parent_scope: &str, child_scope: &str) -> String;
}

/// Nearest wins: minimum depth, ties broken by first encounter in
/// pre-order.
#[derive(Debug, Default)]
pub struct NearestVersionSelector;

impl VersionSelector for NearestVersionSelector {
    fn select_version(&self, ctx: &ConflictContext<'_>) -> Result<usize> {
        ctx.items
            .iter()
            .enumerate()
            .min_by_key(|(_, item)| (item.depth, item.order))
            .map(|(index, _)| index)
            .ok_or_else(|| AetherError::UnsolvableConflict {
                conflict_id: ctx.id.to_string(),
                message: "conflict group has no candidates".to_string(),
            })
    }
}

/// A direct dependency keeps its declared scope; otherwise the widest scope
/// observed across all paths wins, `compile` over `runtime` over `provided`
/// over `test`.
#[derive(Debug, Default)]
pub struct StandardScopeSelector;

impl ScopeSelector for StandardScopeSelector {
    fn select_scope(&self, ctx: &ConflictContext<'_>) -> Result<String> {
        let winner = ctx
            .winner_item()
            .ok_or_else(|| AetherError::UnsolvableConflict {
                conflict_id: ctx.id.to_string(),
                message: "scope selection before winner selection".to_string(),
            })?;
        if winner.depth <= 1 {
            return Ok(winner.declared_scope());
        }
        for candidate in [scope::COMPILE, scope::RUNTIME, scope::PROVIDED, scope::TEST] {
            if ctx
                .items
                .iter()
                .any(|item| item.scopes.iter().any(|s| s == candidate))
            {
                return Ok(candidate.to_string());
            }
        }
        // Only unknown scopes observed: first derived scope of the winner,
        // falling back to its declaration.
        Ok(winner
            .scopes
            .first()
            .cloned()
            .unwrap_or_else(|| winner.declared_scope()))
    }
}

/// A direct dependency keeps its declared optionality; otherwise the group
/// is optional iff every path that reaches it is optional.
#[derive(Debug, Default)]
pub struct StandardOptionalitySelector;

impl OptionalitySelector for StandardOptionalitySelector {
    fn select_optionality(&self, ctx: &ConflictContext<'_>) -> Result<bool> {
        let winner = ctx
            .winner_item()
            .ok_or_else(|| AetherError::UnsolvableConflict {
                conflict_id: ctx.id.to_string(),
                message: "optionality selection before winner selection".to_string(),
            })?;
        if winner.depth <= 1 {
            return Ok(winner
                .node
                .dependency()
                .map(|d| d.is_optional())
                .unwrap_or(false));
        }
        let mandatory = ctx.items.iter().any(|item| item.seen_mandatory());
        let optional = ctx.items.iter().any(|item| item.seen_optional());
        Ok(optional && !mandatory)
    }
}

/// Scope derivation: `provided` and `test` parents stamp their scope onto
/// the whole subtree, a `runtime` parent demotes `compile` children to
/// `runtime`, everything else keeps its declaration.
#[derive(Debug, Default)]
pub struct StandardScopeDeriver;

impl ScopeDeriver for StandardScopeDeriver {
    fn derive_scope(&self, parent_scope: &str, child_scope: &str) -> String {
        if parent_scope == scope::PROVIDED || parent_scope == scope::TEST {
            return parent_scope.to_string();
        }
        if parent_scope == scope::RUNTIME && child_scope == scope::COMPILE {
            return scope::RUNTIME.to_string();
        }
        child_scope.to_string()
    }
}
