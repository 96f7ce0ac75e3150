//! Conflict groups as the selectors see them.

use aether_core::node::DependencyNode;
use indexmap::IndexSet;

/// Optionality bit: at least one path reaching the node was mandatory.
pub const SEEN_MANDATORY: u8 = 0x01;
/// Optionality bit: at least one path reaching the node was optional.
pub const SEEN_OPTIONAL: u8 = 0x02;

/// One candidate node within a conflict group.
#[derive(Debug, Clone)]
pub struct ConflictItem {
    pub node: DependencyNode,
    /// Minimum depth at which the node was observed (direct dependencies
    /// sit at depth 1).
    pub depth: usize,
    /// Pre-order index of the first encounter; the tie-break for equal
    /// depths.
    pub order: usize,
    /// The scopes derived along the surviving paths that reach the node.
    pub scopes: IndexSet<String>,
    /// Bit-field of [`SEEN_MANDATORY`] and [`SEEN_OPTIONAL`].
    pub optionality: u8,
}

impl ConflictItem {
    pub fn new(node: DependencyNode, depth: usize, order: usize) -> Self {
        Self {
            node,
            depth,
            order,
            scopes: IndexSet::new(),
            optionality: 0,
        }
    }

    /// The scope the node's dependency declares.
    pub fn declared_scope(&self) -> String {
        self.node
            .dependency()
            .map(|d| d.scope().to_string())
            .unwrap_or_default()
    }

    pub fn seen_mandatory(&self) -> bool {
        self.optionality & SEEN_MANDATORY != 0
    }

    pub fn seen_optional(&self) -> bool {
        self.optionality & SEEN_OPTIONAL != 0
    }
}

/// A conflict group under resolution: its id, its candidate nodes, and the
/// winner once the version selector has decided.
pub struct ConflictContext<'a> {
    pub id: &'a str,
    pub items: &'a [ConflictItem],
    pub winner: Option<usize>,
}

impl<'a> ConflictContext<'a> {
    pub fn new(id: &'a str, items: &'a [ConflictItem]) -> Self {
        Self {
            id,
            items,
            winner: None,
        }
    }

    pub fn winner_item(&self) -> Option<&ConflictItem> {
        self.items.get(self.winner?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aether_core::artifact::Artifact;
    use aether_core::dependency::Dependency;

    #[test]
    fn optionality_bits() {
        let node = DependencyNode::new(Dependency::compile(Artifact::parse("g:a:1").unwrap()));
        let mut item = ConflictItem::new(node, 1, 0);
        assert!(!item.seen_mandatory());
        item.optionality |= SEEN_MANDATORY;
        item.optionality |= SEEN_OPTIONAL;
        assert!(item.seen_mandatory());
        assert!(item.seen_optional());
    }
}
