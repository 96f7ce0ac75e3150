//! Skip-and-reconcile: validating reused subtrees after the fact.
//!
//! The skip rule reuses memoized child lists, betting that the skipped
//! subtree would have resolved identically. The bet can be wrong when the
//! conflict resolver later selects a node whose subtree was stubbed out
//! (a cycle stub under the cached path, or a nested skip). Reconciliation
//! runs a throwaway verbose conflict resolution on a clone of the graph,
//! finds childless winners that came out of a skipped subtree, evicts the
//! cache entries the wrong bet poisoned, and re-expands those nodes fresh.

use std::collections::{HashMap, HashSet};

use aether_core::artifact::Artifact;
use aether_core::node::{self, DependencyNode};
use aether_resolver::{ConflictResolver, Verbosity};

use crate::collector::{CollectState, DependencyCollector, Policies};
use crate::pool::GraphKey;

/// A deferred expansion created when a cached child list was reused.
pub(crate) struct SkipRecord {
    /// The node whose children were taken from the cache.
    pub node: DependencyNode,
    pub key: GraphKey,
    pub children: Vec<DependencyNode>,
    /// Ancestor artifacts of the skipping node, root first.
    pub ancestors: Vec<Artifact>,
    /// Ancestor coordinates recorded with the cache entry it reused.
    pub cached_ancestors: Vec<String>,
    /// Depth at which the node's children would be expanded.
    pub depth: usize,
    /// The derived policy stack for the node's children.
    pub policies: Policies,
}

pub(crate) fn reconcile(
    collector: &DependencyCollector,
    state: &mut CollectState,
    root: &DependencyNode,
) {
    let records = std::mem::take(&mut state.records);
    tracing::debug!("reconciling {} reused subtrees", records.len());

    let (clone, clone_to_original) = root.clone_deep();
    let resolver = ConflictResolver::default();
    if let Err(error) = resolver.transform_with(&clone, &state.session, Verbosity::Standard) {
        tracing::warn!("skip reconciliation aborted: {error}");
        return;
    }

    // Which record's reused subtree a node belongs to, if any. The first
    // record claiming a node keeps it.
    let mut subtree: HashMap<usize, usize> = HashMap::new();
    for (index, record) in records.iter().enumerate() {
        let mut stack = vec![record.node.clone()];
        stack.extend(record.children.iter().cloned());
        while let Some(current) = stack.pop() {
            if subtree.contains_key(&current.id()) {
                continue;
            }
            subtree.insert(current.id(), index);
            stack.extend(current.children());
        }
    }

    let mut losers: HashSet<String> = HashSet::new();
    let mut candidates: Vec<(usize, DependencyNode)> = Vec::new();
    let mut visited = HashSet::new();
    scan(
        &clone,
        &clone_to_original,
        &subtree,
        &mut losers,
        &mut candidates,
        &mut visited,
    );

    // Evict poisoned cache entries: the keys of the subtrees being
    // re-expanded, plus every entry whose recorded ancestor path runs
    // through a conflict loser.
    let reexpanded_keys: HashSet<&GraphKey> =
        candidates.iter().map(|(index, _)| &records[*index].key).collect();
    state.caches.evict_children(|key, entry| {
        reexpanded_keys.contains(key) || entry.ancestors.iter().any(|a| losers.contains(a))
    });

    for (index, original) in candidates {
        let record = &records[index];
        if !needs_expansion(record, &original) {
            continue;
        }
        tracing::debug!("re-expanding mis-skipped node {original:?}");
        original.set_children(Vec::new());
        let mut ancestors = record.ancestors.clone();
        if !original.same_node(&record.node) {
            // A stub deeper inside the reused subtree; approximate its path
            // with the skipping node appended.
            if let Some(artifact) = record.node.artifact() {
                ancestors.push(artifact);
            }
        }
        collector.expand_reconciled(state, &original, &record.policies, &mut ancestors, record.depth);
    }
}

/// A childless winner needs re-expansion when it is the skipping node
/// itself (its cached child list was empty), or when it was stubbed as a
/// back-edge under the cached ancestors, which the current path may not
/// repeat.
fn needs_expansion(record: &SkipRecord, original: &DependencyNode) -> bool {
    if original.same_node(&record.node) {
        return true;
    }
    let Some(artifact) = original.artifact() else {
        return false;
    };
    let versionless = artifact.versionless_id();
    record.cached_ancestors.iter().any(|ancestor| {
        Artifact::parse(ancestor)
            .map(|a| a.versionless_id() == versionless)
            .unwrap_or(false)
    })
}

/// Walk the resolved clone, recording losers and collecting the childless
/// un-annotated winners whose originals sit in a reused subtree and are
/// childless themselves.
fn scan(
    clone_node: &DependencyNode,
    clone_to_original: &HashMap<usize, DependencyNode>,
    subtree: &HashMap<usize, usize>,
    losers: &mut HashSet<String>,
    candidates: &mut Vec<(usize, DependencyNode)>,
    visited: &mut HashSet<usize>,
) {
    if !visited.insert(clone_node.id()) {
        return;
    }
    let is_loser = clone_node.data(node::key::CONFLICT_WINNER).is_some();
    if is_loser {
        if let Some(artifact) = clone_node.artifact() {
            losers.insert(artifact.to_string());
        }
    } else if !clone_node.has_children() {
        if let Some(original) = clone_to_original.get(&clone_node.id()) {
            if !original.has_children() {
                if let Some(&record_index) = subtree.get(&original.id()) {
                    candidates.push((record_index, original.clone()));
                }
            }
        }
    }
    for child in clone_node.children() {
        scan(
            &child,
            clone_to_original,
            subtree,
            losers,
            candidates,
            visited,
        );
    }
}
