//! The conflict resolver: winner selection and graph materialization.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use aether_core::node::{self, DataValue, DependencyNode};
use aether_core::session::{config, Session};
use aether_core::version::Version;
use aether_util::errors::Result;
use indexmap::IndexMap;

use crate::context::{ConflictContext, ConflictItem, SEEN_MANDATORY, SEEN_OPTIONAL};
use crate::marker;
use crate::scope::{
    NearestVersionSelector, OptionalitySelector, ScopeDeriver, ScopeSelector,
    StandardOptionalitySelector, StandardScopeDeriver, StandardScopeSelector, VersionSelector,
};
use crate::sorter;

/// How much of the conflict structure survives into the transformed graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Resolve mode: losers are pruned, the result is a tree.
    #[default]
    None,
    /// Analyze mode: losers stay, childless, annotated with their winner.
    Standard,
    /// Everything stays; annotations only.
    Full,
}

impl Verbosity {
    /// Parse the `aether.conflictResolver.verbose` value. `true` is an
    /// alias for `STANDARD`, anything unrecognized means `NONE`.
    pub fn from_config(value: Option<&str>) -> Self {
        match value.map(str::to_ascii_lowercase).as_deref() {
            Some("standard") | Some("true") => Verbosity::Standard,
            Some("full") => Verbosity::Full,
            _ => Verbosity::None,
        }
    }
}

/// Winner selection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// One structural walk for all conflict groups, selection keyed by
    /// shortest-path depth.
    #[default]
    Path,
    /// Reference behavior: one graph walk per conflict group.
    Classic,
}

impl Strategy {
    pub fn from_config(value: Option<&str>) -> Self {
        match value.map(str::to_ascii_lowercase).as_deref() {
            Some("classic") => Strategy::Classic,
            _ => Strategy::Path,
        }
    }
}

/// Outputs of a transformation, for consumers that need more than the
/// transformed graph itself.
#[derive(Debug, Default)]
pub struct TransformContext {
    /// Conflict id per node identity.
    pub conflict_ids: HashMap<usize, String>,
    /// All conflict ids, parents before children where acyclic.
    pub sorted_ids: Vec<String>,
    /// The conflict id sets that form cycles.
    pub cyclic_ids: Vec<Vec<String>>,
}

/// The per-group outcome of winner selection.
#[derive(Debug, Clone)]
struct Selection {
    winner: usize,
    scope: String,
    optional: bool,
}

struct NodeInfo {
    node: DependencyNode,
    depth: usize,
    order: usize,
    parents: Vec<usize>,
    children: Vec<usize>,
}

struct Structure {
    infos: HashMap<usize, NodeInfo>,
    /// Conflict id -> member node ids, members in first-encounter order,
    /// groups in first-encounter order.
    groups: IndexMap<String, Vec<usize>>,
    root_id: usize,
}

/// Transforms a collected graph: assigns conflict ids, orders them, selects
/// one winner per group, derives effective scopes and optionality, and
/// materializes the result in place according to the verbosity.
pub struct ConflictResolver {
    version_selector: Arc<dyn VersionSelector>,
    scope_selector: Arc<dyn ScopeSelector>,
    optionality_selector: Arc<dyn OptionalitySelector>,
    scope_deriver: Arc<dyn ScopeDeriver>,
}

impl Default for ConflictResolver {
    fn default() -> Self {
        Self::new(
            Arc::new(NearestVersionSelector),
            Arc::new(StandardScopeSelector),
            Arc::new(StandardOptionalitySelector),
            Arc::new(StandardScopeDeriver),
        )
    }
}

impl ConflictResolver {
    pub fn new(
        version_selector: Arc<dyn VersionSelector>,
        scope_selector: Arc<dyn ScopeSelector>,
        optionality_selector: Arc<dyn OptionalitySelector>,
        scope_deriver: Arc<dyn ScopeDeriver>,
    ) -> Self {
        Self {
            version_selector,
            scope_selector,
            optionality_selector,
            scope_deriver,
        }
    }

    /// Transform with verbosity and strategy taken from session
    /// configuration.
    pub fn transform(&self, root: &DependencyNode, session: &Session) -> Result<TransformContext> {
        let verbosity = Verbosity::from_config(session.config_str(config::RESOLVER_VERBOSE));
        self.transform_with(root, session, verbosity)
    }

    /// Transform with an explicit verbosity, e.g. for the throwaway verbose
    /// resolution of the skip reconciler.
    pub fn transform_with(
        &self,
        root: &DependencyNode,
        session: &Session,
        verbosity: Verbosity,
    ) -> Result<TransformContext> {
        let ids = marker::mark(root);
        let sort = sorter::sort_ids(root, &ids);
        let strategy = Strategy::from_config(session.config_str(config::RESOLVER_IMPL));
        let structure = build_structure(root, &ids);

        let selections = match strategy {
            Strategy::Path => self.select_path(&structure, &ids, &sort.sorted)?,
            Strategy::Classic => self.select_classic(&structure, &ids, &sort.sorted)?,
        };
        tracing::debug!(
            "resolved {} conflict groups over {} nodes",
            selections.len(),
            structure.infos.len()
        );

        materialize(&structure, &ids, &selections, verbosity);

        Ok(TransformContext {
            conflict_ids: ids,
            sorted_ids: sort.sorted,
            cyclic_ids: sort.cycles,
        })
    }

    fn run_selectors(&self, id: &str, items: &[ConflictItem]) -> Result<Selection> {
        let mut ctx = ConflictContext::new(id, items);
        let winner_index = self.version_selector.select_version(&ctx)?;
        ctx.winner = Some(winner_index);
        let scope = self.scope_selector.select_scope(&ctx)?;
        let optional = self.optionality_selector.select_optionality(&ctx)?;
        Ok(Selection {
            winner: items[winner_index].node.id(),
            scope,
            optional,
        })
    }

    /// Path strategy: one structural walk up front; per group, the items
    /// are assembled from the recorded parent edges, scope chains taken
    /// from the effective scopes decided for earlier (nearer) groups.
    fn select_path(
        &self,
        structure: &Structure,
        ids: &HashMap<usize, String>,
        sorted: &[String],
    ) -> Result<HashMap<String, Selection>> {
        let mut selections: HashMap<String, Selection> = HashMap::new();
        let mut pruned: HashSet<usize> = HashSet::new();
        let mut orphaned: HashSet<usize> = HashSet::new();
        let mut eff_scope: HashMap<usize, String> = HashMap::new();
        let mut eff_opt: HashMap<usize, bool> = HashMap::new();

        for id in sorted {
            let Some(members) = structure.groups.get(id) else {
                continue;
            };
            if members.contains(&structure.root_id) {
                continue;
            }

            let mut items: Vec<ConflictItem> = Vec::new();
            for &member in members {
                let info = &structure.infos[&member];
                let valid_parents: Vec<usize> = info
                    .parents
                    .iter()
                    .copied()
                    .filter(|p| !pruned.contains(p) && !orphaned.contains(p))
                    .collect();
                if valid_parents.is_empty() {
                    orphaned.insert(member);
                    cascade_orphans(structure, member, &pruned, &mut orphaned);
                    continue;
                }
                let (declared_scope, declared_optional) = declared(&info.node);
                let mut item = ConflictItem::new(info.node.clone(), info.depth, info.order);
                for parent in valid_parents {
                    let parent_scope = effective_scope(structure, &eff_scope, parent);
                    let parent_optional = effective_optional(structure, &eff_opt, parent);
                    item.scopes
                        .insert(self.scope_deriver.derive_scope(&parent_scope, &declared_scope));
                    item.optionality |= if parent_optional || declared_optional {
                        SEEN_OPTIONAL
                    } else {
                        SEEN_MANDATORY
                    };
                }
                items.push(item);
            }

            if items.is_empty() {
                for &member in members {
                    pruned.insert(member);
                    cascade_orphans(structure, member, &pruned, &mut orphaned);
                }
                continue;
            }

            let selection = self.run_selectors(id, &items)?;
            eff_scope.insert(selection.winner, selection.scope.clone());
            eff_opt.insert(selection.winner, selection.optional);
            for item in &items {
                let member = item.node.id();
                if member != selection.winner {
                    pruned.insert(member);
                    cascade_orphans(structure, member, &pruned, &mut orphaned);
                }
            }
            selections.insert(id.clone(), selection);
        }
        Ok(selections)
    }

    /// Classic strategy: one relaxation walk over the graph per conflict
    /// group, skipping the losers of groups already decided.
    fn select_classic(
        &self,
        structure: &Structure,
        ids: &HashMap<usize, String>,
        sorted: &[String],
    ) -> Result<HashMap<String, Selection>> {
        let mut selections: HashMap<String, Selection> = HashMap::new();
        let mut pruned: HashSet<usize> = HashSet::new();
        let mut eff_scope: HashMap<usize, String> = HashMap::new();
        let mut eff_opt: HashMap<usize, bool> = HashMap::new();

        for id in sorted {
            let Some(members) = structure.groups.get(id) else {
                continue;
            };
            if members.contains(&structure.root_id) {
                continue;
            }

            let mut gather = ClassicGather {
                structure,
                ids,
                pruned: &pruned,
                eff_scope: &eff_scope,
                eff_opt: &eff_opt,
                deriver: self.scope_deriver.as_ref(),
                target: id,
                items: IndexMap::new(),
                order: 0,
                best_depth: HashMap::new(),
                states: HashMap::new(),
            };
            gather.walk(structure.root_id, "", false, 0);
            let items: Vec<ConflictItem> = gather.items.into_values().collect();

            if items.is_empty() {
                pruned.extend(members.iter().copied());
                continue;
            }

            let selection = self.run_selectors(id, &items)?;
            eff_scope.insert(selection.winner, selection.scope.clone());
            eff_opt.insert(selection.winner, selection.optional);
            for item in &items {
                let member = item.node.id();
                if member != selection.winner {
                    pruned.insert(member);
                }
            }
            // Members that the walk never reached are losers too.
            for &member in members {
                if member != selection.winner && !items.iter().any(|i| i.node.id() == member) {
                    pruned.insert(member);
                }
            }
            selections.insert(id.clone(), selection);
        }
        Ok(selections)
    }
}

struct ClassicGather<'a> {
    structure: &'a Structure,
    ids: &'a HashMap<usize, String>,
    pruned: &'a HashSet<usize>,
    eff_scope: &'a HashMap<usize, String>,
    eff_opt: &'a HashMap<usize, bool>,
    deriver: &'a dyn ScopeDeriver,
    target: &'a str,
    items: IndexMap<usize, ConflictItem>,
    order: usize,
    best_depth: HashMap<usize, usize>,
    states: HashMap<usize, HashSet<(String, bool)>>,
}

impl ClassicGather<'_> {
    fn walk(&mut self, current: usize, current_scope: &str, current_optional: bool, depth: usize) {
        let children = self.structure.infos[&current].children.clone();
        for child in children {
            if self.pruned.contains(&child) {
                continue;
            }
            let info = &self.structure.infos[&child];
            let (declared_scope, declared_optional) = declared(&info.node);
            let (child_scope, child_optional) = match self.eff_scope.get(&child) {
                Some(effective) => (
                    effective.clone(),
                    self.eff_opt.get(&child).copied().unwrap_or(declared_optional),
                ),
                None => (
                    self.deriver.derive_scope(current_scope, &declared_scope),
                    current_optional || declared_optional,
                ),
            };
            let child_depth = depth + 1;

            if self.ids.get(&child).map(String::as_str) == Some(self.target) {
                let order = &mut self.order;
                let item = self.items.entry(child).or_insert_with(|| {
                    let item = ConflictItem::new(info.node.clone(), child_depth, *order);
                    *order += 1;
                    item
                });
                item.depth = item.depth.min(child_depth);
                item.scopes.insert(child_scope.clone());
                item.optionality |= if child_optional {
                    SEEN_OPTIONAL
                } else {
                    SEEN_MANDATORY
                };
            }

            let improved = self
                .best_depth
                .get(&child)
                .map_or(true, |&best| child_depth < best);
            if improved {
                self.best_depth.insert(child, child_depth);
            }
            let new_state = self
                .states
                .entry(child)
                .or_default()
                .insert((child_scope.clone(), child_optional));
            if improved || new_state {
                self.walk(child, &child_scope, child_optional, child_depth);
            }
        }
    }
}

/// The resolved version of a node, falling back to its artifact coordinate.
fn node_version(node: &DependencyNode) -> Option<Version> {
    node.version()
        .or_else(|| node.artifact().map(|a| Version::new(a.version())))
}

fn declared(node: &DependencyNode) -> (String, bool) {
    match node.dependency() {
        Some(dependency) => (dependency.scope().to_string(), dependency.is_optional()),
        None => (String::new(), false),
    }
}

fn effective_scope(structure: &Structure, eff: &HashMap<usize, String>, node_id: usize) -> String {
    if node_id == structure.root_id {
        return String::new();
    }
    match eff.get(&node_id) {
        Some(effective) => effective.clone(),
        // Conflict-id cycle: the parent's group is decided later; fall back
        // to its declaration.
        None => declared(&structure.infos[&node_id].node).0,
    }
}

fn effective_optional(structure: &Structure, eff: &HashMap<usize, bool>, node_id: usize) -> bool {
    if node_id == structure.root_id {
        return false;
    }
    match eff.get(&node_id) {
        Some(effective) => *effective,
        None => declared(&structure.infos[&node_id].node).1,
    }
}

fn cascade_orphans(
    structure: &Structure,
    from: usize,
    pruned: &HashSet<usize>,
    orphaned: &mut HashSet<usize>,
) {
    let children = structure.infos[&from].children.clone();
    for child in children {
        if pruned.contains(&child) || orphaned.contains(&child) {
            continue;
        }
        let alive = structure.infos[&child]
            .parents
            .iter()
            .any(|p| !pruned.contains(p) && !orphaned.contains(p));
        if !alive {
            orphaned.insert(child);
            cascade_orphans(structure, child, pruned, orphaned);
        }
    }
}

fn build_structure(root: &DependencyNode, ids: &HashMap<usize, String>) -> Structure {
    let mut structure = Structure {
        infos: HashMap::new(),
        groups: IndexMap::new(),
        root_id: root.id(),
    };
    let mut counter = 0usize;
    record(root, None, ids, &mut structure, &mut counter);

    // Minimum depths via breadth-first relaxation over the recorded edges.
    if let Some(info) = structure.infos.get_mut(&root.id()) {
        info.depth = 0;
    }
    let mut queue = VecDeque::new();
    queue.push_back(root.id());
    while let Some(current) = queue.pop_front() {
        let (depth, children) = {
            let info = &structure.infos[&current];
            (info.depth, info.children.clone())
        };
        for child in children {
            if let Some(info) = structure.infos.get_mut(&child) {
                if depth + 1 < info.depth {
                    info.depth = depth + 1;
                    queue.push_back(child);
                }
            }
        }
    }
    structure
}

fn record(
    node: &DependencyNode,
    parent: Option<usize>,
    ids: &HashMap<usize, String>,
    structure: &mut Structure,
    counter: &mut usize,
) {
    let node_id = node.id();
    if let Some(info) = structure.infos.get_mut(&node_id) {
        if let Some(parent) = parent {
            info.parents.push(parent);
        }
        return;
    }
    let children = node.children();
    structure.infos.insert(
        node_id,
        NodeInfo {
            node: node.clone(),
            depth: usize::MAX,
            order: *counter,
            parents: parent.into_iter().collect(),
            children: children.iter().map(|c| c.id()).collect(),
        },
    );
    *counter += 1;
    if let Some(id) = ids.get(&node_id) {
        structure.groups.entry(id.clone()).or_default().push(node_id);
    }
    for child in children {
        record(&child, Some(node_id), ids, structure, counter);
    }
}

fn materialize(
    structure: &Structure,
    ids: &HashMap<usize, String>,
    selections: &HashMap<String, Selection>,
    verbosity: Verbosity,
) {
    let winner_of = |node_id: usize| -> Option<&Selection> {
        ids.get(&node_id).and_then(|id| selections.get(id))
    };
    let is_winner =
        |node_id: usize| -> bool { winner_of(node_id).is_some_and(|s| s.winner == node_id) };

    // Effective scope and optionality onto the winners.
    for selection in selections.values() {
        if let Some(info) = structure.infos.get(&selection.winner) {
            info.node.update_dependency(|d| {
                d.with_scope(&selection.scope)
                    .with_optional(Some(selection.optional))
            });
        }
    }

    match verbosity {
        Verbosity::None => {
            let mut visited = HashSet::new();
            prune_losers(
                &structure.infos[&structure.root_id].node,
                &is_winner,
                &mut visited,
            );
        }
        Verbosity::Standard | Verbosity::Full => {
            for info in structure.infos.values() {
                let node_id = info.node.id();
                let Some(selection) = winner_of(node_id) else {
                    continue;
                };
                if selection.winner == node_id {
                    continue;
                }
                // A loser: annotate with its winner and its pre-resolution
                // scope and optionality.
                let (original_scope, original_optional) = declared(&info.node);
                if let Some(winner_info) = structure.infos.get(&selection.winner) {
                    info.node.set_data(
                        node::key::CONFLICT_WINNER,
                        DataValue::Node(winner_info.node.clone()),
                    );
                }
                info.node.set_data(
                    node::key::CONFLICT_ORIGINAL_SCOPE,
                    DataValue::Str(original_scope),
                );
                info.node.set_data(
                    node::key::CONFLICT_ORIGINAL_OPTIONALITY,
                    DataValue::Bool(original_optional),
                );
                if verbosity == Verbosity::Standard {
                    info.node.set_children(Vec::new());
                }
            }
            if verbosity == Verbosity::Standard {
                prune_redundant_range_losers(structure, ids, &is_winner);
            }
        }
    }
}

fn prune_losers(
    node: &DependencyNode,
    is_winner: &dyn Fn(usize) -> bool,
    visited: &mut HashSet<usize>,
) {
    if !visited.insert(node.id()) {
        return;
    }
    node.retain_children(|child| is_winner(child.id()));
    for child in node.children() {
        prune_losers(&child, is_winner, visited);
    }
}

/// Under STANDARD verbosity a version range that expanded to several
/// candidate nodes leaves several losers below the same parent. Keep only
/// the highest-version one per conflict group and range site.
fn prune_redundant_range_losers(
    structure: &Structure,
    ids: &HashMap<usize, String>,
    is_winner: &dyn Fn(usize) -> bool,
) {
    let from_range = |child: &DependencyNode| {
        child
            .version_constraint()
            .map_or(false, |constraint| constraint.is_range())
    };
    for info in structure.infos.values() {
        let children = info.node.children();
        // Highest loser version per conflict id among range-expanded
        // children of this parent.
        let mut keep: HashMap<&str, usize> = HashMap::new();
        for child in &children {
            if is_winner(child.id()) || !from_range(child) {
                continue;
            }
            let Some(id) = ids.get(&child.id()) else {
                continue;
            };
            let current = keep.get(id.as_str()).copied();
            match current {
                Some(current) => {
                    let current_node = &structure.infos[&current].node;
                    if node_version(child) > node_version(current_node) {
                        keep.insert(id, child.id());
                    }
                }
                None => {
                    keep.insert(id, child.id());
                }
            }
        }
        if keep.is_empty() {
            continue;
        }
        info.node.retain_children(|child| {
            if is_winner(child.id()) || !from_range(child) {
                return true;
            }
            match ids.get(&child.id()) {
                Some(id) => keep.get(id.as_str()) == Some(&child.id()),
                None => true,
            }
        });
    }
}
