//! End-to-end conflict resolution scenarios over hand-built graphs.

use std::collections::HashSet;

use aether_core::artifact::Artifact;
use aether_core::dependency::Dependency;
use aether_core::node::{self, DependencyNode};
use aether_core::session::{config, Session};
use aether_core::version::VersionConstraint;
use aether_core::visit::{GraphDumper, PreorderNodeListGenerator};
use aether_resolver::ConflictResolver;

fn node(coords: &str, scope: &str) -> DependencyNode {
    DependencyNode::new(Dependency::new(Artifact::parse(coords).unwrap(), scope))
}

/// Root depends on A:1 -> C:1 and B:1 -> C:2.
fn diamond_conflict() -> DependencyNode {
    let root = DependencyNode::root();
    let a = node("g:a:1", "compile");
    let b = node("g:b:1", "compile");
    a.add_child(node("g:c:1", "compile"));
    b.add_child(node("g:c:2", "compile"));
    root.add_child(a);
    root.add_child(b);
    root
}

fn collect_artifacts(root: &DependencyNode) -> Vec<String> {
    let mut gen = PreorderNodeListGenerator::new();
    root.accept(&mut gen);
    gen.nodes()
        .iter()
        .filter_map(|n| n.artifact())
        .map(|a| a.to_string())
        .collect()
}

fn find(root: &DependencyNode, coords: &str) -> Option<DependencyNode> {
    let target = Artifact::parse(coords).unwrap();
    let mut gen = PreorderNodeListGenerator::new();
    root.accept(&mut gen);
    gen.nodes()
        .iter()
        .find(|n| n.artifact().as_ref() == Some(&target))
        .cloned()
}

#[test]
fn nearest_wins_prunes_the_farther_version() {
    let root = diamond_conflict();
    ConflictResolver::default()
        .transform(&root, &Session::new())
        .unwrap();

    let artifacts = collect_artifacts(&root);
    assert!(artifacts.contains(&"g:a:jar:1".to_string()));
    assert!(artifacts.contains(&"g:b:jar:1".to_string()));
    assert!(artifacts.contains(&"g:c:jar:1".to_string()));
    assert!(!artifacts.contains(&"g:c:jar:2".to_string()));

    // Tie at equal depth broke toward the first encounter: the winner hangs
    // below a, and b is childless.
    let a = find(&root, "g:a:jar:1").unwrap();
    let b = find(&root, "g:b:jar:1").unwrap();
    assert_eq!(a.child_count(), 1);
    assert_eq!(b.child_count(), 0);
}

#[test]
fn no_two_output_nodes_share_a_conflict_id() {
    let root = diamond_conflict();
    ConflictResolver::default()
        .transform(&root, &Session::new())
        .unwrap();

    let mut gen = PreorderNodeListGenerator::new();
    root.accept(&mut gen);
    let mut seen = HashSet::new();
    for n in gen.nodes() {
        if let Some(artifact) = n.artifact() {
            assert!(
                seen.insert(artifact.versionless_id()),
                "duplicate conflict id in output: {}",
                artifact.versionless_id()
            );
        }
    }
}

#[test]
fn winners_are_deterministic_across_runs_and_strategies() {
    let mut outputs = Vec::new();
    for strategy in ["path", "classic", "path", "classic"] {
        let root = diamond_conflict();
        let session = Session::new().with_config(config::RESOLVER_IMPL, strategy);
        ConflictResolver::default().transform(&root, &session).unwrap();
        let mut dumper = GraphDumper::new();
        root.accept(&mut dumper);
        outputs.push(dumper.output());
    }
    assert_eq!(outputs[0], outputs[1]);
    assert_eq!(outputs[1], outputs[2]);
    assert_eq!(outputs[2], outputs[3]);
}

#[test]
fn standard_verbosity_keeps_annotated_losers() {
    let root = diamond_conflict();
    let session = Session::new().with_config(config::RESOLVER_VERBOSE, "STANDARD");
    ConflictResolver::default().transform(&root, &session).unwrap();

    let winner = find(&root, "g:c:jar:1").unwrap();
    let loser = find(&root, "g:c:jar:2").unwrap();
    assert_eq!(loser.child_count(), 0);

    let pointed = loser.data(node::key::CONFLICT_WINNER).unwrap();
    assert!(pointed.as_node().unwrap().same_node(&winner));
    assert_eq!(
        loser
            .data(node::key::CONFLICT_ORIGINAL_SCOPE)
            .unwrap()
            .as_str(),
        Some("compile")
    );
    assert_eq!(
        loser
            .data(node::key::CONFLICT_ORIGINAL_OPTIONALITY)
            .unwrap()
            .as_bool(),
        Some(false)
    );
}

#[test]
fn full_verbosity_retains_loser_children() {
    let root = DependencyNode::root();
    let a = node("g:a:1", "compile");
    let b = node("g:b:1", "compile");
    let loser = node("g:c:2", "compile");
    loser.add_child(node("g:d:1", "compile"));
    a.add_child(node("g:c:1", "compile"));
    b.add_child(loser);
    root.add_child(a);
    root.add_child(b);

    let session = Session::new().with_config(config::RESOLVER_VERBOSE, "FULL");
    ConflictResolver::default().transform(&root, &session).unwrap();

    let loser = find(&root, "g:c:jar:2").unwrap();
    assert_eq!(loser.child_count(), 1);
    assert!(loser.data(node::key::CONFLICT_WINNER).is_some());
}

#[test]
fn resolution_is_idempotent_under_none() {
    let root = diamond_conflict();
    let resolver = ConflictResolver::default();
    resolver.transform(&root, &Session::new()).unwrap();
    let mut first = GraphDumper::new();
    root.accept(&mut first);

    resolver.transform(&root, &Session::new()).unwrap();
    let mut second = GraphDumper::new();
    root.accept(&mut second);
    assert_eq!(first.output(), second.output());
}

#[test]
fn runtime_parent_demotes_compile_child() {
    let root = DependencyNode::root();
    let a = node("g:a:1", "runtime");
    a.add_child(node("g:c:1", "compile"));
    root.add_child(a);

    ConflictResolver::default()
        .transform(&root, &Session::new())
        .unwrap();

    let c = find(&root, "g:c:jar:1").unwrap();
    assert_eq!(c.dependency().unwrap().scope(), "runtime");
}

#[test]
fn compile_path_wins_over_runtime_path() {
    let root = DependencyNode::root();
    let a = node("g:a:1", "runtime");
    let b = node("g:b:1", "compile");
    a.add_child(node("g:c:1", "compile"));
    b.add_child(node("g:c:1", "compile"));
    root.add_child(a);
    root.add_child(b);

    ConflictResolver::default()
        .transform(&root, &Session::new())
        .unwrap();

    // Two paths derive runtime and compile; the wider scope wins.
    let mut gen = PreorderNodeListGenerator::new();
    root.accept(&mut gen);
    let c = gen
        .nodes()
        .iter()
        .find(|n| {
            n.artifact()
                .is_some_and(|a| a.artifact_id() == "c")
        })
        .cloned()
        .unwrap();
    assert_eq!(c.dependency().unwrap().scope(), "compile");
}

#[test]
fn optional_only_paths_make_the_winner_optional() {
    let root = DependencyNode::root();
    let a = node("g:a:1", "compile");
    a.add_child(node("g:c:1", "compile").clone());
    root.add_child(a.clone());
    let c = a.children()[0].clone();
    c.update_dependency(|d| d.with_optional(Some(true)));

    ConflictResolver::default()
        .transform(&root, &Session::new())
        .unwrap();
    assert_eq!(c.dependency().unwrap().optional(), Some(true));

    // A second mandatory path to the same coordinates flips it back.
    let root = DependencyNode::root();
    let a = node("g:a:1", "compile");
    let b = node("g:b:1", "compile");
    let c_optional = node("g:c:1", "compile");
    c_optional.update_dependency(|d| d.with_optional(Some(true)));
    a.add_child(c_optional);
    b.add_child(node("g:c:1", "compile"));
    root.add_child(a);
    root.add_child(b);

    ConflictResolver::default()
        .transform(&root, &Session::new())
        .unwrap();
    let mut gen = PreorderNodeListGenerator::new();
    root.accept(&mut gen);
    let winner = gen
        .nodes()
        .iter()
        .find(|n| n.artifact().is_some_and(|a| a.artifact_id() == "c"))
        .cloned()
        .unwrap();
    assert_eq!(winner.dependency().unwrap().optional(), Some(false));
}

#[test]
fn standard_prunes_redundant_range_losers() {
    let root = DependencyNode::root();
    let a = node("g:a:1", "compile");
    // One range site expanded to three candidates.
    let range = VersionConstraint::parse("[1,2)");
    for version in ["1.0", "1.1", "1.2"] {
        let candidate = node(&format!("g:c:{version}"), "compile");
        candidate.set_version_constraint(Some(range.clone()));
        a.add_child(candidate);
    }
    root.add_child(a);

    let session = Session::new().with_config(config::RESOLVER_VERBOSE, "STANDARD");
    ConflictResolver::default().transform(&root, &session).unwrap();

    // First-encountered candidate wins; among the losers only the highest
    // version is kept.
    let artifacts = collect_artifacts(&root);
    assert!(artifacts.contains(&"g:c:jar:1.0".to_string()));
    assert!(!artifacts.contains(&"g:c:jar:1.1".to_string()));
    assert!(artifacts.contains(&"g:c:jar:1.2".to_string()));
}

#[test]
fn transform_context_reports_sorted_and_cyclic_ids() {
    let root = diamond_conflict();
    let context = ConflictResolver::default()
        .transform(&root, &Session::new())
        .unwrap();

    assert!(context.cyclic_ids.is_empty());
    let pos = |name: &str| {
        context
            .sorted_ids
            .iter()
            .position(|id| id == &format!("g:{name}::jar"))
            .unwrap()
    };
    assert!(pos("a") < pos("c"));
    assert!(pos("b") < pos("c"));
}
