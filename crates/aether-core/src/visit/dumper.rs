//! Text rendering of dependency graphs.

use crate::node::{self, DependencyNode};
use crate::version::VersionConstraint;
use crate::visit::DependencyVisitor;

/// Produces one optional annotation for a node line.
pub type Decorator = fn(&DependencyNode) -> Option<String>;

/// The decoration set a plain dump uses: effective scope, premanaged
/// attributes, ranges, and conflict annotations.
pub fn standard_decorators() -> Vec<Decorator> {
    vec![
        scope_decoration,
        version_managed_decoration,
        scope_managed_decoration,
        optionality_managed_decoration,
        exclusions_managed_decoration,
        properties_managed_decoration,
        range_decoration,
        conflict_decoration,
    ]
}

fn scope_decoration(node: &DependencyNode) -> Option<String> {
    let dependency = node.dependency()?;
    if dependency.scope().is_empty() {
        return None;
    }
    if dependency.is_optional() {
        Some(format!("[{}, optional]", dependency.scope()))
    } else {
        Some(format!("[{}]", dependency.scope()))
    }
}

fn version_managed_decoration(node: &DependencyNode) -> Option<String> {
    let premanaged = node.data(node::key::PREMANAGED_VERSION)?;
    Some(format!("(version managed from {})", premanaged.as_str()?))
}

fn scope_managed_decoration(node: &DependencyNode) -> Option<String> {
    let premanaged = node.data(node::key::PREMANAGED_SCOPE)?;
    Some(format!("(scope managed from {})", premanaged.as_str()?))
}

fn optionality_managed_decoration(node: &DependencyNode) -> Option<String> {
    let premanaged = node.data(node::key::PREMANAGED_OPTIONAL)?;
    Some(format!(
        "(optionality managed from {})",
        premanaged.as_bool()?
    ))
}

fn exclusions_managed_decoration(node: &DependencyNode) -> Option<String> {
    match node.data(node::key::PREMANAGED_EXCLUSIONS)? {
        node::DataValue::Exclusions(exclusions) => {
            let rendered: Vec<String> = exclusions.iter().map(|e| e.to_string()).collect();
            Some(format!("(exclusions managed from [{}])", rendered.join(", ")))
        }
        _ => None,
    }
}

fn properties_managed_decoration(node: &DependencyNode) -> Option<String> {
    match node.data(node::key::PREMANAGED_PROPERTIES)? {
        node::DataValue::Properties(properties) => {
            let rendered: Vec<String> = properties
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            Some(format!("(properties managed from {{{}}})", rendered.join(", ")))
        }
        _ => None,
    }
}

fn range_decoration(node: &DependencyNode) -> Option<String> {
    match node.version_constraint()? {
        VersionConstraint::Range(range) => Some(format!("(range '{range}')")),
        VersionConstraint::Recommended(_) => None,
    }
}

fn conflict_decoration(node: &DependencyNode) -> Option<String> {
    let winner = node.data(node::key::CONFLICT_WINNER)?;
    let winner = winner.as_node()?;
    let winner_artifact = winner.artifact()?;
    let this_artifact = node.artifact()?;
    if winner_artifact.version() == this_artifact.version() {
        Some("(nearer exists)".to_string())
    } else {
        Some(format!("(conflicts with {})", winner_artifact.version()))
    }
}

struct Level {
    count: usize,
    visited: usize,
}

/// Preorder visitor emitting one line per node with ASCII tree indentation.
pub struct GraphDumper {
    out: String,
    levels: Vec<Level>,
    decorators: Vec<Decorator>,
}

impl Default for GraphDumper {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphDumper {
    pub fn new() -> Self {
        Self::with_decorators(standard_decorators())
    }

    pub fn with_decorators(decorators: Vec<Decorator>) -> Self {
        Self {
            out: String::new(),
            levels: Vec::new(),
            decorators,
        }
    }

    pub fn output(self) -> String {
        self.out
    }

    pub fn as_str(&self) -> &str {
        &self.out
    }

    /// Render a line for a node that will not be descended into, with an
    /// optional suffix. Used by the cycle-aware dumper for back-references.
    pub fn render_leaf(&mut self, node: &DependencyNode, suffix: Option<&str>) {
        self.render_line(node, suffix);
    }

    fn render_line(&mut self, node: &DependencyNode, suffix: Option<&str>) {
        if let Some(parent) = self.levels.last_mut() {
            parent.visited += 1;
        }
        let depth = self.levels.len();
        for level in self.levels.iter().take(depth.saturating_sub(1)) {
            if level.visited < level.count {
                self.out.push_str("|  ");
            } else {
                self.out.push_str("   ");
            }
        }
        if let Some(last) = self.levels.last() {
            if last.visited < last.count {
                self.out.push_str("+- ");
            } else {
                self.out.push_str("\\- ");
            }
        }

        self.out.push_str(&node_label(node));
        for decorator in &self.decorators {
            if let Some(decoration) = decorator(node) {
                self.out.push(' ');
                self.out.push_str(&decoration);
            }
        }
        if let Some(suffix) = suffix {
            self.out.push(' ');
            self.out.push_str(suffix);
        }
        self.out.push('\n');
    }
}

fn node_label(node: &DependencyNode) -> String {
    match node.artifact() {
        Some(artifact) => artifact.to_string(),
        None => "<root>".to_string(),
    }
}

impl DependencyVisitor for GraphDumper {
    fn visit_enter(&mut self, node: &DependencyNode) -> bool {
        self.render_line(node, None);
        self.levels.push(Level {
            count: node.child_count(),
            visited: 0,
        });
        true
    }

    fn visit_leave(&mut self, _node: &DependencyNode) -> bool {
        self.levels.pop();
        true
    }
}

/// Wraps [`GraphDumper`] with back-reference handling: a node whose
/// versionless id matches an ancestor at path index `N` (root = 0) is
/// rendered as `<node> ^N` and not descended into.
pub struct CycleAwareDumper {
    dumper: GraphDumper,
    path: Vec<String>,
    entered: Vec<usize>,
}

impl Default for CycleAwareDumper {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleAwareDumper {
    pub fn new() -> Self {
        Self::with_dumper(GraphDumper::new())
    }

    pub fn with_dumper(dumper: GraphDumper) -> Self {
        Self {
            dumper,
            path: Vec::new(),
            entered: Vec::new(),
        }
    }

    pub fn output(self) -> String {
        self.dumper.output()
    }
}

impl DependencyVisitor for CycleAwareDumper {
    fn visit_enter(&mut self, node: &DependencyNode) -> bool {
        let id = node
            .artifact()
            .map(|a| a.versionless_id())
            .unwrap_or_default();
        if let Some(index) = self.path.iter().position(|ancestor| *ancestor == id) {
            self.dumper.render_leaf(node, Some(&format!("^{index}")));
            return false;
        }
        let result = self.dumper.visit_enter(node);
        self.path.push(id);
        self.entered.push(node.id());
        result
    }

    fn visit_leave(&mut self, node: &DependencyNode) -> bool {
        if self.entered.last() == Some(&node.id()) {
            self.entered.pop();
            self.path.pop();
            self.dumper.visit_leave(node)
        } else {
            true
        }
    }
}
