//! Structural linting of workflow graphs before publish.
//!
//! [`validate_graph`] is a pure function over a candidate graph: it returns
//! human-readable error strings, and an empty list means the graph is fit to
//! publish. All checks run independently and accumulate into one list so an
//! editor can highlight every problem in a single pass; the same graph always
//! yields the same list.

use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;

use crate::model::{NodeType, WorkflowGraph};
use crate::registry::HandlerRegistry;

/// Handle names always accepted on a router's outgoing edges.
const ROUTER_BUILTIN_HANDLES: [&str; 2] = ["fallback", "default"];

/// Validate a workflow graph against the structural rules.
///
/// Checks, in order of accumulation:
///
/// - the node set is non-empty (an empty graph short-circuits with exactly
///   this one error);
/// - at least one node belongs to the trigger set;
/// - every edge endpoint names an existing node;
/// - no node is an orphan (only checked when the graph has more than one
///   node);
/// - trigger nodes have zero incoming edges;
/// - router nodes' outgoing edges use a configured route name, `"fallback"`,
///   or `"default"`;
/// - the (source, target, source_handle) triple of every edge is unique;
/// - the directed edge relation is cycle-free (three-color depth-first
///   search; every back-edge is reported);
/// - every node type resolves to a registered handler, and that handler
///   accepts the node's configuration.
pub fn validate_graph(graph: &WorkflowGraph, registry: &HandlerRegistry) -> Vec<String> {
    let mut errors = Vec::new();

    if graph.nodes.is_empty() {
        errors.push("workflow has no nodes".to_string());
        return errors;
    }

    let node_ids: FxHashSet<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();

    if !graph.nodes.iter().any(|n| n.node_type.is_trigger()) {
        errors.push("workflow has no trigger node".to_string());
    }

    for edge in &graph.edges {
        if !node_ids.contains(edge.source.as_str()) {
            errors.push(format!(
                "edge '{}' references unknown source node '{}'",
                edge.id, edge.source
            ));
        }
        if !node_ids.contains(edge.target.as_str()) {
            errors.push(format!(
                "edge '{}' references unknown target node '{}'",
                edge.id, edge.target
            ));
        }
    }

    if graph.nodes.len() > 1 {
        let mut connected: FxHashSet<&str> = FxHashSet::default();
        for edge in &graph.edges {
            connected.insert(edge.source.as_str());
            connected.insert(edge.target.as_str());
        }
        for node in &graph.nodes {
            if !connected.contains(node.id.as_str()) {
                errors.push(format!("node '{}' is not connected to any edge", node.id));
            }
        }
    }

    for node in &graph.nodes {
        if node.node_type.is_trigger() {
            for edge in graph.edges.iter().filter(|e| e.target == node.id) {
                errors.push(format!(
                    "trigger node '{}' has an incoming edge from '{}'",
                    node.id, edge.source
                ));
            }
        }
    }

    for node in &graph.nodes {
        if node.node_type != NodeType::Router {
            continue;
        }
        let allowed = router_handles(node);
        for edge in graph.outgoing(&node.id) {
            if !allowed.contains(edge.source_handle.as_str()) {
                errors.push(format!(
                    "router '{}' has an outgoing edge with unknown handle '{}'",
                    node.id, edge.source_handle
                ));
            }
        }
    }

    let mut seen_routes: FxHashSet<(&str, &str, &str)> = FxHashSet::default();
    for edge in &graph.edges {
        if !seen_routes.insert(edge.routing_key()) {
            let (source, target, handle) = edge.routing_key();
            errors.push(format!(
                "duplicate edge '{source}' -> '{target}' (handle '{handle}')"
            ));
        }
    }

    detect_cycles(graph, &node_ids, &mut errors);

    for node in &graph.nodes {
        match registry.resolve(&node.node_type) {
            None => errors.push(format!(
                "unknown node type '{}' on node '{}'",
                node.node_type, node.id
            )),
            Some(handler) => {
                if let Some(message) = handler.validate(node) {
                    errors.push(format!("node '{}': {message}", node.id));
                }
            }
        }
    }

    errors
}

fn router_handles(node: &crate::model::Node) -> FxHashSet<&str> {
    let mut allowed: FxHashSet<&str> = ROUTER_BUILTIN_HANDLES.iter().copied().collect();
    if let Some(Value::Array(routes)) = node.config.get("routes") {
        for route in routes {
            match route {
                Value::String(name) => {
                    allowed.insert(name.as_str());
                }
                Value::Object(map) => {
                    if let Some(name) = map.get("name").and_then(Value::as_str) {
                        allowed.insert(name);
                    }
                }
                _ => {}
            }
        }
    }
    allowed
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Three-color depth-first search over the directed edge relation.
///
/// A back-edge into a gray (in-progress) node is a cycle; each one is
/// reported individually. Edges with dangling endpoints are skipped here
/// since they are reported separately.
fn detect_cycles(graph: &WorkflowGraph, node_ids: &FxHashSet<&str>, errors: &mut Vec<String>) {
    let mut adjacency: FxHashMap<&str, Vec<&str>> = FxHashMap::default();
    for edge in &graph.edges {
        if node_ids.contains(edge.source.as_str()) && node_ids.contains(edge.target.as_str()) {
            adjacency
                .entry(edge.source.as_str())
                .or_default()
                .push(edge.target.as_str());
        }
    }

    let mut colors: FxHashMap<&str, Color> = graph
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), Color::White))
        .collect();

    for node in &graph.nodes {
        if colors[node.id.as_str()] == Color::White {
            visit(node.id.as_str(), &adjacency, &mut colors, errors);
        }
    }
}

fn visit<'a>(
    node: &'a str,
    adjacency: &FxHashMap<&'a str, Vec<&'a str>>,
    colors: &mut FxHashMap<&'a str, Color>,
    errors: &mut Vec<String>,
) {
    colors.insert(node, Color::Gray);
    if let Some(targets) = adjacency.get(node) {
        for target in targets {
            match colors[target] {
                Color::Gray => {
                    errors.push(format!(
                        "cycle detected: edge from '{node}' re-enters '{target}'"
                    ));
                }
                Color::White => visit(target, adjacency, colors, errors),
                Color::Black => {}
            }
        }
    }
    colors.insert(node, Color::Black);
}
