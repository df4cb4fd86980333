//! Flow-control handlers: multi-way routing and boolean branching.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::context::ExecutionContext;
use crate::handler::{NodeHandler, NodeResult};
use crate::model::{Node, NodeType};

/// Handle a router falls back to when no configured route matches.
pub const FALLBACK_HANDLE: &str = "fallback";

/// Picks the first matching route from the node's `routes` config.
///
/// Each route is either a bare name (matches unconditionally) or an
/// object with a `name` and a `condition` template. Routes are evaluated
/// in order; the first truthy condition wins and its name becomes the
/// outgoing handle. With no match the handle is `"fallback"`.
pub struct RouterHandler;

#[async_trait]
impl NodeHandler for RouterHandler {
    fn node_types(&self) -> Vec<NodeType> {
        vec![NodeType::Router]
    }

    fn validate(&self, node: &Node) -> Option<String> {
        let Some(routes) = node.config.get("routes") else {
            return Some("router requires a 'routes' array".into());
        };
        let Some(entries) = routes.as_array() else {
            return Some("router 'routes' must be an array".into());
        };
        for (index, entry) in entries.iter().enumerate() {
            if route_name(entry).is_none() {
                return Some(format!("router route {index} is missing a name"));
            }
        }
        None
    }

    async fn execute(&self, node: &Node, ctx: &mut ExecutionContext) -> NodeResult {
        let routes = node
            .config
            .get("routes")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        for entry in &routes {
            let Some(name) = route_name(entry) else {
                continue;
            };
            let matches = match entry.get("condition").and_then(Value::as_str) {
                Some(condition) => is_truthy(&ctx.resolve_template(condition)),
                None => true,
            };
            if matches {
                return NodeResult::ok()
                    .with_handle(name)
                    .with_entry("route", Value::String(name.to_owned()));
            }
        }

        NodeResult::ok()
            .with_handle(FALLBACK_HANDLE)
            .with_entry("route", Value::String(FALLBACK_HANDLE.to_owned()))
    }
}

/// Two-way branch on a single condition template.
///
/// Routes to the `"true"` or `"false"` handle; the resolved condition is
/// echoed in the output for the audit trail.
pub struct BranchHandler;

#[async_trait]
impl NodeHandler for BranchHandler {
    fn node_types(&self) -> Vec<NodeType> {
        vec![NodeType::Branch]
    }

    fn validate(&self, node: &Node) -> Option<String> {
        if node.config_str("condition").is_none_or(str::is_empty) {
            return Some("branch requires a 'condition' template".into());
        }
        None
    }

    async fn execute(&self, node: &Node, ctx: &mut ExecutionContext) -> NodeResult {
        let condition = node.config_str("condition").unwrap_or_default().to_owned();
        let resolved = ctx.resolve_template(&condition);
        let outcome = is_truthy(&resolved);

        NodeResult::ok()
            .with_handle(if outcome { "true" } else { "false" })
            .with_entry("condition_result", json!(outcome))
            .with_entry("resolved", Value::String(resolved))
    }
}

/// A route entry's name: the entry itself when it is a bare string,
/// otherwise its `name` field.
fn route_name(entry: &Value) -> Option<&str> {
    entry
        .as_str()
        .or_else(|| entry.get("name").and_then(Value::as_str))
}

/// Template-level truthiness. Empty, `false`, `0`, and `null` are false;
/// anything else is true.
fn is_truthy(resolved: &str) -> bool {
    let trimmed = resolved.trim();
    !(trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("false")
        || trimmed == "0"
        || trimmed.eq_ignore_ascii_case("null"))
}
