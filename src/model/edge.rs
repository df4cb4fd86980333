//! Directed edges between workflow nodes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Handle name used when a handler does not pick an explicit branch.
pub const DEFAULT_HANDLE: &str = "default";

/// Handle name an errored node routes through when it names no handle.
pub const ERROR_HANDLE: &str = "error";

/// A directed, optionally labeled connection between two nodes.
///
/// `source_handle` names the output port the edge hangs off; handlers select
/// the outgoing edge by returning a matching handle (for example `"new"` /
/// `"duplicate"` from a dedupe node, or `"true"` / `"false"` from a branch).
/// The triple (source, target, source_handle) must be unique within a
/// workflow; the validator reports duplicates instead of merging them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default = "default_handle")]
    pub source_handle: String,
    #[serde(default = "default_handle")]
    pub target_handle: String,
    /// Optional condition payload carried for editor round-trips; the engine
    /// itself routes purely on `source_handle`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Value>,
}

fn default_handle() -> String {
    DEFAULT_HANDLE.to_string()
}

impl Edge {
    /// Create an edge on the `"default"` handles.
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_handle: default_handle(),
            target_handle: default_handle(),
            condition: None,
        }
    }

    /// Set the source handle this edge hangs off.
    #[must_use]
    pub fn with_source_handle(mut self, handle: impl Into<String>) -> Self {
        self.source_handle = handle.into();
        self
    }

    /// Set the target handle.
    #[must_use]
    pub fn with_target_handle(mut self, handle: impl Into<String>) -> Self {
        self.target_handle = handle.into();
        self
    }

    /// Attach a condition payload.
    #[must_use]
    pub fn with_condition(mut self, condition: Value) -> Self {
        self.condition = Some(condition);
        self
    }

    /// The uniqueness key the validator checks: (source, target, source_handle).
    #[must_use]
    pub fn routing_key(&self) -> (&str, &str, &str) {
        (&self.source, &self.target, &self.source_handle)
    }
}
