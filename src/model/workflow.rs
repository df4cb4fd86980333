//! Workflow: the persisted shape of one automation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::edge::Edge;
use super::node::{Node, Position};
use super::variable::Variable;

/// Editor viewport, persisted so the canvas reopens where it was left.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
        }
    }
}

/// A visual container of nodes. Purely organizational; the engine ignores it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// The node/edge structure of a workflow, in authored order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowGraph {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub viewport: Viewport,
}

impl WorkflowGraph {
    /// Graph with the given nodes and edges and no groups.
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self {
            nodes,
            edges,
            ..Default::default()
        }
    }

    /// Look up a node by id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// The first trigger node in authored order, if any.
    ///
    /// This is the node an execution enters through when the workflow has
    /// several triggers.
    #[must_use]
    pub fn entry_trigger(&self) -> Option<&Node> {
        self.nodes.iter().find(|n| n.node_type.is_trigger())
    }

    /// Outgoing edges of a node, in authored order.
    pub fn outgoing(&self, node_id: &str) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.source == node_id)
    }

    /// The target node of `node_id`'s outgoing edge on `handle`, if wired.
    #[must_use]
    pub fn follow(&self, node_id: &str, handle: &str) -> Option<&Node> {
        self.outgoing(node_id)
            .find(|e| e.source_handle == handle)
            .and_then(|e| self.node(&e.target))
    }
}

/// One automation: a graph plus activation state and workflow-scoped
/// variables.
///
/// Invariant: a published workflow's graph passes
/// [`validate_graph`](crate::validator::validate_graph) with zero errors;
/// the workflow store's publish operation enforces this.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: Uuid,
    pub name: String,
    pub graph: WorkflowGraph,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_published: bool,
    /// Opaque owning principal; authn/authz live outside this crate.
    pub owner: String,
    /// Workflow-scoped variables seeding every run's blackboard.
    #[serde(default)]
    pub variables: Vec<Variable>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    /// Create an unpublished, inactive workflow owned by `owner`.
    pub fn new(name: impl Into<String>, owner: impl Into<String>, graph: WorkflowGraph) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            graph,
            is_active: false,
            is_published: false,
            owner: owner.into(),
            variables: Vec::new(),
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Seed the workflow with predefined variables.
    #[must_use]
    pub fn with_variables(mut self, variables: Vec<Variable>) -> Self {
        self.variables = variables;
        self
    }

    /// Tag the workflow.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}
