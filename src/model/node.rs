//! Node (block) definitions for workflow graphs.
//!
//! A [`Node`] is one configurable unit of work inside a workflow graph. Its
//! [`NodeType`] selects the handler that runs it; its `config` map carries the
//! handler-specific settings authored in the editor.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Identifies the handler bound to a node.
///
/// Known node types are enumerated so registry keys are checked at compile
/// time; [`Custom`](Self::Custom) remains as the escape hatch for externally
/// registered handlers. The string form (`as_str`/`parse`) is what gets
/// persisted inside workflow JSON.
///
/// # Examples
///
/// ```rust
/// use flowloom::model::NodeType;
///
/// let dedupe = NodeType::Dedupe;
/// assert_eq!(dedupe.as_str(), "dedupe");
/// assert_eq!(NodeType::parse("dedupe"), dedupe);
///
/// // Unknown strings survive a round-trip as Custom
/// let custom = NodeType::parse("my_plugin");
/// assert_eq!(custom, NodeType::Custom("my_plugin".to_string()));
/// assert_eq!(custom.as_str(), "my_plugin");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeType {
    /// Run started by an inbound webhook call.
    WebhookTrigger,
    /// Run started by the scheduler collaborator.
    ScheduleTrigger,
    /// Run started by hand from the editor.
    ManualTrigger,
    /// Run started through the public API.
    ApiTrigger,
    /// Run started by a form submission.
    FormTrigger,
    /// Run started by an inbound channel message.
    MessageTrigger,
    /// Run started by an ad-platform lead webhook; normalizes the payload.
    LeadTrigger,
    /// Multi-way route selection over configured routes.
    Router,
    /// Two-way condition split (`"true"` / `"false"` handles).
    Branch,
    /// Cross-run value deduplication against an external oracle.
    Dedupe,
    /// Fire-and-forget push of contact fields to an external CRM.
    CrmPush,
    /// Query records in an external CRM-like service.
    RecordQuery,
    /// Create a record in an external CRM-like service.
    RecordCreate,
    /// Update a record in an external CRM-like service.
    RecordUpdate,
    /// Invoke another workflow as a child execution.
    SubWorkflow,
    /// Externally registered node type identified by its string key.
    Custom(String),
}

impl NodeType {
    /// Persisted string form of this node type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            NodeType::WebhookTrigger => "webhook_trigger",
            NodeType::ScheduleTrigger => "schedule_trigger",
            NodeType::ManualTrigger => "manual_trigger",
            NodeType::ApiTrigger => "api_trigger",
            NodeType::FormTrigger => "form_trigger",
            NodeType::MessageTrigger => "message_trigger",
            NodeType::LeadTrigger => "lead_trigger",
            NodeType::Router => "router",
            NodeType::Branch => "branch",
            NodeType::Dedupe => "dedupe",
            NodeType::CrmPush => "crm_push",
            NodeType::RecordQuery => "record_query",
            NodeType::RecordCreate => "record_create",
            NodeType::RecordUpdate => "record_update",
            NodeType::SubWorkflow => "sub_workflow",
            NodeType::Custom(s) => s,
        }
    }

    /// Parse a persisted string form back into a `NodeType`.
    ///
    /// Unrecognized strings become [`Custom`](Self::Custom), so workflow JSON
    /// written by a newer editor still loads.
    pub fn parse(s: &str) -> Self {
        match s {
            "webhook_trigger" => NodeType::WebhookTrigger,
            "schedule_trigger" => NodeType::ScheduleTrigger,
            "manual_trigger" => NodeType::ManualTrigger,
            "api_trigger" => NodeType::ApiTrigger,
            "form_trigger" => NodeType::FormTrigger,
            "message_trigger" => NodeType::MessageTrigger,
            "lead_trigger" => NodeType::LeadTrigger,
            "router" => NodeType::Router,
            "branch" => NodeType::Branch,
            "dedupe" => NodeType::Dedupe,
            "crm_push" => NodeType::CrmPush,
            "record_query" => NodeType::RecordQuery,
            "record_create" => NodeType::RecordCreate,
            "record_update" => NodeType::RecordUpdate,
            "sub_workflow" => NodeType::SubWorkflow,
            other => NodeType::Custom(other.to_string()),
        }
    }

    /// Returns `true` if this type belongs to the closed trigger set.
    ///
    /// Trigger nodes may start a run and must have zero incoming edges.
    /// `Custom` types are never triggers.
    #[must_use]
    pub fn is_trigger(&self) -> bool {
        matches!(
            self,
            NodeType::WebhookTrigger
                | NodeType::ScheduleTrigger
                | NodeType::ManualTrigger
                | NodeType::ApiTrigger
                | NodeType::FormTrigger
                | NodeType::MessageTrigger
                | NodeType::LeadTrigger
        )
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// Developer Experience: allow using string literals where a NodeType is expected.
impl From<&str> for NodeType {
    fn from(s: &str) -> Self {
        NodeType::parse(s)
    }
}

impl Serialize for NodeType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NodeType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(NodeType::parse(&s))
    }
}

/// 2-D editor layout position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// One configurable block inside a workflow graph.
///
/// Nodes are immutable once an execution has logged them; the audit trail
/// snapshots node data rather than holding live references.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Identifier unique within the workflow graph.
    pub id: String,
    /// Handler selector.
    pub node_type: NodeType,
    /// Handler-specific configuration. Template placeholders are resolved at
    /// execution time, not here.
    #[serde(default)]
    pub config: Map<String, Value>,
    /// Free-form display content (labels, rich text) with no execution
    /// semantics.
    #[serde(default)]
    pub content: Map<String, Value>,
    #[serde(default)]
    pub position: Position,
    /// Optional visual group membership.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl Node {
    /// Create a node with an empty config at the origin.
    pub fn new(id: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            node_type,
            config: Map::new(),
            content: Map::new(),
            position: Position::default(),
            group: None,
        }
    }

    /// Replace the handler configuration.
    #[must_use]
    pub fn with_config(mut self, config: Map<String, Value>) -> Self {
        self.config = config;
        self
    }

    /// Insert one configuration entry.
    #[must_use]
    pub fn with_config_entry(mut self, key: impl Into<String>, value: Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    /// Set the editor layout position.
    #[must_use]
    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = Position { x, y };
        self
    }

    /// Assign this node to a visual group.
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Fetch a string-valued config entry.
    #[must_use]
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(Value::as_str)
    }
}
