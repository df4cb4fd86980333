use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::runtime::ExecutionId;

/// A structured observability event produced while a workflow runs.
///
/// Events are emitted by the engine (run lifecycle, node lifecycle) and by
/// handlers (progress messages through
/// [`ExecutionContext::emit`](crate::context::ExecutionContext::emit)), then
/// fanned out to every sink attached to the [`EventBus`](super::EventBus).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Event {
    Execution(ExecutionEvent),
    Node(NodeEvent),
    Diagnostic(DiagnosticEvent),
}

impl Event {
    pub fn execution_started(execution_id: ExecutionId, workflow_id: Uuid) -> Self {
        Event::Execution(ExecutionEvent {
            execution_id,
            workflow_id,
            scope: "started".to_string(),
            message: format!("execution {execution_id} started"),
        })
    }

    pub fn execution_finished(
        execution_id: ExecutionId,
        workflow_id: Uuid,
        outcome: impl Into<String>,
    ) -> Self {
        let outcome = outcome.into();
        Event::Execution(ExecutionEvent {
            execution_id,
            workflow_id,
            scope: "finished".to_string(),
            message: format!("execution {execution_id} {outcome}"),
        })
    }

    pub fn node_started(execution_id: ExecutionId, node_id: impl Into<String>, step: u64) -> Self {
        let node_id = node_id.into();
        let message = format!("node {node_id} started");
        Event::Node(NodeEvent::new(execution_id, node_id, step, "started", message))
    }

    pub fn node_finished(
        execution_id: ExecutionId,
        node_id: impl Into<String>,
        step: u64,
        outcome: impl Into<String>,
    ) -> Self {
        let node_id = node_id.into();
        let message = format!("node {node_id} {}", outcome.into());
        Event::Node(NodeEvent::new(
            execution_id,
            node_id,
            step,
            "finished",
            message,
        ))
    }

    /// Free-form message scoped to the node currently executing.
    pub fn node_message(
        execution_id: ExecutionId,
        node_id: impl Into<String>,
        step: u64,
        scope: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Event::Node(NodeEvent::new(
            execution_id,
            node_id.into(),
            step,
            scope,
            message,
        ))
    }

    pub fn diagnostic(scope: impl Into<String>, message: impl Into<String>) -> Self {
        Event::Diagnostic(DiagnosticEvent {
            scope: scope.into(),
            message: message.into(),
        })
    }

    pub fn scope_label(&self) -> &str {
        match self {
            Event::Execution(run) => run.scope(),
            Event::Node(node) => node.scope(),
            Event::Diagnostic(diag) => diag.scope(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Event::Execution(run) => run.message(),
            Event::Node(node) => node.message(),
            Event::Diagnostic(diag) => diag.message(),
        }
    }

    /// The execution this event belongs to, if any.
    pub fn execution_id(&self) -> Option<ExecutionId> {
        match self {
            Event::Execution(run) => Some(run.execution_id()),
            Event::Node(node) => Some(node.execution_id()),
            Event::Diagnostic(_) => None,
        }
    }

    /// Convert the event to a JSON value with a normalized schema.
    ///
    /// Every variant serializes to the same envelope so downstream consumers
    /// can route on `type` without caring about variant internals:
    ///
    /// ```json
    /// {
    ///   "type": "execution" | "node" | "diagnostic",
    ///   "scope": "scope_label",
    ///   "message": "event_message",
    ///   "timestamp": "2026-08-24T12:34:56.789Z",
    ///   "metadata": { /* variant-specific fields */ }
    /// }
    /// ```
    ///
    /// # Example
    ///
    /// ```
    /// use flowloom::event_bus::Event;
    /// use flowloom::runtime::ExecutionId;
    ///
    /// let id = ExecutionId::new();
    /// let event = Event::node_message(id, "dedupe", 2, "dedupe", "key already seen");
    /// let json = event.to_json_value();
    ///
    /// assert_eq!(json["type"], "node");
    /// assert_eq!(json["scope"], "dedupe");
    /// assert_eq!(json["metadata"]["node_id"], "dedupe");
    /// assert_eq!(json["metadata"]["step"], 2);
    /// ```
    pub fn to_json_value(&self) -> Value {
        use serde_json::json;

        let (event_type, metadata) = match self {
            Event::Execution(run) => {
                let mut meta = serde_json::Map::new();
                meta.insert("execution_id".to_string(), json!(run.execution_id()));
                meta.insert("workflow_id".to_string(), json!(run.workflow_id()));
                ("execution", Value::Object(meta))
            }
            Event::Node(node) => {
                let mut meta = serde_json::Map::new();
                meta.insert("execution_id".to_string(), json!(node.execution_id()));
                meta.insert("node_id".to_string(), json!(node.node_id()));
                meta.insert("step".to_string(), json!(node.step()));
                ("node", Value::Object(meta))
            }
            Event::Diagnostic(_) => ("diagnostic", Value::Object(serde_json::Map::new())),
        };

        json!({
            "type": event_type,
            "scope": self.scope_label(),
            "message": self.message(),
            "timestamp": Utc::now().to_rfc3339(),
            "metadata": metadata,
        })
    }

    /// Compact JSON string form of [`to_json_value`](Self::to_json_value).
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_json_value())
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Execution(run) => write!(f, "[run {}] {}", run.execution_id(), run.message()),
            Event::Node(node) => {
                write!(f, "[{}@{}] {}", node.node_id(), node.step(), node.message())
            }
            Event::Diagnostic(diag) => write!(f, "{}", diag.message()),
        }
    }
}

/// Run-level lifecycle event (started, finished).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionEvent {
    execution_id: ExecutionId,
    workflow_id: Uuid,
    scope: String,
    message: String,
}

impl ExecutionEvent {
    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    pub fn workflow_id(&self) -> Uuid {
        self.workflow_id
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Node-level event, tagged with the step counter at which it was emitted.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeEvent {
    execution_id: ExecutionId,
    node_id: String,
    step: u64,
    scope: String,
    message: String,
}

impl NodeEvent {
    pub fn new(
        execution_id: ExecutionId,
        node_id: String,
        step: u64,
        scope: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            execution_id,
            node_id,
            step,
            scope: scope.into(),
            message: message.into(),
        }
    }

    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Engine-internal notice not tied to a particular execution.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiagnosticEvent {
    scope: String,
    message: String,
}

impl DiagnosticEvent {
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
