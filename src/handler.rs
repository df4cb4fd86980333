//! Handler contract for executable node types.
//!
//! Every node type binds to one [`NodeHandler`]: a stateless, shared
//! implementation that validates node configuration at publish time and
//! performs the node's effect at execution time. All per-run state lives in
//! the [`ExecutionContext`]; handlers must not keep mutable state of their
//! own, so one `Arc`'d instance serves every concurrent run.

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::ExecutionContext;
use crate::model::{Node, NodeType};

/// Key→value output a node hands downstream.
pub type OutputMap = FxHashMap<String, Value>;

/// What a node's side effect guarantees when the node returns.
///
/// Fire-and-forget handlers enqueue their external write and return before
/// it completes; the audit trail records that distinction explicitly so a
/// log reader knows which nodes guarantee nothing beyond "accepted".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    /// The node's work finished before it returned.
    #[default]
    Completed,
    /// The node enqueued asynchronous work identified by `reference`.
    Enqueued { reference: String },
}

/// Outcome of one node invocation.
///
/// A result either succeeds with an `output` map (merged into
/// downstream-visible state) or carries an `error` string. `handle` names the
/// outgoing edge to follow; the engine falls back to `"default"` on success
/// and `"error"` on failure when no handle is named.
///
/// # Examples
///
/// ```rust
/// use flowloom::handler::NodeResult;
/// use serde_json::json;
///
/// let ok = NodeResult::ok()
///     .with_entry("is_duplicate", json!(false))
///     .with_handle("new");
/// assert!(ok.error.is_none());
///
/// let failed = NodeResult::err("credential_id is required");
/// assert!(failed.error.is_some());
/// ```
#[derive(Clone, Debug, Default)]
pub struct NodeResult {
    /// Success output, visible to downstream nodes via the execution log.
    pub output: OutputMap,
    /// Outgoing edge handle to follow, when the handler picks a branch.
    pub handle: Option<String>,
    /// Error message; set means the invocation failed.
    pub error: Option<String>,
    /// What the node's side effect guarantees.
    pub effect: Effect,
}

impl NodeResult {
    /// An empty success.
    #[must_use]
    pub fn ok() -> Self {
        Self::default()
    }

    /// A failed invocation carrying `message`.
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }

    /// A success whose external work was enqueued, not completed.
    pub fn enqueued(reference: impl Into<String>) -> Self {
        Self {
            effect: Effect::Enqueued {
                reference: reference.into(),
            },
            ..Default::default()
        }
    }

    /// Replace the output map.
    #[must_use]
    pub fn with_output(mut self, output: OutputMap) -> Self {
        self.output = output;
        self
    }

    /// Insert one output entry.
    #[must_use]
    pub fn with_entry(mut self, key: impl Into<String>, value: Value) -> Self {
        self.output.insert(key.into(), value);
        self
    }

    /// Name the outgoing edge handle to follow.
    #[must_use]
    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }

    /// The output map as a JSON object, for audit logging.
    #[must_use]
    pub fn output_json(&self) -> Value {
        serde_json::to_value(&self.output).unwrap_or(Value::Null)
    }
}

/// Core trait defining executable node types.
///
/// # Contract
///
/// - [`node_types`](Self::node_types) declares the registry keys this handler
///   claims. One implementation may claim several (aliases); the registry
///   stores the same instance under each.
/// - [`validate`](Self::validate) is a pure, synchronous configuration check
///   run when a graph is checked for publish-readiness, and defensively again
///   before each execution. `None` means valid.
/// - [`execute`](Self::execute) performs the node's effect. It reads trigger
///   data and variables only through the context accessors, and reports
///   failure through [`NodeResult::err`] rather than panicking. Side-effect
///   retry/backoff is the handler's own business; the engine never retries.
#[async_trait]
pub trait NodeHandler: Send + Sync {
    /// Registry keys this handler claims.
    fn node_types(&self) -> Vec<NodeType>;

    /// Check node configuration. `None` means valid.
    fn validate(&self, node: &Node) -> Option<String> {
        let _ = node;
        None
    }

    /// Execute the node against the run's context.
    async fn execute(&self, node: &Node, ctx: &mut ExecutionContext) -> NodeResult;
}
