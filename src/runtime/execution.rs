//! Execution records and the run-status state machine.
//!
//! An [`Execution`] is the audit record of one workflow run: it carries the
//! trigger payload, the final result or error, timestamps, and the status
//! machine `pending -> running -> {completed, failed, cancelled}`. A
//! [`NodeExecutionLog`] row is appended for every node invocation inside a
//! run; ordering by `started_at` defines the trace.

use std::fmt;

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::handler::{Effect, OutputMap};
use crate::model::NodeType;

/// Unique identifier of a single workflow run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(Uuid);

impl ExecutionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ExecutionId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// What started a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    Manual,
    Webhook,
    Schedule,
    Api,
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::Webhook => write!(f, "webhook"),
            Self::Schedule => write!(f, "schedule"),
            Self::Api => write!(f, "api"),
        }
    }
}

/// Run status.
///
/// The only legal transitions are `Pending -> Running` and
/// `Running -> {Completed, Failed, Cancelled}`. Terminal states accept no
/// further transition; in particular a run can only fail after it started
/// running.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    #[must_use]
    pub fn can_transition(&self, next: ExecutionStatus) -> bool {
        use ExecutionStatus::{Cancelled, Completed, Failed, Pending, Running};
        matches!(
            (self, next),
            (Pending, Running) | (Running, Completed | Failed | Cancelled)
        )
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Attempted status transition that the state machine forbids.
#[derive(Debug, Error, Diagnostic)]
#[error("invalid execution transition: {from} -> {to}")]
#[diagnostic(
    code(flowloom::execution::invalid_transition),
    help("Executions move pending -> running -> terminal; terminal states are final.")
)]
pub struct InvalidTransition {
    pub from: ExecutionStatus,
    pub to: ExecutionStatus,
}

/// Audit record of one workflow run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Execution {
    pub id: ExecutionId,
    pub workflow_id: Uuid,
    pub status: ExecutionStatus,
    pub trigger_data: Value,
    pub result_data: Option<Value>,
    pub error_message: Option<String>,
    pub triggered_by: TriggerSource,
    /// Set when this run was spawned by another run's sub-workflow node.
    pub parent_execution: Option<ExecutionId>,
    /// Which graph snapshot ran, when the workflow has published versions.
    pub version: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Execution {
    pub fn new(workflow_id: Uuid, trigger_data: Value, triggered_by: TriggerSource) -> Self {
        Self {
            id: ExecutionId::new(),
            workflow_id,
            status: ExecutionStatus::Pending,
            trigger_data,
            result_data: None,
            error_message: None,
            triggered_by,
            parent_execution: None,
            version: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    #[must_use]
    pub fn with_parent(mut self, parent: ExecutionId) -> Self {
        self.parent_execution = Some(parent);
        self
    }

    #[must_use]
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    fn transition(&mut self, next: ExecutionStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Mark the run as started.
    pub fn begin(&mut self) -> Result<(), InvalidTransition> {
        self.transition(ExecutionStatus::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Finish successfully with the final node's output.
    pub fn complete(&mut self, result_data: Value) -> Result<(), InvalidTransition> {
        self.transition(ExecutionStatus::Completed)?;
        self.result_data = Some(result_data);
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Finish with an error.
    pub fn fail(&mut self, error_message: impl Into<String>) -> Result<(), InvalidTransition> {
        self.transition(ExecutionStatus::Failed)?;
        self.error_message = Some(error_message.into());
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Finish because the run was cancelled.
    pub fn cancel(&mut self) -> Result<(), InvalidTransition> {
        self.transition(ExecutionStatus::Cancelled)?;
        self.finished_at = Some(Utc::now());
        Ok(())
    }
}

/// Outcome of one node invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRunStatus {
    Success,
    Error,
    Skipped,
    Waiting,
}

impl fmt::Display for NodeRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
            Self::Skipped => write!(f, "skipped"),
            Self::Waiting => write!(f, "waiting"),
        }
    }
}

/// One row of the per-node audit trail.
///
/// `input_data` snapshots the variable map as the node saw it on entry;
/// `output_data` is the handler's output map. Rows are append-only and
/// ordered by `started_at`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeExecutionLog {
    pub execution_id: ExecutionId,
    pub node_id: String,
    pub node_type: NodeType,
    pub status: NodeRunStatus,
    pub input_data: Value,
    pub output_data: OutputMap,
    pub error_details: Option<String>,
    pub effect: Effect,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
}

impl NodeExecutionLog {
    /// Output map rendered as a JSON object with stable key order.
    #[must_use]
    pub fn output_json(&self) -> Value {
        let mut keys: Vec<&String> = self.output_data.keys().collect();
        keys.sort();
        let mut map = serde_json::Map::new();
        for key in keys {
            if let Some(value) = self.output_data.get(key) {
                map.insert(key.clone(), value.clone());
            }
        }
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pending_runs_to_completed() {
        let mut run = Execution::new(Uuid::new_v4(), json!({"k": 1}), TriggerSource::Manual);
        assert_eq!(run.status, ExecutionStatus::Pending);
        run.begin().unwrap();
        assert_eq!(run.status, ExecutionStatus::Running);
        assert!(run.started_at.is_some());
        run.complete(json!({"done": true})).unwrap();
        assert_eq!(run.status, ExecutionStatus::Completed);
        assert!(run.finished_at.is_some());
    }

    #[test]
    fn cannot_fail_before_running() {
        let mut run = Execution::new(Uuid::new_v4(), Value::Null, TriggerSource::Api);
        let err = run.fail("boom").unwrap_err();
        assert_eq!(err.from, ExecutionStatus::Pending);
        assert_eq!(err.to, ExecutionStatus::Failed);
        assert_eq!(run.status, ExecutionStatus::Pending);
        assert!(run.error_message.is_none());
    }

    #[test]
    fn terminal_states_are_final() {
        let mut run = Execution::new(Uuid::new_v4(), Value::Null, TriggerSource::Webhook);
        run.begin().unwrap();
        run.cancel().unwrap();
        assert!(run.begin().is_err());
        assert!(run.complete(Value::Null).is_err());
        assert!(run.fail("late").is_err());
        assert_eq!(run.status, ExecutionStatus::Cancelled);
    }

    #[test]
    fn output_json_orders_keys() {
        let mut output = OutputMap::default();
        output.insert("zeta".to_string(), json!(1));
        output.insert("alpha".to_string(), json!(2));
        let log = NodeExecutionLog {
            execution_id: ExecutionId::new(),
            node_id: "n1".to_string(),
            node_type: NodeType::Dedupe,
            status: NodeRunStatus::Success,
            input_data: Value::Null,
            output_data: output,
            error_details: None,
            effect: Effect::Completed,
            duration_ms: 3,
            started_at: Utc::now(),
        };
        let rendered = serde_json::to_string(&log.output_json()).unwrap();
        assert_eq!(rendered, r#"{"alpha":2,"zeta":1}"#);
    }
}
