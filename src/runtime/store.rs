//! Persistence seams for workflows and executions.
//!
//! Both traits are async and object-safe so the engine can be wired to any
//! backend; the in-memory implementations here back tests and single-process
//! deployments. Two rules are enforced at the store boundary regardless of
//! backend: execution records in a terminal state refuse further updates,
//! and publish refuses a graph the validator rejects.

use async_trait::async_trait;
use chrono::Utc;
use miette::Diagnostic;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::model::{Workflow, WorkflowVersion};
use crate::registry::HandlerRegistry;
use crate::validator::validate_graph;

use super::execution::{Execution, ExecutionId, ExecutionStatus, NodeExecutionLog};

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("workflow not found: {workflow_id}")]
    #[diagnostic(code(flowloom::store::workflow_not_found))]
    WorkflowNotFound { workflow_id: Uuid },

    #[error("execution not found: {execution_id}")]
    #[diagnostic(code(flowloom::store::execution_not_found))]
    ExecutionNotFound { execution_id: ExecutionId },

    #[error("execution {execution_id} is {status}; terminal records are immutable")]
    #[diagnostic(
        code(flowloom::store::terminal_execution),
        help("Start a new execution instead of rewriting a finished one.")
    )]
    TerminalExecution {
        execution_id: ExecutionId,
        status: ExecutionStatus,
    },

    #[error("workflow {workflow_id} failed validation with {} error(s)", errors.len())]
    #[diagnostic(
        code(flowloom::store::validation_failed),
        help("Fix every reported graph error, then publish again.")
    )]
    ValidationFailed {
        workflow_id: Uuid,
        errors: Vec<String>,
    },

    #[error("storage backend error: {0}")]
    #[diagnostic(code(flowloom::store::backend))]
    Backend(String),
}

/// Append-only audit storage for runs and their per-node logs.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn insert_execution(&self, execution: &Execution) -> Result<(), StoreError>;

    /// Persist a mutated execution record.
    ///
    /// Refused once the stored record is terminal.
    async fn update_execution(&self, execution: &Execution) -> Result<(), StoreError>;

    async fn get_execution(&self, execution_id: ExecutionId) -> Result<Execution, StoreError>;

    async fn append_log(&self, log: NodeExecutionLog) -> Result<(), StoreError>;

    /// Logs of one execution in trace order.
    async fn logs_for_execution(
        &self,
        execution_id: ExecutionId,
    ) -> Result<Vec<NodeExecutionLog>, StoreError>;

    /// All executions of one workflow, oldest first.
    async fn executions_for_workflow(
        &self,
        workflow_id: Uuid,
    ) -> Result<Vec<Execution>, StoreError>;
}

/// Workflow definitions plus their immutable version history.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn get_workflow(&self, workflow_id: Uuid) -> Result<Workflow, StoreError>;

    async fn upsert_workflow(&self, workflow: Workflow) -> Result<(), StoreError>;

    /// Validate and publish a workflow.
    ///
    /// Runs the graph validator; any finding aborts with
    /// [`StoreError::ValidationFailed`] and the workflow is untouched.
    /// Otherwise cuts the next [`WorkflowVersion`] (tagged `"published"`),
    /// flips `is_published`, and returns the new version.
    async fn publish(
        &self,
        workflow_id: Uuid,
        registry: &HandlerRegistry,
    ) -> Result<WorkflowVersion, StoreError>;

    /// Version history, oldest first.
    async fn versions(&self, workflow_id: Uuid) -> Result<Vec<WorkflowVersion>, StoreError>;

    async fn latest_version(
        &self,
        workflow_id: Uuid,
    ) -> Result<Option<WorkflowVersion>, StoreError>;
}

#[derive(Default)]
struct ExecutionCells {
    executions: FxHashMap<ExecutionId, Execution>,
    order: Vec<ExecutionId>,
    logs: FxHashMap<ExecutionId, Vec<NodeExecutionLog>>,
}

/// Volatile execution store for tests and single-process runs.
#[derive(Default)]
pub struct InMemoryExecutionStore {
    cells: Mutex<ExecutionCells>,
}

impl InMemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn insert_execution(&self, execution: &Execution) -> Result<(), StoreError> {
        let mut cells = self.cells.lock();
        if !cells.executions.contains_key(&execution.id) {
            cells.order.push(execution.id);
        }
        cells.executions.insert(execution.id, execution.clone());
        Ok(())
    }

    async fn update_execution(&self, execution: &Execution) -> Result<(), StoreError> {
        let mut cells = self.cells.lock();
        let stored =
            cells
                .executions
                .get_mut(&execution.id)
                .ok_or(StoreError::ExecutionNotFound {
                    execution_id: execution.id,
                })?;
        if stored.status.is_terminal() {
            return Err(StoreError::TerminalExecution {
                execution_id: execution.id,
                status: stored.status,
            });
        }
        *stored = execution.clone();
        Ok(())
    }

    async fn get_execution(&self, execution_id: ExecutionId) -> Result<Execution, StoreError> {
        self.cells
            .lock()
            .executions
            .get(&execution_id)
            .cloned()
            .ok_or(StoreError::ExecutionNotFound { execution_id })
    }

    async fn append_log(&self, log: NodeExecutionLog) -> Result<(), StoreError> {
        let mut cells = self.cells.lock();
        cells.logs.entry(log.execution_id).or_default().push(log);
        Ok(())
    }

    async fn logs_for_execution(
        &self,
        execution_id: ExecutionId,
    ) -> Result<Vec<NodeExecutionLog>, StoreError> {
        Ok(self
            .cells
            .lock()
            .logs
            .get(&execution_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn executions_for_workflow(
        &self,
        workflow_id: Uuid,
    ) -> Result<Vec<Execution>, StoreError> {
        let cells = self.cells.lock();
        Ok(cells
            .order
            .iter()
            .filter_map(|id| cells.executions.get(id))
            .filter(|e| e.workflow_id == workflow_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
struct WorkflowCells {
    workflows: FxHashMap<Uuid, Workflow>,
    versions: FxHashMap<Uuid, Vec<WorkflowVersion>>,
}

/// Volatile workflow store for tests and single-process runs.
#[derive(Default)]
pub struct InMemoryWorkflowStore {
    cells: Mutex<WorkflowCells>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn get_workflow(&self, workflow_id: Uuid) -> Result<Workflow, StoreError> {
        self.cells
            .lock()
            .workflows
            .get(&workflow_id)
            .cloned()
            .ok_or(StoreError::WorkflowNotFound { workflow_id })
    }

    async fn upsert_workflow(&self, workflow: Workflow) -> Result<(), StoreError> {
        self.cells.lock().workflows.insert(workflow.id, workflow);
        Ok(())
    }

    async fn publish(
        &self,
        workflow_id: Uuid,
        registry: &HandlerRegistry,
    ) -> Result<WorkflowVersion, StoreError> {
        let mut guard = self.cells.lock();
        let cells = &mut *guard;
        let workflow = cells
            .workflows
            .get_mut(&workflow_id)
            .ok_or(StoreError::WorkflowNotFound { workflow_id })?;

        let errors = validate_graph(&workflow.graph, registry);
        if !errors.is_empty() {
            return Err(StoreError::ValidationFailed {
                workflow_id,
                errors,
            });
        }

        let history = cells.versions.entry(workflow_id).or_default();
        let number = history.last().map_or(1, |v| v.number + 1);
        let version = WorkflowVersion::snapshot(workflow_id, number, workflow.graph.clone())
            .with_tag("published");
        history.push(version.clone());
        workflow.is_published = true;
        workflow.updated_at = Utc::now();
        Ok(version)
    }

    async fn versions(&self, workflow_id: Uuid) -> Result<Vec<WorkflowVersion>, StoreError> {
        Ok(self
            .cells
            .lock()
            .versions
            .get(&workflow_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn latest_version(
        &self,
        workflow_id: Uuid,
    ) -> Result<Option<WorkflowVersion>, StoreError> {
        Ok(self
            .cells
            .lock()
            .versions
            .get(&workflow_id)
            .and_then(|history| history.last().cloned()))
    }
}
