//! The traversal engine.
//!
//! One run follows a single logical path: enter at the graph's first trigger
//! node, invoke the resolved handler for each node under the configured
//! timeout, append an audit log row, then follow the outgoing edge whose
//! `source_handle` matches the handle the handler returned. A node with no
//! matching outgoing edge ends the path and completes the run.
//!
//! The engine owns run bookkeeping only; node behavior lives behind
//! [`NodeHandler`](crate::handler::NodeHandler) implementations resolved
//! through the [`HandlerRegistry`].

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use miette::Diagnostic;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{Value, json};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use uuid::Uuid;

use crate::context::ExecutionContext;
use crate::event_bus::{Event, EventBus, EventStream};
use crate::handler::{Effect, NodeResult, OutputMap};
use crate::model::{DEFAULT_HANDLE, ERROR_HANDLE, Node, NodeType, Workflow};
use crate::registry::HandlerRegistry;

use super::config::EngineConfig;
use super::execution::{
    Execution, ExecutionId, ExecutionStatus, InvalidTransition, NodeExecutionLog, NodeRunStatus,
    TriggerSource,
};
use super::store::{ExecutionStore, StoreError, WorkflowStore};

/// Infrastructure failure while driving a run.
///
/// Run-level problems (missing trigger, handler error without an error
/// branch, timeout) do not surface here; they terminate the [`Execution`]
/// record as `failed` and the driver still returns `Ok`.
#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error(transparent)]
    #[diagnostic(code(flowloom::engine::store))]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(code(flowloom::engine::transition))]
    Transition(#[from] InvalidTransition),
}

/// How a walk over the graph ended.
enum RunOutcome {
    Completed(Value),
    Failed(String),
    Cancelled,
}

/// Drives workflow executions.
///
/// Cheap to clone; all state is behind `Arc`s, so one engine can serve
/// spawned background runs and inline runs concurrently.
#[derive(Clone)]
pub struct Engine {
    registry: Arc<HandlerRegistry>,
    workflows: Arc<dyn WorkflowStore>,
    executions: Arc<dyn ExecutionStore>,
    config: EngineConfig,
    event_bus: Arc<EventBus>,
    event_tx: flume::Sender<Event>,
    cancellations: Arc<Mutex<FxHashMap<ExecutionId, CancellationToken>>>,
}

impl Engine {
    /// Wire an engine together and start the event bus listener.
    pub fn new(
        registry: HandlerRegistry,
        workflows: Arc<dyn WorkflowStore>,
        executions: Arc<dyn ExecutionStore>,
        config: EngineConfig,
        event_bus: Arc<EventBus>,
    ) -> Self {
        event_bus.listen_for_events();
        let event_tx = event_bus.get_sender();
        Self {
            registry: Arc::new(registry),
            workflows,
            executions,
            config,
            event_bus,
            event_tx,
            cancellations: Arc::new(Mutex::new(FxHashMap::default())),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Subscribe to the live event feed of all runs on this engine.
    pub fn subscribe(&self) -> EventStream {
        self.event_bus.subscribe()
    }

    /// Create a pending execution and drive it in the background.
    ///
    /// Returns as soon as the record exists; progress is observable through
    /// the event bus and the execution store.
    #[instrument(skip(self, payload), err)]
    pub async fn start_execution(
        &self,
        workflow_id: Uuid,
        payload: Value,
        triggered_by: TriggerSource,
    ) -> Result<ExecutionId, EngineError> {
        let workflow = self.workflows.get_workflow(workflow_id).await?;
        let execution = self.prepare_execution(&workflow, payload, triggered_by, None).await?;
        let execution_id = execution.id;
        let engine = self.clone();
        tokio::spawn(async move {
            if let Err(err) = engine
                .drive(workflow, execution, CancellationToken::new(), 0)
                .await
            {
                tracing::error!(execution = %execution_id, error = %err, "execution driver failed");
            }
        });
        Ok(execution_id)
    }

    /// Drive a run inline and return its terminal record.
    #[instrument(skip(self, payload), err)]
    pub async fn run_execution(
        &self,
        workflow_id: Uuid,
        payload: Value,
        triggered_by: TriggerSource,
    ) -> Result<Execution, EngineError> {
        let workflow = self.workflows.get_workflow(workflow_id).await?;
        let execution = self.prepare_execution(&workflow, payload, triggered_by, None).await?;
        self.drive(workflow, execution, CancellationToken::new(), 0).await
    }

    /// Request cooperative cancellation of a run.
    ///
    /// Returns `false` when the run is unknown or already finished. The run
    /// observes the request between nodes; the node currently executing
    /// finishes first.
    pub fn cancel(&self, execution_id: ExecutionId) -> bool {
        let cancellations = self.cancellations.lock();
        match cancellations.get(&execution_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    async fn prepare_execution(
        &self,
        workflow: &Workflow,
        payload: Value,
        triggered_by: TriggerSource,
        parent: Option<ExecutionId>,
    ) -> Result<Execution, EngineError> {
        let mut execution = Execution::new(workflow.id, payload, triggered_by);
        if let Some(parent) = parent {
            execution = execution.with_parent(parent);
        }
        if let Some(version) = self.workflows.latest_version(workflow.id).await? {
            execution = execution.with_version(version.number);
        }
        self.executions.insert_execution(&execution).await?;
        Ok(execution)
    }

    /// Run one execution to its terminal state and persist every step.
    #[instrument(
        skip_all,
        fields(execution = %execution.id, workflow = %workflow.id, depth),
        err
    )]
    async fn drive(
        &self,
        workflow: Workflow,
        mut execution: Execution,
        cancellation: CancellationToken,
        depth: u32,
    ) -> Result<Execution, EngineError> {
        self.cancellations
            .lock()
            .insert(execution.id, cancellation.clone());
        let result = self
            .traverse(&workflow, &mut execution, cancellation, depth)
            .await;
        self.cancellations.lock().remove(&execution.id);
        result?;
        Ok(execution)
    }

    async fn traverse(
        &self,
        workflow: &Workflow,
        execution: &mut Execution,
        cancellation: CancellationToken,
        depth: u32,
    ) -> Result<(), EngineError> {
        execution.begin()?;
        self.executions.update_execution(execution).await?;
        self.emit(Event::execution_started(execution.id, execution.workflow_id));
        tracing::info!(triggered_by = %execution.triggered_by, "execution started");

        let mut ctx = ExecutionContext::new(
            execution.id,
            workflow.id,
            execution.trigger_data.clone(),
            &workflow.variables,
            self.event_tx.clone(),
            cancellation.clone(),
        );

        let outcome = match self
            .walk(workflow, execution, &mut ctx, &cancellation, depth)
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(error = %err, "run aborted by infrastructure error");
                RunOutcome::Failed(format!("internal error: {err}"))
            }
        };

        match outcome {
            RunOutcome::Completed(result_data) => execution.complete(result_data)?,
            RunOutcome::Failed(message) => {
                tracing::warn!(error = %message, "execution failed");
                execution.fail(message)?;
            }
            RunOutcome::Cancelled => execution.cancel()?,
        }
        self.executions.update_execution(execution).await?;
        self.emit(Event::execution_finished(
            execution.id,
            execution.workflow_id,
            execution.status.to_string(),
        ));
        tracing::info!(status = %execution.status, "execution finished");
        Ok(())
    }

    /// Walk the graph from the entry trigger until the path ends.
    async fn walk(
        &self,
        workflow: &Workflow,
        execution: &Execution,
        ctx: &mut ExecutionContext,
        cancellation: &CancellationToken,
        depth: u32,
    ) -> Result<RunOutcome, EngineError> {
        let graph = &workflow.graph;
        let Some(trigger) = graph.entry_trigger() else {
            return Ok(RunOutcome::Failed("workflow has no trigger node".to_string()));
        };

        // The trigger seeds the context from its payload; its outcome lives
        // on the execution record itself, not in a log row.
        ctx.enter_node(&trigger.id, 0);
        let Some(result) = self.invoke_handler(trigger, ctx).await else {
            tracing::error!(node = %trigger.id, node_type = %trigger.node_type, "no handler registered for node type");
            return Ok(RunOutcome::Failed(format!(
                "unknown node type '{}' on node '{}'",
                trigger.node_type, trigger.id
            )));
        };
        if let Some(error) = &result.error {
            return Ok(RunOutcome::Failed(format!(
                "trigger '{}' failed: {error}",
                trigger.id
            )));
        }

        let mut last_output = result.output_json();
        let first_handle = result.handle.as_deref().unwrap_or(DEFAULT_HANDLE);
        let Some(mut current) = graph.follow(&trigger.id, first_handle) else {
            return Ok(RunOutcome::Completed(last_output));
        };

        let mut step: u64 = 0;
        loop {
            step += 1;
            if step > self.config.max_steps {
                return Ok(RunOutcome::Failed(format!(
                    "step limit {} exceeded at node '{}'",
                    self.config.max_steps, current.id
                )));
            }
            if ctx.is_cancelled() {
                self.append_log(
                    execution,
                    current,
                    NodeRunStatus::Skipped,
                    ctx.variables().to_json(),
                    OutputMap::default(),
                    Some("execution cancelled".to_string()),
                    Effect::Completed,
                    0,
                    Utc::now(),
                )
                .await?;
                return Ok(RunOutcome::Cancelled);
            }

            ctx.enter_node(&current.id, step);
            self.emit(Event::node_started(execution.id, &current.id, step));
            let input_data = ctx.variables().to_json();
            let started_at = Utc::now();
            let timer = Instant::now();

            let invoked = if current.node_type == NodeType::SubWorkflow {
                Some(
                    self.run_sub_workflow(current, execution, ctx, cancellation, depth)
                        .await?,
                )
            } else {
                self.invoke_handler(current, ctx).await
            };

            let Some(result) = invoked else {
                tracing::error!(node = %current.id, node_type = %current.node_type, "no handler registered for node type");
                let message = format!(
                    "unknown node type '{}' on node '{}'",
                    current.node_type, current.id
                );
                self.append_log(
                    execution,
                    current,
                    NodeRunStatus::Error,
                    input_data,
                    OutputMap::default(),
                    Some(message.clone()),
                    Effect::Completed,
                    duration_ms(&timer),
                    started_at,
                )
                .await?;
                self.emit(Event::node_finished(execution.id, &current.id, step, "error"));
                return Ok(RunOutcome::Failed(message));
            };

            let status = if result.error.is_some() {
                NodeRunStatus::Error
            } else {
                NodeRunStatus::Success
            };
            self.append_log(
                execution,
                current,
                status,
                input_data,
                result.output.clone(),
                result.error.clone(),
                result.effect.clone(),
                duration_ms(&timer),
                started_at,
            )
            .await?;
            self.emit(Event::node_finished(
                execution.id,
                &current.id,
                step,
                status.to_string(),
            ));

            match &result.error {
                None => {
                    last_output = result.output_json();
                    let handle = result.handle.as_deref().unwrap_or(DEFAULT_HANDLE);
                    match graph.follow(&current.id, handle) {
                        Some(next) => current = next,
                        None => return Ok(RunOutcome::Completed(last_output)),
                    }
                }
                Some(error) => {
                    let handle = result.handle.as_deref().unwrap_or(ERROR_HANDLE);
                    match graph.follow(&current.id, handle) {
                        Some(next) => {
                            tracing::warn!(
                                node = %current.id,
                                handle,
                                error = %error,
                                "node failed, continuing on routed branch"
                            );
                            current = next;
                        }
                        None => {
                            return Ok(RunOutcome::Failed(format!(
                                "node '{}' failed: {error}",
                                current.id
                            )));
                        }
                    }
                }
            }
        }
    }

    /// Resolve, re-validate, and execute a node under the engine timeout.
    ///
    /// `None` means no handler claims the node type.
    async fn invoke_handler(
        &self,
        node: &Node,
        ctx: &mut ExecutionContext,
    ) -> Option<NodeResult> {
        let handler = self.registry.resolve(&node.node_type)?;
        if let Some(message) = handler.validate(node) {
            return Some(NodeResult::err(message));
        }
        Some(
            match tokio::time::timeout(self.config.node_timeout, handler.execute(node, ctx)).await
            {
                Ok(result) => result,
                Err(_) => NodeResult::err(format!(
                    "node '{}' timed out after {}s",
                    node.id,
                    self.config.node_timeout.as_secs()
                )),
            },
        )
    }

    /// Dispatch a sub-workflow node: spawn a child execution and reflect its
    /// terminal status as this node's result.
    ///
    /// The child shares the parent's cancellation lineage (cancelling the
    /// parent cancels the child, not vice versa) and inherits `triggered_by`.
    async fn run_sub_workflow(
        &self,
        node: &Node,
        parent: &Execution,
        ctx: &mut ExecutionContext,
        cancellation: &CancellationToken,
        depth: u32,
    ) -> Result<NodeResult, EngineError> {
        if depth >= self.config.max_sub_workflow_depth {
            return Ok(NodeResult::err(format!(
                "sub-workflow depth limit {} reached",
                self.config.max_sub_workflow_depth
            )));
        }

        let Some(raw_id) = node.config_str("workflow_id") else {
            return Ok(NodeResult::err(
                "sub-workflow node is missing 'workflow_id' in config",
            ));
        };
        let resolved_id = ctx.resolve_template(raw_id);
        let Ok(child_workflow_id) = resolved_id.parse::<Uuid>() else {
            return Ok(NodeResult::err(format!(
                "sub-workflow 'workflow_id' is not a valid uuid: '{resolved_id}'"
            )));
        };

        let child_workflow = match self.workflows.get_workflow(child_workflow_id).await {
            Ok(workflow) => workflow,
            Err(err) => return Ok(NodeResult::err(err.to_string())),
        };

        let payload = match node.config.get("payload") {
            Some(template) => ctx.resolve_value(template),
            None => ctx.trigger_data().clone(),
        };

        let child = self
            .prepare_execution(&child_workflow, payload, parent.triggered_by, Some(parent.id))
            .await?;
        let child_id = child.id;
        tracing::info!(child = %child_id, workflow = %child_workflow_id, "sub-workflow dispatched");

        let child = Box::pin(self.drive(
            child_workflow,
            child,
            cancellation.child_token(),
            depth + 1,
        ))
        .await?;

        let result = match child.status {
            ExecutionStatus::Completed => NodeResult::ok().with_entry(
                "result",
                child.result_data.clone().unwrap_or(Value::Null),
            ),
            ExecutionStatus::Failed => NodeResult::err(
                child
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "sub-workflow failed".to_string()),
            ),
            ExecutionStatus::Cancelled => NodeResult::err("sub-workflow cancelled"),
            ExecutionStatus::Pending | ExecutionStatus::Running => {
                NodeResult::err("sub-workflow did not reach a terminal state")
            }
        };
        Ok(result
            .with_entry("execution_id", json!(child_id))
            .with_entry("status", json!(child.status.to_string())))
    }

    #[allow(clippy::too_many_arguments)]
    async fn append_log(
        &self,
        execution: &Execution,
        node: &Node,
        status: NodeRunStatus,
        input_data: Value,
        output_data: OutputMap,
        error_details: Option<String>,
        effect: Effect,
        duration_ms: u64,
        started_at: chrono::DateTime<Utc>,
    ) -> Result<(), EngineError> {
        self.executions
            .append_log(NodeExecutionLog {
                execution_id: execution.id,
                node_id: node.id.clone(),
                node_type: node.node_type.clone(),
                status,
                input_data,
                output_data,
                error_details,
                effect,
                duration_ms,
                started_at,
            })
            .await?;
        Ok(())
    }

    fn emit(&self, event: Event) {
        if self.event_tx.send(event).is_err() {
            tracing::trace!("event bus closed; dropping event");
        }
    }
}

fn duration_ms(timer: &Instant) -> u64 {
    u64::try_from(timer.elapsed().as_millis()).unwrap_or(u64::MAX)
}
