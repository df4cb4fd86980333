//! Per-run execution context: the blackboard every handler reads and writes.
//!
//! One [`ExecutionContext`] exists per execution and is exclusively owned by
//! it; handlers receive `&mut` access while they run and never see another
//! run's context. Variables are deliberately un-namespaced so later nodes see
//! earlier nodes' writes (the graph is authored expecting that).

use miette::Diagnostic;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::event_bus::Event;
use crate::model::Variable;
use crate::runtime::ExecutionId;
use crate::template;
use uuid::Uuid;

/// Insertion-ordered map of run variables.
///
/// Iteration follows first-insertion order; JSON snapshots render with
/// sorted keys, so audit output is stable across runs of the same graph.
#[derive(Clone, Debug, Default)]
pub struct VariableMap {
    entries: FxHashMap<String, Variable>,
    order: Vec<String>,
}

impl VariableMap {
    /// Seed a map from workflow-scoped variables.
    pub fn seeded(variables: &[Variable]) -> Self {
        let mut map = Self::default();
        for variable in variables {
            map.insert(variable.clone());
        }
        map
    }

    /// Set a user variable, detecting its kind from the value.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.insert(Variable::new(name, value));
    }

    /// Set an engine-populated variable.
    pub fn set_system(&mut self, name: impl Into<String>, value: Value) {
        self.insert(Variable::system(name, value));
    }

    fn insert(&mut self, variable: Variable) {
        if !self.entries.contains_key(&variable.name) {
            self.order.push(variable.name.clone());
        }
        self.entries.insert(variable.name.clone(), variable);
    }

    /// Look up a variable by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.entries.get(name)
    }

    /// The variable's value, or `default` when absent.
    #[must_use]
    pub fn get_or<'a>(&'a self, name: &str, default: &'a Value) -> &'a Value {
        self.get(name).map_or(default, |v| &v.value)
    }

    /// Variables in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.order.iter().filter_map(|name| self.entries.get(name))
    }

    /// Name→value JSON object for audit snapshots.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        for variable in self.iter() {
            out.insert(variable.name.clone(), variable.value.clone());
        }
        Value::Object(out)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Errors that can occur when using ExecutionContext methods.
#[derive(Debug, Error, Diagnostic)]
pub enum ContextError {
    /// Event could not be sent because the event bus is gone.
    #[error("failed to emit event: event bus unavailable")]
    #[diagnostic(
        code(flowloom::context::event_bus_unavailable),
        help("The event bus may have been dropped. Check the engine's lifecycle.")
    )]
    EventBusUnavailable,
}

/// Mutable per-run state handed to node handlers.
///
/// Carries the immutable trigger payload, the shared variable blackboard,
/// the in-run dedup set, and the event emitter. The engine updates the
/// current node id and step between invocations so emitted events and dedup
/// keys stay attributable.
#[derive(Debug)]
pub struct ExecutionContext {
    execution_id: ExecutionId,
    workflow_id: Uuid,
    trigger_data: Value,
    variables: VariableMap,
    seen: FxHashSet<String>,
    node_id: String,
    step: u64,
    event_tx: flume::Sender<Event>,
    cancellation: CancellationToken,
}

impl ExecutionContext {
    /// Build the context for one run.
    ///
    /// `seed` carries the workflow-scoped variables that pre-populate the
    /// blackboard.
    pub fn new(
        execution_id: ExecutionId,
        workflow_id: Uuid,
        trigger_data: Value,
        seed: &[Variable],
        event_tx: flume::Sender<Event>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            execution_id,
            workflow_id,
            trigger_data,
            variables: VariableMap::seeded(seed),
            seen: FxHashSet::default(),
            node_id: String::new(),
            step: 0,
            event_tx,
            cancellation,
        }
    }

    #[must_use]
    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    #[must_use]
    pub fn workflow_id(&self) -> Uuid {
        self.workflow_id
    }

    /// The payload that started this run. Immutable for the run's lifetime.
    #[must_use]
    pub fn trigger_data(&self) -> &Value {
        &self.trigger_data
    }

    /// Read access to the blackboard.
    #[must_use]
    pub fn variables(&self) -> &VariableMap {
        &self.variables
    }

    /// Look up a variable by name.
    #[must_use]
    pub fn get_variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    /// The variable's value, or `default` when absent.
    #[must_use]
    pub fn get_variable_or<'a>(&'a self, name: &str, default: &'a Value) -> &'a Value {
        self.variables.get_or(name, default)
    }

    /// Write a user variable to the blackboard.
    pub fn set_variable(&mut self, name: impl Into<String>, value: Value) {
        self.variables.set(name, value);
    }

    /// Write an engine-populated variable to the blackboard.
    pub fn set_system_variable(&mut self, name: impl Into<String>, value: Value) {
        self.variables.set_system(name, value);
    }

    /// Record `key` in the in-run dedup set.
    ///
    /// Returns `true` the first time a key is seen within this run; repeat
    /// calls return `false` so dedup handlers can short-circuit without a
    /// second oracle round-trip.
    pub fn mark_seen(&mut self, key: impl Into<String>) -> bool {
        self.seen.insert(key.into())
    }

    /// Resolve `{{variable}}` / `{{$trigger.path}}` placeholders in `input`.
    ///
    /// Unresolved placeholders render as the empty string.
    #[must_use]
    pub fn resolve_template(&self, input: &str) -> String {
        template::resolve_str(input, &self.variables, &self.trigger_data)
    }

    /// Resolve every string leaf of a JSON value, preserving structure.
    #[must_use]
    pub fn resolve_value(&self, value: &Value) -> Value {
        template::resolve_value(value, &self.variables, &self.trigger_data)
    }

    /// Resolve every string leaf of a field-mapping object.
    #[must_use]
    pub fn resolve_map(&self, map: &Map<String, Value>) -> Map<String, Value> {
        template::resolve_map(map, &self.variables, &self.trigger_data)
    }

    /// Emit a node-scoped event enriched with this run's metadata.
    pub fn emit(
        &self,
        scope: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<(), ContextError> {
        self.event_tx
            .send(Event::node_message(
                self.execution_id,
                self.node_id.clone(),
                self.step,
                scope,
                message,
            ))
            .map_err(|_| ContextError::EventBusUnavailable)
    }

    /// True once cancellation has been requested for this run.
    ///
    /// The engine honors cancellation between nodes; long-running handlers
    /// may poll this to bail out early.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Point the context at the node about to run. Engine-internal.
    pub(crate) fn enter_node(&mut self, node_id: impl Into<String>, step: u64) {
        self.node_id = node_id.into();
        self.step = step;
    }
}
