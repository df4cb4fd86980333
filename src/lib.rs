//! # Flowloom: Node-Graph Workflow Automation Engine
//!
//! Flowloom executes user-authored automation workflows: directed graphs of
//! typed nodes where a trigger node starts a run, each node's handler does
//! one unit of work, and the chosen outgoing edge decides what runs next.
//! Every run leaves a complete per-node audit trail.
//!
//! ## Core Concepts
//!
//! - **Workflow**: A named, versioned graph of nodes and edges
//! - **Handler**: Async unit of work claiming one or more node types
//! - **Registry**: Maps node-type strings to handler instances
//! - **Context**: Per-run blackboard with `{{variable}}` templating
//! - **Validator**: Structural linter run before a graph is published
//! - **Engine**: Drives one node at a time and records the audit trail
//!
//! ## Quick Start
//!
//! ### Defining a Custom Handler
//!
//! Handlers implement [`handler::NodeHandler`] and claim their node types;
//! anything beyond the built-ins hangs off [`model::NodeType::Custom`]:
//!
//! ```
//! use async_trait::async_trait;
//! use flowloom::context::ExecutionContext;
//! use flowloom::handler::{NodeHandler, NodeResult};
//! use flowloom::model::{Node, NodeType};
//! use serde_json::json;
//!
//! struct WelcomeNode;
//!
//! #[async_trait]
//! impl NodeHandler for WelcomeNode {
//!     fn node_types(&self) -> Vec<NodeType> {
//!         vec![NodeType::Custom("welcome".into())]
//!     }
//!
//!     async fn execute(&self, _node: &Node, ctx: &mut ExecutionContext) -> NodeResult {
//!         let greeting = format!("Welcome, {}!", ctx.resolve_template("{{name}}"));
//!         NodeResult::ok().with_entry("greeting", json!(greeting))
//!     }
//! }
//! ```
//!
//! ### Assembling and Validating a Workflow
//!
//! ```
//! use flowloom::handlers::Collaborators;
//! use flowloom::model::{Edge, Node, NodeType, WorkflowGraph};
//! use flowloom::registry::HandlerRegistry;
//! use flowloom::runtime::EngineConfig;
//! use flowloom::validator::validate_graph;
//!
//! let config = EngineConfig::default();
//! let registry = HandlerRegistry::builtin(&Collaborators::in_memory(&config))?;
//!
//! let graph = WorkflowGraph::new(
//!     vec![
//!         Node::new("lead", NodeType::LeadTrigger),
//!         Node::new("dedupe", NodeType::Dedupe)
//!             .with_config_entry("field", "{{phone}}".into()),
//!     ],
//!     vec![Edge::new("e1", "lead", "dedupe")],
//! );
//!
//! // Empty error list means the graph is publishable.
//! assert!(validate_graph(&graph, &registry).is_empty());
//! # Ok::<(), flowloom::registry::RegistryError>(())
//! ```
//!
//! ### Running a Workflow
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use flowloom::event_bus::EventBus;
//! use flowloom::handlers::Collaborators;
//! use flowloom::model::{Edge, Node, NodeType, Workflow, WorkflowGraph};
//! use flowloom::registry::HandlerRegistry;
//! use flowloom::runtime::{
//!     Engine, EngineConfig, InMemoryExecutionStore, InMemoryWorkflowStore, TriggerSource,
//!     WorkflowStore,
//! };
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> miette::Result<()> {
//!     flowloom::telemetry::init();
//!
//!     let config = EngineConfig::from_env();
//!     let registry = HandlerRegistry::builtin(&Collaborators::in_memory(&config))?;
//!
//!     let graph = WorkflowGraph::new(
//!         vec![
//!             Node::new("lead", NodeType::LeadTrigger),
//!             Node::new("dedupe", NodeType::Dedupe)
//!                 .with_config_entry("field", "{{phone}}".into()),
//!         ],
//!         vec![Edge::new("e1", "lead", "dedupe")],
//!     );
//!     let workflow = Workflow::new("lead-intake", "ops@example.com", graph);
//!     let workflow_id = workflow.id;
//!
//!     let workflows = Arc::new(InMemoryWorkflowStore::new());
//!     workflows.upsert_workflow(workflow).await?;
//!
//!     let engine = Engine::new(
//!         registry,
//!         workflows,
//!         Arc::new(InMemoryExecutionStore::new()),
//!         config,
//!         Arc::new(EventBus::default()),
//!     );
//!
//!     let execution = engine
//!         .run_execution(
//!             workflow_id,
//!             json!({"name": "Ana", "phone": "+5511999990000"}),
//!             TriggerSource::Webhook,
//!         )
//!         .await?;
//!     println!("finished: {}", execution.status);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Guide
//!
//! - [`model`] - Workflows, nodes, edges, variables, and version snapshots
//! - [`handler`] - The [`NodeHandler`](handler::NodeHandler) contract and [`NodeResult`](handler::NodeResult)
//! - [`handlers`] - Built-in handlers and their collaborator seams
//! - [`registry`] - Node-type to handler resolution
//! - [`context`] - Per-run execution context and variable blackboard
//! - [`template`] - `{{variable}}` / `{{$trigger.path}}` resolution
//! - [`validator`] - Pre-publish structural graph checks
//! - [`runtime`] - Engine, executions, audit logs, stores, scheduling
//! - [`event_bus`] - Structured run observability
//! - [`telemetry`] - Tracing setup and event formatting

pub mod context;
pub mod event_bus;
pub mod handler;
pub mod handlers;
pub mod model;
pub mod registry;
pub mod runtime;
pub mod telemetry;
pub mod template;
pub mod validator;
