#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use flowloom::event_bus::{EventBus, MemorySink};
use flowloom::handler::NodeHandler;
use flowloom::handlers::{Collaborators, InMemoryCrm, InMemoryDedupOracle, InMemoryTaskQueue};
use flowloom::model::{Edge, Node, NodeType, Workflow, WorkflowGraph};
use flowloom::registry::HandlerRegistry;
use flowloom::runtime::{
    BlockingPool, Engine, EngineConfig, Execution, ExecutionId, ExecutionStore,
    InMemoryExecutionStore, InMemoryWorkflowStore, NodeExecutionLog, WorkflowStore,
};
use serde_json::Value;
use uuid::Uuid;

/// Engine wired against in-memory everything, with handles to each
/// collaborator so tests can inspect side effects directly.
pub struct TestHarness {
    pub engine: Engine,
    pub workflows: Arc<InMemoryWorkflowStore>,
    pub executions: Arc<InMemoryExecutionStore>,
    pub oracle: Arc<InMemoryDedupOracle>,
    pub crm: Arc<InMemoryCrm>,
    pub queue: Arc<InMemoryTaskQueue>,
    pub sink: MemorySink,
}

pub fn harness() -> TestHarness {
    harness_with(EngineConfig::default(), Vec::new())
}

pub fn harness_with(config: EngineConfig, extra: Vec<Arc<dyn NodeHandler>>) -> TestHarness {
    let oracle = Arc::new(InMemoryDedupOracle::default());
    let crm = Arc::new(InMemoryCrm::default());
    let queue = Arc::new(InMemoryTaskQueue::default());
    let collaborators = Collaborators {
        dedup: oracle.clone(),
        crm: crm.clone(),
        tasks: queue.clone(),
        blocking: BlockingPool::new(config.blocking_pool_size),
    };
    let mut registry = HandlerRegistry::builtin(&collaborators).expect("builtin registry");
    for handler in extra {
        registry.register(handler).expect("register test handler");
    }

    let sink = MemorySink::new();
    let event_bus = Arc::new(EventBus::with_sink(sink.clone()));

    let workflows = Arc::new(InMemoryWorkflowStore::new());
    let executions = Arc::new(InMemoryExecutionStore::new());
    let engine = Engine::new(
        registry,
        workflows.clone(),
        executions.clone(),
        config,
        event_bus,
    );

    TestHarness {
        engine,
        workflows,
        executions,
        oracle,
        crm,
        queue,
        sink,
    }
}

impl TestHarness {
    /// Store a workflow wrapping `graph` and return its id.
    pub async fn add_workflow(&self, graph: WorkflowGraph) -> Uuid {
        let workflow = Workflow::new("test-workflow", "tests@example.com", graph);
        let id = workflow.id;
        self.workflows
            .upsert_workflow(workflow)
            .await
            .expect("store workflow");
        id
    }

    pub async fn logs(&self, execution_id: ExecutionId) -> Vec<NodeExecutionLog> {
        self.executions
            .logs_for_execution(execution_id)
            .await
            .expect("fetch logs")
    }

    /// Poll the store until the execution reaches a terminal status.
    pub async fn wait_for_terminal(&self, execution_id: ExecutionId) -> Execution {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let execution = self
                .executions
                .get_execution(execution_id)
                .await
                .expect("fetch execution");
            if execution.status.is_terminal() {
                return execution;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "execution {execution_id} did not reach a terminal status in time"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

/// lead_trigger -> dedupe on `{{phone}}` -> crm_push, wired on `"new"`.
pub fn lead_intake_graph() -> WorkflowGraph {
    WorkflowGraph::new(
        vec![
            Node::new("lead", NodeType::LeadTrigger),
            Node::new("dedupe", NodeType::Dedupe)
                .with_config_entry("field", Value::String("{{phone}}".into())),
            Node::new("push", NodeType::CrmPush),
        ],
        vec![
            Edge::new("e1", "lead", "dedupe"),
            Edge::new("e2", "dedupe", "push").with_source_handle("new"),
        ],
    )
}

/// webhook_trigger -> `node`, nothing else.
pub fn single_node_graph(node: Node) -> WorkflowGraph {
    let target = node.id.clone();
    WorkflowGraph::new(
        vec![Node::new("start", NodeType::WebhookTrigger), node],
        vec![Edge::new("e1", "start", target)],
    )
}
