mod common;
use common::*;

use std::sync::Arc;
use std::time::Duration;

use flowloom::event_bus::{EventBus, MemorySink};
use flowloom::handler::Effect;
use flowloom::handlers::{
    CrmClient, CrmPushHandler, DedupeHandler, LeadTriggerHandler, TriggerHandler,
};
use flowloom::model::{Edge, Node, NodeType, Workflow, WorkflowGraph};
use flowloom::registry::HandlerRegistry;
use flowloom::runtime::{
    Engine, EngineConfig, ExecutionStatus, ExecutionStore, InMemoryExecutionStore,
    InMemoryWorkflowStore, NodeRunStatus, TriggerSource, WorkflowStore,
};
use serde_json::{Map, Value, json};

fn obj(value: Value) -> Map<String, Value> {
    value.as_object().cloned().expect("object literal")
}

/// The harness always wires the in-memory oracle, so this one test builds
/// its own engine around an oracle that is permanently down.
#[tokio::test]
async fn dedupe_fails_open_when_the_oracle_is_unreachable() {
    let queue = Arc::new(flowloom::handlers::InMemoryTaskQueue::default());
    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(TriggerHandler)).unwrap();
    registry.register(Arc::new(LeadTriggerHandler)).unwrap();
    registry
        .register(Arc::new(DedupeHandler::new(Arc::new(UnreachableOracle))))
        .unwrap();
    registry
        .register(Arc::new(CrmPushHandler::new(queue.clone())))
        .unwrap();

    let sink = MemorySink::new();
    let workflows = Arc::new(InMemoryWorkflowStore::new());
    let executions = Arc::new(InMemoryExecutionStore::new());
    let engine = Engine::new(
        registry,
        workflows.clone(),
        executions.clone(),
        EngineConfig::default(),
        Arc::new(EventBus::with_sink(sink.clone())),
    );

    let workflow = Workflow::new("degraded-intake", "tests@example.com", lead_intake_graph());
    let workflow_id = workflow.id;
    workflows.upsert_workflow(workflow).await.unwrap();

    let execution = engine
        .run_execution(
            workflow_id,
            json!({"name": "Ana", "phone": "+5511999990000"}),
            TriggerSource::Webhook,
        )
        .await
        .unwrap();

    // Fail open: the value counts as new and the run keeps going.
    assert_status(&execution, ExecutionStatus::Completed);
    let logs = executions.logs_for_execution(execution.id).await.unwrap();
    assert_trace(
        &logs,
        &[
            ("dedupe", NodeRunStatus::Success),
            ("push", NodeRunStatus::Success),
        ],
    );
    assert_eq!(logs[0].output_data["is_duplicate"], json!(false));
    assert_eq!(logs[0].output_data["degraded"], json!(true));
    assert!(logs[0].error_details.is_none());
    assert_eq!(queue.len(), 1);

    // The handler announces the degradation on the event bus.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let events = sink.for_execution(execution.id);
    assert!(
        events
            .iter()
            .any(|e| e.message() == "oracle unreachable, treating value as new"),
        "expected a degradation event, got: {events:#?}"
    );
}

#[tokio::test]
async fn router_follows_the_matching_route_end_to_end() {
    let harness = harness_with(EngineConfig::default(), vec![Arc::new(EchoHandler)]);
    let graph = WorkflowGraph::new(
        vec![
            Node::new("start", NodeType::WebhookTrigger),
            Node::new("router", NodeType::Router).with_config_entry(
                "routes",
                json!([
                    {"name": "vip", "condition": "{{$trigger.vip}}"},
                    "regular"
                ]),
            ),
            Node::new("vip_echo", NodeType::Custom("echo".into())),
            Node::new("regular_echo", NodeType::Custom("echo".into())),
        ],
        vec![
            Edge::new("e1", "start", "router"),
            Edge::new("e2", "router", "vip_echo").with_source_handle("vip"),
            Edge::new("e3", "router", "regular_echo").with_source_handle("regular"),
        ],
    );
    let workflow_id = harness.add_workflow(graph).await;

    let vip_run = harness
        .engine
        .run_execution(workflow_id, json!({"vip": true}), TriggerSource::Webhook)
        .await
        .unwrap();
    assert_status(&vip_run, ExecutionStatus::Completed);
    let logs = harness.logs(vip_run.id).await;
    assert_trace(
        &logs,
        &[
            ("router", NodeRunStatus::Success),
            ("vip_echo", NodeRunStatus::Success),
        ],
    );
    assert_eq!(logs[0].output_data["route"], json!("vip"));

    // A falsy condition falls through to the unconditional route.
    let regular_run = harness
        .engine
        .run_execution(workflow_id, json!({"vip": false}), TriggerSource::Webhook)
        .await
        .unwrap();
    let logs = harness.logs(regular_run.id).await;
    assert_trace(
        &logs,
        &[
            ("router", NodeRunStatus::Success),
            ("regular_echo", NodeRunStatus::Success),
        ],
    );
}

#[tokio::test]
async fn router_fallback_edge_catches_unmatched_payloads() {
    let harness = harness_with(EngineConfig::default(), vec![Arc::new(EchoHandler)]);
    let graph = WorkflowGraph::new(
        vec![
            Node::new("start", NodeType::WebhookTrigger),
            Node::new("router", NodeType::Router).with_config_entry(
                "routes",
                json!([{"name": "vip", "condition": "{{$trigger.vip}}"}]),
            ),
            Node::new("catch", NodeType::Custom("echo".into())),
        ],
        vec![
            Edge::new("e1", "start", "router"),
            Edge::new("e2", "router", "catch").with_source_handle("fallback"),
        ],
    );
    let workflow_id = harness.add_workflow(graph).await;

    let execution = harness
        .engine
        .run_execution(workflow_id, json!({}), TriggerSource::Api)
        .await
        .unwrap();

    assert_status(&execution, ExecutionStatus::Completed);
    let logs = harness.logs(execution.id).await;
    assert_trace(
        &logs,
        &[
            ("router", NodeRunStatus::Success),
            ("catch", NodeRunStatus::Success),
        ],
    );
    assert_eq!(logs[0].output_data["route"], json!("fallback"));
}

#[tokio::test]
async fn branch_wires_both_outcomes_to_their_handles() {
    let harness = harness_with(EngineConfig::default(), vec![Arc::new(EchoHandler)]);
    let graph = WorkflowGraph::new(
        vec![
            Node::new("start", NodeType::WebhookTrigger),
            Node::new("gate", NodeType::Branch)
                .with_config_entry("condition", Value::String("{{$trigger.ready}}".into())),
            Node::new("yes", NodeType::Custom("echo".into())),
            Node::new("no", NodeType::Custom("echo".into())),
        ],
        vec![
            Edge::new("e1", "start", "gate"),
            Edge::new("e2", "gate", "yes").with_source_handle("true"),
            Edge::new("e3", "gate", "no").with_source_handle("false"),
        ],
    );
    let workflow_id = harness.add_workflow(graph).await;

    let truthy = harness
        .engine
        .run_execution(workflow_id, json!({"ready": "yes"}), TriggerSource::Webhook)
        .await
        .unwrap();
    let logs = harness.logs(truthy.id).await;
    assert_trace(
        &logs,
        &[
            ("gate", NodeRunStatus::Success),
            ("yes", NodeRunStatus::Success),
        ],
    );
    assert_eq!(logs[0].output_data["condition_result"], json!(true));

    let falsy = harness
        .engine
        .run_execution(workflow_id, json!({"ready": false}), TriggerSource::Webhook)
        .await
        .unwrap();
    let logs = harness.logs(falsy.id).await;
    assert_trace(
        &logs,
        &[
            ("gate", NodeRunStatus::Success),
            ("no", NodeRunStatus::Success),
        ],
    );
    assert_eq!(logs[0].output_data["resolved"], json!("false"));
}

#[tokio::test]
async fn lead_envelope_feeds_push_templates_and_owner_pick() {
    let harness = harness();
    let graph = WorkflowGraph::new(
        vec![
            Node::new("lead", NodeType::LeadTrigger),
            Node::new("push", NodeType::CrmPush)
                .with_config_entry("owners", json!([{"id": "u-7"}]))
                .with_config_entry("fields", json!({"city": "{{$trigger.city}}"})),
        ],
        vec![Edge::new("e1", "lead", "push")],
    );
    let workflow_id = harness.add_workflow(graph).await;

    let execution = harness
        .engine
        .run_execution(
            workflow_id,
            json!({"lead": {"name": "Bruno", "phone": "+5521988880000"}, "city": "Niterói"}),
            TriggerSource::Webhook,
        )
        .await
        .unwrap();

    assert_status(&execution, ExecutionStatus::Completed);
    let logs = harness.logs(execution.id).await;
    assert_trace(&logs, &[("push", NodeRunStatus::Success)]);
    assert!(matches!(logs[0].effect, Effect::Enqueued { .. }));
    assert_eq!(logs[0].output_data["owner"], json!("u-7"));

    let jobs = harness.queue.snapshot();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].job, "crm_push");
    assert_eq!(jobs[0].payload["name"], "Bruno");
    assert_eq!(jobs[0].payload["phone"], "+5521988880000");
    assert_eq!(jobs[0].payload["owner"], "u-7");
    assert_eq!(jobs[0].payload["fields"]["city"], "Niterói");
    assert_eq!(logs[0].output_data["reference"], json!(jobs[0].reference));
}

#[tokio::test]
async fn plain_trigger_leaves_lead_variables_empty_and_push_fails() {
    let harness = harness();
    // No lead normalization: {{name}}, {{phone}}, {{email}} all resolve empty.
    let workflow_id = harness
        .add_workflow(single_node_graph(Node::new("push", NodeType::CrmPush)))
        .await;

    let execution = harness
        .engine
        .run_execution(workflow_id, json!({"whatever": 1}), TriggerSource::Webhook)
        .await
        .unwrap();

    assert_status(&execution, ExecutionStatus::Failed);
    let message = execution.error_message.unwrap();
    assert!(message.starts_with("node 'push' failed"), "{message}");
    assert!(message.contains("at least one of name, phone, email"), "{message}");
    assert!(harness.queue.is_empty());
}

#[tokio::test]
async fn record_create_persists_a_resolved_record() {
    let harness = harness();
    let graph = WorkflowGraph::new(
        vec![
            Node::new("lead", NodeType::LeadTrigger),
            Node::new("create", NodeType::RecordCreate)
                .with_config_entry("object", Value::String("contact".into()))
                .with_config_entry(
                    "fields",
                    json!({
                        "name": "{{name}}",
                        "phone": "{{phone}}",
                        "source": "{{$trigger.source}}"
                    }),
                ),
        ],
        vec![Edge::new("e1", "lead", "create")],
    );
    let workflow_id = harness.add_workflow(graph).await;

    let execution = harness
        .engine
        .run_execution(
            workflow_id,
            json!({"name": "Ana", "phone": "+5511999990000", "source": "fb_lead_ads"}),
            TriggerSource::Webhook,
        )
        .await
        .unwrap();

    assert_status(&execution, ExecutionStatus::Completed);
    assert_eq!(harness.crm.count("contact"), 1);

    let logs = harness.logs(execution.id).await;
    assert_trace(&logs, &[("create", NodeRunStatus::Success)]);
    let record = &logs[0].output_data["record"];
    assert_eq!(record["name"], "Ana");
    assert_eq!(record["source"], "fb_lead_ads");
    assert!(record["id"].is_string());
}

#[tokio::test]
async fn record_query_filters_on_resolved_templates() {
    let harness = harness();
    harness
        .crm
        .create_record(
            "contact",
            &obj(json!({"phone": "+5511999990000", "city": "SP"})),
        )
        .unwrap();
    harness
        .crm
        .create_record(
            "contact",
            &obj(json!({"phone": "+5521988880000", "city": "RJ"})),
        )
        .unwrap();

    let lookup = Node::new("lookup", NodeType::RecordQuery)
        .with_config_entry("object", Value::String("contact".into()))
        .with_config_entry("filters", json!({"phone": "{{$trigger.phone}}"}));
    let workflow_id = harness.add_workflow(single_node_graph(lookup)).await;

    let execution = harness
        .engine
        .run_execution(
            workflow_id,
            json!({"phone": "+5511999990000"}),
            TriggerSource::Api,
        )
        .await
        .unwrap();

    assert_status(&execution, ExecutionStatus::Completed);
    let logs = harness.logs(execution.id).await;
    assert_trace(&logs, &[("lookup", NodeRunStatus::Success)]);
    assert_eq!(logs[0].output_data["count"], json!(1));
    assert_eq!(logs[0].output_data["records"][0]["city"], "SP");
}
