#![allow(dead_code)]

use std::time::Duration;

use async_trait::async_trait;
use flowloom::context::ExecutionContext;
use flowloom::handler::{NodeHandler, NodeResult};
use flowloom::handlers::{CollaboratorError, DedupOracle};
use flowloom::model::{Node, NodeType};
use serde_json::{Value, json};

/// Writes a `ran_<id>` marker variable and echoes its node id.
pub struct EchoHandler;

#[async_trait]
impl NodeHandler for EchoHandler {
    fn node_types(&self) -> Vec<NodeType> {
        vec![NodeType::Custom("echo".into())]
    }

    async fn execute(&self, node: &Node, ctx: &mut ExecutionContext) -> NodeResult {
        ctx.set_variable(format!("ran_{}", node.id), json!(true));
        NodeResult::ok().with_entry("echoed", json!(node.id))
    }
}

/// Fails with the configured `message`, or `"boom"` by default.
pub struct FailingHandler;

#[async_trait]
impl NodeHandler for FailingHandler {
    fn node_types(&self) -> Vec<NodeType> {
        vec![NodeType::Custom("failing".into())]
    }

    async fn execute(&self, node: &Node, _ctx: &mut ExecutionContext) -> NodeResult {
        NodeResult::err(node.config_str("message").unwrap_or("boom"))
    }
}

/// Sleeps for `delay_ms` (default 100) before succeeding.
pub struct SlowHandler;

#[async_trait]
impl NodeHandler for SlowHandler {
    fn node_types(&self) -> Vec<NodeType> {
        vec![NodeType::Custom("slow".into())]
    }

    async fn execute(&self, node: &Node, _ctx: &mut ExecutionContext) -> NodeResult {
        let delay = node
            .config
            .get("delay_ms")
            .and_then(Value::as_u64)
            .unwrap_or(100);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        NodeResult::ok()
    }
}

/// Dedup oracle that is never reachable.
pub struct UnreachableOracle;

#[async_trait]
impl DedupOracle for UnreachableOracle {
    async fn register_if_absent(&self, _key: &str) -> Result<bool, CollaboratorError> {
        Err(CollaboratorError::Unavailable("oracle offline".into()))
    }
}
