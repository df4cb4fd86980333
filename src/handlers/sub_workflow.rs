//! Sub-workflow node handler.
//!
//! Only validation lives here. The engine dispatches `sub_workflow` nodes
//! itself because spawning a child run needs the workflow store and the
//! parent's cancellation lineage, neither of which crosses the handler
//! seam.

use async_trait::async_trait;
use uuid::Uuid;

use crate::context::ExecutionContext;
use crate::handler::{NodeHandler, NodeResult};
use crate::model::{Node, NodeType};

pub struct SubWorkflowHandler;

#[async_trait]
impl NodeHandler for SubWorkflowHandler {
    fn node_types(&self) -> Vec<NodeType> {
        vec![NodeType::SubWorkflow]
    }

    fn validate(&self, node: &Node) -> Option<String> {
        let Some(raw) = node.config_str("workflow_id") else {
            return Some("sub_workflow requires a 'workflow_id'".into());
        };
        if raw.contains("{{") {
            // Template; resolvable only at execution time.
            return None;
        }
        if Uuid::parse_str(raw).is_err() {
            return Some(format!(
                "sub_workflow 'workflow_id' is not a valid uuid: '{raw}'"
            ));
        }
        None
    }

    async fn execute(&self, node: &Node, _ctx: &mut ExecutionContext) -> NodeResult {
        // The engine intercepts sub_workflow nodes before handler dispatch;
        // reaching this body means it was bypassed.
        NodeResult::err(format!(
            "sub_workflow node '{}' must be dispatched by the engine",
            node.id
        ))
    }
}
