//! Deduplication against an external register-if-absent oracle.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::warn;

use crate::context::ExecutionContext;
use crate::handler::{NodeHandler, NodeResult};
use crate::model::{Node, NodeType};

use super::DedupOracle;

/// Handle followed when the value has been seen before.
pub const DUPLICATE_HANDLE: &str = "duplicate";
/// Handle followed when the value is new.
pub const NEW_HANDLE: &str = "new";

/// Routes a run by whether a templated field value was seen before.
///
/// The check is two-tiered: an in-run memory set short-circuits repeats
/// within a single execution without touching the oracle, then the
/// oracle's register-if-absent call decides across runs. Keys are scoped
/// per workflow, so two workflows dedupe the same value independently.
///
/// Failure policy is asymmetric on purpose:
/// - an unreachable oracle fails open: the value is treated as new, the
///   run keeps going, and the output carries `degraded: true`;
/// - an empty dedup value fails closed: routed to `"duplicate"` with an
///   error set, because an empty key can never be trusted as new.
pub struct DedupeHandler {
    oracle: Arc<dyn DedupOracle>,
}

impl DedupeHandler {
    pub fn new(oracle: Arc<dyn DedupOracle>) -> Self {
        Self { oracle }
    }
}

#[async_trait]
impl NodeHandler for DedupeHandler {
    fn node_types(&self) -> Vec<NodeType> {
        vec![NodeType::Dedupe]
    }

    fn validate(&self, node: &Node) -> Option<String> {
        if node.config_str("field").is_none_or(str::is_empty) {
            return Some("dedupe node requires a 'field' template".into());
        }
        None
    }

    async fn execute(&self, node: &Node, ctx: &mut ExecutionContext) -> NodeResult {
        let field = node.config_str("field").unwrap_or_default().to_owned();
        let value = ctx.resolve_template(&field);
        if value.is_empty() {
            return NodeResult::err(format!("dedupe field '{field}' resolved to an empty value"))
                .with_handle(DUPLICATE_HANDLE);
        }

        let key = format!("{}:{value}", ctx.workflow_id());
        if !ctx.mark_seen(&key) {
            // Repeat within this run; skip the oracle round-trip.
            return NodeResult::ok()
                .with_handle(DUPLICATE_HANDLE)
                .with_entry("is_duplicate", json!(true))
                .with_entry("value", Value::String(value));
        }

        match self.oracle.register_if_absent(&key).await {
            Ok(true) => NodeResult::ok()
                .with_handle(NEW_HANDLE)
                .with_entry("is_duplicate", json!(false))
                .with_entry("value", Value::String(value)),
            Ok(false) => NodeResult::ok()
                .with_handle(DUPLICATE_HANDLE)
                .with_entry("is_duplicate", json!(true))
                .with_entry("value", Value::String(value)),
            Err(err) => {
                warn!(node = %node.id, error = %err, "dedup oracle unreachable, failing open");
                ctx.emit("dedupe", "oracle unreachable, treating value as new")
                    .ok();
                NodeResult::ok()
                    .with_handle(NEW_HANDLE)
                    .with_entry("is_duplicate", json!(false))
                    .with_entry("degraded", json!(true))
                    .with_entry("value", Value::String(value))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{CollaboratorError, InMemoryDedupOracle};
    use crate::runtime::ExecutionId;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_util::sync::CancellationToken;
    use uuid::Uuid;

    #[derive(Default)]
    struct CountingOracle {
        inner: InMemoryDedupOracle,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DedupOracle for CountingOracle {
        async fn register_if_absent(&self, key: &str) -> Result<bool, CollaboratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.register_if_absent(key).await
        }
    }

    struct FailingOracle;

    #[async_trait]
    impl DedupOracle for FailingOracle {
        async fn register_if_absent(&self, _key: &str) -> Result<bool, CollaboratorError> {
            Err(CollaboratorError::Unavailable("oracle down".into()))
        }
    }

    fn ctx() -> ExecutionContext {
        let (tx, rx) = flume::unbounded();
        std::mem::forget(rx);
        ExecutionContext::new(
            ExecutionId::new(),
            Uuid::new_v4(),
            serde_json::json!({"phone": "+5511999990000"}),
            &[],
            tx,
            CancellationToken::new(),
        )
    }

    fn dedupe_node() -> Node {
        Node::new("dedupe-1", NodeType::Dedupe)
            .with_config_entry("field", Value::String("{{$trigger.phone}}".into()))
    }

    #[tokio::test]
    async fn second_in_run_check_skips_the_oracle() {
        let oracle = Arc::new(CountingOracle::default());
        let handler = DedupeHandler::new(oracle.clone());
        let node = dedupe_node();
        let mut ctx = ctx();

        let first = handler.execute(&node, &mut ctx).await;
        assert_eq!(first.handle.as_deref(), Some(NEW_HANDLE));
        assert_eq!(first.output["is_duplicate"], json!(false));

        let second = handler.execute(&node, &mut ctx).await;
        assert_eq!(second.handle.as_deref(), Some(DUPLICATE_HANDLE));
        assert_eq!(second.output["is_duplicate"], json!(true));
        assert!(second.error.is_none());

        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_value_fails_closed() {
        let handler = DedupeHandler::new(Arc::new(InMemoryDedupOracle::default()));
        let node = Node::new("dedupe-1", NodeType::Dedupe)
            .with_config_entry("field", Value::String("{{missing}}".into()));
        let mut ctx = ctx();

        let result = handler.execute(&node, &mut ctx).await;
        assert_eq!(result.handle.as_deref(), Some(DUPLICATE_HANDLE));
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn unreachable_oracle_fails_open() {
        let handler = DedupeHandler::new(Arc::new(FailingOracle));
        let node = dedupe_node();
        let mut ctx = ctx();

        let result = handler.execute(&node, &mut ctx).await;
        assert!(result.error.is_none());
        assert_eq!(result.handle.as_deref(), Some(NEW_HANDLE));
        assert_eq!(result.output["degraded"], json!(true));
    }

    #[tokio::test]
    async fn keys_are_scoped_per_workflow() {
        let oracle = Arc::new(InMemoryDedupOracle::default());
        let handler = DedupeHandler::new(oracle.clone());
        let node = dedupe_node();

        let first = handler.execute(&node, &mut ctx()).await;
        let other_workflow = handler.execute(&node, &mut ctx()).await;

        // Same value, different workflows: both are new.
        assert_eq!(first.handle.as_deref(), Some(NEW_HANDLE));
        assert_eq!(other_workflow.handle.as_deref(), Some(NEW_HANDLE));
        assert_eq!(oracle.len(), 2);
    }

    #[test]
    fn validate_requires_a_field() {
        let handler = DedupeHandler::new(Arc::new(InMemoryDedupOracle::default()));
        assert!(
            handler
                .validate(&Node::new("d", NodeType::Dedupe))
                .is_some()
        );
        assert!(handler.validate(&dedupe_node()).is_none());
    }
}
