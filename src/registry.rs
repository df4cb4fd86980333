//! Node handler registry: node-type keys to shared handler instances.
//!
//! The registry decouples node types from handler implementations so new
//! node kinds can be added without touching the traversal engine. Handlers
//! self-declare their keys through [`NodeHandler::node_types`]; registering
//! a key twice is a startup-time error, never a silent overwrite, so handler
//! collisions fail at assembly rather than at some later run.

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::handler::NodeHandler;
use crate::model::NodeType;

/// Errors raised while assembling a handler registry.
#[derive(Debug, Error, Diagnostic)]
pub enum RegistryError {
    /// Two handlers claimed the same node type.
    #[error("node type '{node_type}' is already registered")]
    #[diagnostic(
        code(flowloom::registry::duplicate),
        help("Each node type maps to exactly one handler. Remove the duplicate registration.")
    )]
    Duplicate { node_type: NodeType },

    /// A handler declared no node types at all.
    #[error("handler registered without any node types")]
    #[diagnostic(code(flowloom::registry::empty_claim))]
    EmptyClaim,
}

/// Maps node types to their handler implementations.
///
/// Handlers are stateless shared instances: the same `Arc` is stored under
/// every alias the handler claims, and the same instance serves every
/// concurrent run.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use flowloom::context::ExecutionContext;
/// use flowloom::handler::{NodeHandler, NodeResult};
/// use flowloom::model::{Node, NodeType};
/// use flowloom::registry::HandlerRegistry;
///
/// struct EchoHandler;
///
/// #[async_trait]
/// impl NodeHandler for EchoHandler {
///     fn node_types(&self) -> Vec<NodeType> {
///         vec![NodeType::Custom("echo".into())]
///     }
///
///     async fn execute(&self, _node: &Node, _ctx: &mut ExecutionContext) -> NodeResult {
///         NodeResult::ok()
///     }
/// }
///
/// let mut registry = HandlerRegistry::new();
/// registry.register(Arc::new(EchoHandler)).unwrap();
/// assert!(registry.resolve(&NodeType::Custom("echo".into())).is_some());
/// ```
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: FxHashMap<NodeType, Arc<dyn NodeHandler>>,
}

impl HandlerRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under every node type it claims.
    ///
    /// # Errors
    ///
    /// [`RegistryError::Duplicate`] if any claimed key is already taken;
    /// nothing is registered in that case. [`RegistryError::EmptyClaim`] if
    /// the handler claims no keys.
    pub fn register(&mut self, handler: Arc<dyn NodeHandler>) -> Result<(), RegistryError> {
        let claims = handler.node_types();
        if claims.is_empty() {
            return Err(RegistryError::EmptyClaim);
        }
        for node_type in &claims {
            if self.handlers.contains_key(node_type) {
                return Err(RegistryError::Duplicate {
                    node_type: node_type.clone(),
                });
            }
        }
        for node_type in claims {
            self.handlers.insert(node_type, Arc::clone(&handler));
        }
        Ok(())
    }

    /// Look up the handler for a node type.
    ///
    /// Unknown types are a graph-validation failure; a miss at execution
    /// time indicates a validation gap and fails that run.
    #[must_use]
    pub fn resolve(&self, node_type: &NodeType) -> Option<Arc<dyn NodeHandler>> {
        self.handlers.get(node_type).cloned()
    }

    /// Returns `true` if a handler is registered for `node_type`.
    #[must_use]
    pub fn contains(&self, node_type: &NodeType) -> bool {
        self.handlers.contains_key(node_type)
    }

    /// Number of registered keys (aliases counted individually).
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
