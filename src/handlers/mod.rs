//! Built-in node handlers and the collaborator seams they depend on.
//!
//! Handlers fall into three groups:
//!
//! - **Trigger normalization** ([`TriggerHandler`], [`LeadTriggerHandler`]):
//!   accept heterogeneous inbound payloads and seed canonical context
//!   variables for downstream nodes.
//! - **Flow control** ([`RouterHandler`], [`BranchHandler`],
//!   [`SubWorkflowHandler`]): choose the outgoing edge handle without any
//!   external I/O.
//! - **Effectful nodes** ([`DedupeHandler`], [`CrmPushHandler`], the record
//!   handlers): talk to external systems through the narrow traits in this
//!   module, so tests can swap in the in-memory fakes from
//!   [`collaborators`].
//!
//! [`HandlerRegistry::builtin`] wires the full set against a
//! [`Collaborators`] bundle:
//!
//! ```rust
//! use flowloom::handlers::Collaborators;
//! use flowloom::model::NodeType;
//! use flowloom::registry::HandlerRegistry;
//! use flowloom::runtime::EngineConfig;
//!
//! let config = EngineConfig::default();
//! let registry = HandlerRegistry::builtin(&Collaborators::in_memory(&config))?;
//! assert!(registry.contains(&NodeType::Dedupe));
//! assert!(registry.contains(&NodeType::WebhookTrigger));
//! # Ok::<(), flowloom::registry::RegistryError>(())
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use miette::Diagnostic;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::registry::{HandlerRegistry, RegistryError};
use crate::runtime::{BlockingPool, EngineConfig};

pub mod collaborators;
pub mod crm;
pub mod dedupe;
pub mod routing;
pub mod sub_workflow;
pub mod triggers;

pub use collaborators::{InMemoryCrm, InMemoryDedupOracle, InMemoryTaskQueue, QueuedTask};
pub use crm::{CrmPushHandler, RecordCreateHandler, RecordQueryHandler, RecordUpdateHandler};
pub use dedupe::DedupeHandler;
pub use routing::{BranchHandler, RouterHandler};
pub use sub_workflow::SubWorkflowHandler;
pub use triggers::{LeadTriggerHandler, TriggerHandler};

// ============================================================================
// Collaborator Seams
// ============================================================================

/// Failure surfaced by an external collaborator.
#[derive(Debug, Error, Diagnostic)]
pub enum CollaboratorError {
    /// The collaborator could not be reached at all.
    #[error("collaborator unavailable: {0}")]
    #[diagnostic(
        code(flowloom::handlers::unavailable),
        help("check connectivity to the external service")
    )]
    Unavailable(String),

    /// The collaborator answered but refused the request.
    #[error("collaborator rejected request: {0}")]
    #[diagnostic(code(flowloom::handlers::rejected))]
    Rejected(String),
}

/// Cross-run register-if-absent store consulted by [`DedupeHandler`].
///
/// The oracle is the one deliberately cross-run shared resource in the
/// engine. It must uphold at-most-once registration under concurrent
/// callers; the handler layers an in-run guard on top but never assumes
/// exclusive access.
#[async_trait]
pub trait DedupOracle: Send + Sync {
    /// Register `key` if it is not already present.
    ///
    /// Returns `true` when the key was newly registered, `false` when it had
    /// been seen before.
    async fn register_if_absent(&self, key: &str) -> Result<bool, CollaboratorError>;
}

/// CRM-style record store used by the record handlers.
///
/// Methods are synchronous on purpose: production clients wrap a blocking
/// SDK, so every call goes through a [`BlockingPool`] instead of running on
/// the async executor.
pub trait CrmClient: Send + Sync {
    /// Fetch records of `object` matching every filter by equality.
    fn query_records(
        &self,
        object: &str,
        filters: &Map<String, Value>,
    ) -> Result<Vec<Value>, CollaboratorError>;

    /// Create a record and return it with its assigned id.
    fn create_record(
        &self,
        object: &str,
        fields: &Map<String, Value>,
    ) -> Result<Value, CollaboratorError>;

    /// Merge `fields` into the record with `record_id` and return the result.
    fn update_record(
        &self,
        object: &str,
        record_id: &str,
        fields: &Map<String, Value>,
    ) -> Result<Value, CollaboratorError>;
}

/// Fire-and-forget job queue for handlers that defer external writes.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Enqueue `payload` under `job`, returning the queued task's reference.
    async fn enqueue(&self, job: &str, payload: Value) -> Result<String, CollaboratorError>;
}

/// Bundle of external seams shared by the built-in handlers.
#[derive(Clone)]
pub struct Collaborators {
    pub dedup: Arc<dyn DedupOracle>,
    pub crm: Arc<dyn CrmClient>,
    pub tasks: Arc<dyn TaskQueue>,
    pub blocking: BlockingPool,
}

impl Collaborators {
    /// In-memory collaborators suitable for tests and local runs.
    #[must_use]
    pub fn in_memory(config: &EngineConfig) -> Self {
        Self {
            dedup: Arc::new(InMemoryDedupOracle::default()),
            crm: Arc::new(InMemoryCrm::default()),
            tasks: Arc::new(InMemoryTaskQueue::default()),
            blocking: BlockingPool::new(config.blocking_pool_size),
        }
    }
}

// ============================================================================
// Registry Wiring
// ============================================================================

impl HandlerRegistry {
    /// Registry pre-loaded with every built-in handler.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] if two built-ins claim the same
    /// node type; that is a wiring bug and surfaces at startup, never
    /// mid-run.
    pub fn builtin(collaborators: &Collaborators) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        registry.register(Arc::new(TriggerHandler))?;
        registry.register(Arc::new(LeadTriggerHandler))?;
        registry.register(Arc::new(DedupeHandler::new(Arc::clone(&collaborators.dedup))))?;
        registry.register(Arc::new(CrmPushHandler::new(Arc::clone(&collaborators.tasks))))?;
        registry.register(Arc::new(RecordQueryHandler::new(
            Arc::clone(&collaborators.crm),
            collaborators.blocking.clone(),
        )))?;
        registry.register(Arc::new(RecordCreateHandler::new(
            Arc::clone(&collaborators.crm),
            collaborators.blocking.clone(),
        )))?;
        registry.register(Arc::new(RecordUpdateHandler::new(
            Arc::clone(&collaborators.crm),
            collaborators.blocking.clone(),
        )))?;
        registry.register(Arc::new(RouterHandler))?;
        registry.register(Arc::new(BranchHandler))?;
        registry.register(Arc::new(SubWorkflowHandler))?;
        Ok(registry)
    }
}
