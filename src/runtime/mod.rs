//! Run-time infrastructure: the engine, execution records, stores,
//! scheduling, and analytics.
//!
//! The runtime layer is built around a few seams:
//!
//! - **[`Engine`]** - walks a workflow graph and drives one run to a
//!   terminal state
//! - **[`ExecutionStore`] / [`WorkflowStore`]** - pluggable persistence for
//!   audit records and workflow definitions
//! - **[`Execution`] / [`NodeExecutionLog`]** - the append-only audit trail
//! - **[`WorkflowSchedule`]** - the policy an external scheduler consumes
//! - **[`BlockingPool`]** - bounded offload lane for synchronous SDK calls
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use flowloom::event_bus::EventBus;
//! use flowloom::runtime::{
//!     Engine, EngineConfig, InMemoryExecutionStore, InMemoryWorkflowStore, TriggerSource,
//! };
//! # use flowloom::registry::HandlerRegistry;
//! # async fn example(registry: HandlerRegistry, workflow_id: uuid::Uuid) -> Result<(), Box<dyn std::error::Error>> {
//!
//! let engine = Engine::new(
//!     registry,
//!     Arc::new(InMemoryWorkflowStore::new()),
//!     Arc::new(InMemoryExecutionStore::new()),
//!     EngineConfig::default(),
//!     Arc::new(EventBus::default()),
//! );
//!
//! let record = engine
//!     .run_execution(
//!         workflow_id,
//!         serde_json::json!({"lead": {"phone": "+15550100"}}),
//!         TriggerSource::Webhook,
//!     )
//!     .await?;
//! println!("finished: {}", record.status);
//! # Ok(())
//! # }
//! ```

pub mod analytics;
pub mod config;
pub mod engine;
pub mod execution;
pub mod pool;
pub mod schedule;
pub mod store;

pub use analytics::{NodeAnalytics, rebuild_analytics};
pub use config::EngineConfig;
pub use engine::{Engine, EngineError};
pub use execution::{
    Execution, ExecutionId, ExecutionStatus, InvalidTransition, NodeExecutionLog, NodeRunStatus,
    TriggerSource,
};
pub use pool::{BlockingPool, PoolError};
pub use schedule::{SchedulePolicy, ScheduleError, WorkflowSchedule};
pub use store::{
    ExecutionStore, InMemoryExecutionStore, InMemoryWorkflowStore, StoreError, WorkflowStore,
};
