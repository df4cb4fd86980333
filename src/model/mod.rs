//! Data model for workflow automations.
//!
//! This module defines the persisted shape of an automation: the
//! [`Workflow`] with its [`WorkflowGraph`] of [`Node`]s and [`Edge`]s,
//! workflow-scoped [`Variable`]s, and immutable [`WorkflowVersion`]
//! snapshots. Everything here is plain serde data; execution semantics live
//! in [`crate::runtime`] and the handlers.

pub mod edge;
pub mod node;
pub mod variable;
pub mod version;
pub mod workflow;

pub use edge::{DEFAULT_HANDLE, ERROR_HANDLE, Edge};
pub use node::{Node, NodeType, Position};
pub use variable::{Variable, VariableKind};
pub use version::WorkflowVersion;
pub use workflow::{Group, Viewport, Workflow, WorkflowGraph};
