//! Immutable workflow graph snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::workflow::WorkflowGraph;

/// A snapshot of a workflow's graph at a point in time.
///
/// Versions are numbered monotonically per workflow and never mutated after
/// creation. Publish cuts a new version tagged `"published"`; executions
/// record which version number ran.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowVersion {
    pub workflow_id: Uuid,
    pub number: u32,
    pub graph: WorkflowGraph,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WorkflowVersion {
    /// Snapshot `graph` as version `number` of `workflow_id`.
    pub fn snapshot(workflow_id: Uuid, number: u32, graph: WorkflowGraph) -> Self {
        Self {
            workflow_id,
            number,
            graph,
            tag: None,
            created_at: Utc::now(),
        }
    }

    /// Attach a tag such as `"published"`.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}
