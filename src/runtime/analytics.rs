//! Per-node analytics derived from execution logs.
//!
//! Aggregates are rebuildable at any time from the append-only
//! [`NodeExecutionLog`] history, so they are never authoritative; a lost
//! analytics table costs nothing but a recount.

use chrono::NaiveDate;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::execution::{NodeExecutionLog, NodeRunStatus};

/// One day of counters for one node of one workflow.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeAnalytics {
    pub workflow_id: Uuid,
    pub node_id: String,
    pub date: NaiveDate,
    /// Node invocations, regardless of outcome.
    pub views: u64,
    /// Invocations that finished with status `success`.
    pub conversions: u64,
    /// Invocations that finished with status `error`.
    pub drop_offs: u64,
    /// Sum of numeric `revenue` fields found in output maps.
    pub revenue: f64,
    pub avg_duration_ms: f64,
}

#[derive(Default)]
struct Bucket {
    views: u64,
    conversions: u64,
    drop_offs: u64,
    revenue: f64,
    total_ms: u64,
}

/// Recount analytics for one workflow from its log history.
///
/// Buckets by (node, UTC day of `started_at`); the result is sorted by date
/// then node id, so rebuilding twice from the same logs yields identical
/// output.
pub fn rebuild_analytics(workflow_id: Uuid, logs: &[NodeExecutionLog]) -> Vec<NodeAnalytics> {
    let mut buckets: FxHashMap<(NaiveDate, String), Bucket> = FxHashMap::default();

    for log in logs {
        let key = (log.started_at.date_naive(), log.node_id.clone());
        let bucket = buckets.entry(key).or_default();
        bucket.views += 1;
        match log.status {
            NodeRunStatus::Success => bucket.conversions += 1,
            NodeRunStatus::Error => bucket.drop_offs += 1,
            NodeRunStatus::Skipped | NodeRunStatus::Waiting => {}
        }
        if let Some(revenue) = log.output_data.get("revenue").and_then(Value::as_f64) {
            bucket.revenue += revenue;
        }
        bucket.total_ms += log.duration_ms;
    }

    let mut rows: Vec<NodeAnalytics> = buckets
        .into_iter()
        .map(|((date, node_id), bucket)| NodeAnalytics {
            workflow_id,
            node_id,
            date,
            views: bucket.views,
            conversions: bucket.conversions,
            drop_offs: bucket.drop_offs,
            revenue: bucket.revenue,
            avg_duration_ms: if bucket.views == 0 {
                0.0
            } else {
                bucket.total_ms as f64 / bucket.views as f64
            },
        })
        .collect();

    rows.sort_by(|a, b| (a.date, &a.node_id).cmp(&(b.date, &b.node_id)));
    rows
}
