//! CRM-facing handlers.
//!
//! [`CrmPushHandler`] never talks to the CRM directly: it resolves and
//! validates the contact fields, then enqueues the actual write as a
//! fire-and-forget task and returns the task reference. The record
//! handlers do talk to the CRM, through a blocking client off-loaded to a
//! [`BlockingPool`] so SDK calls cannot stall concurrent runs.

use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use serde_json::{Map, Value, json};

use crate::context::ExecutionContext;
use crate::handler::{NodeHandler, NodeResult};
use crate::model::{Node, NodeType};
use crate::runtime::BlockingPool;

use super::{CrmClient, TaskQueue};

/// Resolves contact fields and enqueues the CRM write as an async task.
///
/// Field templates default to the canonical lead variables (`{{name}}`,
/// `{{phone}}`, `{{email}}`); at least one must resolve non-empty. When
/// the config lists `owners`, one is picked by weighted random selection
/// and attached to the queued payload. The node completes as soon as the
/// task is queued; the output's `reference` identifies the queued task,
/// not the CRM's final answer.
pub struct CrmPushHandler {
    tasks: Arc<dyn TaskQueue>,
}

impl CrmPushHandler {
    pub fn new(tasks: Arc<dyn TaskQueue>) -> Self {
        Self { tasks }
    }
}

#[async_trait]
impl NodeHandler for CrmPushHandler {
    fn node_types(&self) -> Vec<NodeType> {
        vec![NodeType::CrmPush]
    }

    fn validate(&self, node: &Node) -> Option<String> {
        if let Some(owners) = node.config.get("owners")
            && !owners.is_array()
        {
            return Some("crm_push 'owners' must be an array".into());
        }
        None
    }

    async fn execute(&self, node: &Node, ctx: &mut ExecutionContext) -> NodeResult {
        let name = resolved_field(node, "name", "{{name}}", ctx);
        let phone = resolved_field(node, "phone", "{{phone}}", ctx);
        let email = resolved_field(node, "email", "{{email}}", ctx);
        if name.is_empty() && phone.is_empty() && email.is_empty() {
            return NodeResult::err(
                "crm push needs at least one of name, phone, email to resolve non-empty",
            );
        }

        let owner = pick_owner(node.config.get("owners"));
        let mut payload = Map::new();
        payload.insert("name".into(), Value::String(name));
        payload.insert("phone".into(), Value::String(phone));
        payload.insert("email".into(), Value::String(email));
        if let Some(owner) = &owner {
            payload.insert("owner".into(), owner.clone());
        }
        let extra = resolved_section(node, "fields", ctx);
        if !extra.is_empty() {
            payload.insert("fields".into(), Value::Object(extra));
        }

        match self.tasks.enqueue("crm_push", Value::Object(payload)).await {
            Ok(reference) => {
                let mut result = NodeResult::enqueued(reference.clone())
                    .with_entry("reference", Value::String(reference));
                if let Some(owner) = owner {
                    result = result.with_entry("owner", owner);
                }
                result
            }
            Err(err) => NodeResult::err(format!("failed to enqueue crm push: {err}")),
        }
    }
}

/// Equality-filter query against the CRM.
pub struct RecordQueryHandler {
    crm: Arc<dyn CrmClient>,
    pool: BlockingPool,
}

impl RecordQueryHandler {
    pub fn new(crm: Arc<dyn CrmClient>, pool: BlockingPool) -> Self {
        Self { crm, pool }
    }
}

#[async_trait]
impl NodeHandler for RecordQueryHandler {
    fn node_types(&self) -> Vec<NodeType> {
        vec![NodeType::RecordQuery]
    }

    fn validate(&self, node: &Node) -> Option<String> {
        if node.config_str("object").is_none_or(str::is_empty) {
            return Some("record_query requires an 'object' type".into());
        }
        None
    }

    async fn execute(&self, node: &Node, ctx: &mut ExecutionContext) -> NodeResult {
        let Some(object) = object_name(node, ctx) else {
            return NodeResult::err("record_query 'object' resolved to an empty value");
        };
        let filters = resolved_section(node, "filters", ctx);

        let crm = Arc::clone(&self.crm);
        let outcome = self
            .pool
            .run(move || crm.query_records(&object, &filters))
            .await;
        match outcome {
            Ok(Ok(records)) => NodeResult::ok()
                .with_entry("count", json!(records.len()))
                .with_entry("records", Value::Array(records)),
            Ok(Err(err)) => NodeResult::err(format!("record query failed: {err}")),
            Err(err) => NodeResult::err(format!("blocking pool unavailable: {err}")),
        }
    }
}

/// Creates one CRM record from a resolved field mapping.
pub struct RecordCreateHandler {
    crm: Arc<dyn CrmClient>,
    pool: BlockingPool,
}

impl RecordCreateHandler {
    pub fn new(crm: Arc<dyn CrmClient>, pool: BlockingPool) -> Self {
        Self { crm, pool }
    }
}

#[async_trait]
impl NodeHandler for RecordCreateHandler {
    fn node_types(&self) -> Vec<NodeType> {
        vec![NodeType::RecordCreate]
    }

    fn validate(&self, node: &Node) -> Option<String> {
        if node.config_str("object").is_none_or(str::is_empty) {
            return Some("record_create requires an 'object' type".into());
        }
        if !node.config.get("fields").is_some_and(Value::is_object) {
            return Some("record_create requires a 'fields' object".into());
        }
        None
    }

    async fn execute(&self, node: &Node, ctx: &mut ExecutionContext) -> NodeResult {
        let Some(object) = object_name(node, ctx) else {
            return NodeResult::err("record_create 'object' resolved to an empty value");
        };
        let fields = resolved_section(node, "fields", ctx);

        let crm = Arc::clone(&self.crm);
        let outcome = self
            .pool
            .run(move || crm.create_record(&object, &fields))
            .await;
        match outcome {
            Ok(Ok(record)) => NodeResult::ok().with_entry("record", record),
            Ok(Err(err)) => NodeResult::err(format!("record create failed: {err}")),
            Err(err) => NodeResult::err(format!("blocking pool unavailable: {err}")),
        }
    }
}

/// Merges a resolved field mapping into an existing CRM record.
pub struct RecordUpdateHandler {
    crm: Arc<dyn CrmClient>,
    pool: BlockingPool,
}

impl RecordUpdateHandler {
    pub fn new(crm: Arc<dyn CrmClient>, pool: BlockingPool) -> Self {
        Self { crm, pool }
    }
}

#[async_trait]
impl NodeHandler for RecordUpdateHandler {
    fn node_types(&self) -> Vec<NodeType> {
        vec![NodeType::RecordUpdate]
    }

    fn validate(&self, node: &Node) -> Option<String> {
        if node.config_str("object").is_none_or(str::is_empty) {
            return Some("record_update requires an 'object' type".into());
        }
        if node.config_str("record_id").is_none_or(str::is_empty) {
            return Some("record_update requires a 'record_id' template".into());
        }
        if !node.config.get("fields").is_some_and(Value::is_object) {
            return Some("record_update requires a 'fields' object".into());
        }
        None
    }

    async fn execute(&self, node: &Node, ctx: &mut ExecutionContext) -> NodeResult {
        let Some(object) = object_name(node, ctx) else {
            return NodeResult::err("record_update 'object' resolved to an empty value");
        };
        let record_id = ctx.resolve_template(node.config_str("record_id").unwrap_or_default());
        if record_id.is_empty() {
            return NodeResult::err("record_update 'record_id' resolved to an empty value");
        }
        let fields = resolved_section(node, "fields", ctx);

        let crm = Arc::clone(&self.crm);
        let outcome = self
            .pool
            .run(move || crm.update_record(&object, &record_id, &fields))
            .await;
        match outcome {
            Ok(Ok(record)) => NodeResult::ok().with_entry("record", record),
            Ok(Err(err)) => NodeResult::err(format!("record update failed: {err}")),
            Err(err) => NodeResult::err(format!("blocking pool unavailable: {err}")),
        }
    }
}

/// Config template for `key`, resolved; `default` names the canonical
/// lead variable used when the config leaves the field out.
fn resolved_field(node: &Node, key: &str, default: &str, ctx: &ExecutionContext) -> String {
    ctx.resolve_template(node.config_str(key).unwrap_or(default))
}

fn object_name(node: &Node, ctx: &ExecutionContext) -> Option<String> {
    let object = ctx.resolve_template(node.config_str("object")?);
    (!object.is_empty()).then_some(object)
}

fn resolved_section(node: &Node, key: &str, ctx: &ExecutionContext) -> Map<String, Value> {
    node.config
        .get(key)
        .and_then(Value::as_object)
        .map(|map| ctx.resolve_map(map))
        .unwrap_or_default()
}

/// Weighted random pick among the configured owners.
///
/// Entries are either bare values or objects with an `id` and an optional
/// positive `weight` (default 1). Returns the picked entry's id.
fn pick_owner(owners: Option<&Value>) -> Option<Value> {
    let entries = owners?.as_array()?;
    if entries.is_empty() {
        return None;
    }
    let weights: Vec<f64> = entries
        .iter()
        .map(|entry| {
            entry
                .get("weight")
                .and_then(Value::as_f64)
                .filter(|weight| *weight > 0.0)
                .unwrap_or(1.0)
        })
        .collect();
    let total: f64 = weights.iter().sum();
    let mut roll = rand::rng().random_range(0.0..total);
    for (entry, weight) in entries.iter().zip(&weights) {
        roll -= weight;
        if roll < 0.0 {
            return Some(owner_id(entry));
        }
    }
    // Floating-point slack; land on the last entry.
    entries.last().map(owner_id)
}

fn owner_id(entry: &Value) -> Value {
    entry.get("id").cloned().unwrap_or_else(|| entry.clone())
}
