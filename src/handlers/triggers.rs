//! Trigger normalization handlers.
//!
//! A trigger node is a run's entry point. The engine invokes its handler
//! once, before the first regular node, so payload normalization happens
//! exactly once per run and downstream nodes can rely on canonical
//! variable names instead of payload shapes.

use async_trait::async_trait;
use serde_json::Value;

use crate::context::ExecutionContext;
use crate::handler::{NodeHandler, NodeResult};
use crate::model::{Node, NodeType};
use crate::template;

/// Pass-through handler for the plain trigger types.
///
/// Claims every trigger type that needs no payload normalization. The raw
/// payload is exposed as the node's `payload` output and stays reachable
/// through `{{$trigger.*}}` templates.
pub struct TriggerHandler;

#[async_trait]
impl NodeHandler for TriggerHandler {
    fn node_types(&self) -> Vec<NodeType> {
        vec![
            NodeType::WebhookTrigger,
            NodeType::ScheduleTrigger,
            NodeType::ManualTrigger,
            NodeType::ApiTrigger,
            NodeType::FormTrigger,
            NodeType::MessageTrigger,
        ]
    }

    async fn execute(&self, _node: &Node, ctx: &mut ExecutionContext) -> NodeResult {
        NodeResult::ok().with_entry("payload", ctx.trigger_data().clone())
    }
}

// Lookup order for each canonical field. Flat keys first, then the
// `lead`/`contact` envelopes some webhook providers wrap payloads in.
const NAME_PATHS: &[&str] = &["name", "full_name", "lead.name", "contact.name"];
const PHONE_PATHS: &[&str] = &["phone", "phone_number", "lead.phone", "contact.phone"];
const EMAIL_PATHS: &[&str] = &["email", "lead.email", "contact.email"];
const LEAD_ID_PATHS: &[&str] = &["lead_id", "leadgen_id", "id", "lead.id"];

/// Normalizes ad-platform lead payloads into canonical context variables.
///
/// Accepts flat payloads, `lead`/`contact` envelopes, and Facebook-style
/// `field_data` answer arrays, and writes `name`, `phone`, `email`, and
/// `lead_id` as system variables. Absent fields become empty strings;
/// this handler never fails, so even a thin payload yields a run with
/// uniform variable names.
pub struct LeadTriggerHandler;

#[async_trait]
impl NodeHandler for LeadTriggerHandler {
    fn node_types(&self) -> Vec<NodeType> {
        vec![NodeType::LeadTrigger]
    }

    async fn execute(&self, _node: &Node, ctx: &mut ExecutionContext) -> NodeResult {
        let trigger = ctx.trigger_data().clone();
        let name = first_match(&trigger, NAME_PATHS, "full_name");
        let phone = first_match(&trigger, PHONE_PATHS, "phone_number");
        let email = first_match(&trigger, EMAIL_PATHS, "email");
        let lead_id = first_match(&trigger, LEAD_ID_PATHS, "leadgen_id");

        ctx.set_system_variable("name", Value::String(name.clone()));
        ctx.set_system_variable("phone", Value::String(phone.clone()));
        ctx.set_system_variable("email", Value::String(email.clone()));
        ctx.set_system_variable("lead_id", Value::String(lead_id.clone()));

        NodeResult::ok()
            .with_entry("name", Value::String(name))
            .with_entry("phone", Value::String(phone))
            .with_entry("email", Value::String(email))
            .with_entry("lead_id", Value::String(lead_id))
            .with_entry("payload", trigger)
    }
}

/// First non-empty value across `paths`, falling back to the `field_data`
/// answer named `field_data_key`, then to the empty string.
fn first_match(trigger: &Value, paths: &[&str], field_data_key: &str) -> String {
    for path in paths {
        if let Some(found) = template::get_by_path(trigger, path) {
            let rendered = template::render_value(found);
            if !rendered.is_empty() {
                return rendered;
            }
        }
    }
    from_field_data(trigger, field_data_key).unwrap_or_default()
}

fn from_field_data(trigger: &Value, wanted: &str) -> Option<String> {
    let entries = trigger.get("field_data")?.as_array()?;
    entries.iter().find_map(|entry| {
        if entry.get("name").and_then(Value::as_str) != Some(wanted) {
            return None;
        }
        entry
            .get("values")
            .and_then(Value::as_array)
            .and_then(|values| values.first())
            .map(template::render_value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ExecutionId;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;
    use uuid::Uuid;

    fn ctx(trigger: Value) -> ExecutionContext {
        let (tx, rx) = flume::unbounded();
        std::mem::forget(rx);
        ExecutionContext::new(
            ExecutionId::new(),
            Uuid::new_v4(),
            trigger,
            &[],
            tx,
            CancellationToken::new(),
        )
    }

    fn node(node_type: NodeType) -> Node {
        Node::new("trigger-1", node_type)
    }

    #[tokio::test]
    async fn flat_payload_seeds_variables() {
        let mut ctx = ctx(json!({"name": "Ana", "phone": "+5511999990000"}));
        let result = LeadTriggerHandler
            .execute(&node(NodeType::LeadTrigger), &mut ctx)
            .await;

        assert!(result.error.is_none());
        assert_eq!(ctx.resolve_template("{{name}}"), "Ana");
        assert_eq!(ctx.resolve_template("{{phone}}"), "+5511999990000");
        assert_eq!(ctx.resolve_template("{{email}}"), "");
    }

    #[tokio::test]
    async fn nested_lead_envelope_is_unwrapped() {
        let mut ctx = ctx(json!({"lead": {"name": "Bruno", "phone": "+5521988880000"}}));
        LeadTriggerHandler
            .execute(&node(NodeType::LeadTrigger), &mut ctx)
            .await;

        assert_eq!(ctx.resolve_template("{{name}}"), "Bruno");
        assert_eq!(ctx.resolve_template("{{phone}}"), "+5521988880000");
    }

    #[tokio::test]
    async fn field_data_answers_are_scanned() {
        let mut ctx = ctx(json!({
            "leadgen_id": "778899",
            "field_data": [
                {"name": "full_name", "values": ["Carla"]},
                {"name": "phone_number", "values": ["+5531977770000"]},
                {"name": "email", "values": ["carla@example.com"]}
            ]
        }));
        let result = LeadTriggerHandler
            .execute(&node(NodeType::LeadTrigger), &mut ctx)
            .await;

        assert_eq!(ctx.resolve_template("{{name}}"), "Carla");
        assert_eq!(ctx.resolve_template("{{email}}"), "carla@example.com");
        assert_eq!(ctx.resolve_template("{{lead_id}}"), "778899");
        assert_eq!(result.output["phone"], "+5531977770000");
    }

    #[tokio::test]
    async fn absent_fields_become_empty_strings_not_errors() {
        let mut ctx = ctx(json!({}));
        let result = LeadTriggerHandler
            .execute(&node(NodeType::LeadTrigger), &mut ctx)
            .await;

        assert!(result.error.is_none());
        assert_eq!(result.output["name"], "");
        assert_eq!(result.output["lead_id"], "");
    }

    #[tokio::test]
    async fn plain_trigger_passes_payload_through() {
        let mut ctx = ctx(json!({"anything": [1, 2, 3]}));
        let result = TriggerHandler
            .execute(&node(NodeType::WebhookTrigger), &mut ctx)
            .await;

        assert!(result.error.is_none());
        assert_eq!(result.output["payload"], json!({"anything": [1, 2, 3]}));
    }
}
