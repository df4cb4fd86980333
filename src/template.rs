//! `{{placeholder}}` template resolution against the run blackboard.
//!
//! Templates appear throughout node configurations. Two placeholder forms are
//! supported:
//!
//! - `{{name}}` reads the variable `name` from the blackboard;
//! - `{{$trigger.path.to.field}}` descends into the trigger payload by
//!   dot-path (array segments are numeric indices). `{{$trigger}}` alone
//!   renders the whole payload.
//!
//! Resolution is total: a placeholder that matches nothing renders as the
//! empty string, never an error. Templates are user-authored and frequently
//! optional, so missing data must not abort a run.
//!
//! # Examples
//!
//! ```rust
//! use flowloom::context::VariableMap;
//! use flowloom::template::resolve_str;
//! use serde_json::json;
//!
//! let mut vars = VariableMap::default();
//! vars.set("a", json!("x"));
//! vars.set("b", json!("y"));
//! let trigger = json!({"lead": {"phone": "+5511999990000"}});
//!
//! assert_eq!(resolve_str("{{a}}-{{b}}", &vars, &trigger), "x-y");
//! assert_eq!(
//!     resolve_str("call {{$trigger.lead.phone}}", &vars, &trigger),
//!     "call +5511999990000"
//! );
//! assert_eq!(resolve_str("{{a}}-{{missing}}", &vars, &trigger), "x-");
//! ```

use serde_json::{Map, Value};

use crate::context::VariableMap;

/// Prefix selecting the trigger payload instead of the blackboard.
const TRIGGER_PREFIX: &str = "$trigger";

/// Resolve every placeholder in `input` against `variables` and `trigger`.
///
/// Text outside placeholders passes through untouched. An unterminated
/// `{{` is kept literally.
pub fn resolve_str(input: &str, variables: &VariableMap, trigger: &Value) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];
        match after_open.find("}}") {
            Some(close) => {
                let token = after_open[..close].trim();
                out.push_str(&lookup(token, variables, trigger));
                rest = &after_open[close + 2..];
            }
            None => {
                // No closing braces; keep the remainder literally.
                out.push_str(&rest[open..]);
                return out;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Resolve every string leaf of `value`, preserving structure.
///
/// Objects and arrays are walked recursively; non-string scalars are cloned
/// unchanged.
pub fn resolve_value(value: &Value, variables: &VariableMap, trigger: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(resolve_str(s, variables, trigger)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| resolve_value(item, variables, trigger))
                .collect(),
        ),
        Value::Object(map) => Value::Object(resolve_map(map, variables, trigger)),
        other => other.clone(),
    }
}

/// [`resolve_value`] over a JSON object, used for field-mapping configs.
pub fn resolve_map(
    map: &Map<String, Value>,
    variables: &VariableMap,
    trigger: &Value,
) -> Map<String, Value> {
    map.iter()
        .map(|(k, v)| (k.clone(), resolve_value(v, variables, trigger)))
        .collect()
}

fn lookup(token: &str, variables: &VariableMap, trigger: &Value) -> String {
    if token.is_empty() {
        return String::new();
    }
    if let Some(rest) = token.strip_prefix(TRIGGER_PREFIX) {
        let path = rest.strip_prefix('.').unwrap_or(rest);
        return match get_by_path(trigger, path) {
            Some(value) => render_value(value),
            None => String::new(),
        };
    }
    match variables.get(token) {
        Some(variable) => render_value(&variable.value),
        None => String::new(),
    }
}

/// Render a JSON value the way templates splice it into strings.
///
/// Strings pass through unquoted, numbers and booleans stringify, objects
/// and arrays render as compact JSON, null renders empty.
#[must_use]
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Navigate a JSON value by dot-separated path.
///
/// Object segments are keys, array segments are numeric indices. An empty
/// path returns the value itself.
#[must_use]
pub fn get_by_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }

    let mut current = value;
    for part in path.split('.') {
        match current {
            Value::Object(obj) => {
                current = obj.get(part)?;
            }
            Value::Array(arr) => {
                let index: usize = part.parse().ok()?;
                current = arr.get(index)?;
            }
            _ => return None,
        }
    }
    Some(current)
}
