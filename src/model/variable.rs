//! Workflow variables: named JSON values with a detected kind.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Runtime kind of a variable, detected from its JSON value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    String,
    Integer,
    Float,
    Boolean,
    Object,
    Array,
    Null,
}

impl VariableKind {
    /// Detect the kind of a JSON value.
    ///
    /// Numbers that fit an integer are [`Integer`](Self::Integer); everything
    /// else numeric is [`Float`](Self::Float).
    #[must_use]
    pub fn of(value: &Value) -> Self {
        match value {
            Value::String(_) => VariableKind::String,
            Value::Number(n) => {
                if n.is_i64() || n.is_u64() {
                    VariableKind::Integer
                } else {
                    VariableKind::Float
                }
            }
            Value::Bool(_) => VariableKind::Boolean,
            Value::Object(_) => VariableKind::Object,
            Value::Array(_) => VariableKind::Array,
            Value::Null => VariableKind::Null,
        }
    }
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VariableKind::String => "string",
            VariableKind::Integer => "integer",
            VariableKind::Float => "float",
            VariableKind::Boolean => "boolean",
            VariableKind::Object => "object",
            VariableKind::Array => "array",
            VariableKind::Null => "null",
        };
        write!(f, "{label}")
    }
}

/// A named, workflow-scoped value on the run blackboard.
///
/// `is_system` marks engine-populated variables (trigger-derived fields and
/// the like) apart from user-authored ones; both are readable by every
/// handler in the run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub value: Value,
    pub kind: VariableKind,
    #[serde(default)]
    pub is_system: bool,
}

impl Variable {
    /// Create a user variable; the kind is detected from the value.
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        let kind = VariableKind::of(&value);
        Self {
            name: name.into(),
            value,
            kind,
            is_system: false,
        }
    }

    /// Create an engine-populated variable.
    pub fn system(name: impl Into<String>, value: Value) -> Self {
        let mut variable = Self::new(name, value);
        variable.is_system = true;
        variable
    }

    /// The value rendered as a plain string, the way templates see it.
    ///
    /// Strings pass through unquoted, scalars stringify, containers render as
    /// compact JSON, null renders empty.
    #[must_use]
    pub fn render(&self) -> String {
        crate::template::render_value(&self.value)
    }
}
