//! Declared input types.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The value type an input accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    /// Any JSON string.
    String,
    /// Any JSON number.
    Number,
    /// `true` or `false`.
    Boolean,
    /// A JSON array.
    Array,
    /// One of the declared `enum` values.
    Enum,
}

impl InputType {
    /// Returns `true` if `value` has the right JSON shape for this type.
    ///
    /// Enum membership is checked separately against [`InputSpec::allowed`].
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Enum => !value.is_null() && !value.is_object() && !value.is_array(),
        }
    }
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Enum => "enum",
        };
        f.write_str(name)
    }
}

/// Declaration of one input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputSpec {
    /// Accepted value type.
    #[serde(rename = "type")]
    pub input_type: InputType,
    /// Whether the caller must supply a value when there is no default.
    #[serde(default)]
    pub required: bool,
    /// Value used when the caller supplies none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Allowed values; mandatory for `enum`, optional restriction otherwise.
    #[serde(default, rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub allowed: Vec<Value>,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl InputSpec {
    /// Checks a candidate value against type and allowed values.
    ///
    /// # Errors
    ///
    /// Returns a diagnostic describing the mismatch.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        if !self.input_type.accepts(value) {
            return Err(format!("expected {}, got {}", self.input_type, json_kind(value)));
        }
        if !self.allowed.is_empty() && !self.allowed.contains(value) {
            let allowed: Vec<String> = self.allowed.iter().map(Value::to_string).collect();
            return Err(format!("must be one of [{}], got {value}", allowed.join(", ")));
        }
        Ok(())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn spec(input_type: InputType, allowed: Vec<Value>) -> InputSpec {
        InputSpec { input_type, required: false, default: None, allowed, description: None }
    }

    #[test]
    fn type_mismatch_is_reported() {
        let err = spec(InputType::Number, vec![]).check(&json!("three")).unwrap_err();
        assert_eq!(err, "expected number, got string");
    }

    #[test]
    fn enum_membership_is_enforced() {
        let s = spec(InputType::Enum, vec![json!("sqlite"), json!("postgres")]);
        assert!(s.check(&json!("postgres")).is_ok());
        assert!(s.check(&json!("mysql")).unwrap_err().contains("must be one of"));
    }
}
