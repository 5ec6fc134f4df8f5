//! Input resolution: defaults, required fields, types and allowed values.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::definition::InputSpec;

/// Caller-supplied inputs that do not satisfy their declarations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    /// Inputs were not a JSON object.
    #[error("inputs must be a JSON object, got {found}")]
    NotAnObject {
        /// JSON kind that was supplied.
        found: String,
    },
    /// A required input has neither a value nor a default.
    #[error("missing required input `{name}`")]
    Missing {
        /// Input name.
        name: String,
    },
    /// A value has the wrong type or is not an allowed value.
    #[error("invalid input `{name}`: {message}")]
    Invalid {
        /// Input name.
        name: String,
        /// What is wrong.
        message: String,
    },
    /// A checkpoint modification named an input the task does not declare.
    #[error("cannot modify undeclared input `{name}`")]
    Undeclared {
        /// Input name.
        name: String,
    },
}

/// Validates supplied inputs and fills defaults.
///
/// Keys the task does not declare are dropped with a warning. Optional
/// inputs without a default and without a value stay absent.
///
/// # Errors
///
/// Returns the first missing or invalid input, checking inputs in name order.
pub fn resolve(
    specs: &BTreeMap<String, InputSpec>,
    supplied: &Value,
) -> Result<Map<String, Value>, InputError> {
    let empty = Map::new();
    let supplied = match supplied {
        Value::Object(map) => map,
        Value::Null => &empty,
        other => return Err(InputError::NotAnObject { found: json_kind(other).to_string() }),
    };
    for key in supplied.keys().filter(|key| !specs.contains_key(*key)) {
        tracing::warn!(input = %key, "ignoring undeclared input");
    }

    let mut resolved = Map::new();
    for (name, spec) in specs {
        let value = match supplied.get(name).filter(|v| !v.is_null()) {
            Some(value) => value.clone(),
            None => match &spec.default {
                Some(default) => default.clone(),
                None if spec.required => return Err(InputError::Missing { name: name.clone() }),
                None => continue,
            },
        };
        spec.check(&value)
            .map_err(|message| InputError::Invalid { name: name.clone(), message })?;
        resolved.insert(name.clone(), value);
    }
    Ok(resolved)
}

/// Applies a checkpoint modification on top of already resolved inputs.
///
/// # Errors
///
/// Returns an error if a key is undeclared or a new value is invalid.
pub fn merge(
    specs: &BTreeMap<String, InputSpec>,
    current: &Map<String, Value>,
    changes: &Map<String, Value>,
) -> Result<Map<String, Value>, InputError> {
    let mut merged = current.clone();
    for (name, value) in changes {
        let spec =
            specs.get(name).ok_or_else(|| InputError::Undeclared { name: name.clone() })?;
        spec.check(value)
            .map_err(|message| InputError::Invalid { name: name.clone(), message })?;
        merged.insert(name.clone(), value.clone());
    }
    Ok(merged)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
