//! Typed extraction over the dynamic JSON parameter payload.
//!
//! Invocation parameters arrive either in positional array form
//! `[user, collection, data_name]` (event handler invocations) or in object
//! form carrying named fields (direct invocations). Extraction failures are
//! typed errors rather than panics.

use crate::error::{PolicyError, Result};
use crate::paths;
use serde_json::Value;

/// Extract a required string field from an object payload.
pub fn required_str<'a>(payload: &'a Value, field: &str) -> Result<&'a str> {
    match payload.get(field) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(PolicyError::FieldType {
            field: field.to_string(),
            expected: "string",
        }),
        None => Err(PolicyError::MissingField(field.to_string())),
    }
}

/// Extract an optional string field; absent or non-string yields `None`.
pub fn optional_str<'a>(payload: &'a Value, field: &str) -> Option<&'a str> {
    payload.get(field).and_then(Value::as_str)
}

/// Extract a required integer field from an object payload.
pub fn required_i64(payload: &Value, field: &str) -> Result<i64> {
    match payload.get(field) {
        Some(value) => value.as_i64().ok_or_else(|| PolicyError::FieldType {
            field: field.to_string(),
            expected: "integer",
        }),
        None => Err(PolicyError::MissingField(field.to_string())),
    }
}

/// Extract an optional integer field; absent or non-integer yields `None`.
pub fn optional_i64(payload: &Value, field: &str) -> Option<i64> {
    payload.get(field).and_then(Value::as_i64)
}

fn positional_str<'a>(values: &'a [Value], idx: usize, name: &str) -> Result<&'a str> {
    values[idx].as_str().ok_or_else(|| PolicyError::FieldType {
        field: name.to_string(),
        expected: "string",
    })
}

/// Canonical invocation parameters shared by both plugins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventParameters {
    pub user_name: String,
    pub logical_path: String,
    pub source_resource: String,
    pub destination_resource: String,
}

impl EventParameters {
    /// Normalize an invocation payload into canonical parameters.
    ///
    /// Array form carries `[user, collection, data_name]`; the logical path
    /// is the collection joined with the data name, and resources are empty.
    /// Object form carries named fields, each of which may be absent.
    pub fn capture(parameters: &Value) -> Result<Self> {
        if let Some(positional) = parameters.as_array() {
            if positional.len() < 3 {
                return Err(PolicyError::InvalidInput(format!(
                    "expected 3 positional parameters, found {}",
                    positional.len()
                )));
            }

            let user_name = positional_str(positional, 0, "user_name")?;
            let collection = positional_str(positional, 1, "collection_name")?;
            let data_name = positional_str(positional, 2, "data_name")?;

            return Ok(Self {
                user_name: user_name.to_string(),
                logical_path: paths::join(collection, data_name),
                ..Self::default()
            });
        }

        Ok(Self {
            user_name: optional_str(parameters, "user_name").unwrap_or_default().to_string(),
            logical_path: optional_str(parameters, "logical_path")
                .unwrap_or_default()
                .to_string(),
            source_resource: optional_str(parameters, "source_resource")
                .unwrap_or_default()
                .to_string(),
            destination_resource: optional_str(parameters, "destination_resource")
                .unwrap_or_default()
                .to_string(),
        })
    }
}
