//! JSON-safe serialization of attribute values
//!
//! Snapshot and diff maps are persisted into JSON columns. This module turns
//! [`AttrValue`] trees into `serde_json::Value` without losing information:
//!
//! - timestamps become ISO-8601 (RFC 3339) strings,
//! - dates become ISO calendar-date strings,
//! - fixed-point decimals become their exact decimal string (a float would
//!   silently truncate monetary values),
//! - maps and lists are transformed recursively.
//!
//! A value with no faithful JSON representation (a non-finite float) is an
//! error, not a silent drop. The error propagates up through the change
//! interceptor and aborts the enclosing transaction.

use crate::value::{AttrMap, AttrValue};
use serde_json::{Map as JsonMap, Value as JsonValue};
use thiserror::Error;

/// Errors raised while converting a value for JSON storage
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JsonSafeError {
    #[error("float value {0} has no JSON representation")]
    NonFiniteFloat(f64),
}

/// Convert a single attribute value into its JSON-safe form.
pub fn to_json_safe(value: &AttrValue) -> Result<JsonValue, JsonSafeError> {
    match value {
        AttrValue::Null => Ok(JsonValue::Null),
        AttrValue::Bool(v) => Ok(JsonValue::Bool(*v)),
        AttrValue::Int(v) => Ok(JsonValue::Number((*v).into())),
        AttrValue::Float(v) => serde_json::Number::from_f64(*v)
            .map(JsonValue::Number)
            .ok_or(JsonSafeError::NonFiniteFloat(*v)),
        AttrValue::Text(v) => Ok(JsonValue::String(v.clone())),
        // Decimal string keeps the declared scale; "10.00" stays "10.00".
        AttrValue::Decimal(v) => Ok(JsonValue::String(v.to_string())),
        AttrValue::Timestamp(v) => Ok(JsonValue::String(v.to_rfc3339())),
        AttrValue::Date(v) => Ok(JsonValue::String(v.to_string())),
        AttrValue::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(to_json_safe(item)?);
            }
            Ok(JsonValue::Array(out))
        },
        AttrValue::Map(map) => map_to_json(map),
    }
}

/// Convert an attribute map into a JSON object.
pub fn map_to_json(map: &AttrMap) -> Result<JsonValue, JsonSafeError> {
    let mut out = JsonMap::with_capacity(map.len());
    for (name, value) in map {
        out.insert(name.clone(), to_json_safe(value)?);
    }
    Ok(JsonValue::Object(out))
}
