//! Shared helpers for command handlers.

use std::str::FromStr;

use chrono::{DateTime, Local, Utc};
use serde_json::{Map, Value};

use hubpanel_core::Section;

use crate::error::CliError;

/// Resolve a section name (`waterHeater`, case-insensitive).
pub fn parse_section(name: &str) -> Result<Section, CliError> {
    Section::from_str(name).map_err(|_| CliError::unknown_section(name))
}

/// Parse a JSON argument.
pub fn parse_json(field: &str, raw: &str) -> Result<Value, CliError> {
    serde_json::from_str(raw).map_err(|e| CliError::Validation {
        field: field.into(),
        reason: format!("invalid JSON: {e}"),
    })
}

/// Parse a JSON argument that must be an object. `None` means empty.
pub fn parse_json_object(field: &str, raw: Option<&str>) -> Result<Map<String, Value>, CliError> {
    let Some(raw) = raw else {
        return Ok(Map::new());
    };
    match parse_json(field, raw)? {
        Value::Object(map) => Ok(map),
        other => Err(CliError::Validation {
            field: field.into(),
            reason: format!("expected a JSON object, got {other}"),
        }),
    }
}

/// Every `entityId` string anywhere inside a section value, in order.
pub fn entity_ids_in(value: &Value) -> Vec<String> {
    fn walk(value: &Value, out: &mut Vec<String>) {
        match value {
            Value::Object(map) => {
                if let Some(Value::String(id)) = map.get("entityId") {
                    out.push(id.clone());
                }
                map.values().for_each(|v| walk(v, out));
            }
            Value::Array(items) => items.iter().for_each(|v| walk(v, out)),
            _ => {}
        }
    }

    let mut out = Vec::new();
    walk(value, &mut out);
    out
}

/// Local wall-clock time for tables.
pub fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Render an attribute value without JSON quoting for strings.
pub fn attribute_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
