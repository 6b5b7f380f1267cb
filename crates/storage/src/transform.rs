//! Resolution of field writes against the currently stored document.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use shared::protocol::{FieldValue, Fields, WriteMode};

pub fn server_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Builds the document body that results from writing `fields` over
/// `existing`. Overwrites start from an empty body; merges keep untouched
/// fields.
pub fn apply_fields(
    existing: Option<Map<String, Value>>,
    fields: &Fields,
    mode: WriteMode,
    now: &str,
) -> Map<String, Value> {
    let mut body = match mode {
        WriteMode::Overwrite => Map::new(),
        WriteMode::Merge => existing.unwrap_or_default(),
    };

    for (key, field) in fields {
        let resolved = match field {
            FieldValue::Value(value) => value.clone(),
            FieldValue::ServerTimestamp => Value::String(now.to_string()),
            FieldValue::ArrayUnion(values) => {
                let mut items = current_array(&body, key);
                for value in values {
                    if !items.contains(value) {
                        items.push(value.clone());
                    }
                }
                Value::Array(items)
            }
            FieldValue::ArrayRemove(values) => {
                let mut items = current_array(&body, key);
                items.retain(|item| !values.contains(item));
                Value::Array(items)
            }
        };
        body.insert(key.clone(), resolved);
    }

    body
}

fn current_array(body: &Map<String, Value>, key: &str) -> Vec<Value> {
    match body.get(key) {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
#[path = "tests/transform_tests.rs"]
mod tests;
