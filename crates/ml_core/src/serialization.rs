//! Canonical JSON for hashing model artifacts.
//!
//! Object keys are sorted recursively and output is compact, so equal values
//! always hash to equal digests. Sorting is explicit because another crate in
//! the graph may enable `serde_json/preserve_order`.

use serde::Serialize;
use serde_json::{Map, Value};

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let sorted: Map<String, Value> = entries
                .into_iter()
                .map(|(key, val)| (key, canonicalize(val)))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Serialize `value` to canonical compact JSON.
pub fn canonical_json_string<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let canonical = canonicalize(serde_json::to_value(value)?);
    serde_json::to_string(&canonical)
}
