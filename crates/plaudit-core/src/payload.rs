//! Typed reads over a response's free-form answer map.
//!
//! None of these functions fail: anything of the wrong shape reads as absent.

use serde_json::{Map, Value};

use crate::response::Response;

/// The answer map of `response`, or an empty map when the stored payload is
/// null, an array, or any other non-object value.
pub fn extract_payload(response: &Response) -> Map<String, Value> {
  payload_map(&response.payload)
}

/// Like [`extract_payload`] but over a bare payload value.
pub fn payload_map(value: &Value) -> Map<String, Value> {
  match value {
    Value::Object(map) => map.clone(),
    _ => Map::new(),
  }
}

/// The value under `key` if it is exactly a string. No coercion.
pub fn read_string<'a>(payload: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
  payload.get(key).and_then(Value::as_str)
}

/// The value under `key` as a finite number.
///
/// Numbers are returned as-is; non-blank strings are parsed and returned only
/// if the result is finite.
pub fn read_number(payload: &Map<String, Value>, key: &str) -> Option<f64> {
  match payload.get(key)? {
    Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
    Value::String(s) if !s.trim().is_empty() => {
      s.trim().parse::<f64>().ok().filter(|f| f.is_finite())
    }
    _ => None,
  }
}

/// Human-readable text for an answer value, as sent to the generation
/// workflow.
///
/// Absent and null become `""`, strings pass through, numbers and booleans use
/// their textual form, and arrays/objects are rendered as JSON.
pub fn stringify(value: Option<&Value>) -> String {
  match value {
    None | Some(Value::Null) => String::new(),
    Some(Value::String(s)) => s.clone(),
    Some(Value::Number(n)) => n.to_string(),
    Some(Value::Bool(b)) => b.to_string(),
    Some(other) => serde_json::to_string(other).unwrap_or_default(),
  }
}
