//! Output contract checks for model responses.
//!
//! A response is accepted only when it is an object with exactly the keys
//! `is_valid`, `errors` and `warnings`, correctly typed, and consistent
//! (non-empty `errors` forces `is_valid == false`). Every violation found is
//! reported so the repair prompt can name all of them at once.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::{json_type, ValidationResult};

/// Keys the output contract requires, in reporting order.
pub const REQUIRED_KEYS: [&str; 3] = ["is_valid", "errors", "warnings"];

/// A response that does not satisfy the output contract.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("schema violation: {}", .reasons.join("; "))]
pub struct SchemaViolation {
    /// Human-readable reasons, in check order
    pub reasons: Vec<String>,
}

impl SchemaViolation {
    fn single(reason: impl Into<String>) -> Self {
        Self {
            reasons: vec![reason.into()],
        }
    }
}

/// Validate a parsed response against the output contract.
///
/// Checks run in order: key set, `is_valid` type, array element types,
/// then the errors/is_valid invariant. This function has no side effects.
pub fn validate_response(value: &Value) -> Result<ValidationResult, SchemaViolation> {
    let map = match value.as_object() {
        Some(map) => map,
        None => {
            return Err(SchemaViolation::single(format!(
                "response must be a JSON object, got {}",
                json_type(value)
            )))
        }
    };

    let mut reasons = Vec::new();

    check_keys(map, &mut reasons);

    let is_valid = match map.get("is_valid") {
        Some(Value::Bool(b)) => Some(*b),
        Some(other) => {
            reasons.push(format!("is_valid must be a boolean, got {}", json_type(other)));
            None
        }
        None => None,
    };

    let errors = map.get("errors").and_then(|v| string_array("errors", v, &mut reasons));
    let warnings = map
        .get("warnings")
        .and_then(|v| string_array("warnings", v, &mut reasons));

    let errors_non_empty = map
        .get("errors")
        .and_then(Value::as_array)
        .is_some_and(|a| !a.is_empty());
    if is_valid == Some(true) && errors_non_empty {
        reasons.push("is_valid must be false when errors is non-empty".to_string());
    }

    match (is_valid, errors, warnings) {
        (Some(is_valid), Some(errors), Some(warnings)) if reasons.is_empty() => {
            Ok(ValidationResult {
                is_valid,
                errors,
                warnings,
            })
        }
        _ => Err(SchemaViolation { reasons }),
    }
}

fn check_keys(map: &Map<String, Value>, reasons: &mut Vec<String>) {
    let missing: Vec<&str> = REQUIRED_KEYS
        .iter()
        .copied()
        .filter(|k| !map.contains_key(*k))
        .collect();
    if !missing.is_empty() {
        reasons.push(format!("missing required fields: {}", missing.join(", ")));
    }

    let extra: Vec<&str> = map
        .keys()
        .map(String::as_str)
        .filter(|k| !REQUIRED_KEYS.contains(k))
        .collect();
    if !extra.is_empty() {
        reasons.push(format!("extra fields not allowed: {}", extra.join(", ")));
    }
}

/// Read `value` as an array of strings, recording every offending element.
fn string_array(field: &str, value: &Value, reasons: &mut Vec<String>) -> Option<Vec<String>> {
    let items = match value.as_array() {
        Some(items) => items,
        None => {
            reasons.push(format!(
                "{} must be an array of strings, got {}",
                field,
                json_type(value)
            ));
            return None;
        }
    };

    let mut strings = Vec::with_capacity(items.len());
    let mut ok = true;
    for (i, item) in items.iter().enumerate() {
        match item.as_str() {
            Some(s) => strings.push(s.to_string()),
            None => {
                ok = false;
                reasons.push(format!(
                    "{}[{}] must be a string, got {}",
                    field,
                    i,
                    json_type(item)
                ));
            }
        }
    }

    ok.then_some(strings)
}
