//! Core data types for profile validation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Error message carried by the safe-default result.
pub const FALLBACK_ERROR: &str = "validation failed: unable to obtain well-formed response";

/// Field names the validation rules know about.
pub const PROFILE_FIELDS: [&str; 5] = ["name", "email", "age", "country", "phone"];

/// Errors from reading a profile record.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("Profile input must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A user-profile record submitted for validation.
///
/// Every field is optional. Values are kept as raw JSON so that a
/// wrongly-typed value (`"age": "twenty"`) still reaches the model, which
/// is the one that judges it. A JSON `null` is read as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<Value>,

    /// Top-level keys that are not profile fields. Never sent to the model.
    #[serde(skip)]
    unknown_fields: Vec<String>,
}

impl ProfileInput {
    /// Create an empty profile.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a profile from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, InputError> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(&value)
    }

    /// Build a profile from a JSON value, recording unknown keys.
    pub fn from_value(value: &Value) -> Result<Self, InputError> {
        let map = value
            .as_object()
            .ok_or_else(|| InputError::NotAnObject(json_type(value)))?;

        Ok(Self {
            name: present(map, "name"),
            email: present(map, "email"),
            age: present(map, "age"),
            country: present(map, "country"),
            phone: present(map, "phone"),
            unknown_fields: map
                .keys()
                .filter(|k| !PROFILE_FIELDS.contains(&k.as_str()))
                .cloned()
                .collect(),
        })
    }

    pub fn with_name(mut self, name: impl Into<Value>) -> Self {
        self.name = non_null(name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<Value>) -> Self {
        self.email = non_null(email.into());
        self
    }

    pub fn with_age(mut self, age: impl Into<Value>) -> Self {
        self.age = non_null(age.into());
        self
    }

    pub fn with_country(mut self, country: impl Into<Value>) -> Self {
        self.country = non_null(country.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<Value>) -> Self {
        self.phone = non_null(phone.into());
        self
    }

    /// Keys in the source record that are not profile fields.
    pub fn unknown_fields(&self) -> &[String] {
        &self.unknown_fields
    }

    /// Names of the fields that carry a value.
    pub fn present_fields(&self) -> Vec<&'static str> {
        PROFILE_FIELDS
            .iter()
            .zip([&self.name, &self.email, &self.age, &self.country, &self.phone])
            .filter(|(_, v)| v.is_some())
            .map(|(k, _)| *k)
            .collect()
    }

    /// True when no field carries a value.
    pub fn is_empty(&self) -> bool {
        self.present_fields().is_empty()
    }

    /// Compact JSON with absent and null fields omitted.
    pub fn to_prompt_json(&self) -> String {
        // Only string keys and JSON values: serialization cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

fn present(map: &Map<String, Value>, key: &str) -> Option<Value> {
    map.get(key).cloned().and_then(non_null)
}

fn non_null(value: Value) -> Option<Value> {
    if value.is_null() {
        None
    } else {
        Some(value)
    }
}

/// The structured verdict returned for every validation call.
///
/// # Invariants
/// - Non-empty `errors` implies `is_valid == false`
/// - `warnings` never affect `is_valid`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// A passing result with the given warnings.
    pub fn valid(warnings: Vec<String>) -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings,
        }
    }

    /// A failing result with the given errors and warnings.
    pub fn invalid(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            is_valid: false,
            errors,
            warnings,
        }
    }

    /// The deterministic safe default used when no well-formed response
    /// could be obtained.
    pub fn fallback() -> Self {
        Self::invalid(vec![FALLBACK_ERROR.to_string()], Vec::new())
    }

    /// Check the errors/is_valid invariant.
    pub fn is_consistent(&self) -> bool {
        self.errors.is_empty() || !self.is_valid
    }

    /// Whether this is the safe-default result.
    pub fn is_fallback(&self) -> bool {
        *self == Self::fallback()
    }
}

/// JSON type name used in diagnostics.
pub fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
