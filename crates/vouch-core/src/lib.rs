//! # vouch-core
//!
//! Output contract and data model for LLM-judged profile validation.
//!
//! This crate never calls a model. It defines what goes in (a
//! [`ProfileInput`]), what must come out (a [`ValidationResult`]) and the
//! checks that stand between a model's raw text and the caller:
//!
//! 1. [`parse_response`] extracts a JSON object from surrounding prose or
//!    code fences
//! 2. [`validate_response`] enforces the exact three-key contract and the
//!    errors/is_valid invariant, reporting every violation found
//!
//! ## Example
//!
//! ```rust
//! use vouch_core::{parse_response, validate_response};
//!
//! let raw = "```json\n{\"is_valid\": true, \"errors\": [], \"warnings\": [\"age is under 18\"]}\n```";
//! let value = parse_response(raw).unwrap();
//! let result = validate_response(&value).unwrap();
//! assert!(result.is_valid);
//! ```

pub mod contract;
pub mod types;

pub use contract::{parse_response, validate_response, ParseError, SchemaViolation, REQUIRED_KEYS};
pub use types::{
    json_type, InputError, ProfileInput, ValidationResult, FALLBACK_ERROR, PROFILE_FIELDS,
};
