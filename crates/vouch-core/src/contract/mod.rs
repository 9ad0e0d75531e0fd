//! The output contract for model responses.
//!
//! Model responses are untrusted text. This module turns them into a
//! [`ValidationResult`](crate::ValidationResult) in two steps: syntactic
//! extraction of a JSON object, then strict shape checks against the
//! three-key contract.

mod parser;
mod schema;

pub use parser::{parse_response, ParseError};
pub use schema::{validate_response, SchemaViolation, REQUIRED_KEYS};
