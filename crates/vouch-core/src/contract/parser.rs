//! Extraction of a JSON object from raw model text.
//!
//! Models wrap their answer in code fences or surround it with prose even
//! when asked not to. This module only locates and deserializes the object;
//! it makes no judgment about its shape.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

lazy_static! {
    /// A fenced block, optionally tagged (```json ... ```).
    static ref CODE_FENCE: Regex =
        Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)```").unwrap();
}

/// Errors from response extraction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("response was empty")]
    Empty,

    #[error("no JSON object found in response")]
    NoJsonObject,

    #[error("response contained a malformed JSON object: {0}")]
    Malformed(String),
}

/// Extract the JSON object a model response carries.
///
/// Fenced blocks are searched first, then the whole text. Within each
/// source, every outermost balanced `{ ... }` span is tried in order and the
/// first one that deserializes wins.
pub fn parse_response(raw: &str) -> Result<Value, ParseError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut sources: Vec<&str> = CODE_FENCE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect();
    sources.push(text);

    let mut last_error = None;
    for source in sources {
        for candidate in balanced_objects(source) {
            match serde_json::from_str::<Value>(candidate) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    tracing::trace!(error = %e, "Skipping malformed JSON candidate");
                    last_error = Some(e.to_string());
                }
            }
        }
    }

    match last_error {
        Some(e) => Err(ParseError::Malformed(e)),
        None => Err(ParseError::NoJsonObject),
    }
}

/// Outermost balanced `{ ... }` spans of `text`, in order.
///
/// Braces inside string literals are ignored once an object has opened.
/// Quotes in surrounding prose are not treated as strings. An opening brace
/// that is never closed is skipped and the scan resumes right after it, so
/// a stray `{` in prose does not hide a later object.
fn balanced_objects(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut from = 0usize;

    while let Some(offset) = text[from..].find('{') {
        let start = from + offset;
        match object_len(&text[start..]) {
            Some(len) => {
                spans.push(&text[start..start + len]);
                from = start + len;
            }
            None => from = start + 1,
        }
    }

    spans
}

/// Byte length of the balanced object opening at the start of `text`.
fn object_len(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in text.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }

    None
}
