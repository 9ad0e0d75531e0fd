//! Reading profile records from disk.
//!
//! A file that cannot be turned into a [`ProfileInput`] is never sent to a
//! model; the CLI prints an invalid result naming the file instead.

use std::path::{Path, PathBuf};

use thiserror::Error;
use vouch_core::{InputError, ProfileInput, ValidationResult};

/// Why an input file could not be used.
#[derive(Error, Debug)]
pub enum InputFileError {
    #[error("Input file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Input file contains invalid JSON: {}", .0.display())]
    InvalidJson(PathBuf, #[source] serde_json::Error),

    #[error("Input file must contain a JSON object: {}", .0.display())]
    NotAnObject(PathBuf),

    #[error("Failed to read input file {}: {}", .0.display(), .1)]
    Unreadable(PathBuf, #[source] std::io::Error),
}

impl InputFileError {
    /// The result printed in place of a model verdict.
    pub fn to_result(&self) -> ValidationResult {
        ValidationResult::invalid(vec![self.to_string()], Vec::new())
    }
}

/// Load one profile record.
pub fn load_profile(path: &Path) -> Result<ProfileInput, InputFileError> {
    let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => InputFileError::NotFound(path.to_path_buf()),
        _ => InputFileError::Unreadable(path.to_path_buf(), e),
    })?;

    let input = ProfileInput::from_json(&text).map_err(|e| match e {
        InputError::JsonError(e) => InputFileError::InvalidJson(path.to_path_buf(), e),
        InputError::NotAnObject(_) => InputFileError::NotAnObject(path.to_path_buf()),
    })?;

    if !input.unknown_fields().is_empty() {
        tracing::warn!(
            file = %path.display(),
            fields = ?input.unknown_fields(),
            "Input has fields that will not be validated"
        );
    }
    tracing::debug!(file = %path.display(), "Loaded input file");

    Ok(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("vouch-input-{}-{}", std::process::id(), name));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_valid_profile() {
        let path = write_temp("ok.json", r#"{"age": 16, "nickname": "kid"}"#);
        let input = load_profile(&path).unwrap();
        assert_eq!(input.present_fields(), vec!["age"]);
        assert_eq!(input.unknown_fields(), ["nickname".to_string()]);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_file_result_names_file() {
        let path = PathBuf::from("/nonexistent/profile.json");
        let err = load_profile(&path).unwrap_err();
        assert!(matches!(err, InputFileError::NotFound(_)));

        let result = err.to_result();
        assert!(!result.is_valid);
        assert_eq!(result.errors, vec!["Input file not found: /nonexistent/profile.json"]);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_invalid_json() {
        let path = write_temp("bad.json", "{\"age\": ");
        let err = load_profile(&path).unwrap_err();
        assert!(matches!(err, InputFileError::InvalidJson(..)));
        assert!(err.to_string().starts_with("Input file contains invalid JSON"));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_array_is_rejected() {
        let path = write_temp("array.json", "[1, 2]");
        let err = load_profile(&path).unwrap_err();
        assert!(matches!(err, InputFileError::NotAnObject(_)));
        std::fs::remove_file(&path).unwrap();
    }
}
