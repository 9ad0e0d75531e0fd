//! Prompts for the profile validator.
//!
//! The system prompt carries every validation rule and the output
//! contract; the model is the only place judgment happens. The repair
//! prompt is sent after a response fails the contract and quotes that
//! response back together with the reasons it failed.
//!
//! Both can be overridden from a directory holding `system_prompt.txt` and
//! `repair_prompt.txt`.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name of the system prompt override.
pub const SYSTEM_PROMPT_FILE: &str = "system_prompt.txt";

/// File name of the repair prompt override.
pub const REPAIR_PROMPT_FILE: &str = "repair_prompt.txt";

/// Placeholder replaced with the rejected response.
pub const PREVIOUS_OUTPUT_PLACEHOLDER: &str = "{previous_output}";

/// Placeholder replaced with the list of contract violations.
pub const VIOLATIONS_PLACEHOLDER: &str = "{violations}";

/// Built-in system prompt.
///
/// The model must only ever mention values that appear in the input; it
/// is told so explicitly because nothing downstream can check it.
pub const SYSTEM_PROMPT: &str = r#"
You are a data validation service for user profiles.

You receive one JSON object under "User Input:". It may contain any of the
fields name, email, age, country and phone. Every field is optional.

## Rules
Apply a rule ONLY when its field is present and not null. If a field is
absent or null, skip it entirely and say nothing about it.

- name: ERROR if it is an empty string. WARNING if it is shorter than 3 characters.
- email: ERROR if it is not a syntactically valid email address.
  WARNING if its domain belongs to a known disposable email provider
  (for example mailinator.com, 10minutemail.com, guerrillamail.com, tempmail.com).
- age: ERROR if it is not a positive number. WARNING if it is less than 18.
  An age under 18 is never an error.
- country: ERROR if it is not exactly two uppercase letters (ISO 3166-1 alpha-2, e.g. "US").
- phone: ERROR if it is not "+" followed by 8 to 15 digits (E.164, e.g. "+14155552671").

## Message Constraints
1. Each message names the field it concerns.
2. Only mention values that appear in the input. Never invent values.
3. Never mention a field that is absent or null.
4. Warnings never make the profile invalid.

## Output Format
Respond with exactly one JSON object and nothing else: no prose, no
Markdown, no code fences.
{
  "is_valid": true | false,
  "errors": ["string", ...],
  "warnings": ["string", ...]
}

The object has exactly these three keys. errors and warnings are arrays of
strings (use [] when empty). is_valid is false if and only if errors is
non-empty.
"#;

/// Built-in repair prompt.
pub const REPAIR_PROMPT: &str = r#"
Your previous response did not follow the required output format.

Previous response:
{previous_output}

Problems found:
{violations}

Respond again with exactly one JSON object containing only the keys
"is_valid" (boolean), "errors" (array of strings) and "warnings" (array of
strings). No other keys, no nested objects inside the arrays, no prose and no
code fences. is_valid must be false when errors is non-empty. Apply the same
validation rules to the same user input as before.
"#;

/// Errors from loading prompt overrides.
#[derive(Error, Debug)]
pub enum PromptError {
    #[error("failed to read prompt file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("prompt file {0} is empty")]
    Empty(PathBuf),
}

/// The pair of prompts an orchestrator works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    system: String,
    repair: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self::new(SYSTEM_PROMPT, REPAIR_PROMPT)
    }
}

impl PromptSet {
    /// Create from explicit prompt text. Surrounding whitespace is trimmed.
    pub fn new(system: impl AsRef<str>, repair: impl AsRef<str>) -> Self {
        Self {
            system: system.as_ref().trim().to_string(),
            repair: repair.as_ref().trim().to_string(),
        }
    }

    /// Load both prompts from `dir`.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, PromptError> {
        let dir = dir.as_ref();
        let system = read_prompt(&dir.join(SYSTEM_PROMPT_FILE))?;
        let repair = read_prompt(&dir.join(REPAIR_PROMPT_FILE))?;
        Ok(Self { system, repair })
    }

    pub fn system(&self) -> &str {
        &self.system
    }

    /// Fill the repair template.
    ///
    /// A template with neither placeholder gets the previous output and the
    /// violations appended, so a plain-text override still tells the model
    /// what went wrong.
    pub fn render_repair(&self, previous_output: &str, violations: &[String]) -> String {
        let violations = format_violations(violations);
        let has_placeholders = self.repair.contains(PREVIOUS_OUTPUT_PLACEHOLDER)
            || self.repair.contains(VIOLATIONS_PLACEHOLDER);

        if has_placeholders {
            fill_placeholders(&self.repair, previous_output, &violations)
        } else {
            format!(
                "{}\n\nPrevious response:\n{}\n\nProblems found:\n{}",
                self.repair, previous_output, violations
            )
        }
    }
}

fn read_prompt(path: &Path) -> Result<String, PromptError> {
    let content = std::fs::read_to_string(path).map_err(|source| PromptError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let content = content.trim();
    if content.is_empty() {
        return Err(PromptError::Empty(path.to_path_buf()));
    }

    tracing::info!(path = %path.display(), "Loaded prompt");
    Ok(content.to_string())
}

/// Substitute both placeholders in one pass over the template.
///
/// Substituted text is never rescanned, so a rejected output that itself
/// contains `{violations}` is quoted as-is.
fn fill_placeholders(template: &str, previous_output: &str, violations: &str) -> String {
    let mut out = String::with_capacity(template.len() + previous_output.len() + violations.len());
    let mut rest = template;

    while let Some(pos) = rest.find('{') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if let Some(after) = tail.strip_prefix(PREVIOUS_OUTPUT_PLACEHOLDER) {
            out.push_str(previous_output);
            rest = after;
        } else if let Some(after) = tail.strip_prefix(VIOLATIONS_PLACEHOLDER) {
            out.push_str(violations);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }

    out.push_str(rest);
    out
}

fn format_violations(violations: &[String]) -> String {
    if violations.is_empty() {
        return "- response did not match the required format".to_string();
    }

    violations
        .iter()
        .map(|v| format!("- {}", v))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "vouch-prompts-{}-{}",
            name,
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_system_prompt_covers_every_field() {
        for field in vouch_core::PROFILE_FIELDS {
            assert!(SYSTEM_PROMPT.contains(field), "missing rule for {}", field);
        }
        assert!(SYSTEM_PROMPT.contains("Never invent values"));
        assert!(SYSTEM_PROMPT.contains("\"is_valid\""));
    }

    #[test]
    fn test_builtin_repair_template_has_placeholders() {
        assert!(REPAIR_PROMPT.contains(PREVIOUS_OUTPUT_PLACEHOLDER));
        assert!(REPAIR_PROMPT.contains(VIOLATIONS_PLACEHOLDER));
    }

    #[test]
    fn test_render_repair_fills_placeholders() {
        let prompts = PromptSet::default();
        let text = prompts.render_repair(
            r#"{"is_valid": false, "errors": [{"field": "email"}]}"#,
            &[
                "missing required fields: warnings".to_string(),
                "errors[0] must be a string, got object".to_string(),
            ],
        );

        assert!(text.contains(r#"{"field": "email"}"#));
        assert!(text.contains("- missing required fields: warnings"));
        assert!(text.contains("- errors[0] must be a string, got object"));
        assert!(!text.contains(PREVIOUS_OUTPUT_PLACEHOLDER));
        assert!(!text.contains(VIOLATIONS_PLACEHOLDER));
    }

    #[test]
    fn test_quoted_output_is_not_rescanned() {
        let prompts = PromptSet::default();
        let previous = r#"{"is_valid": true, "note": "{violations}"}"#;
        let text = prompts.render_repair(previous, &["unexpected field: note".to_string()]);

        assert!(text.contains(previous));
        assert_eq!(text.matches("- unexpected field: note").count(), 1);
    }

    #[test]
    fn test_unknown_braces_in_template_are_kept() {
        let prompts = PromptSet::new("system", "Return {\"is_valid\": ...} for {previous_output}");
        let text = prompts.render_repair("oops", &[]);
        assert_eq!(text, "Return {\"is_valid\": ...} for oops");
    }

    #[test]
    fn test_render_repair_appends_without_placeholders() {
        let prompts = PromptSet::new("system", "Return valid JSON only.");
        let text = prompts.render_repair("oops", &["response was empty".to_string()]);

        assert!(text.starts_with("Return valid JSON only."));
        assert!(text.contains("Previous response:\noops"));
        assert!(text.contains("- response was empty"));
    }

    #[test]
    fn test_load_from_directory() {
        let dir = temp_dir("load");
        std::fs::write(dir.join(SYSTEM_PROMPT_FILE), "  custom system\n").unwrap();
        std::fs::write(dir.join(REPAIR_PROMPT_FILE), "fix {violations}").unwrap();

        let prompts = PromptSet::load(&dir).unwrap();
        assert_eq!(prompts.system(), "custom system");
        assert_eq!(
            prompts.render_repair("x", &["bad".to_string()]),
            "fix - bad"
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_missing_file() {
        let dir = temp_dir("missing");
        std::fs::write(dir.join(SYSTEM_PROMPT_FILE), "custom system").unwrap();

        let err = PromptSet::load(&dir).unwrap_err();
        assert!(matches!(err, PromptError::Io { .. }));
        assert!(err.to_string().contains(REPAIR_PROMPT_FILE));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_empty_file() {
        let dir = temp_dir("empty");
        std::fs::write(dir.join(SYSTEM_PROMPT_FILE), "   \n").unwrap();
        std::fs::write(dir.join(REPAIR_PROMPT_FILE), "repair").unwrap();

        assert!(matches!(
            PromptSet::load(&dir),
            Err(PromptError::Empty(_))
        ));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
