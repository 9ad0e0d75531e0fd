//! Validator configuration.
//!
//! Loaded from YAML, every field defaulted. The orchestrator receives a
//! finished [`ValidatorConfig`] and never reads the environment itself;
//! [`ValidatorConfig::apply_env`] is called once by startup code.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::providers::CompletionConfig;

/// Environment switch selecting the cloud backend.
pub const USE_GEMINI_API_ENV: &str = "USE_GEMINI_API";

/// Errors from loading or checking configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Which inference backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Locally hosted model behind Ollama
    #[default]
    Local,

    /// Gemini API
    Cloud,
}

impl BackendKind {
    /// Provider registry key for this backend.
    pub fn provider_type(&self) -> &'static str {
        match self {
            BackendKind::Local => "ollama",
            BackendKind::Cloud => "gemini",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Local => write!(f, "local"),
            BackendKind::Cloud => write!(f, "cloud"),
        }
    }
}

/// Local backend settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalBackendConfig {
    pub model: String,
    pub base_url: String,
}

impl Default for LocalBackendConfig {
    fn default() -> Self {
        Self {
            model: "llama3.1:8b".to_string(),
            base_url: "http://localhost:11434".to_string(),
        }
    }
}

/// Cloud backend settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudBackendConfig {
    pub model: String,
    pub base_url: String,

    /// Falls back to `GEMINI_API_KEY` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for CloudBackendConfig {
    fn default() -> Self {
        Self {
            model: "gemini-1.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key: None,
        }
    }
}

impl std::fmt::Debug for CloudBackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudBackendConfig")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Generation parameters sent with every adapter call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub max_tokens: u32,
    pub temperature: f32,

    /// Per-call timeout, e.g. `"30s"` or `"1m 30s"`
    #[serde(with = "duration_str")]
    pub timeout: Duration,

    pub json_mode: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: 200,
            temperature: 0.0,
            timeout: Duration::from_secs(30),
            json_mode: true,
        }
    }
}

/// Bounds on the conversation carried through repairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairConfig {
    /// Total characters of context sent per call
    pub max_context_chars: usize,

    /// Characters of a previous output quoted in a repair prompt
    pub max_output_chars: usize,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            max_context_chars: 12_000,
            max_output_chars: 2_000,
        }
    }
}

mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    pub backend: BackendKind,
    pub local: LocalBackendConfig,
    pub cloud: CloudBackendConfig,
    pub generation: GenerationConfig,
    pub repair: RepairConfig,

    /// Directory holding `system_prompt.txt` and `repair_prompt.txt`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts_dir: Option<PathBuf>,
}

impl ValidatorConfig {
    /// Parse configuration from YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read and parse a YAML configuration file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// Overlay `USE_GEMINI_API` onto the backend choice.
    pub fn apply_env(mut self) -> Self {
        if let Ok(value) = std::env::var(USE_GEMINI_API_ENV) {
            self.apply_backend_switch(&value);
        }
        self
    }

    fn apply_backend_switch(&mut self, value: &str) {
        match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => self.backend = BackendKind::Cloud,
            "false" | "0" | "no" => self.backend = BackendKind::Local,
            other => {
                tracing::warn!(value = other, "Ignoring unrecognised {}", USE_GEMINI_API_ENV)
            }
        }
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let generation = &self.generation;

        if !(0.0..=2.0).contains(&generation.temperature) {
            return Err(ConfigError::Invalid(format!(
                "generation.temperature must be within 0.0..=2.0, got {}",
                generation.temperature
            )));
        }
        if generation.max_tokens == 0 {
            return Err(ConfigError::Invalid(
                "generation.max_tokens must be greater than zero".to_string(),
            ));
        }
        if generation.timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "generation.timeout must be greater than zero".to_string(),
            ));
        }

        for (key, url) in [
            ("local.base_url", &self.local.base_url),
            ("cloud.base_url", &self.cloud.base_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be an http(s) URL, got '{}'",
                    key, url
                )));
            }
        }

        Ok(())
    }

    /// Provider registry key for the selected backend.
    pub fn provider_type(&self) -> &'static str {
        self.backend.provider_type()
    }

    /// Model name of the selected backend.
    pub fn model(&self) -> &str {
        match self.backend {
            BackendKind::Local => &self.local.model,
            BackendKind::Cloud => &self.cloud.model,
        }
    }

    /// JSON configuration handed to the provider factory.
    pub fn provider_config(&self) -> JsonValue {
        match self.backend {
            BackendKind::Local => serde_json::json!({
                "model": self.local.model,
                "base_url": self.local.base_url,
            }),
            BackendKind::Cloud => {
                let mut config = serde_json::json!({
                    "model": self.cloud.model,
                    "base_url": self.cloud.base_url,
                });
                if let Some(key) = &self.cloud.api_key {
                    config["api_key"] = JsonValue::String(key.clone());
                }
                config
            }
        }
    }

    /// Per-call generation parameters for the selected backend.
    pub fn completion_config(&self) -> CompletionConfig {
        CompletionConfig {
            model: self.model().to_string(),
            max_tokens: self.generation.max_tokens,
            temperature: self.generation.temperature,
            timeout: self.generation.timeout,
            json_mode: self.generation.json_mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ValidatorConfig::default();
        assert_eq!(config.backend, BackendKind::Local);
        assert_eq!(config.provider_type(), "ollama");
        assert_eq!(config.model(), "llama3.1:8b");
        assert_eq!(config.generation.max_tokens, 200);
        assert_eq!(config.generation.timeout, Duration::from_secs(30));
        assert_eq!(config.repair.max_context_chars, 12_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
backend: cloud
cloud:
  model: gemini-1.5-pro
generation:
  timeout: 1m 30s
"#;
        let config = ValidatorConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.backend, BackendKind::Cloud);
        assert_eq!(config.model(), "gemini-1.5-pro");
        assert_eq!(
            config.cloud.base_url,
            "https://generativelanguage.googleapis.com/v1beta"
        );
        assert_eq!(config.generation.timeout, Duration::from_secs(90));
        assert_eq!(config.generation.max_tokens, 200);
    }

    #[test]
    fn test_bad_duration_rejected() {
        let yaml = "generation:\n  timeout: soon\n";
        assert!(matches!(
            ValidatorConfig::from_yaml(yaml),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = ValidatorConfig::from_yaml_file("/nonexistent/vouch.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/vouch.yaml"));
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut config = ValidatorConfig::default();
        config.generation.temperature = 2.5;
        assert!(config.validate().is_err());

        let mut config = ValidatorConfig::default();
        config.generation.max_tokens = 0;
        assert!(config.validate().is_err());

        let mut config = ValidatorConfig::default();
        config.generation.timeout = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = ValidatorConfig::default();
        config.local.base_url = "localhost:11434".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("local.base_url"));
    }

    #[test]
    fn test_backend_switch() {
        let mut config = ValidatorConfig::default();
        config.apply_backend_switch("TRUE");
        assert_eq!(config.backend, BackendKind::Cloud);

        config.apply_backend_switch("false");
        assert_eq!(config.backend, BackendKind::Local);

        config.apply_backend_switch("maybe");
        assert_eq!(config.backend, BackendKind::Local);
    }

    #[test]
    fn test_provider_config_includes_key_only_when_set() {
        let mut config = ValidatorConfig {
            backend: BackendKind::Cloud,
            ..Default::default()
        };
        assert!(config.provider_config().get("api_key").is_none());

        config.cloud.api_key = Some("secret".to_string());
        assert_eq!(config.provider_config()["api_key"], "secret");
        assert!(!format!("{:?}", config).contains("secret"));
    }

    #[test]
    fn test_completion_config_follows_backend() {
        let config = ValidatorConfig {
            backend: BackendKind::Cloud,
            ..Default::default()
        };
        let completion = config.completion_config();
        assert_eq!(completion.model, "gemini-1.5-flash");
        assert!(completion.json_mode);
    }

    #[test]
    fn test_round_trip_yaml() {
        let config = ValidatorConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("30s"));
        assert_eq!(ValidatorConfig::from_yaml(&yaml).unwrap(), config);
    }
}
