//! # vouch-runtime
//!
//! LLM-backed orchestration for Vouch profile validation.
//!
//! This crate owns everything that talks to a model: the provider
//! adapters, the prompts, the bounded repair loop and the orchestrator
//! that ties them together. The output contract itself lives in
//! `vouch-core` and never calls a model.
//!
//! ## Guarantees
//!
//! - [`ValidationOrchestrator::validate_profile`] always returns a
//!   well-formed [`ValidationResult`](vouch_core::ValidationResult)
//! - At most three adapter calls are made per record (one initial call and
//!   up to [`MAX_REPAIR_ATTEMPTS`] repairs)
//! - When no conforming response is obtained, the fixed fallback result is
//!   returned instead of anything partially validated
//!
//! ## Example
//!
//! ```rust,ignore
//! use vouch_core::ProfileInput;
//! use vouch_runtime::{ValidationOrchestrator, ValidatorConfig};
//!
//! let config = ValidatorConfig::from_yaml_file("vouch.yaml")?.apply_env();
//! let orchestrator = ValidationOrchestrator::from_config(config)?;
//!
//! let input = ProfileInput::new().with_age(16);
//! let result = orchestrator.validate_profile(&input).await;
//! assert!(result.is_valid);
//! ```

pub mod config;
pub mod conversation;
pub mod orchestrator;
pub mod prompts;
pub mod providers;
pub mod resilience;

pub use config::{BackendKind, ConfigError, ValidatorConfig};
pub use conversation::ConversationState;
pub use orchestrator::{
    RuntimeError, ValidationOrchestrator, ValidationOrchestratorBuilder, ValidationOutcome,
};
pub use prompts::{PromptError, PromptSet};
pub use providers::{
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError,
    ProviderRegistry, TokenUsage,
};
pub use resilience::{
    AttemptRecord, AttemptStatus, LlmUsage, RepairAttemptCounter, RepairState,
    MAX_REPAIR_ATTEMPTS,
};
