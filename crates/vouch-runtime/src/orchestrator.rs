//! Validation orchestrator.
//!
//! The orchestrator turns a [`ProfileInput`] into a [`ValidationResult`]:
//! - Builds the initial request from the input record
//! - Hands it to a per-call [`RepairCoordinator`]
//! - Returns the terminal result, never an error
//!
//! It holds only immutable configuration, so one instance serves any
//! number of concurrent calls.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use thiserror::Error;

use vouch_core::{ProfileInput, ValidationResult};

use crate::config::{ConfigError, ValidatorConfig};
use crate::prompts::{PromptError, PromptSet};
use crate::providers::{CompletionConfig, LlmProvider, ProviderError, ProviderRegistry};
use crate::resilience::{AttemptRecord, LlmUsage, RepairCoordinator};

/// Errors from building an orchestrator.
///
/// Validation itself never fails; these only arise during setup.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Prompt(#[from] PromptError),
}

/// Full report of one validation call.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationOutcome {
    /// The verdict returned to callers
    pub result: ValidationResult,

    /// Whether the safe default replaced a model verdict
    pub used_fallback: bool,

    /// Repair attempts consumed (0..=2)
    pub repairs: u32,

    /// One record per adapter call, in order
    pub attempts: Vec<AttemptRecord>,

    /// Token usage across all attempts
    pub usage: LlmUsage,
}

/// Header placed before the serialized input record.
pub const USER_INPUT_HEADER: &str = "User Input:";

/// Render the user message for an input record.
pub fn build_input_message(input: &ProfileInput) -> String {
    format!("{}\n{}", USER_INPUT_HEADER, input.to_prompt_json())
}

/// Drives LLM-judged validation of profile records.
pub struct ValidationOrchestrator {
    provider: Arc<dyn LlmProvider>,
    config: ValidatorConfig,
    completion: CompletionConfig,
    prompts: PromptSet,
}

impl ValidationOrchestrator {
    /// Create an orchestrator with the built-in prompts.
    pub fn new(provider: Arc<dyn LlmProvider>, config: ValidatorConfig) -> Self {
        Self::with_prompts(provider, config, PromptSet::default())
    }

    fn with_prompts(
        provider: Arc<dyn LlmProvider>,
        config: ValidatorConfig,
        prompts: PromptSet,
    ) -> Self {
        let completion = config.completion_config();
        Self {
            provider,
            config,
            completion,
            prompts,
        }
    }

    /// Build an orchestrator whose provider is chosen by `config.backend`.
    ///
    /// Uses every provider compiled into this crate.
    pub fn from_config(config: ValidatorConfig) -> Result<Self, RuntimeError> {
        ValidationOrchestratorBuilder::new()
            .registry(ProviderRegistry::with_defaults())
            .config(config)
            .build()
    }

    /// Validate a record, returning only the verdict.
    pub async fn validate_profile(&self, input: &ProfileInput) -> ValidationResult {
        self.validate(input).await.result
    }

    /// Validate a record and report every attempt.
    pub async fn validate(&self, input: &ProfileInput) -> ValidationOutcome {
        if !input.unknown_fields().is_empty() {
            tracing::warn!(fields = ?input.unknown_fields(), "Ignoring unknown input fields");
        }

        let message = build_input_message(input);
        tracing::info!(
            provider = self.provider.name(),
            model = %self.completion.model,
            fields = ?input.present_fields(),
            "Starting validation"
        );
        tracing::debug!(input = %message, "Input message");

        let coordinator = RepairCoordinator::new(
            self.provider.as_ref(),
            &self.completion,
            &self.prompts,
            &self.config.repair,
        );
        let outcome = coordinator.run(message).await;

        tracing::info!(
            is_valid = outcome.result.is_valid,
            used_fallback = outcome.used_fallback,
            repairs = outcome.repairs,
            llm_calls = outcome.usage.llm_calls,
            total_tokens = outcome.usage.total_tokens,
            "Validation finished"
        );
        outcome
    }

    /// Validate independent records with at most `concurrency` in flight.
    ///
    /// Outcomes are returned in input order. A `concurrency` of zero is
    /// treated as one.
    pub async fn validate_many(
        &self,
        inputs: &[ProfileInput],
        concurrency: usize,
    ) -> Vec<ValidationOutcome> {
        let outcomes: Vec<ValidationOutcome> =
            stream::iter(inputs.iter().map(|input| self.validate(input)))
                .buffered(concurrency.max(1))
                .collect()
                .await;

        let mut usage = LlmUsage::default();
        for outcome in &outcomes {
            usage.merge(&outcome.usage);
        }
        tracing::info!(
            records = outcomes.len(),
            fallbacks = outcomes.iter().filter(|o| o.used_fallback).count(),
            llm_calls = usage.llm_calls,
            total_tokens = usage.total_tokens,
            "Batch finished"
        );

        outcomes
    }

    /// Ask the backend whether it can take requests.
    ///
    /// Validation does not depend on this; a call to an unhealthy backend
    /// still ends in a result.
    pub async fn health_check(&self) -> bool {
        let healthy = self.provider.health_check().await;
        tracing::debug!(provider = self.provider.name(), healthy, "Backend health check");
        healthy
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn prompts(&self) -> &PromptSet {
        &self.prompts
    }
}

/// Builder for ValidationOrchestrator.
pub struct ValidationOrchestratorBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    registry: Option<ProviderRegistry>,
    config: ValidatorConfig,
    prompts: Option<PromptSet>,
}

impl ValidationOrchestratorBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            provider: None,
            registry: None,
            config: ValidatorConfig::default(),
            prompts: None,
        }
    }

    /// Set the LLM provider directly.
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Create the provider from this registry when none is set.
    pub fn registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the configuration.
    pub fn config(mut self, config: ValidatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the prompts, overriding `config.prompts_dir`.
    pub fn prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = Some(prompts);
        self
    }

    /// Build the orchestrator.
    ///
    /// Checks the configuration, loads prompt overrides and resolves the
    /// provider, in that order.
    pub fn build(self) -> Result<ValidationOrchestrator, RuntimeError> {
        self.config.validate()?;

        let prompts = match (self.prompts, &self.config.prompts_dir) {
            (Some(prompts), _) => prompts,
            (None, Some(dir)) => PromptSet::load(dir)?,
            (None, None) => PromptSet::default(),
        };

        let provider = match (self.provider, self.registry) {
            (Some(provider), _) => provider,
            (None, Some(registry)) => {
                registry.create(self.config.provider_type(), &self.config.provider_config())?
            }
            (None, None) => {
                return Err(RuntimeError::ProviderNotConfigured(
                    "No provider set".to_string(),
                ))
            }
        };

        tracing::info!(
            backend = %self.config.backend,
            provider = provider.name(),
            model = self.config.model(),
            "Validator ready"
        );

        Ok(ValidationOrchestrator::with_prompts(
            provider,
            self.config,
            prompts,
        ))
    }
}

impl Default for ValidationOrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
