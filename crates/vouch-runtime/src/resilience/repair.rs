//! Bounded schema-repair loop.
//!
//! The coordinator drives one validation call through an explicit state
//! machine:
//!
//! ```text
//! Initial -> AwaitingResponse -> Validating -> Succeeded
//!                 ^                   |
//!                 |                   v
//!                 +------------- Repairing      (budget left)
//!                                     |
//!                                     v
//!                             ExhaustedFallback (budget spent)
//! ```
//!
//! A parse failure and a schema violation are treated alike: both produce
//! reasons that are quoted back to the model. A failed adapter call
//! (timeout, HTTP, API error) also consumes an attempt but re-issues the
//! same request unchanged. At most `1 + MAX_REPAIR_ATTEMPTS` adapter calls
//! are made.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vouch_core::{parse_response, validate_response, ValidationResult};

use super::budget::{LlmUsage, RepairAttemptCounter, MAX_REPAIR_ATTEMPTS};
use crate::config::RepairConfig;
use crate::conversation::{truncate_chars, ConversationState};
use crate::orchestrator::ValidationOutcome;
use crate::prompts::PromptSet;
use crate::providers::{CompletionConfig, CompletionResponse, LlmProvider, ProviderError};

/// States of one validation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairState {
    Initial,
    AwaitingResponse,
    Validating,
    Repairing,
    Succeeded,
    ExhaustedFallback,
}

impl RepairState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RepairState::Succeeded | RepairState::ExhaustedFallback)
    }

    /// Whether `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: RepairState) -> bool {
        use RepairState::*;
        matches!(
            (self, next),
            (Initial, AwaitingResponse)
                | (AwaitingResponse, Validating)
                // adapter failure: retry unchanged or give up
                | (AwaitingResponse, AwaitingResponse)
                | (AwaitingResponse, ExhaustedFallback)
                | (Validating, Succeeded)
                | (Validating, Repairing)
                | (Validating, ExhaustedFallback)
                | (Repairing, AwaitingResponse)
        )
    }
}

/// What happened on one adapter call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptStatus {
    /// Parsed and passed the schema
    Accepted,

    /// No JSON object could be extracted
    ParseFailed { reason: String },

    /// Parsed, but broke the output contract
    SchemaViolation { reasons: Vec<String> },

    /// The adapter returned no text (timeout, transport or API error)
    AdapterFailed { error: String },
}

impl AttemptStatus {
    pub fn is_accepted(&self) -> bool {
        matches!(self, AttemptStatus::Accepted)
    }

    /// Label for log events.
    pub fn label(&self) -> &'static str {
        match self {
            AttemptStatus::Accepted => "accepted",
            AttemptStatus::ParseFailed { .. } => "parse_failed",
            AttemptStatus::SchemaViolation { .. } => "schema_violation",
            AttemptStatus::AdapterFailed { .. } => "adapter_failed",
        }
    }

    /// Reasons to quote back to the model.
    fn reasons(&self) -> Vec<String> {
        match self {
            AttemptStatus::Accepted => Vec::new(),
            AttemptStatus::ParseFailed { reason } => vec![reason.clone()],
            AttemptStatus::SchemaViolation { reasons } => reasons.clone(),
            AttemptStatus::AdapterFailed { error } => vec![error.clone()],
        }
    }
}

/// Record of one adapter call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// 1-based call number
    pub attempt: u32,

    pub timestamp: DateTime<Utc>,

    /// Text exactly as returned, absent when the call failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,

    #[serde(flatten)]
    pub status: AttemptStatus,
}

/// Drives a single validation call to a terminal state.
///
/// Borrowed per call from the orchestrator; all mutable state (the
/// conversation, the counter, the attempt log) is local to [`run`].
///
/// [`run`]: RepairCoordinator::run
pub struct RepairCoordinator<'a> {
    provider: &'a dyn LlmProvider,
    completion: &'a CompletionConfig,
    prompts: &'a PromptSet,
    limits: &'a RepairConfig,
}

impl<'a> RepairCoordinator<'a> {
    pub fn new(
        provider: &'a dyn LlmProvider,
        completion: &'a CompletionConfig,
        prompts: &'a PromptSet,
        limits: &'a RepairConfig,
    ) -> Self {
        Self {
            provider,
            completion,
            prompts,
            limits,
        }
    }

    /// Run the loop for one input message.
    pub async fn run(&self, input_message: String) -> ValidationOutcome {
        let mut conversation = ConversationState::new(
            self.prompts.system(),
            input_message,
            self.limits.max_context_chars,
        );
        let mut counter = RepairAttemptCounter::new();
        let mut usage = LlmUsage::default();
        let mut attempts = Vec::new();
        let mut state = RepairState::Initial;

        loop {
            state = transition(state, RepairState::AwaitingResponse);
            let attempt = counter.used() + 1;

            let response = self.call(&conversation).await;
            let (raw, status, result) = match response {
                Err(e) => {
                    usage.record_failed_call();
                    let status = AttemptStatus::AdapterFailed {
                        error: e.to_string(),
                    };
                    (None, status, None)
                }
                Ok(response) => {
                    usage.add(&response.usage);
                    state = transition(state, RepairState::Validating);
                    let (status, result) = judge(&response.content);
                    (Some(response.content), status, result)
                }
            };

            log_attempt(attempt, raw.as_deref(), &status);
            attempts.push(AttemptRecord {
                attempt,
                timestamp: Utc::now(),
                raw_response: raw.clone(),
                status: status.clone(),
            });

            if let Some(result) = result {
                transition(state, RepairState::Succeeded);
                tracing::info!(
                    attempt,
                    is_valid = result.is_valid,
                    errors = result.errors.len(),
                    warnings = result.warnings.len(),
                    "Validation succeeded"
                );
                return ValidationOutcome {
                    result,
                    used_fallback: false,
                    repairs: counter.used(),
                    attempts,
                    usage,
                };
            }

            if !counter.try_increment() {
                transition(state, RepairState::ExhaustedFallback);
                tracing::error!(
                    attempts = attempts.len(),
                    max_repairs = MAX_REPAIR_ATTEMPTS,
                    "Repair budget exhausted, returning fallback result"
                );
                return ValidationOutcome {
                    result: ValidationResult::fallback(),
                    used_fallback: true,
                    repairs: counter.used(),
                    attempts,
                    usage,
                };
            }

            // A failed call has nothing to repair; the same request goes out again.
            if let Some(raw) = raw {
                state = transition(state, RepairState::Repairing);
                let quoted = truncate_chars(&raw, self.limits.max_output_chars);
                let prompt = self.prompts.render_repair(&quoted, &status.reasons());
                conversation.push_repair(quoted.into_owned(), prompt);
                tracing::info!(
                    repair = counter.used(),
                    max_repairs = MAX_REPAIR_ATTEMPTS,
                    "Retrying with repair prompt"
                );
            } else {
                tracing::info!(
                    retry = counter.used(),
                    max_repairs = MAX_REPAIR_ATTEMPTS,
                    "Retrying failed adapter call"
                );
            }
        }
    }

    /// One adapter call, bounded by the configured timeout.
    async fn call(
        &self,
        conversation: &ConversationState,
    ) -> Result<CompletionResponse, ProviderError> {
        let messages = conversation.messages();
        let timeout = self.completion.timeout;

        tracing::debug!(
            provider = self.provider.name(),
            model = %self.completion.model,
            messages = messages.len(),
            repairs = conversation.repair_count(),
            context_chars = conversation.total_chars(),
            "Sending request"
        );

        match tokio::time::timeout(timeout, self.provider.complete(messages, self.completion)).await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(timeout)),
        }
    }
}

/// Parse then schema-check a raw response.
fn judge(raw: &str) -> (AttemptStatus, Option<ValidationResult>) {
    let value = match parse_response(raw) {
        Ok(value) => value,
        Err(e) => {
            return (
                AttemptStatus::ParseFailed {
                    reason: e.to_string(),
                },
                None,
            )
        }
    };

    match validate_response(&value) {
        Ok(result) => (AttemptStatus::Accepted, Some(result)),
        Err(violation) => (
            AttemptStatus::SchemaViolation {
                reasons: violation.reasons,
            },
            None,
        ),
    }
}

fn transition(from: RepairState, to: RepairState) -> RepairState {
    debug_assert!(
        from.can_transition_to(to),
        "illegal transition {:?} -> {:?}",
        from,
        to
    );
    tracing::trace!(from = ?from, to = ?to, "Repair state transition");
    to
}

fn log_attempt(attempt: u32, raw: Option<&str>, status: &AttemptStatus) {
    let max_attempts = MAX_REPAIR_ATTEMPTS + 1;
    let raw_response = raw.unwrap_or("");

    match status {
        AttemptStatus::Accepted => tracing::info!(
            attempt,
            max_attempts,
            raw_response,
            parse = "ok",
            validation = "ok",
            "Attempt completed"
        ),
        AttemptStatus::ParseFailed { reason } => tracing::warn!(
            attempt,
            max_attempts,
            raw_response,
            parse = %reason,
            validation = "skipped",
            "Attempt failed to parse"
        ),
        AttemptStatus::SchemaViolation { reasons } => tracing::warn!(
            attempt,
            max_attempts,
            raw_response,
            parse = "ok",
            validation = %reasons.join("; "),
            "Attempt violated output schema"
        ),
        AttemptStatus::AdapterFailed { error } => tracing::warn!(
            attempt,
            max_attempts,
            error = %error,
            "Adapter call failed"
        ),
    }
}
