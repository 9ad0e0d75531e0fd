//! Per-call repair budget and usage accounting.
//!
//! Both live for exactly one validation call; nothing here is shared
//! between calls.

use serde::{Deserialize, Serialize};

use crate::providers::TokenUsage;

/// Maximum repair attempts after the initial call.
pub const MAX_REPAIR_ATTEMPTS: u32 = 2;

/// Bounded counter of repair attempts for one validation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RepairAttemptCounter {
    used: u32,
}

impl RepairAttemptCounter {
    /// Create a counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one attempt if any remain.
    ///
    /// Returns `false` once the counter is terminal; the count never
    /// exceeds [`MAX_REPAIR_ATTEMPTS`].
    pub fn try_increment(&mut self) -> bool {
        if self.is_exhausted() {
            return false;
        }
        self.used += 1;
        true
    }

    /// Attempts consumed.
    pub fn used(&self) -> u32 {
        self.used
    }

    /// Attempts left.
    pub fn remaining(&self) -> u32 {
        MAX_REPAIR_ATTEMPTS.saturating_sub(self.used)
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= MAX_REPAIR_ATTEMPTS
    }
}

/// Accumulated LLM usage for a validation call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmUsage {
    /// Total tokens used
    pub total_tokens: u32,

    /// Prompt/input tokens
    pub prompt_tokens: u32,

    /// Completion/output tokens
    pub completion_tokens: u32,

    /// Adapter calls made, including failed ones
    pub llm_calls: u32,
}

impl LlmUsage {
    /// Add token usage from a provider response.
    pub fn add(&mut self, usage: &TokenUsage) {
        self.prompt_tokens += usage.prompt_tokens;
        self.completion_tokens += usage.completion_tokens;
        self.total_tokens += usage.total();
        self.llm_calls += 1;
    }

    /// Count a call that produced no response.
    pub fn record_failed_call(&mut self) {
        self.llm_calls += 1;
    }

    /// Merge usage from another call.
    pub fn merge(&mut self, other: &LlmUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
        self.llm_calls += other.llm_calls;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_is_bounded() {
        let mut counter = RepairAttemptCounter::new();
        assert_eq!(counter.remaining(), 2);

        assert!(counter.try_increment());
        assert!(counter.try_increment());
        assert!(counter.is_exhausted());

        assert!(!counter.try_increment());
        assert_eq!(counter.used(), MAX_REPAIR_ATTEMPTS);
        assert_eq!(counter.remaining(), 0);
    }

    #[test]
    fn test_usage_accumulation() {
        let mut usage = LlmUsage::default();
        usage.add(&TokenUsage {
            prompt_tokens: 100,
            completion_tokens: 20,
        });
        usage.record_failed_call();
        usage.add(&TokenUsage {
            prompt_tokens: 150,
            completion_tokens: 30,
        });

        assert_eq!(usage.prompt_tokens, 250);
        assert_eq!(usage.completion_tokens, 50);
        assert_eq!(usage.total_tokens, 300);
        assert_eq!(usage.llm_calls, 3);
    }

    #[test]
    fn test_usage_merge() {
        let mut total = LlmUsage::default();
        let call = LlmUsage {
            total_tokens: 10,
            prompt_tokens: 8,
            completion_tokens: 2,
            llm_calls: 1,
        };
        total.merge(&call);
        total.merge(&call);
        assert_eq!(total.total_tokens, 20);
        assert_eq!(total.llm_calls, 2);
    }
}
