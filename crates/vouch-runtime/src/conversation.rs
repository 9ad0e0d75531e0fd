//! Conversation carried across repair attempts.
//!
//! One [`ConversationState`] belongs to one validation call. It always
//! starts with the system prompt and the user input; each repair adds the
//! rejected response as an assistant turn followed by the repair prompt as a
//! user turn.
//!
//! ## Context cap
//!
//! Before every call the context is capped at `max_context_chars`. Whole
//! repair exchanges are dropped oldest first; the system prompt, the input
//! message and the latest exchange are always sent even when they alone
//! exceed the cap.

use std::borrow::Cow;

use crate::providers::ChatMessage;

/// Marker appended to text cut by [`truncate_chars`].
pub const TRUNCATION_MARKER: &str = " ...[truncated]";

/// One repair round: the rejected output and the prompt that followed it.
#[derive(Debug, Clone, PartialEq)]
struct RepairExchange {
    rejected: ChatMessage,
    repair: ChatMessage,
}

impl RepairExchange {
    fn chars(&self) -> usize {
        self.rejected.content.chars().count() + self.repair.content.chars().count()
    }
}

/// Ordered chat history for a single validation call.
#[derive(Debug, Clone)]
pub struct ConversationState {
    system: ChatMessage,
    input: ChatMessage,
    exchanges: Vec<RepairExchange>,
    max_context_chars: usize,
}

impl ConversationState {
    /// Start a conversation with the system prompt and the user input.
    pub fn new(
        system_prompt: impl Into<String>,
        input_message: impl Into<String>,
        max_context_chars: usize,
    ) -> Self {
        Self {
            system: ChatMessage::system(system_prompt),
            input: ChatMessage::user(input_message),
            exchanges: Vec::new(),
            max_context_chars,
        }
    }

    /// Record a repair round.
    pub fn push_repair(
        &mut self,
        rejected_output: impl Into<String>,
        repair_prompt: impl Into<String>,
    ) {
        self.exchanges.push(RepairExchange {
            rejected: ChatMessage::assistant(rejected_output),
            repair: ChatMessage::user(repair_prompt),
        });
    }

    /// Number of repair rounds recorded.
    pub fn repair_count(&self) -> usize {
        self.exchanges.len()
    }

    /// Characters across every recorded message, before capping.
    pub fn total_chars(&self) -> usize {
        self.base_chars() + self.exchanges.iter().map(RepairExchange::chars).sum::<usize>()
    }

    fn base_chars(&self) -> usize {
        self.system.content.chars().count() + self.input.content.chars().count()
    }

    /// Messages to send on the next call, capped to the context limit.
    pub fn messages(&self) -> Vec<ChatMessage> {
        let mut budget = self.max_context_chars.saturating_sub(self.base_chars());
        let mut kept = 0;

        for (i, exchange) in self.exchanges.iter().enumerate().rev() {
            let cost = exchange.chars();
            let is_latest = i + 1 == self.exchanges.len();
            if !is_latest && cost > budget {
                break;
            }
            budget = budget.saturating_sub(cost);
            kept += 1;
        }

        let dropped = self.exchanges.len() - kept;
        if dropped > 0 {
            tracing::debug!(
                dropped,
                max_context_chars = self.max_context_chars,
                "Dropped oldest repair exchanges to fit context"
            );
        }

        let mut messages = Vec::with_capacity(2 + kept * 2);
        messages.push(self.system.clone());
        messages.push(self.input.clone());
        for exchange in &self.exchanges[dropped..] {
            messages.push(exchange.rejected.clone());
            messages.push(exchange.repair.clone());
        }
        messages
    }
}

/// Cut `text` to at most `max_chars` characters, marking the cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> Cow<'_, str> {
    match text.char_indices().nth(max_chars) {
        None => Cow::Borrowed(text),
        Some((byte_idx, _)) => Cow::Owned(format!("{}{}", &text[..byte_idx], TRUNCATION_MARKER)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(messages: &[ChatMessage]) -> Vec<&str> {
        messages.iter().map(|m| m.role.as_str()).collect()
    }

    #[test]
    fn test_initial_messages() {
        let conversation = ConversationState::new("rules", "User Input:\n{}", 12_000);
        let messages = conversation.messages();
        assert_eq!(roles(&messages), vec!["system", "user"]);
        assert_eq!(messages[1].content, "User Input:\n{}");
        assert_eq!(conversation.repair_count(), 0);
    }

    #[test]
    fn test_repairs_accumulate_in_order() {
        let mut conversation = ConversationState::new("rules", "input", 12_000);
        conversation.push_repair("bad one", "fix one");
        conversation.push_repair("bad two", "fix two");

        let messages = conversation.messages();
        assert_eq!(
            roles(&messages),
            vec!["system", "user", "assistant", "user", "assistant", "user"]
        );
        assert_eq!(messages[2].content, "bad one");
        assert_eq!(messages[5].content, "fix two");
    }

    #[test]
    fn test_cap_drops_oldest_exchange_first() {
        // base = 10 chars, each exchange = 20 chars, room for one exchange
        let mut conversation = ConversationState::new("sssss", "iiiii", 35);
        conversation.push_repair("a".repeat(10), "b".repeat(10));
        conversation.push_repair("c".repeat(10), "d".repeat(10));

        let messages = conversation.messages();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[2].content, "c".repeat(10));
        assert_eq!(conversation.total_chars(), 50);
    }

    #[test]
    fn test_cap_never_drops_latest_or_base() {
        let mut conversation = ConversationState::new("system prompt", "input", 5);
        conversation.push_repair("x".repeat(100), "y".repeat(100));

        let messages = conversation.messages();
        assert_eq!(roles(&messages), vec!["system", "user", "assistant", "user"]);
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert!(matches!(truncate_chars("short", 5), Cow::Borrowed(_)));

        let cut = truncate_chars("abcdefgh", 3);
        assert_eq!(cut, format!("abc{}", TRUNCATION_MARKER));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let cut = truncate_chars("ééééé", 2);
        assert!(cut.starts_with("éé"));
        assert!(cut.ends_with(TRUNCATION_MARKER));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn cap_keeps_base_and_latest(
                outputs in prop::collection::vec(".{0,40}", 1..4),
                cap in 0usize..200,
            ) {
                let mut conversation = ConversationState::new("rules", "input", cap);
                for (i, output) in outputs.iter().enumerate() {
                    conversation.push_repair(output.clone(), format!("repair {}", i));
                }

                let messages = conversation.messages();
                prop_assert!(messages[0].is_system());
                prop_assert_eq!(&messages[1].content, "input");
                prop_assert_eq!(messages.len() % 2, 0);

                let last = &messages[messages.len() - 1];
                prop_assert_eq!(&last.content, &format!("repair {}", outputs.len() - 1));
            }

            #[test]
            fn cap_is_respected_beyond_latest_exchange(
                outputs in prop::collection::vec("[a-z]{0,40}", 2..5),
                cap in 0usize..300,
            ) {
                let mut conversation = ConversationState::new("rules", "input", cap);
                for output in &outputs {
                    conversation.push_repair(output.clone(), "fix");
                }

                let messages = conversation.messages();
                let chars: usize = messages.iter().map(|m| m.content.chars().count()).sum();
                // Over the cap only when the base and latest exchange alone exceed it
                if messages.len() > 4 {
                    prop_assert!(chars <= cap);
                }
            }

            #[test]
            fn truncation_bounds_length(text in ".{0,100}", max in 0usize..50) {
                let cut = truncate_chars(&text, max);
                let limit = max + TRUNCATION_MARKER.chars().count();
                prop_assert!(cut.chars().count() <= limit);
                prop_assert!(text.starts_with(cut.trim_end_matches(TRUNCATION_MARKER)));
            }
        }
    }
}
