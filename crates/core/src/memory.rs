//! Bounded conversation memory.
//!
//! Holds the dialogue of a single session as an ordered log of messages and
//! keeps it under a configured size:
//!
//! - At most `max_history` non-system messages are retained. On overflow the
//!   oldest non-system message is evicted (strict FIFO).
//! - An optional system message is pinned at the front. It never counts
//!   toward `max_history` and is never evicted.
//! - An optional token budget trims further from the front, but never drops
//!   the newest message.
//!
//! The memory is owned by exactly one session and is not shared across
//! threads, so it needs no locking.

use std::collections::VecDeque;

use tracing::{debug, info};

use crate::error::MemoryError;
use crate::message::{ConversationId, Message, Role};

/// An ordered, capped log of conversation turns.
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    id: ConversationId,
    system: Option<Message>,
    turns: VecDeque<Message>,
    max_history: usize,
    max_context_tokens: Option<usize>,
}

impl ConversationMemory {
    /// Create an empty memory retaining up to `max_history` non-system messages.
    ///
    /// A `max_history` of zero is treated as one.
    pub fn new(max_history: usize) -> Self {
        let max_history = max_history.max(1);
        let id = ConversationId::new();
        info!(conversation_id = %id, max_history, "Initialized conversation memory");
        Self {
            id,
            system: None,
            turns: VecDeque::with_capacity(max_history + 1),
            max_history,
            max_context_tokens: None,
        }
    }

    /// Create a memory with a pinned system prompt.
    ///
    /// A blank prompt pins nothing.
    pub fn with_system_prompt(max_history: usize, prompt: impl Into<String>) -> Self {
        let mut memory = Self::new(max_history);
        let prompt = prompt.into();
        if !prompt.trim().is_empty() {
            memory.system = Some(Message::system(prompt));
        }
        memory
    }

    /// Cap the estimated prompt size in tokens.
    pub fn with_max_context_tokens(mut self, budget: usize) -> Self {
        self.max_context_tokens = Some(budget);
        self
    }

    /// Append a message, evicting from the front as needed.
    ///
    /// Returns the messages evicted by this append, oldest first. A `system`
    /// message replaces the pinned system message instead of entering the log.
    ///
    /// Fails with [`MemoryError::InvalidMessage`] when the content is empty;
    /// the memory is left untouched in that case.
    pub fn append(&mut self, message: Message) -> Result<Vec<Message>, MemoryError> {
        message.validate()?;

        if message.role() == Role::System {
            debug!(conversation_id = %self.id, "Pinned new system message");
            self.system = Some(message);
            return Ok(self.enforce_token_budget());
        }

        debug!(
            conversation_id = %self.id,
            role = %message.role(),
            content = %message.preview(),
            "Appended message"
        );
        self.turns.push_back(message);

        let mut evicted = Vec::new();
        while self.turns.len() > self.max_history {
            if let Some(oldest) = self.turns.pop_front() {
                self.log_eviction(&oldest, "max_history");
                evicted.push(oldest);
            }
        }
        evicted.extend(self.enforce_token_budget());
        Ok(evicted)
    }

    /// The retained messages, oldest first, with the pinned system message
    /// (if any) in front.
    pub fn history(&self) -> impl Iterator<Item = &Message> + '_ {
        self.system.iter().chain(self.turns.iter())
    }

    /// An owned copy of [`history`](Self::history), for building requests.
    pub fn to_messages(&self) -> Vec<Message> {
        self.history().cloned().collect()
    }

    /// Drop every turn. The pinned system message survives.
    pub fn clear(&mut self) {
        let dropped = self.turns.len();
        self.turns.clear();
        info!(conversation_id = %self.id, dropped, "Cleared conversation history");
    }

    /// Number of retained non-system messages.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// True when no non-system messages are retained.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    pub fn max_context_tokens(&self) -> Option<usize> {
        self.max_context_tokens
    }

    pub fn system_prompt(&self) -> Option<&Message> {
        self.system.as_ref()
    }

    pub fn id(&self) -> &ConversationId {
        &self.id
    }

    /// Estimated prompt size of everything retained, system message included.
    pub fn estimated_tokens(&self) -> usize {
        self.history().map(Message::estimated_tokens).sum()
    }

    fn enforce_token_budget(&mut self) -> Vec<Message> {
        let Some(budget) = self.max_context_tokens else {
            return Vec::new();
        };

        let mut evicted = Vec::new();
        while self.turns.len() > 1 && self.estimated_tokens() > budget {
            if let Some(oldest) = self.turns.pop_front() {
                self.log_eviction(&oldest, "max_context_tokens");
                evicted.push(oldest);
            }
        }
        evicted
    }

    fn log_eviction(&self, message: &Message, limit: &'static str) {
        debug!(
            conversation_id = %self.id,
            role = %message.role(),
            content = %message.preview(),
            limit,
            "Evicted oldest message"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(memory: &ConversationMemory) -> Vec<String> {
        memory.history().map(|m| m.content().to_string()).collect()
    }

    #[test]
    fn evicts_oldest_on_overflow() {
        let mut memory = ConversationMemory::new(3);
        memory.append(Message::user("hi")).unwrap();
        memory.append(Message::assistant("hello")).unwrap();
        memory.append(Message::user("bye")).unwrap();
        assert_eq!(contents(&memory), ["hi", "hello", "bye"]);

        let evicted = memory.append(Message::assistant("ok")).unwrap();
        assert_eq!(contents(&memory), ["hello", "bye", "ok"]);
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].content(), "hi");
    }

    // Assumption: the pinned system message does not count toward max_history.
    #[test]
    fn pinned_system_message_is_excluded_from_cap() {
        let mut memory = ConversationMemory::with_system_prompt(2, "be brief");
        for text in ["a", "b", "c", "d"] {
            memory.append(Message::user(text)).unwrap();
        }
        assert_eq!(contents(&memory), ["be brief", "c", "d"]);
        assert_eq!(memory.len(), 2);
        assert!(memory.history().next().unwrap().is_system());
    }

    #[test]
    fn empty_content_is_rejected_without_mutation() {
        let mut memory = ConversationMemory::with_system_prompt(3, "sys");
        memory.append(Message::user("first")).unwrap();
        let before = memory.to_messages();

        let err = memory.append(Message::user("")).unwrap_err();
        assert!(matches!(err, MemoryError::InvalidMessage { .. }));
        let err = memory.append(Message::assistant("   ")).unwrap_err();
        assert!(matches!(err, MemoryError::InvalidMessage { .. }));

        assert_eq!(memory.to_messages(), before);
    }

    #[test]
    fn invalid_role_never_reaches_the_memory() {
        let memory = ConversationMemory::new(3);
        let result = Message::parse("narrator", "once upon a time");
        assert!(matches!(result, Err(MemoryError::InvalidMessage { .. })));
        assert!(memory.is_empty());
    }

    #[test]
    fn clear_without_pin_yields_empty_history() {
        let mut memory = ConversationMemory::new(5);
        memory.append(Message::user("hi")).unwrap();
        memory.clear();
        assert_eq!(memory.history().count(), 0);
        assert!(memory.is_empty());
    }

    #[test]
    fn clear_keeps_pinned_system_message() {
        let mut memory = ConversationMemory::with_system_prompt(5, "sys");
        memory.append(Message::user("hi")).unwrap();
        memory.append(Message::assistant("hello")).unwrap();
        memory.clear();
        assert_eq!(contents(&memory), ["sys"]);
    }

    #[test]
    fn appending_system_message_repins() {
        let mut memory = ConversationMemory::with_system_prompt(2, "old rules");
        memory.append(Message::user("hi")).unwrap();
        let evicted = memory.append(Message::system("new rules")).unwrap();

        assert!(evicted.is_empty());
        assert_eq!(contents(&memory), ["new rules", "hi"]);
        assert_eq!(memory.history().filter(|m| m.is_system()).count(), 1);
    }

    #[test]
    fn blank_system_prompt_pins_nothing() {
        let memory = ConversationMemory::with_system_prompt(2, "  ");
        assert!(memory.system_prompt().is_none());
    }

    #[test]
    fn zero_max_history_keeps_latest_message() {
        let mut memory = ConversationMemory::new(0);
        assert_eq!(memory.max_history(), 1);
        memory.append(Message::user("one")).unwrap();
        memory.append(Message::user("two")).unwrap();
        assert_eq!(contents(&memory), ["two"]);
    }

    #[test]
    fn history_is_stable_between_mutations() {
        let mut memory = ConversationMemory::with_system_prompt(4, "sys");
        memory.append(Message::user("q")).unwrap();
        memory.append(Message::assistant("a")).unwrap();
        let first = memory.to_messages();
        let second = memory.to_messages();
        assert_eq!(first, second);
    }

    #[test]
    fn token_budget_evicts_oldest_but_keeps_newest() {
        // Each 8-char message costs 4 + 2 = 6 tokens.
        let mut memory = ConversationMemory::new(10).with_max_context_tokens(13);
        memory.append(Message::user("aaaaaaaa")).unwrap();
        memory.append(Message::user("bbbbbbbb")).unwrap();
        let evicted = memory.append(Message::user("cccccccc")).unwrap();

        assert_eq!(contents(&memory), ["bbbbbbbb", "cccccccc"]);
        assert_eq!(evicted[0].content(), "aaaaaaaa");

        // A single message over budget is still retained.
        memory.append(Message::user("x".repeat(200))).unwrap();
        assert_eq!(memory.len(), 1);
    }

    #[test]
    fn token_budget_never_evicts_system_message() {
        let mut memory =
            ConversationMemory::with_system_prompt(10, "s".repeat(100)).with_max_context_tokens(10);
        memory.append(Message::user("hi")).unwrap();
        memory.append(Message::user("there")).unwrap();
        assert!(memory.system_prompt().is_some());
        assert_eq!(contents(&memory)[1..], ["there"]);
    }

    #[test]
    fn estimated_tokens_counts_system_message() {
        let mut memory = ConversationMemory::with_system_prompt(3, "test");
        memory.append(Message::user("test")).unwrap();
        assert_eq!(memory.estimated_tokens(), 10);
    }
}
