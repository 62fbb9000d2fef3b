//! One conversation turn at a time: memory in, provider call, memory out.

use std::sync::Arc;

use aichat_config::AppConfig;
use aichat_core::error::{ProviderError, Result};
use aichat_core::memory::ConversationMemory;
use aichat_core::message::Message;
use aichat_core::provider::{Provider, ProviderRequest, Usage};
use tracing::{debug, info, warn};

/// Drives a single chat session against a provider.
pub struct ChatAgent {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// The model to use
    model: String,

    /// Temperature setting
    temperature: f32,

    /// Max tokens per response
    max_tokens: Option<u32>,

    memory: ConversationMemory,

    /// Usage reported by the most recent successful call
    last_usage: Option<Usage>,
}

impl ChatAgent {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        memory: ConversationMemory,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            memory,
            last_usage: None,
        }
    }

    /// Build an agent with model settings and memory bounds taken from config.
    pub fn from_config(provider: Arc<dyn Provider>, config: &AppConfig) -> Self {
        let mut memory =
            ConversationMemory::with_system_prompt(config.max_history, &config.system_prompt);
        if let Some(budget) = config.max_context_tokens {
            memory = memory.with_max_context_tokens(budget);
        }
        Self::new(provider, &config.model, memory)
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Send `input` with the retained history and return the reply text.
    ///
    /// The user message and the reply are recorded only after the provider
    /// answers; a failed turn leaves the history as it was.
    pub async fn chat(&mut self, input: &str) -> Result<String> {
        let user = Message::user(input);
        user.validate()?;

        let mut messages = self.memory.to_messages();
        messages.push(user.clone());

        debug!(
            conversation = %self.memory.id(),
            messages = messages.len(),
            preview = %user.preview(),
            "Sending chat request"
        );

        let request = ProviderRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = match self.provider.complete(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(provider = self.provider.name(), error = %e, "Chat turn failed");
                return Err(e.into());
            }
        };

        let reply = response.message.content().to_string();
        if reply.trim().is_empty() {
            warn!(provider = self.provider.name(), "Provider returned an empty reply");
            return Err(ProviderError::ApiError {
                status_code: 200,
                message: "Empty reply from model".into(),
            }
            .into());
        }

        self.memory.append(user)?;
        self.memory.append(Message::assistant(reply.as_str()))?;

        if let Some(usage) = &response.usage {
            info!(
                model = %response.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Chat turn complete"
            );
        }
        self.last_usage = response.usage;

        Ok(reply)
    }

    /// Forget the dialogue turns. The system prompt stays pinned.
    pub fn clear_history(&mut self) {
        self.memory.clear();
    }

    pub fn history(&self) -> Vec<Message> {
        self.memory.to_messages()
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn last_usage(&self) -> Option<&Usage> {
        self.last_usage.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FailingProvider, SequentialMockProvider, make_text_response};
    use aichat_core::error::{Error, MemoryError};
    use aichat_core::message::Role;

    fn agent_with(provider: Arc<dyn Provider>, max_history: usize) -> ChatAgent {
        let memory = ConversationMemory::with_system_prompt(max_history, "Be brief.");
        ChatAgent::new(provider, "test-model", memory)
    }

    #[tokio::test]
    async fn successful_turn_appends_user_and_reply() {
        let provider = Arc::new(SequentialMockProvider::single_text("Hi there"));
        let mut agent = agent_with(provider.clone(), 10);

        let reply = agent.chat("Hello").await.unwrap();
        assert_eq!(reply, "Hi there");

        let history = agent.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].role(), Role::System);
        assert_eq!(history[1].content(), "Hello");
        assert_eq!(history[2].role(), Role::Assistant);
        assert_eq!(agent.last_usage().unwrap().total_tokens, 15);
    }

    #[tokio::test]
    async fn request_starts_with_system_prompt_and_ends_with_input() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            make_text_response("one"),
            make_text_response("two"),
        ]));
        let mut agent = agent_with(provider.clone(), 10)
            .with_temperature(0.2)
            .with_max_tokens(64);

        agent.chat("first").await.unwrap();
        agent.chat("second").await.unwrap();

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        let last = &requests[1];
        assert_eq!(last.model, "test-model");
        assert_eq!(last.temperature, 0.2);
        assert_eq!(last.max_tokens, Some(64));
        assert_eq!(last.messages[0].content(), "Be brief.");
        assert_eq!(last.messages.len(), 4);
        assert_eq!(last.messages[3].content(), "second");
    }

    #[tokio::test]
    async fn failed_call_leaves_history_unchanged() {
        let mut agent = agent_with(Arc::new(FailingProvider), 10);
        let before = agent.history();

        let err = agent.chat("Hello").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Provider(ProviderError::AuthenticationFailed(_))
        ));
        assert_eq!(agent.history(), before);
    }

    #[tokio::test]
    async fn blank_input_is_rejected_without_calling_provider() {
        let provider = Arc::new(SequentialMockProvider::new(vec![]));
        let mut agent = agent_with(provider.clone(), 10);

        let err = agent.chat("   ").await.unwrap_err();
        assert!(matches!(err, Error::Memory(MemoryError::InvalidMessage { .. })));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn empty_reply_is_an_api_error() {
        let provider = Arc::new(SequentialMockProvider::single_text(""));
        let mut agent = agent_with(provider, 10);

        let err = agent.chat("Hello").await.unwrap_err();
        assert!(matches!(err, Error::Provider(ProviderError::ApiError { .. })));
        assert_eq!(agent.memory().len(), 0);
    }

    #[tokio::test]
    async fn history_is_bounded_across_turns() {
        let responses = (0..4).map(|i| make_text_response(&format!("r{i}"))).collect();
        let provider = Arc::new(SequentialMockProvider::new(responses));
        let mut agent = agent_with(provider, 3);

        for i in 0..4 {
            agent.chat(&format!("q{i}")).await.unwrap();
        }

        let contents: Vec<_> = agent
            .history()
            .iter()
            .map(|m| m.content().to_string())
            .collect();
        assert_eq!(contents, ["Be brief.", "r2", "q3", "r3"]);
    }

    #[tokio::test]
    async fn clear_history_keeps_system_prompt() {
        let provider = Arc::new(SequentialMockProvider::single_text("ok"));
        let mut agent = agent_with(provider, 10);
        agent.chat("Hello").await.unwrap();

        agent.clear_history();
        let history = agent.history();
        assert_eq!(history.len(), 1);
        assert!(history[0].is_system());
    }

    #[test]
    fn from_config_applies_settings() {
        let mut config = AppConfig::default();
        config.model = "gpt-test".into();
        config.temperature = 1.1;
        config.max_tokens = 128;
        config.max_history = 4;
        config.max_context_tokens = Some(500);
        config.system_prompt = "You are terse.".into();
        let agent = ChatAgent::from_config(Arc::new(FailingProvider), &config);

        assert_eq!(agent.model(), "gpt-test");
        assert_eq!(agent.temperature, 1.1);
        assert_eq!(agent.max_tokens, Some(128));
        assert_eq!(agent.memory().max_history(), 4);
        assert_eq!(agent.memory().max_context_tokens(), Some(500));
        assert_eq!(
            agent.memory().system_prompt().map(|m| m.content()),
            Some("You are terse.")
        );
        assert_eq!(agent.provider_name(), "failing");
    }
}
