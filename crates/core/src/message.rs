//! Message domain types.
//!
//! These are the value objects that flow through the whole system:
//! the user types a line → the agent wraps it in a `Message` → the memory
//! retains it → the provider sees it as prompt context.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::MemoryError;

/// Unique identifier for a conversation (session).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions (persona, rules)
    System,
    /// The end user
    User,
    /// The AI assistant
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(MemoryError::invalid(format!(
                "unknown role '{other}' (expected system, user or assistant)"
            ))),
        }
    }
}

/// A single message in a conversation.
///
/// Fields are private: a message cannot be changed once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    role: Role,
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<DateTime<Utc>>,
}

impl Message {
    /// Create a message stamped with the current time.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Some(Utc::now()),
        }
    }

    /// Create a message from a role name, rejecting unknown roles.
    pub fn parse(role: &str, content: impl Into<String>) -> Result<Self, MemoryError> {
        Ok(Self::new(role.parse()?, content))
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }

    /// Check that the message may enter a conversation.
    pub fn validate(&self) -> Result<(), MemoryError> {
        if self.content.trim().is_empty() {
            return Err(MemoryError::invalid(format!(
                "{} message has empty content",
                self.role
            )));
        }
        Ok(())
    }

    /// Rough token estimate: 4 chars ≈ 1 token, plus 4 tokens of
    /// per-message overhead for role and delimiters.
    pub fn estimated_tokens(&self) -> usize {
        let chars = self.content.chars().count();
        4 + chars.div_ceil(4)
    }

    /// A short single-line preview for logs.
    pub fn preview(&self) -> String {
        let mut preview: String = self.content.chars().take(50).collect();
        if self.content.chars().count() > 50 {
            preview.push_str("...");
        }
        preview.replace('\n', " ")
    }
}
