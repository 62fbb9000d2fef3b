//! # aichat core
//!
//! Domain types, traits, and error definitions for the aichat assistant.
//! This crate has **no framework dependencies**: it defines the domain model
//! that every other crate builds on.
//!
//! The centrepiece is [`ConversationMemory`], a bounded log of dialogue turns
//! with a pinned system message and FIFO eviction. Model backends implement
//! the [`Provider`] trait.

pub mod error;
pub mod memory;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use error::{Error, MemoryError, ProviderError, Result};
pub use memory::ConversationMemory;
pub use message::{ConversationId, Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
