//! Chat-completion provider implementations for aichat.
//!
//! All providers implement the `aichat_core::Provider` trait.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
