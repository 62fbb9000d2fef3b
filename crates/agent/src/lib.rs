//! The chat agent: the loop between the user, the bounded memory and the model.
//!
//! Each turn:
//!
//! 1. **Validate** the user's input
//! 2. **Build the request** (pinned system prompt + retained history + input)
//! 3. **Send to the model** via the configured provider
//! 4. **Record** the input and the reply in memory, only if the call succeeded

pub mod chat;

#[cfg(test)]
mod test_helpers;

pub use chat::ChatAgent;
