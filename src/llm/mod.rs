//! Model backend integration
//!
//! This module provides the chat completions client the agent talks to and
//! the prompt text that frames every run.

pub mod chat;
pub mod prompt;

pub use chat::{ChatBackend, ChatClient, ChatError, ChatMessage};
