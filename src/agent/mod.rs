//! Agent module for root cause analysis over parquet telemetry
//!
//! This module provides the agent loop that orchestrates:
//! - An OpenAI-compatible model backend (/v1/chat/completions)
//! - Text directives parsed from each model output
//! - Tool adapters executing generated programs in the sandbox
//!
//! # Architecture
//!
//! ```text
//! Task → AgentController → ChatBackend.complete(conversation)
//!              ↓
//!        protocol::parse_action(output)
//!              ↓
//!   <tool_call> → ToolRegistry.dispatch() → SandboxClient /run_code
//!              ↓                                   ↓
//!        observation appended  ←──────── stdout / stderr
//!              ↓
//!   <answer> → answer::extract() → RunResult
//! ```

pub mod answer;
pub mod controller;
pub mod conversation;
pub mod protocol;

pub use answer::{extract, UNKNOWN_PREDICTION};
pub use controller::{AgentController, RunResult, Termination};
pub use conversation::{CallTag, Conversation, Entry, Role};
