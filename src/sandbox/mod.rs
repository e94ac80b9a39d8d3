//! Remote code execution for tool adapters
//!
//! Every tool call ends up here: a generated program is sent to the sandbox
//! execution service and the reply is normalized into an [`ExecutionResult`].
//!
//! ```text
//! Tool Adapter → SandboxClient.run_code() → POST {endpoint}/run_code
//!                                               ↓
//!                        {run_result: {stdout, stderr, return_code}, status}
//!                                               ↓
//!                           ExecutionResult (never an error)
//! ```

pub mod client;

pub use client::{
    CodeRunner, ExecutionRequest, ExecutionResult, RunStatus, SandboxClient,
    DEFAULT_RUN_TIMEOUT_SECS, MAX_RUN_TIMEOUT_SECS,
};
