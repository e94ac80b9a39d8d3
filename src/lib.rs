//! rca-agent - LLM-driven root cause analysis over parquet telemetry
//!
//! An agent asks a model to find the service that caused an incident. The
//! model explores logs, metrics and traces stored as parquet files by calling
//! tools; every tool compiles its arguments into a python program that runs
//! in a remote sandbox.
//!
//! # Modules
//!
//! - `agent` - Conversation loop, directive protocol and answer extraction
//! - `llm` - Chat completions client and prompt text
//! - `tools` - Parquet and python tool adapters
//! - `sandbox` - HTTP client for the code execution service
//! - `config` - Agent configuration from defaults and environment
//! - `metrics` - Prometheus metrics for observability
//! - `tracing` - Logging and OpenTelemetry export
//!
//! # Quick Start
//!
//! ```ignore
//! use rca_agent::{AgentConfig, AgentController};
//!
//! let controller = AgentController::from_config(AgentConfig::from_env()?)?;
//! let result = controller.run("The ts-order-service is slow. Find the root cause.").await;
//! println!("{}", result.prediction);
//! ```

pub mod agent;
pub mod config;
pub mod llm;
pub mod metrics;
pub mod sandbox;
pub mod tools;
pub mod tracing;

// Re-export commonly used types at crate root for convenience
pub use agent::{AgentController, RunResult, Termination};
pub use config::{AgentConfig, ConfigError, LlmSettings};
pub use sandbox::{CodeRunner, ExecutionResult, SandboxClient};
pub use tools::{ToolRegistry, ToolSettings};
