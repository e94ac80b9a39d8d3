//! Prometheus metrics for agent runs
//!
//! All collectors live in the default registry so a host process can expose
//! them next to its own metrics. [`gather_text`] renders the text format.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram, register_histogram_vec, CounterVec, Encoder,
    Histogram, HistogramVec, TextEncoder,
};

lazy_static! {
    // ─────────────────────────────────────────────────────────────────────────────
    // Run Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Completed runs by how they terminated.
    ///
    /// Labels:
    /// - termination: "answered", "turn_budget_exhausted", "model_unavailable", "timed_out",
    ///   "context_exhausted"
    pub static ref AGENT_RUNS: CounterVec = register_counter_vec!(
        "rca_agent_runs_total",
        "Agent runs by termination reason",
        &["termination"]
    ).expect("failed to register AGENT_RUNS metric");

    /// Model calls issued per run.
    pub static ref AGENT_TURNS: Histogram = register_histogram!(
        "rca_agent_turns",
        "Model calls issued per agent run",
        vec![1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0]
    ).expect("failed to register AGENT_TURNS metric");

    // ─────────────────────────────────────────────────────────────────────────────
    // Model Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Model requests by outcome.
    ///
    /// Labels:
    /// - outcome: "success", "transient_error", "error"
    pub static ref LLM_CALLS: CounterVec = register_counter_vec!(
        "rca_agent_llm_calls_total",
        "Model requests by outcome",
        &["outcome"]
    ).expect("failed to register LLM_CALLS metric");

    /// Model request latency in seconds.
    pub static ref LLM_CALL_TIME: HistogramVec = register_histogram_vec!(
        "rca_agent_llm_call_seconds",
        "Model request latency",
        &["model"],
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]
    ).expect("failed to register LLM_CALL_TIME metric");

    // ─────────────────────────────────────────────────────────────────────────────
    // Tool & Sandbox Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Tool dispatches by tool and outcome.
    ///
    /// Labels:
    /// - tool: registered tool name, or "unknown" / "invalid"
    /// - outcome: "ok", "error"
    pub static ref TOOL_CALLS: CounterVec = register_counter_vec!(
        "rca_agent_tool_calls_total",
        "Tool dispatches by tool and outcome",
        &["tool", "outcome"]
    ).expect("failed to register TOOL_CALLS metric");

    /// Sandbox round trips by transport status.
    ///
    /// Labels:
    /// - status: "success", "failed"
    pub static ref SANDBOX_EXECUTIONS: CounterVec = register_counter_vec!(
        "rca_agent_sandbox_executions_total",
        "Sandbox executions by transport status",
        &["status"]
    ).expect("failed to register SANDBOX_EXECUTIONS metric");

    /// Sandbox round trip duration in seconds.
    pub static ref SANDBOX_EXECUTION_DURATION: Histogram = register_histogram!(
        "rca_agent_sandbox_execution_seconds",
        "Sandbox round trip duration",
        vec![0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0]
    ).expect("failed to register SANDBOX_EXECUTION_DURATION metric");
}

/// Render every registered metric in the Prometheus text format.
pub fn gather_text() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder.encode(&prometheus::gather(), &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_includes_touched_metrics() {
        TOOL_CALLS.with_label_values(&["query_parquet", "ok"]).inc();
        AGENT_RUNS.with_label_values(&["answered"]).inc();

        let text = gather_text();
        assert!(text.contains("rca_agent_tool_calls_total"));
        assert!(text.contains("rca_agent_runs_total"));
    }
}
