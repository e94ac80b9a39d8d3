//! HTTP client for the sandbox execution service
//!
//! The sandbox runs one program per request in a fresh interpreter and
//! reports captured output. This client never fails: connection errors,
//! timeouts, non-2xx replies and undecodable bodies all come back as an
//! [`ExecutionResult`] with `status = failed` and a descriptive stderr.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::metrics::{SANDBOX_EXECUTIONS, SANDBOX_EXECUTION_DURATION};

/// Run timeout used by the tool adapters
pub const DEFAULT_RUN_TIMEOUT_SECS: u64 = 60;
/// Upper bound accepted for a single execution
pub const MAX_RUN_TIMEOUT_SECS: u64 = 300;
/// Extra time the HTTP call gets on top of the run timeout
const CLIENT_TIMEOUT_SLACK_SECS: u64 = 5;

/// Body of `POST /run_code`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionRequest {
    pub code: String,
    pub language: String,
    pub run_timeout: u64,
}

impl ExecutionRequest {
    /// Build a python execution request, clamping the timeout to `1..=MAX_RUN_TIMEOUT_SECS`
    pub fn python(code: impl Into<String>, run_timeout_secs: u64) -> Self {
        Self {
            code: code.into(),
            language: "python".to_string(),
            run_timeout: clamp_timeout(run_timeout_secs),
        }
    }
}

/// Outcome of the transport, not of the program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        }
    }
}

/// Normalized reply from the sandbox
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    /// Wall time of the round trip in seconds
    pub execution_time: f64,
    pub exit_code: i32,
    pub status: RunStatus,
}

impl ExecutionResult {
    /// A failed execution carrying `reason` as stderr
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: reason.into(),
            execution_time: 0.0,
            exit_code: 1,
            status: RunStatus::Failed,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    /// Render the result the way the model sees it.
    ///
    /// Stdout alone on a clean run; otherwise stderr first with stdout kept
    /// underneath so partial progress survives a failure.
    pub fn to_observation(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("Error: {}\nOutput: {}", self.stderr, self.stdout)
        }
    }
}

/// Anything that can run a generated program and report its output.
///
/// Implementations must not fail: every problem is reported inside the
/// returned [`ExecutionResult`].
#[async_trait]
pub trait CodeRunner: Send + Sync {
    async fn run_code(&self, request: ExecutionRequest) -> ExecutionResult;
}

/// Client for the sandbox execution service's `/run_code` endpoint
#[derive(Clone)]
pub struct SandboxClient {
    endpoint: String,
    client: reqwest::Client,
}

impl SandboxClient {
    /// Create a new sandbox client
    ///
    /// # Arguments
    /// * `endpoint` - Base URL of the service (e.g., "http://localhost:8080")
    pub fn new(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Self {
            endpoint,
            client: reqwest::Client::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Execute python `code` with the given run timeout
    pub async fn execute(&self, code: &str, timeout: Duration) -> ExecutionResult {
        self.run_code(ExecutionRequest::python(code, timeout.as_secs()))
            .await
    }

    async fn post(&self, request: &ExecutionRequest) -> Result<Value, reqwest::Error> {
        let url = format!("{}/run_code", self.endpoint);
        let timeout = Duration::from_secs(request.run_timeout + CLIENT_TIMEOUT_SLACK_SECS);

        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(request)
            .send()
            .await?
            .error_for_status()?;

        response.json::<Value>().await
    }
}

#[async_trait]
impl CodeRunner for SandboxClient {
    async fn run_code(&self, request: ExecutionRequest) -> ExecutionResult {
        debug!(
            endpoint = %self.endpoint,
            code_len = request.code.len(),
            run_timeout = request.run_timeout,
            "Sending code to sandbox"
        );
        let start = Instant::now();

        let result = match self.post(&request).await {
            Ok(body) => normalize_response(&body, &self.endpoint, start.elapsed()),
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "Sandbox request failed");
                ExecutionResult::failed(format!(
                    "Failed to connect to sandbox at {}: {}",
                    self.endpoint, e
                ))
            }
        };

        SANDBOX_EXECUTIONS
            .with_label_values(&[result.status.as_str()])
            .inc();
        SANDBOX_EXECUTION_DURATION.observe(start.elapsed().as_secs_f64());

        result
    }
}

fn clamp_timeout(secs: u64) -> u64 {
    secs.clamp(1, MAX_RUN_TIMEOUT_SECS)
}

/// Map a decoded `/run_code` reply onto an [`ExecutionResult`].
///
/// Missing stdout/stderr become empty strings and a missing `return_code`
/// becomes 0. An explicit `null` return code means the program never
/// produced one and maps to 1.
fn normalize_response(body: &Value, endpoint: &str, elapsed: Duration) -> ExecutionResult {
    let Some(object) = body.as_object() else {
        return ExecutionResult::failed(format!(
            "Malformed response from sandbox at {}: expected a JSON object, got {}",
            endpoint, body
        ));
    };

    let run_result = object.get("run_result").filter(|v| v.is_object());
    let text_field = |name: &str| {
        run_result
            .and_then(|r| r.get(name))
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string()
    };

    let stdout = text_field("stdout");
    let mut stderr = text_field("stderr");
    let exit_code = match run_result.and_then(|r| r.get("return_code")) {
        None => 0,
        Some(Value::Null) => 1,
        Some(code) => code.as_i64().map(|c| c as i32).unwrap_or(1),
    };

    // A reply without a run result still has to explain itself
    if run_result.is_none() && stderr.is_empty() {
        if let Some(status) = object.get("status").and_then(Value::as_str) {
            if !status.eq_ignore_ascii_case("success") {
                let message = object
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("no run result");
                stderr = format!("Sandbox reported status '{}': {}", status, message);
            }
        }
    }

    ExecutionResult {
        stdout,
        stderr,
        execution_time: elapsed.as_secs_f64(),
        exit_code,
        status: RunStatus::Success,
    }
}
