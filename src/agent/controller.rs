//! Agent Controller - main orchestration loop for root cause analysis
//!
//! The AgentController alternates between the model backend and the tool
//! registry: each model output is parsed into a directive, tool calls are
//! dispatched in order and their observations fed back, until the model
//! answers or a budget runs out.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::AgentConfig;
use crate::llm::{prompt, ChatBackend, ChatClient, ChatError};
use crate::metrics::{AGENT_RUNS, AGENT_TURNS, LLM_CALLS, LLM_CALL_TIME, TOOL_CALLS};
use crate::sandbox::SandboxClient;
use crate::tools::{ToolName, ToolRegistry};

use super::answer::{extract, UNKNOWN_PREDICTION};
use super::conversation::{truncate_observation, CallTag, Conversation};
use super::protocol::{
    parse_action, Directive, ModelAction, CONTEXT_LIMIT_NOTICE, NO_ACTION_REMINDER,
};

/// Input kept free for the length notice and the model's final answer
const CONTEXT_NOTICE_RESERVE: usize = 1_000;

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Termination {
    /// The model produced an answer directive
    Answered,
    /// `max_turns` model requests were spent without an answer
    TurnBudgetExhausted { max_turns: usize },
    /// The backend failed permanently, or kept failing past the retry limit
    ModelUnavailable { error: String },
    /// The whole-run deadline passed
    TimedOut { after_secs: u64 },
    /// The input budget was spent and the model did not answer when told to
    ContextExhausted { max_input_chars: usize },
}

impl Termination {
    pub fn label(&self) -> &'static str {
        match self {
            Termination::Answered => "answered",
            Termination::TurnBudgetExhausted { .. } => "turn_budget_exhausted",
            Termination::ModelUnavailable { .. } => "model_unavailable",
            Termination::TimedOut { .. } => "timed_out",
            Termination::ContextExhausted { .. } => "context_exhausted",
        }
    }
}

/// Result of an agent run
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    /// Unique trace ID for this agent run
    pub trace_id: String,
    /// Task text the run started from
    pub question: String,
    /// Declared root cause service, or "unknown"
    pub prediction: String,
    pub termination: Termination,
    /// Model requests issued, retries included
    pub model_calls: usize,
    /// Tool directives executed
    pub tool_calls: usize,
    pub duration_ms: u64,
    /// Full conversation log
    pub conversation: Conversation,
}

impl RunResult {
    pub fn answered(&self) -> bool {
        self.termination == Termination::Answered
    }
}

/// Reasons the loop stops asking the model
enum Halt {
    Budget,
    Model(ChatError),
    Deadline,
}

/// Counters carried through one run
#[derive(Default)]
struct Progress {
    model_calls: usize,
    tool_calls: usize,
}

/// Agent Controller orchestrating the model and the tools
pub struct AgentController {
    backend: Arc<dyn ChatBackend>,
    tools: ToolRegistry,
    config: AgentConfig,
}

impl AgentController {
    /// Create a new agent controller
    ///
    /// # Arguments
    /// * `backend` - Model backend producing each assistant output
    /// * `tools` - Registry the tool calls are dispatched to
    /// * `config` - Agent configuration
    pub fn new(backend: Arc<dyn ChatBackend>, tools: ToolRegistry, config: AgentConfig) -> Self {
        Self {
            backend,
            tools,
            config,
        }
    }

    /// Wire the HTTP model client and sandbox client described by `config`
    pub fn from_config(config: AgentConfig) -> Result<Self, ChatError> {
        let backend = Arc::new(ChatClient::new(config.llm.clone())?);
        let runner = Arc::new(SandboxClient::new(config.sandbox_endpoint.clone()));
        let tools = ToolRegistry::new(runner, config.tools.clone());
        Ok(Self::new(backend, tools, config))
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// The configured system prompt, or the default one rendered with today's date
    pub fn system_prompt(&self) -> String {
        match &self.config.system_prompt {
            Some(custom) => custom.clone(),
            None => prompt::system_prompt(
                &self.tools.render_definitions(),
                chrono::Utc::now().date_naive(),
            ),
        }
    }

    /// Run the agent loop for a given task
    ///
    /// Never fails: backend outages, budget exhaustion and timeouts end the
    /// run with the matching [`Termination`] and the conversation so far.
    pub async fn run(&self, task: &str) -> RunResult {
        let trace_id = Uuid::now_v7().to_string();
        let started = Instant::now();
        let deadline = self
            .config
            .run_timeout_secs
            .map(|secs| started + Duration::from_secs(secs));

        // Create root span for the entire agent task
        let root_span = info_span!(
            "agent_task",
            trace_id = %trace_id,
            model = %self.backend.model(),
            max_turns = self.config.max_turns,
            otel.name = "agent_task"
        );

        async {
            info!(trace_id = %trace_id, task_len = task.len(), "Starting agent task");

            let mut conversation = Conversation::seeded(self.system_prompt(), task);
            let mut progress = Progress::default();

            let termination = self
                .drive(&mut conversation, &mut progress, &trace_id, deadline)
                .await;

            let prediction = conversation
                .last_assistant()
                .map(extract)
                .unwrap_or_else(|| UNKNOWN_PREDICTION.to_string());

            AGENT_RUNS.with_label_values(&[termination.label()]).inc();
            AGENT_TURNS.observe(progress.model_calls as f64);

            let duration_ms = started.elapsed().as_millis() as u64;
            match &termination {
                Termination::Answered => info!(
                    trace_id = %trace_id,
                    prediction = %prediction,
                    model_calls = progress.model_calls,
                    tool_calls = progress.tool_calls,
                    duration_ms,
                    "Agent task completed"
                ),
                other => warn!(
                    trace_id = %trace_id,
                    termination = other.label(),
                    prediction = %prediction,
                    model_calls = progress.model_calls,
                    duration_ms,
                    "Agent task ended without an answer"
                ),
            }

            RunResult {
                trace_id: trace_id.clone(),
                question: task.to_string(),
                prediction,
                termination,
                model_calls: progress.model_calls,
                tool_calls: progress.tool_calls,
                duration_ms,
                conversation,
            }
        }
        .instrument(root_span)
        .await
    }

    async fn drive(
        &self,
        conversation: &mut Conversation,
        progress: &mut Progress,
        trace_id: &str,
        deadline: Option<Instant>,
    ) -> Termination {
        let mut turn = 0;
        let mut notice_sent = false;

        loop {
            if conversation.input_chars() > self.config.max_input_chars {
                return self.context_exhausted(trace_id);
            }

            let output = match self
                .ask_model(conversation, progress, trace_id, deadline)
                .await
            {
                Ok(output) => output,
                Err(Halt::Budget) => {
                    warn!(trace_id = %trace_id, max_turns = self.config.max_turns, "Turn budget exhausted");
                    return Termination::TurnBudgetExhausted {
                        max_turns: self.config.max_turns,
                    };
                }
                Err(Halt::Model(e)) => {
                    warn!(trace_id = %trace_id, error = %e, "Model backend unavailable");
                    return Termination::ModelUnavailable {
                        error: e.to_string(),
                    };
                }
                Err(Halt::Deadline) => return self.timed_out(trace_id),
            };

            turn += 1;
            conversation.push_assistant(output.as_str());

            match parse_action(&output) {
                ModelAction::Answer { skipped_calls } => {
                    if skipped_calls > 0 {
                        warn!(trace_id = %trace_id, turn, skipped_calls, "Tool calls next to an answer were not run");
                    }
                    return Termination::Answered;
                }
                _ if notice_sent => return self.context_exhausted(trace_id),
                ModelAction::NoAction => {
                    debug!(trace_id = %trace_id, turn, "No directive in model output");
                    conversation.push_observation(NO_ACTION_REMINDER, None);
                }
                ModelAction::ToolCalls(directives) => {
                    for (index, directive) in directives.iter().enumerate() {
                        let observation =
                            match within(deadline, self.execute(directive, trace_id, turn)).await {
                                Some(observation) => observation,
                                None => return self.timed_out(trace_id),
                            };
                        progress.tool_calls += 1;
                        let observation = self.fit_observation(conversation, &observation);
                        conversation.push_observation(
                            observation,
                            Some(CallTag {
                                tool: directive.label().to_string(),
                                turn,
                                index,
                            }),
                        );
                    }
                }
            }

            if !notice_sent
                && conversation.input_chars() + CONTEXT_NOTICE_RESERVE >= self.config.max_input_chars
            {
                info!(
                    trace_id = %trace_id,
                    input_chars = conversation.input_chars(),
                    max_input_chars = self.config.max_input_chars,
                    "Input budget nearly spent, asking for a final answer"
                );
                conversation.push_observation(CONTEXT_LIMIT_NOTICE, None);
                notice_sent = true;
            }
        }
    }

    /// Truncate an observation to the per-observation cap and the input room left
    fn fit_observation(&self, conversation: &Conversation, observation: &str) -> String {
        let room = self
            .config
            .max_input_chars
            .saturating_sub(conversation.input_chars() + CONTEXT_NOTICE_RESERVE);
        let cap = self.config.max_observation_chars.min(room);
        truncate_observation(observation, cap)
    }

    /// Ask for the next output, retrying transient failures.
    ///
    /// Every attempt is one model request and counts against `max_turns`.
    async fn ask_model(
        &self,
        conversation: &Conversation,
        progress: &mut Progress,
        trace_id: &str,
        deadline: Option<Instant>,
    ) -> Result<String, Halt> {
        let messages = conversation.to_messages();
        let model = self.backend.model();
        let mut attempt: u32 = 0;

        loop {
            if progress.model_calls >= self.config.max_turns {
                return Err(Halt::Budget);
            }
            attempt += 1;
            progress.model_calls += 1;

            // Create span for LLM call
            let llm_span = info_span!(
                "llm_call",
                trace_id = %trace_id,
                call = progress.model_calls,
                attempt,
                model = %model,
                otel.name = "llm_call"
            );

            let call_start = Instant::now();
            let result = within(deadline, self.backend.complete(&messages))
                .instrument(llm_span)
                .await;
            let call_duration_secs = call_start.elapsed().as_secs_f64();
            LLM_CALL_TIME.with_label_values(&[model]).observe(call_duration_secs);

            match result {
                None => return Err(Halt::Deadline),
                Some(Ok(output)) => {
                    LLM_CALLS.with_label_values(&["success"]).inc();
                    info!(
                        trace_id = %trace_id,
                        call = progress.model_calls,
                        duration_ms = call_duration_secs * 1000.0,
                        output_len = output.len(),
                        "LLM call completed"
                    );
                    return Ok(output);
                }
                Some(Err(e)) if e.is_transient() && attempt < self.config.model_retries => {
                    LLM_CALLS.with_label_values(&["transient_error"]).inc();
                    let delay = Duration::from_millis(self.config.retry_delay_ms * u64::from(attempt));
                    warn!(
                        trace_id = %trace_id,
                        attempt,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "LLM call failed, retrying"
                    );
                    if within(deadline, tokio::time::sleep(delay)).await.is_none() {
                        return Err(Halt::Deadline);
                    }
                }
                Some(Err(e)) => {
                    LLM_CALLS.with_label_values(&["error"]).inc();
                    return Err(Halt::Model(e));
                }
            }
        }
    }

    /// Turn one directive into its observation
    async fn execute(&self, directive: &Directive, trace_id: &str, turn: usize) -> String {
        let call = match directive {
            Directive::Call(call) => call,
            Directive::Malformed { reason } => {
                TOOL_CALLS.with_label_values(&["invalid", "error"]).inc();
                warn!(trace_id = %trace_id, turn, reason = %reason, "Malformed tool call");
                return format!("Error: {}", reason);
            }
        };

        let label = call
            .name
            .parse::<ToolName>()
            .map(|tool| tool.as_str())
            .unwrap_or("unknown");

        let tool_span = info_span!(
            "tool_call",
            trace_id = %trace_id,
            tool = %call.name,
            turn,
            otel.name = "tool_call"
        );

        let call_start = Instant::now();
        let observation = self
            .tools
            .dispatch(&call.name, &call.arguments)
            .instrument(tool_span)
            .await;

        let outcome = if observation.starts_with("Error") {
            "error"
        } else {
            "ok"
        };
        TOOL_CALLS.with_label_values(&[label, outcome]).inc();
        info!(
            trace_id = %trace_id,
            tool = %call.name,
            outcome,
            duration_ms = call_start.elapsed().as_secs_f64() * 1000.0,
            observation_len = observation.len(),
            "Tool call finished"
        );

        observation
    }

    fn context_exhausted(&self, trace_id: &str) -> Termination {
        let max_input_chars = self.config.max_input_chars;
        warn!(trace_id = %trace_id, max_input_chars, "Input budget exhausted");
        Termination::ContextExhausted { max_input_chars }
    }

    fn timed_out(&self, trace_id: &str) -> Termination {
        let after_secs = self.config.run_timeout_secs.unwrap_or_default();
        warn!(trace_id = %trace_id, after_secs, "Run deadline passed");
        Termination::TimedOut { after_secs }
    }
}

/// Await `fut`, giving up at `deadline` if there is one
async fn within<F: Future>(deadline: Option<Instant>, fut: F) -> Option<F::Output> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut).await.ok(),
        None => Some(fut.await),
    }
}
