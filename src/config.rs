//! Agent configuration
//!
//! [`AgentConfig::default`] gives a local setup (model server on :8000,
//! sandbox on :8080, data under `/data`). [`AgentConfig::from_env`] overlays
//! environment variables on top of it.

use std::str::FromStr;

use crate::sandbox::MAX_RUN_TIMEOUT_SECS;
use crate::tools::ToolSettings;

/// Input budget: 32k tokens at roughly four characters per token
pub const DEFAULT_MAX_INPUT_CHARS: usize = 128_000;
/// Longest single observation kept in the conversation
pub const DEFAULT_MAX_OBSERVATION_CHARS: usize = 20_000;

/// Error type for configuration loading
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: '{value}' ({reason})")]
    Invalid {
        name: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(name: &str, value: impl ToString, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            name: name.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Model backend settings
#[derive(Debug, Clone, PartialEq)]
pub struct LlmSettings {
    /// Base URL of the OpenAI-compatible server (e.g., "http://localhost:8000")
    pub base_url: String,
    /// Model to request
    pub model: String,
    /// Bearer token, if the server wants one
    pub api_key: Option<String>,
    /// Timeout for a single model request in seconds
    pub timeout_secs: u64,
    pub temperature: f32,
    pub top_p: f32,
    pub presence_penalty: f32,
    pub max_tokens: Option<u32>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            model: "Qwen/Qwen2.5-72B-Instruct".to_string(),
            api_key: None,
            timeout_secs: 300,
            temperature: 0.0,
            top_p: 0.95,
            presence_penalty: 1.1,
            max_tokens: None,
        }
    }
}

/// Configuration for the agent controller
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub llm: LlmSettings,
    /// Base URL of the sandbox execution service
    pub sandbox_endpoint: String,
    pub tools: ToolSettings,
    /// Maximum number of model requests per run, retries included
    pub max_turns: usize,
    /// Attempts per model step when the backend fails transiently
    pub model_retries: u32,
    /// Base delay between model attempts in milliseconds
    pub retry_delay_ms: u64,
    /// Wall clock budget for a whole run in seconds
    pub run_timeout_secs: Option<u64>,
    /// Characters the model input may hold across all messages
    pub max_input_chars: usize,
    /// Characters kept from one observation before truncation
    pub max_observation_chars: usize,
    /// Custom system prompt (uses default if None)
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            llm: LlmSettings::default(),
            sandbox_endpoint: "http://localhost:8080".to_string(),
            tools: ToolSettings::default(),
            max_turns: 100,
            model_retries: 3,
            retry_delay_ms: 1000,
            run_timeout_secs: None,
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            max_observation_chars: DEFAULT_MAX_OBSERVATION_CHARS,
            system_prompt: None,
        }
    }
}

impl AgentConfig {
    /// Defaults overlaid with the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with whatever `lookup` returns for each variable
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(url) = get("RCA_LLM_BASE_URL") {
            config.llm.base_url = url;
        }
        if let Some(model) = get("RCA_MODEL") {
            config.llm.model = model;
        }
        config.llm.api_key = get("RCA_LLM_API_KEY");
        if let Some(endpoint) = get("SANDBOX_FUSION_ENDPOINT") {
            config.sandbox_endpoint = endpoint;
        }
        if let Some(dir) = get("RCA_SANDBOX_DATA_DIR") {
            config.tools.data_dir = dir;
        }

        parse_into(&get, "RCA_MAX_TURNS", &mut config.max_turns)?;
        parse_into(&get, "RCA_MODEL_RETRIES", &mut config.model_retries)?;
        parse_into(&get, "RCA_RETRY_DELAY_MS", &mut config.retry_delay_ms)?;
        parse_into(&get, "RCA_MODEL_TIMEOUT_SECS", &mut config.llm.timeout_secs)?;
        parse_into(&get, "RCA_EXECUTION_TIMEOUT_SECS", &mut config.tools.run_timeout_secs)?;
        parse_into(&get, "RCA_MAX_INPUT_CHARS", &mut config.max_input_chars)?;
        parse_into(&get, "RCA_MAX_OBSERVATION_CHARS", &mut config.max_observation_chars)?;
        parse_into(&get, "RCA_TEMPERATURE", &mut config.llm.temperature)?;
        parse_into(&get, "RCA_TOP_P", &mut config.llm.top_p)?;
        parse_into(&get, "RCA_PRESENCE_PENALTY", &mut config.llm.presence_penalty)?;
        if let Some(raw) = get("RCA_MAX_TOKENS") {
            config.llm.max_tokens = Some(parse_value("RCA_MAX_TOKENS", &raw)?);
        }
        if let Some(raw) = get("RCA_RUN_TIMEOUT_SECS") {
            config.run_timeout_secs = Some(parse_value("RCA_RUN_TIMEOUT_SECS", &raw)?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the agent loop cannot honor
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_turns == 0 {
            return Err(ConfigError::invalid("max_turns", self.max_turns, "must be at least 1"));
        }
        if self.model_retries == 0 {
            return Err(ConfigError::invalid(
                "model_retries",
                self.model_retries,
                "must be at least 1",
            ));
        }
        if self.llm.timeout_secs == 0 {
            return Err(ConfigError::invalid("llm.timeout_secs", 0, "must be positive"));
        }
        if self.tools.run_timeout_secs == 0 || self.tools.run_timeout_secs > MAX_RUN_TIMEOUT_SECS {
            return Err(ConfigError::invalid(
                "tools.run_timeout_secs",
                self.tools.run_timeout_secs,
                format!("must be between 1 and {}", MAX_RUN_TIMEOUT_SECS),
            ));
        }
        if self.max_input_chars == 0 {
            return Err(ConfigError::invalid("max_input_chars", 0, "must be positive"));
        }
        if self.max_observation_chars == 0 {
            return Err(ConfigError::invalid("max_observation_chars", 0, "must be positive"));
        }
        if self.run_timeout_secs == Some(0) {
            return Err(ConfigError::invalid("run_timeout_secs", 0, "must be positive"));
        }
        Ok(())
    }
}

fn parse_value<T>(name: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| ConfigError::invalid(name, raw, e.to_string()))
}

fn parse_into<T, G>(get: &G, name: &str, target: &mut T) -> Result<(), ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    if let Some(raw) = get(name) {
        *target = parse_value(name, &raw)?;
    }
    Ok(())
}
