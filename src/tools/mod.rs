//! Tool adapters exposed to the model
//!
//! The registry is fixed: [`ToolName`] enumerates every tool and
//! [`ToolRegistry::get`] maps each name to its adapter. A name that does not
//! parse into a [`ToolName`] never reaches an adapter.
//!
//! Adapters compile their arguments into a python program
//! ([`codegen`]), run it through a [`CodeRunner`] and hand back text.
//! They never return errors: bad arguments, missing files and sandbox
//! failures all come back as observations the model can read.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::sandbox::{CodeRunner, ExecutionRequest, DEFAULT_RUN_TIMEOUT_SECS};

pub mod codegen;
pub mod parquet;
pub mod python;

pub use parquet::{GetParquetSchema, ListParquetFiles, QueryParquet};
pub use python::PythonInterpreter;

/// Where the data lives inside the sandbox
pub const DEFAULT_SANDBOX_DATA_DIR: &str = "/data";

/// Names of the registered tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ToolName {
    #[serde(rename = "list_parquet_files")]
    ListParquetFiles,
    #[serde(rename = "get_parquet_schema")]
    GetParquetSchema,
    #[serde(rename = "query_parquet")]
    QueryParquet,
    #[serde(rename = "PythonInterpreter")]
    PythonInterpreter,
}

impl ToolName {
    /// Every tool, in the order they are described to the model
    pub const ALL: [ToolName; 4] = [
        ToolName::PythonInterpreter,
        ToolName::ListParquetFiles,
        ToolName::GetParquetSchema,
        ToolName::QueryParquet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::ListParquetFiles => "list_parquet_files",
            ToolName::GetParquetSchema => "get_parquet_schema",
            ToolName::QueryParquet => "query_parquet",
            ToolName::PythonInterpreter => "PythonInterpreter",
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool name outside the registry
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tool '{0}'")]
pub struct UnknownTool(pub String);

impl FromStr for ToolName {
    type Err = UnknownTool;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        ToolName::ALL
            .into_iter()
            .find(|tool| tool.as_str() == name)
            .ok_or_else(|| UnknownTool(name.to_string()))
    }
}

/// Tool definition as shown to the model
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String, // Always "function"
    pub function: ToolFunction,
}

/// Function specification for a tool
#[derive(Debug, Clone, Serialize)]
pub struct ToolFunction {
    pub name: String,
    pub description: String,
    pub parameters: Value, // JSON Schema
}

/// A capability the model can invoke
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> ToolName;

    fn description(&self) -> &'static str;

    /// JSON Schema of the argument object
    fn parameters(&self) -> Value;

    /// Run the tool. Always produces an observation, never an error.
    async fn call(&self, args: &Value) -> String;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            tool_type: "function".to_string(),
            function: ToolFunction {
                name: self.name().as_str().to_string(),
                description: self.description().to_string(),
                parameters: self.parameters(),
            },
        }
    }
}

/// Settings shared by every adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSettings {
    /// Data root as seen from inside the sandbox
    pub data_dir: String,
    /// Run timeout for each generated program, in seconds
    pub run_timeout_secs: u64,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            data_dir: DEFAULT_SANDBOX_DATA_DIR.to_string(),
            run_timeout_secs: DEFAULT_RUN_TIMEOUT_SECS,
        }
    }
}

/// Shared plumbing: one runner, one set of settings
#[derive(Clone)]
pub(crate) struct SandboxContext {
    runner: Arc<dyn CodeRunner>,
    settings: ToolSettings,
}

impl SandboxContext {
    pub(crate) fn data_dir(&self) -> &str {
        &self.settings.data_dir
    }

    /// Run `code` and render the result as an observation
    pub(crate) async fn run(&self, code: String) -> String {
        let request = ExecutionRequest::python(code, self.settings.run_timeout_secs);
        self.runner.run_code(request).await.to_observation()
    }
}

/// Fixed mapping from [`ToolName`] to adapter
pub struct ToolRegistry {
    list_files: ListParquetFiles,
    schema: GetParquetSchema,
    query: QueryParquet,
    python: PythonInterpreter,
}

impl ToolRegistry {
    pub fn new(runner: Arc<dyn CodeRunner>, settings: ToolSettings) -> Self {
        let context = SandboxContext { runner, settings };
        Self {
            list_files: ListParquetFiles::new(context.clone()),
            schema: GetParquetSchema::new(context.clone()),
            query: QueryParquet::new(context.clone()),
            python: PythonInterpreter::new(context),
        }
    }

    pub fn get(&self, name: ToolName) -> &dyn Tool {
        match name {
            ToolName::ListParquetFiles => &self.list_files,
            ToolName::GetParquetSchema => &self.schema,
            ToolName::QueryParquet => &self.query,
            ToolName::PythonInterpreter => &self.python,
        }
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        ToolName::ALL
            .iter()
            .map(|name| self.get(*name).definition())
            .collect()
    }

    /// One JSON definition per line, for the system prompt's `<tools>` block
    pub fn render_definitions(&self) -> String {
        self.definitions()
            .iter()
            .filter_map(|d| serde_json::to_string(d).ok())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Resolve `name` and call the tool; unknown names become an error observation
    pub async fn dispatch(&self, name: &str, args: &Value) -> String {
        match name.parse::<ToolName>() {
            Ok(tool) => self.get(tool).call(args).await,
            Err(e) => unknown_tool_observation(&e),
        }
    }
}

pub(crate) fn unknown_tool_observation(error: &UnknownTool) -> String {
    let available = ToolName::ALL
        .iter()
        .map(ToolName::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    format!("Error: {}. Available tools: {}", error, available)
}

/// Decode tool arguments into `T`.
///
/// Accepts an object, a JSON-encoded string of an object, or null (treated
/// as `{}`). The error is already phrased as an observation.
pub(crate) fn parse_args<T: DeserializeOwned>(tool: ToolName, args: &Value) -> Result<T, String> {
    let value = match args {
        Value::Null => Value::Object(Default::default()),
        Value::String(raw) => serde_json::from_str(raw)
            .map_err(|e| format!("Error: invalid arguments for {}: {}", tool, e))?,
        other => other.clone(),
    };
    serde_json::from_value(value).map_err(|e| format!("Error: invalid arguments for {}: {}", tool, e))
}

/// Reduce a file reference to its base filename.
///
/// `"/data/logs.parquet"`, `"./logs.parquet"` and `"logs.parquet"` all give
/// `"logs.parquet"`; references with no usable final component give `None`.
pub fn base_filename(reference: &str) -> Option<&str> {
    let name = reference.trim().rsplit('/').next()?.trim();
    match name {
        "" | "." | ".." => None,
        name => Some(name),
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::RecordingRunner;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_name_round_trip() {
        for tool in ToolName::ALL {
            assert_eq!(tool.as_str().parse::<ToolName>(), Ok(tool));
        }
        assert_eq!(
            "drop_tables".parse::<ToolName>(),
            Err(UnknownTool("drop_tables".to_string()))
        );
    }

    #[test]
    fn test_base_filename() {
        assert_eq!(base_filename("logs.parquet"), Some("logs.parquet"));
        assert_eq!(base_filename("/data/logs.parquet"), Some("logs.parquet"));
        assert_eq!(base_filename("../../etc/passwd"), Some("passwd"));
        assert_eq!(base_filename(" ./traces.parquet "), Some("traces.parquet"));
        assert_eq!(base_filename("/data/"), None);
        assert_eq!(base_filename(".."), None);
        assert_eq!(base_filename(""), None);
    }

    #[test]
    fn test_parse_args_accepts_string_payload() {
        #[derive(serde::Deserialize)]
        struct Args {
            parquet_file: String,
        }
        let args: Args = parse_args(
            ToolName::GetParquetSchema,
            &json!("{\"parquet_file\": \"logs.parquet\"}"),
        )
        .unwrap();
        assert_eq!(args.parquet_file, "logs.parquet");

        let err = parse_args::<Args>(ToolName::GetParquetSchema, &json!({})).err().unwrap();
        assert!(err.starts_with("Error: invalid arguments for get_parquet_schema"));
    }

    #[test]
    fn test_definitions_cover_registry() {
        let registry = ToolRegistry::new(RecordingRunner::replying("", ""), ToolSettings::default());
        let names: Vec<_> = registry
            .definitions()
            .into_iter()
            .map(|d| d.function.name)
            .collect();
        assert_eq!(
            names,
            vec!["PythonInterpreter", "list_parquet_files", "get_parquet_schema", "query_parquet"]
        );

        let rendered = registry.render_definitions();
        assert_eq!(rendered.lines().count(), 4);
        assert!(rendered.contains("\"type\":\"function\""));
    }

    #[tokio::test]
    async fn test_dispatch_unknown_tool_reports_error() {
        let runner = RecordingRunner::replying("never", "");
        let registry = ToolRegistry::new(runner.clone(), ToolSettings::default());

        let observation = registry.dispatch("delete_everything", &json!({})).await;
        assert!(observation.starts_with("Error: unknown tool 'delete_everything'"));
        assert!(observation.contains("query_parquet"));
        assert!(runner.codes().is_empty());
    }
}
