//! Free-form code execution
//!
//! The model writes the program itself; it runs verbatim in the sandbox.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{parse_args, SandboxContext, Tool, ToolName};

#[derive(Debug, Default, Deserialize)]
struct PythonArgs {
    #[serde(default)]
    code: Option<String>,
}

pub struct PythonInterpreter {
    context: SandboxContext,
}

impl PythonInterpreter {
    pub(crate) fn new(context: SandboxContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Tool for PythonInterpreter {
    fn name(&self) -> ToolName {
        ToolName::PythonInterpreter
    }

    fn description(&self) -> &'static str {
        r#"Executes Python code in a sandboxed environment. To use this tool, you must follow this format:
1. The 'arguments' JSON object must be empty: {}.
2. The Python code to be executed must be placed immediately after the JSON block, enclosed within <code> and </code> tags.

IMPORTANT: Any output you want to see MUST be printed to standard output using the print() function.

Example of a correct call:
<tool_call>
{"name": "PythonInterpreter", "arguments": {}}
<code>
import duckdb
print(duckdb.sql("SELECT COUNT(*) FROM read_parquet('/data/traces.parquet')").fetchall())
</code>
</tool_call>"#
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn call(&self, args: &Value) -> String {
        let args: PythonArgs = match parse_args(self.name(), args) {
            Ok(args) => args,
            Err(observation) => return observation,
        };
        let code = args.code.unwrap_or_default();
        if code.trim().is_empty() {
            return "Error: no code to execute. Put the Python code between <code> and </code> inside the tool call.".to_string();
        }

        debug!(code_len = code.len(), "Running model-supplied code");
        self.context.run(code).await
    }
}
