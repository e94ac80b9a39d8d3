//! Text protocol between the model and the controller
//!
//! The model acts by writing delimited blocks into its output:
//!
//! ```text
//! <tool_call>
//! {"name": "query_parquet", "arguments": {"parquet_files": ["traces.parquet"], "query": "..."}}
//! </tool_call>
//!
//! <tool_call>
//! {"name": "PythonInterpreter", "arguments": {}}
//! <code>
//! print("hello")
//! </code>
//! </tool_call>
//!
//! <answer>
//! ...
//! Root cause service: ts-food-service
//! </answer>
//! ```
//!
//! Tool observations come back wrapped in `<tool_response>` tags; controller
//! notices come back as plain text.

use serde_json::{Map, Value};

pub const TOOL_CALL_OPEN: &str = "<tool_call>";
pub const TOOL_CALL_CLOSE: &str = "</tool_call>";
pub const CODE_OPEN: &str = "<code>";
pub const CODE_CLOSE: &str = "</code>";
pub const ANSWER_OPEN: &str = "<answer>";
pub const ANSWER_CLOSE: &str = "</answer>";
pub const OBSERVATION_OPEN: &str = "<tool_response>";
pub const OBSERVATION_CLOSE: &str = "</tool_response>";

/// Observation appended when a model output contains no directive
pub const NO_ACTION_REMINDER: &str = "No tool call or final answer was found in your last message. \
Call a tool inside <tool_call></tool_call> tags, or give the final answer inside <answer></answer> tags \
with the last line 'Root cause service: <service-name>'.";

/// Observation appended once the input budget is nearly spent
pub const CONTEXT_LIMIT_NOTICE: &str = "The conversation has reached its length limit and no more tool calls will be run. \
Give your final answer now inside <answer></answer> tags, \
with the last line 'Root cause service: <service-name>'.";

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    pub name: String,
    pub arguments: Value,
}

/// One `<tool_call>` block, parsed or not
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Call(ToolCallRequest),
    Malformed { reason: String },
}

impl Directive {
    /// Name used to tag the observation of this directive
    pub fn label(&self) -> &str {
        match self {
            Directive::Call(call) => &call.name,
            Directive::Malformed { .. } => "invalid",
        }
    }
}

/// What a model output asks the controller to do
#[derive(Debug, Clone, PartialEq)]
pub enum ModelAction {
    /// A final answer; any tool calls written alongside it are not run
    Answer { skipped_calls: usize },
    ToolCalls(Vec<Directive>),
    NoAction,
}

/// Classify a model output
pub fn parse_action(text: &str) -> ModelAction {
    let blocks = tool_call_blocks(text);
    if answer_block(text).is_some() {
        return ModelAction::Answer {
            skipped_calls: blocks.len(),
        };
    }
    if blocks.is_empty() {
        return ModelAction::NoAction;
    }
    ModelAction::ToolCalls(blocks.into_iter().map(parse_tool_call).collect())
}

/// Content of the first `<answer>...</answer>` block
pub fn answer_block(text: &str) -> Option<&str> {
    let start = text.find(ANSWER_OPEN)? + ANSWER_OPEN.len();
    let end = text[start..].find(ANSWER_CLOSE)?;
    Some(&text[start..start + end])
}

/// Contents of every `<tool_call>` block, in order.
///
/// A final block left open (generation stopped early) runs to the end of
/// the text.
pub fn tool_call_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find(TOOL_CALL_OPEN) {
        let after = &rest[open + TOOL_CALL_OPEN.len()..];
        match after.find(TOOL_CALL_CLOSE) {
            Some(close) => {
                blocks.push(&after[..close]);
                rest = &after[close + TOOL_CALL_CLOSE.len()..];
            }
            None => {
                blocks.push(after);
                break;
            }
        }
    }

    blocks
}

/// Parse the inside of one `<tool_call>` block
pub fn parse_tool_call(block: &str) -> Directive {
    let (json_part, code) = split_code(block);

    let Some(json_str) = first_json_object(json_part) else {
        return malformed("Tool call is not a valid JSON object");
    };
    let value: Value = match serde_json::from_str(json_str) {
        Ok(value) => value,
        Err(e) => return malformed(&format!("Tool call is not a valid JSON object ({})", e)),
    };
    let Some(name) = value.get("name").and_then(Value::as_str) else {
        return malformed("Tool call is missing a string \"name\" field");
    };

    // Some models use "parameters" instead of "arguments"
    let mut arguments = value
        .get("arguments")
        .or_else(|| value.get("parameters"))
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));
    let decoded = match &arguments {
        Value::String(raw) => serde_json::from_str::<Value>(raw)
            .ok()
            .filter(Value::is_object),
        _ => None,
    };
    if let Some(decoded) = decoded {
        arguments = decoded;
    }

    if let Some(code) = code {
        match &mut arguments {
            Value::Object(map) => {
                map.insert("code".to_string(), Value::String(code));
            }
            _ => {
                let mut map = Map::new();
                map.insert("code".to_string(), Value::String(code));
                arguments = Value::Object(map);
            }
        }
    }

    Directive::Call(ToolCallRequest {
        name: name.to_string(),
        arguments,
    })
}

fn malformed(reason: &str) -> Directive {
    Directive::Malformed {
        reason: format!(
            "{}. A tool call must contain a JSON object with \"name\" and \"arguments\" fields.",
            reason
        ),
    }
}

/// Separate a trailing `<code>` section from the JSON part of a block
fn split_code(block: &str) -> (&str, Option<String>) {
    let Some(open) = block.find(CODE_OPEN) else {
        return (block, None);
    };
    let after = &block[open + CODE_OPEN.len()..];
    let body = match after.find(CODE_CLOSE) {
        Some(close) => &after[..close],
        None => after,
    };
    let code = body.trim_start_matches(&['\r', '\n'][..]).trim_end();
    (&block[..open], Some(code.to_string()))
}

/// First balanced `{...}` in `text`, ignoring braces inside JSON strings
fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    None
}
