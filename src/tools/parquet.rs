//! Parquet inspection tools: listing, schema and SQL queries
//!
//! All three generate a duckdb program and run it in the sandbox. File
//! references from the model are reduced to base filenames and resolved
//! against the data root, so nothing outside it can be named.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{base_filename, codegen, parse_args, SandboxContext, Tool, ToolName};

/// Rows returned by `query_parquet` when the model gives no limit
pub const DEFAULT_QUERY_LIMIT: usize = 10;

// ─────────────────────────────────────────────────────────────────────────────
// list_parquet_files
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct ListArgs {
    #[serde(default)]
    directory: Option<String>,
}

pub struct ListParquetFiles {
    context: SandboxContext,
}

impl ListParquetFiles {
    pub(crate) fn new(context: SandboxContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Tool for ListParquetFiles {
    fn name(&self) -> ToolName {
        ToolName::ListParquetFiles
    }

    fn description(&self) -> &'static str {
        "List all parquet files in the data directory with row and column counts."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "directory": {
                    "type": "string",
                    "description": "Directory to search for parquet files (defaults to the data directory)"
                }
            },
            "required": []
        })
    }

    async fn call(&self, args: &Value) -> String {
        let args: ListArgs = match parse_args(self.name(), args) {
            Ok(args) => args,
            Err(observation) => return observation,
        };
        let data_dir = self.context.data_dir();
        let directory = match resolve_directory(data_dir, args.directory.as_deref()) {
            Ok(directory) => directory,
            Err(observation) => return observation,
        };

        debug!(directory = %directory, "Listing parquet files");
        self.context
            .run(codegen::list_files_program(&directory))
            .await
    }
}

/// Resolve the directory argument of `list_parquet_files`.
///
/// No argument, `""` and `"."` mean the data root. Relative paths are taken
/// from the data root. Anything that climbs with `..` or points outside the
/// data root is refused.
fn resolve_directory(data_dir: &str, requested: Option<&str>) -> Result<String, String> {
    let root = data_dir.trim_end_matches('/');
    let requested = match requested.map(str::trim) {
        None | Some("") | Some(".") | Some("./") => return Ok(data_dir.to_string()),
        Some(path) => path,
    };

    let outside = || {
        format!(
            "Error: directory '{}' is outside the data directory {}",
            requested, data_dir
        )
    };

    if requested.split('/').any(|part| part == "..") {
        return Err(outside());
    }

    let trimmed = requested.trim_end_matches('/');
    if requested.starts_with('/') {
        if trimmed == root || trimmed.starts_with(&format!("{}/", root)) {
            return Ok(trimmed.to_string());
        }
        return Err(outside());
    }

    let relative = trimmed.trim_start_matches("./");
    if relative.is_empty() || relative == "." {
        return Ok(data_dir.to_string());
    }
    Ok(format!("{}/{}", root, relative))
}

// ─────────────────────────────────────────────────────────────────────────────
// get_parquet_schema
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SchemaArgs {
    parquet_file: String,
}

pub struct GetParquetSchema {
    context: SandboxContext,
}

impl GetParquetSchema {
    pub(crate) fn new(context: SandboxContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Tool for GetParquetSchema {
    fn name(&self) -> ToolName {
        ToolName::GetParquetSchema
    }

    fn description(&self) -> &'static str {
        "Get the column names, column types and row count of a parquet file."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "parquet_file": {
                    "type": "string",
                    "description": "Name of the parquet file to inspect (e.g. 'abnormal_logs.parquet')"
                }
            },
            "required": ["parquet_file"]
        })
    }

    async fn call(&self, args: &Value) -> String {
        let args: SchemaArgs = match parse_args(self.name(), args) {
            Ok(args) => args,
            Err(observation) => return observation,
        };
        let Some(filename) = base_filename(&args.parquet_file) else {
            return format!(
                "Error: '{}' is not a valid parquet file reference",
                args.parquet_file
            );
        };

        debug!(file = %filename, "Reading parquet schema");
        self.context
            .run(codegen::schema_program(self.context.data_dir(), filename))
            .await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// query_parquet
// ─────────────────────────────────────────────────────────────────────────────

/// Models send either a list of files or a single filename
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FileList {
    One(String),
    Many(Vec<String>),
}

impl Default for FileList {
    fn default() -> Self {
        FileList::Many(Vec::new())
    }
}

impl FileList {
    fn into_vec(self) -> Vec<String> {
        match self {
            FileList::One(file) => vec![file],
            FileList::Many(files) => files,
        }
    }
}

fn default_limit() -> usize {
    DEFAULT_QUERY_LIMIT
}

#[derive(Debug, Deserialize)]
struct QueryArgs {
    #[serde(default)]
    parquet_files: FileList,
    query: String,
    #[serde(default = "default_limit")]
    limit: usize,
}

pub struct QueryParquet {
    context: SandboxContext,
}

impl QueryParquet {
    pub(crate) fn new(context: SandboxContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Tool for QueryParquet {
    fn name(&self) -> ToolName {
        ToolName::QueryParquet
    }

    fn description(&self) -> &'static str {
        "Query parquet files with SQL. Each file is available as a view named after the file without its extension (abnormal_logs.parquet -> abnormal_logs)."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "parquet_files": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Parquet filenames to query"
                },
                "query": {
                    "type": "string",
                    "description": "SQL query to execute"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of rows to return",
                    "default": DEFAULT_QUERY_LIMIT
                }
            },
            "required": ["parquet_files", "query"]
        })
    }

    async fn call(&self, args: &Value) -> String {
        let args: QueryArgs = match parse_args(self.name(), args) {
            Ok(args) => args,
            Err(observation) => return observation,
        };
        if args.query.trim().is_empty() {
            return "Error executing query: query is empty".to_string();
        }

        let mut warnings = Vec::new();
        let mut files = Vec::new();
        for reference in args.parquet_files.into_vec() {
            match base_filename(&reference) {
                Some(name) => files.push(name.to_string()),
                None => warnings.push(format!(
                    "Warning: File {} is not a valid parquet file reference",
                    reference
                )),
            }
        }

        debug!(files = ?files, limit = args.limit, "Running parquet query");
        let output = self
            .context
            .run(codegen::query_program(
                self.context.data_dir(),
                &files,
                &args.query,
                args.limit,
            ))
            .await;

        if warnings.is_empty() {
            output
        } else {
            format!("{}\n{}", warnings.join("\n"), output)
        }
    }
}
