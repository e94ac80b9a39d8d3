//! Program generation for the parquet tools
//!
//! Each function is pure: it turns validated tool arguments into the text of
//! a python program for the sandbox. Values are embedded as JSON literals,
//! which are also valid python literals, so argument text can never escape
//! its assignment. The program bodies below are fixed; only the assignment
//! block at the top varies.

use serde::Serialize;

const PRELUDE: &str = r#"import glob
import json
import os
from datetime import date, datetime, time

import duckdb


def sql_literal(value):
    return "'" + value.replace("'", "''") + "'"


def quote_ident(name):
    return '"' + name.replace('"', '""') + '"'
"#;

const LIST_FILES_BODY: &str = r#"
files_info = []

try:
    for file_path in sorted(glob.glob(os.path.join(data_dir, "*.parquet"))):
        try:
            conn = duckdb.connect(":memory:")
            try:
                source = f"read_parquet({sql_literal(file_path)})"
                row_count = conn.execute(f"SELECT COUNT(*) FROM {source}").fetchone()[0]
                result = conn.execute(f"SELECT * FROM {source} LIMIT 0")
                column_count = len(result.description)
            finally:
                conn.close()
            files_info.append({
                "filename": os.path.basename(file_path),
                "path": file_path,
                "row_count": row_count,
                "column_count": column_count,
            })
        except Exception as e:
            files_info.append({
                "filename": os.path.basename(file_path),
                "error": str(e),
            })

    print(json.dumps(files_info, indent=2))
except Exception as e:
    print(f"Error listing files: {e}")
"#;

const SCHEMA_BODY: &str = r#"
file_path = os.path.join(data_dir, filename)

try:
    if not os.path.exists(file_path):
        print(f"Error: File {file_path} not found")
    else:
        conn = duckdb.connect(":memory:")
        try:
            source = f"read_parquet({sql_literal(file_path)})"
            result = conn.execute(f"SELECT * FROM {source} LIMIT 0")
            columns = [{"name": desc[0], "type": str(desc[1])} for desc in result.description]
            row_count = conn.execute(f"SELECT COUNT(*) FROM {source}").fetchone()[0]
        finally:
            conn.close()
        info = {
            "file": filename,
            "row_count": row_count,
            "columns": columns,
        }
        print(json.dumps(info, indent=2))
except Exception as e:
    print(f"Error getting schema: {e}")
"#;

const QUERY_BODY: &str = r#"

def serialize(obj):
    if isinstance(obj, (datetime, date, time)):
        return obj.isoformat()
    return str(obj)


try:
    conn = duckdb.connect(":memory:")
    try:
        for fname in files:
            path = os.path.join(data_dir, fname)
            if os.path.exists(path):
                view = os.path.splitext(fname)[0]
                conn.execute(
                    f"CREATE OR REPLACE VIEW {quote_ident(view)} AS "
                    f"SELECT * FROM read_parquet({sql_literal(path)})"
                )
            else:
                print(f"Warning: File {fname} not found")

        cursor = conn.execute(query)
        columns = [desc[0] for desc in cursor.description]
        rows = [dict(zip(columns, row)) for row in cursor.fetchall()]
    finally:
        conn.close()

    # The limit bounds the output, not the query
    rows = rows[:limit]
    print(json.dumps(rows, default=serialize, indent=2))
except Exception as e:
    print(f"Error executing query: {e}")
"#;

/// Encode a value as a python literal
fn py_literal<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "None".to_string())
}

fn assemble(assignments: &[(&str, String)], body: &str) -> String {
    let mut program = String::from(PRELUDE);
    program.push('\n');
    for (name, literal) in assignments {
        program.push_str(name);
        program.push_str(" = ");
        program.push_str(literal);
        program.push('\n');
    }
    program.push_str(body);
    program
}

/// Program listing every `*.parquet` file in `directory` with row and column counts
pub fn list_files_program(directory: &str) -> String {
    assemble(&[("data_dir", py_literal(directory))], LIST_FILES_BODY)
}

/// Program printing the columns and row count of `data_dir/filename`
pub fn schema_program(data_dir: &str, filename: &str) -> String {
    assemble(
        &[
            ("data_dir", py_literal(data_dir)),
            ("filename", py_literal(filename)),
        ],
        SCHEMA_BODY,
    )
}

/// Program binding one view per file and printing at most `limit` result rows
pub fn query_program(data_dir: &str, files: &[String], query: &str, limit: usize) -> String {
    assemble(
        &[
            ("data_dir", py_literal(data_dir)),
            ("files", py_literal(files)),
            ("query", py_literal(query)),
            ("limit", limit.to_string()),
        ],
        QUERY_BODY,
    )
}
