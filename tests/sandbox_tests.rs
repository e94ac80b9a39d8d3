//! Integration tests for the sandbox client
//!
//! Each test starts a one-shot HTTP server on a local port that answers a
//! single `/run_code` request with a canned reply.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use rca_agent::sandbox::{RunStatus, SandboxClient};
use rca_agent::{ToolRegistry, ToolSettings};

/// Request line and decoded JSON body seen by the fake sandbox
struct Captured {
    request_line: String,
    body: Value,
}

/// Serve one request, answering with `status` and `body`
async fn one_shot_server(status: &'static str, body: String) -> (String, JoinHandle<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];

        // Read headers, then exactly Content-Length bytes of body
        let (header_end, content_length) = loop {
            let n = socket.read(&mut buf).await.unwrap();
            assert!(n > 0, "client closed before sending headers");
            raw.extend_from_slice(&buf[..n]);
            if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                let headers = String::from_utf8_lossy(&raw[..pos]).to_lowercase();
                let length = headers
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                break (pos + 4, length);
            }
        };
        while raw.len() < header_end + content_length {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
        }

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();

        let request_line = String::from_utf8_lossy(&raw)
            .lines()
            .next()
            .unwrap_or_default()
            .to_string();
        let body = serde_json::from_slice(&raw[header_end..]).unwrap_or(Value::Null);
        Captured { request_line, body }
    });

    (url, handle)
}

#[tokio::test]
async fn test_successful_run_is_mapped() {
    let reply = json!({
        "status": "Success",
        "message": "",
        "run_result": {"status": "Finished", "stdout": "42\n", "stderr": "", "return_code": 0}
    });
    let (url, server) = one_shot_server("200 OK", reply.to_string()).await;
    let client = SandboxClient::new(url);

    let result = client.execute("print(6 * 7)", Duration::from_secs(30)).await;

    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(result.stdout, "42\n");
    assert_eq!(result.stderr, "");
    assert_eq!(result.exit_code, 0);
    assert!(result.execution_time >= 0.0);

    let captured = server.await.unwrap();
    assert!(captured.request_line.starts_with("POST /run_code "));
    assert_eq!(
        captured.body,
        json!({"code": "print(6 * 7)", "language": "python", "run_timeout": 30})
    );
}

#[tokio::test]
async fn test_program_failure_keeps_transport_success() {
    let reply = json!({
        "status": "Failed",
        "run_result": {
            "stdout": "partial\n",
            "stderr": "Traceback (most recent call last):\nZeroDivisionError",
            "return_code": 1
        }
    });
    let (url, server) = one_shot_server("200 OK", reply.to_string()).await;
    let client = SandboxClient::new(url);

    let result = client.execute("1 / 0", Duration::from_secs(10)).await;
    server.await.unwrap();

    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(result.exit_code, 1);
    assert!(result.to_observation().starts_with("Error: Traceback"));
    assert!(result.to_observation().ends_with("Output: partial\n"));
}

#[tokio::test]
async fn test_server_error_is_failed_result() {
    let (url, server) = one_shot_server("500 Internal Server Error", "{}".to_string()).await;
    let client = SandboxClient::new(url.clone());

    let result = client.execute("print(1)", Duration::from_secs(10)).await;
    server.await.unwrap();

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.exit_code, 1);
    assert!(result.stderr.contains(&url));
}

#[tokio::test]
async fn test_non_json_reply_is_failed_result() {
    let (url, server) = one_shot_server("200 OK", "<html>gateway</html>".to_string()).await;
    let client = SandboxClient::new(url);

    let result = client.execute("print(1)", Duration::from_secs(10)).await;
    server.await.unwrap();

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.exit_code, 1);
    assert!(!result.stderr.is_empty());
}

#[tokio::test]
async fn test_missing_fields_default() {
    let (url, server) = one_shot_server("200 OK", json!({"run_result": {}}).to_string()).await;
    let client = SandboxClient::new(url);

    let result = client.execute("pass", Duration::from_secs(10)).await;
    server.await.unwrap();

    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(result.stdout, "");
    assert_eq!(result.stderr, "");
    assert_eq!(result.exit_code, 0);
}

#[tokio::test]
async fn test_timeout_is_clamped_on_the_wire() {
    let reply = json!({"run_result": {"stdout": "", "return_code": 0}});
    let (url, server) = one_shot_server("200 OK", reply.to_string()).await;
    let client = SandboxClient::new(url);

    client.execute("pass", Duration::from_secs(0)).await;

    let captured = server.await.unwrap();
    assert_eq!(captured.body["run_timeout"], 1);
}

#[tokio::test]
async fn test_registry_over_http_sandbox() {
    let listing = r#"[{"filename": "abnormal_logs.parquet", "path": "/data/abnormal_logs.parquet", "row_count": 10, "column_count": 4}]"#;
    let reply = json!({"status": "Success", "run_result": {"stdout": listing, "stderr": "", "return_code": 0}});
    let (url, server) = one_shot_server("200 OK", reply.to_string()).await;

    let registry = ToolRegistry::new(Arc::new(SandboxClient::new(url)), ToolSettings::default());
    let observation = registry.dispatch("list_parquet_files", &json!({})).await;

    assert_eq!(observation, listing);
    let captured = server.await.unwrap();
    let code = captured.body["code"].as_str().unwrap();
    assert!(code.contains("data_dir = \"/data\""));
    assert!(code.contains("import duckdb"));
    assert_eq!(captured.body["run_timeout"], 60);
}
