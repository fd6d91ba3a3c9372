//! Query Executor
//!
//! Contract for running one SQL statement against the cloud-resource query
//! engine, plus the Steampipe CLI implementation and payload parsing.

use crate::provider::CloudProvider;
use crate::query::{Credentials, Row};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Raw error text reported by the query engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ExecutorError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
    Table,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Table => "table",
        })
    }
}

#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run one statement and return the engine's raw output.
    async fn run_query(
        &self,
        provider: CloudProvider,
        query: &str,
        credentials: &Credentials,
        format: OutputFormat,
    ) -> std::result::Result<String, ExecutorError>;
}

/// Runs queries through a local `steampipe` binary.
///
/// The child process is killed if the returned future is dropped, so caller
/// cancellation does not leak running queries.
#[derive(Debug, Clone)]
pub struct SteampipeExecutor {
    binary: PathBuf,
}

impl SteampipeExecutor {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for SteampipeExecutor {
    fn default() -> Self {
        Self::new("steampipe")
    }
}

#[async_trait]
impl QueryExecutor for SteampipeExecutor {
    async fn run_query(
        &self,
        provider: CloudProvider,
        query: &str,
        credentials: &Credentials,
        format: OutputFormat,
    ) -> std::result::Result<String, ExecutorError> {
        info!("Executing {} query with steampipe: {}", provider, query);

        let mut cmd = Command::new(&self.binary);
        cmd.arg("query")
            .arg(query)
            .arg("--output")
            .arg(format.to_string())
            .kill_on_drop(true);
        for (key, value) in credentials {
            if !value.is_empty() {
                cmd.env(key, value);
            }
        }

        let output = cmd.output().await.map_err(|e| {
            ExecutorError(format!(
                "failed to run steampipe ({}): {}",
                self.binary.display(),
                e
            ))
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            let detail = [stderr.trim(), stdout.trim()]
                .iter()
                .filter(|s| !s.is_empty())
                .copied()
                .collect::<Vec<_>>()
                .join("\n");
            warn!("Steampipe query failed ({}): {}", output.status, detail);
            return Err(ExecutorError(format!("steampipe query failed: {}", detail)));
        }

        debug!("Steampipe returned {} bytes", stdout.len());
        Ok(stdout)
    }
}

/// Turn raw engine output into rows.
///
/// Accepts a JSON array (non-object items become `{"value": item}`), an
/// object carrying a `rows` array, a single object, or any other text, which
/// becomes one `{"result": text}` row. Blank output is zero rows.
pub fn parse_payload(raw: &str) -> Vec<Row> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Array(items)) => items.into_iter().map(into_row).collect(),
        Ok(Value::Object(mut obj)) => match obj.remove("rows") {
            Some(Value::Array(items)) => items.into_iter().map(into_row).collect(),
            Some(other) => {
                obj.insert("rows".to_string(), other);
                vec![obj]
            }
            None => vec![obj],
        },
        Ok(other) => vec![into_row(other)],
        Err(e) => {
            debug!("Payload is not JSON ({}), treating as a single result", e);
            let mut row = Row::new();
            row.insert("result".to_string(), Value::String(raw.to_string()));
            vec![row]
        }
    }
}

fn into_row(value: Value) -> Row {
    match value {
        Value::Object(obj) => obj,
        other => {
            let mut row = Row::new();
            row.insert("value".to_string(), other);
            row
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_of_objects() {
        let rows = parse_payload(r#"[{"name":"a"},{"name":"b"}]"#);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["name"], "b");
    }

    #[test]
    fn test_rows_envelope() {
        let rows = parse_payload(r#"{"columns":[{"name":"name"}],"rows":[{"name":"a"}]}"#);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], "a");
    }

    #[test]
    fn test_single_object_and_text() {
        let rows = parse_payload(r#"{"account_id":"123"}"#);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["account_id"], "123");

        let rows = parse_payload("plain output\n");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["result"], "plain output\n");
    }

    #[test]
    fn test_blank_and_scalars() {
        assert!(parse_payload("  \n").is_empty());
        let rows = parse_payload("[1, {\"a\": 2}]");
        assert_eq!(rows[0]["value"], 1);
        assert_eq!(rows[1]["a"], 2);
    }

    #[cfg(unix)]
    fn fake_steampipe(dir: &std::path::Path, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("steampipe");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", script)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_rows_mentioning_error_are_results() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let bin = fake_steampipe(
            temp_dir.path(),
            r#"echo '[{"function_name":"f1","description":"Error: handler retries on throttle"}]'"#,
        );
        let raw = SteampipeExecutor::new(bin)
            .run_query(CloudProvider::Aws, "SELECT * FROM aws_lambda_function", &Credentials::new(), OutputFormat::Json)
            .await
            .unwrap();
        let rows = parse_payload(&raw);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["description"], "Error: handler retries on throttle");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_an_executor_error() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let bin = fake_steampipe(temp_dir.path(), "echo 'Error: relation \"nope\" does not exist' >&2; exit 1");
        let err = SteampipeExecutor::new(bin)
            .run_query(CloudProvider::Aws, "SELECT * FROM nope", &Credentials::new(), OutputFormat::Json)
            .await
            .unwrap_err();
        assert!(err.0.contains("does not exist"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_an_executor_error() {
        let exec = SteampipeExecutor::new("/nonexistent/steampipe-binary");
        let err = exec
            .run_query(CloudProvider::Aws, "SELECT 1", &Credentials::new(), OutputFormat::Json)
            .await
            .unwrap_err();
        assert!(err.0.contains("failed to run steampipe"));
    }
}
