//! Query Tool
//!
//! Orchestrates one query: rewrite, execute, then either record the success
//! and extract insights, or classify the failure and record the lesson.
//! Execution failures are returned as data and never raised as errors.

use crate::error::Result;
use crate::insights::{extract_from_results, Insight};
use crate::learning::memory::{MemoryHandle, QueryFailure, QuerySuccess, TableSchema};
use crate::learning::{classify_error, lesson_for_error, schema_catalog, ErrorKind};
use crate::provider::CloudProvider;
use crate::query::context::CallContext;
use crate::query::executor::{parse_payload, ExecutorError, OutputFormat, QueryExecutor};
use crate::query::rewriter::QueryRewriter;
use crate::query::{Credentials, Row};
use chrono::Utc;
use itertools::Itertools;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

lazy_static::lazy_static! {
    static ref TABLE_REF: Regex =
        Regex::new(r"(?i)\b(?:from|join)\s+([a-z_][a-z0-9_]*)").expect("table reference regex");
}

/// Tool-call request envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRequest {
    pub provider: String,
    pub query: String,
    #[serde(default, skip_serializing)]
    pub credentials: Option<Credentials>,
    /// Natural-language intent the query answers; defaults to the query text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
}

/// Tool-call response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponse {
    pub success: bool,
    #[serde(default)]
    pub results: Vec<Row>,
    pub row_count: usize,
    pub execution_time_ms: u64,
    /// The query actually sent to the engine.
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorKind>,
    #[serde(default)]
    pub insights: Vec<Insight>,
}

pub struct QueryTool {
    executor: Arc<dyn QueryExecutor>,
    memory: MemoryHandle,
    query_timeout: Option<Duration>,
}

impl QueryTool {
    pub fn new(executor: Arc<dyn QueryExecutor>, memory: MemoryHandle) -> Self {
        Self {
            executor,
            memory,
            query_timeout: None,
        }
    }

    /// Per-query limit enforced by the tool itself. Unlike a caller deadline,
    /// hitting it counts as an execution failure and is recorded.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    pub fn memory(&self) -> &MemoryHandle {
        &self.memory
    }

    pub async fn execute(
        &self,
        provider: CloudProvider,
        query: &str,
        credentials: &Credentials,
        ctx: &CallContext,
    ) -> Result<ToolResponse> {
        self.execute_for_intent(provider, query, query, credentials, ctx).await
    }

    /// Execute `query` on behalf of `intent`.
    ///
    /// Errors only for an invalid query or a caller interruption; neither
    /// touches memory.
    pub async fn execute_for_intent(
        &self,
        provider: CloudProvider,
        intent: &str,
        query: &str,
        credentials: &Credentials,
        ctx: &CallContext,
    ) -> Result<ToolResponse> {
        let improved = QueryRewriter::for_provider(provider).rewrite(query)?;
        if improved != query.trim() {
            debug!("Rewrote query: {} -> {}", query, improved);
        }

        let started = Instant::now();
        let outcome = ctx
            .run("query", self.run_with_timeout(provider, &improved, credentials))
            .await?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(raw) => Ok(self.on_success(provider, intent, improved, &raw, elapsed_ms)),
            Err(e) => Ok(self.on_failure(provider, intent, improved, e.0, elapsed_ms)),
        }
    }

    async fn run_with_timeout(
        &self,
        provider: CloudProvider,
        query: &str,
        credentials: &Credentials,
    ) -> std::result::Result<String, ExecutorError> {
        let call = self
            .executor
            .run_query(provider, query, credentials, OutputFormat::Json);
        match self.query_timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
                Err(ExecutorError(format!(
                    "query timeout after {}ms",
                    limit.as_millis()
                )))
            }),
            None => call.await,
        }
    }

    fn on_success(
        &self,
        provider: CloudProvider,
        intent: &str,
        query: String,
        raw: &str,
        elapsed_ms: u64,
    ) -> ToolResponse {
        let results = parse_payload(raw);
        let row_count = results.len();
        let tables = referenced_tables(&query);

        self.memory.update(|m| {
            let pattern_used = m.learn_pattern(provider, intent, &query, tables, true);
            m.record_success(QuerySuccess {
                original_intent: intent.to_string(),
                generated_query: query.clone(),
                result_count: row_count,
                provider,
                timestamp: Utc::now(),
                pattern_used,
                execution_time_ms: elapsed_ms,
            });
        });

        let insights = extract_from_results(&results, provider, &query);
        info!("Query succeeded with {} row(s) in {}ms", row_count, elapsed_ms);

        ToolResponse {
            success: true,
            results,
            row_count,
            execution_time_ms: elapsed_ms,
            query,
            error: None,
            error_type: None,
            insights,
        }
    }

    fn on_failure(
        &self,
        provider: CloudProvider,
        intent: &str,
        query: String,
        error: String,
        elapsed_ms: u64,
    ) -> ToolResponse {
        let error_type = classify_error(&error);
        let lesson = lesson_for_error(&error);
        warn!("Query failed ({}): {} | lesson: {}", error_type, error, lesson);

        self.memory.update(|m| {
            m.learn_pattern(provider, intent, &query, Vec::new(), false);
            m.record_failure(QueryFailure {
                original_intent: intent.to_string(),
                generated_query: query.clone(),
                error_message: error.clone(),
                error_type,
                provider,
                timestamp: Utc::now(),
                lesson_learned: lesson,
            });
        });

        ToolResponse {
            success: false,
            results: Vec::new(),
            row_count: 0,
            execution_time_ms: elapsed_ms,
            query,
            error: Some(error),
            error_type: Some(error_type),
            insights: Vec::new(),
        }
    }

    /// Handle a tool-call request envelope.
    pub async fn invoke(&self, request: ToolRequest, ctx: &CallContext) -> Result<ToolResponse> {
        let provider: CloudProvider = request.provider.parse()?;
        let credentials = request.credentials.unwrap_or_default();
        let intent = request.intent.unwrap_or_else(|| request.query.clone());
        self.execute_for_intent(provider, &intent, &request.query, &credentials, ctx)
            .await
    }

    /// JSON-in, JSON-out form of [`QueryTool::invoke`].
    pub async fn invoke_json(&self, arguments: &str, ctx: &CallContext) -> Result<String> {
        let request: ToolRequest = serde_json::from_str(arguments)?;
        let response = self.invoke(request, ctx).await?;
        Ok(serde_json::to_string(&response)?)
    }

    /// Discover a table's columns and cache the schema in memory.
    ///
    /// Discovery failures are logged and yield `None`; they are not lessons.
    pub async fn learn_schema(
        &self,
        provider: CloudProvider,
        table: &str,
        credentials: &Credentials,
        ctx: &CallContext,
    ) -> Result<Option<TableSchema>> {
        let query = schema_catalog::schema_query(table);
        let outcome = ctx
            .run("schema discovery", self.run_with_timeout(provider, &query, credentials))
            .await?;

        let raw = match outcome {
            Ok(raw) => raw,
            Err(e) => {
                debug!("Failed to discover schema for {}: {}", table, e);
                return Ok(None);
            }
        };

        let schema = schema_catalog::build_schema(provider, table, &parse_payload(&raw));
        if schema.columns.is_empty() {
            debug!("No columns found for {}", table);
            return Ok(None);
        }

        debug!("Learned schema for {} ({} columns)", table, schema.columns.len());
        self.memory.update(|m| m.store_schema(schema.clone()));
        Ok(Some(schema))
    }
}

/// Table names referenced after FROM/JOIN, lowercased and deduplicated.
pub fn referenced_tables(query: &str) -> Vec<String> {
    TABLE_REF
        .captures_iter(query)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_lowercase())
        .unique()
        .collect()
}
