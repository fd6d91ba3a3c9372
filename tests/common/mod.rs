#![allow(dead_code)]

use async_trait::async_trait;
use infra_investigator::agent::{CredentialProvider, PlannedStep, Planner};
use infra_investigator::error::{InvestigatorError, Result};
use infra_investigator::provider::CloudProvider;
use infra_investigator::query::{Credentials, ExecutorError, OutputFormat, QueryExecutor};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// What the stub engine does for one call.
pub enum Reply {
    Rows(&'static str),
    Fail(&'static str),
    /// Never answers.
    Hang,
    /// Cancels the token, then never answers.
    CancelAndHang(CancellationToken),
    Slow(Duration, &'static str),
}

/// Query engine that replays scripted replies in call order.
#[derive(Default)]
pub struct ScriptedExecutor {
    replies: Mutex<VecDeque<Reply>>,
    pub seen: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryExecutor for ScriptedExecutor {
    async fn run_query(
        &self,
        _provider: CloudProvider,
        query: &str,
        _credentials: &Credentials,
        _format: OutputFormat,
    ) -> std::result::Result<String, ExecutorError> {
        self.seen.lock().unwrap().push(query.to_string());
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Rows(raw)) => Ok(raw.to_string()),
            Some(Reply::Fail(msg)) => Err(ExecutorError(msg.to_string())),
            Some(Reply::Hang) => std::future::pending().await,
            Some(Reply::CancelAndHang(token)) => {
                token.cancel();
                std::future::pending().await
            }
            Some(Reply::Slow(delay, raw)) => {
                tokio::time::sleep(delay).await;
                Ok(raw.to_string())
            }
            None => Ok("[]".to_string()),
        }
    }
}

/// Planner that returns a fixed plan and remembers the prompt it got.
pub struct FixedPlanner {
    plan: std::result::Result<Vec<PlannedStep>, String>,
    pub prompts: Mutex<Vec<String>>,
    pub tables: Mutex<Vec<Vec<String>>>,
}

impl FixedPlanner {
    pub fn steps(steps: &[(&str, &str)]) -> Self {
        Self {
            plan: Ok(steps.iter().map(|(d, q)| PlannedStep::new(*d, *q)).collect()),
            prompts: Mutex::new(Vec::new()),
            tables: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            plan: Err(message.to_string()),
            prompts: Mutex::new(Vec::new()),
            tables: Mutex::new(Vec::new()),
        }
    }

    pub fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl Planner for FixedPlanner {
    async fn generate_plan(
        &self,
        enhanced_prompt: &str,
        _provider: CloudProvider,
        candidate_tables: &[String],
    ) -> Result<Vec<PlannedStep>> {
        self.prompts.lock().unwrap().push(enhanced_prompt.to_string());
        self.tables.lock().unwrap().push(candidate_tables.to_vec());
        self.plan.clone().map_err(InvestigatorError::Planner)
    }
}

/// Planner that never answers.
pub struct HangingPlanner;

#[async_trait]
impl Planner for HangingPlanner {
    async fn generate_plan(
        &self,
        _enhanced_prompt: &str,
        _provider: CloudProvider,
        _candidate_tables: &[String],
    ) -> Result<Vec<PlannedStep>> {
        std::future::pending().await
    }
}

pub struct NoCredentials;

#[async_trait]
impl CredentialProvider for NoCredentials {
    async fn credentials(&self, _provider: CloudProvider) -> Credentials {
        Credentials::new()
    }
}

/// Credential source that never answers.
pub struct HangingCredentials;

#[async_trait]
impl CredentialProvider for HangingCredentials {
    async fn credentials(&self, _provider: CloudProvider) -> Credentials {
        std::future::pending().await
    }
}

pub const TWO_BUCKETS: &str = r#"[{"name":"logs-bucket"},{"name":"assets-bucket"}]"#;
