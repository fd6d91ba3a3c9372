//! Investigation Agent
//!
//! Drives one investigation: validate, plan, run each planned query through
//! the [`QueryTool`], then aggregate steps into an [`InvestigationResult`].
//! Failed queries never abort the loop; caller cancellation does.

use crate::agent::contracts::{
    InvestigationRequest, InvestigationResult, InvestigationStep, Interruption, PlannedStep,
};
use crate::agent::credentials::{CredentialProvider, EnvCredentialProvider};
use crate::agent::planner::{LlmPlanner, Planner};
use crate::agent::prompt::enhance_with_schemas;
use crate::config::{AgentConfig, DEFAULT_MAX_STEPS};
use crate::error::{InvestigatorError, Result};
use crate::insights::{extract_from_text, Insight, Severity};
use crate::learning::{classify_error, MemoryHandle};
use crate::provider::CloudProvider;
use crate::query::{CallContext, Credentials, QueryTool, SteampipeExecutor};
use crate::tables::resolve_tables;
use itertools::Itertools;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Notable insight titles quoted in the summary.
const SUMMARY_FINDINGS: usize = 3;

pub struct InvestigationAgent {
    planner: Arc<dyn Planner>,
    tool: Arc<QueryTool>,
    credentials: Arc<dyn CredentialProvider>,
    max_steps: usize,
    learn_schemas: bool,
}

impl InvestigationAgent {
    pub fn new(
        planner: Arc<dyn Planner>,
        tool: Arc<QueryTool>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            planner,
            tool,
            credentials,
            max_steps: DEFAULT_MAX_STEPS,
            learn_schemas: false,
        }
    }

    /// Production wiring: LLM planner, Steampipe executor, environment credentials.
    pub fn from_config(config: &AgentConfig, memory: MemoryHandle) -> Self {
        let executor = Arc::new(SteampipeExecutor::new(config.steampipe_bin.clone()));
        let tool = QueryTool::new(executor, memory).with_query_timeout(config.query_timeout);
        Self::new(
            Arc::new(LlmPlanner::new(config.llm_client())),
            Arc::new(tool),
            Arc::new(EnvCredentialProvider),
        )
        .with_max_steps(config.max_steps)
        .with_schema_learning(config.learn_schemas)
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn with_schema_learning(mut self, enabled: bool) -> Self {
        self.learn_schemas = enabled;
        self
    }

    pub fn memory(&self) -> &MemoryHandle {
        self.tool.memory()
    }

    pub fn tool(&self) -> &Arc<QueryTool> {
        &self.tool
    }

    pub async fn investigate(
        &self,
        request: &InvestigationRequest,
        ctx: &CallContext,
    ) -> Result<InvestigationResult> {
        let started = Instant::now();
        let provider = request.validate()?;
        info!("Starting {} investigation: {}", provider, request.prompt.trim());

        let tables = resolve_tables(&request.prompt, provider);
        debug!("Candidate tables: {:?}", tables);

        let (credentials, plan) = match self.prepare(request, provider, &tables, ctx).await {
            Ok(prepared) => prepared,
            Err(e) => match Interruption::from_error(&e) {
                Some(interruption) => {
                    warn!("Investigation interrupted before any step: {}", e);
                    return Ok(aggregate(request, provider, Vec::new(), Some(interruption), started));
                }
                None => return Err(e),
            },
        };

        let mut steps = Vec::with_capacity(plan.len());
        let mut interruption = None;
        for (index, planned) in plan.iter().enumerate() {
            let step_number = index + 1;
            info!("Step {}/{}: {}", step_number, plan.len(), planned.description);

            match self.run_step(step_number, planned, request, provider, &credentials, ctx).await {
                Ok(step) => steps.push(step),
                Err((step, stop)) => {
                    steps.push(step);
                    interruption = Some(stop);
                    break;
                }
            }
        }

        Ok(aggregate(request, provider, steps, interruption, started))
    }

    /// Everything before the first step: credentials, then the plan.
    async fn prepare(
        &self,
        request: &InvestigationRequest,
        provider: CloudProvider,
        tables: &[String],
        ctx: &CallContext,
    ) -> Result<(Credentials, Vec<PlannedStep>)> {
        let credentials = match &request.credentials {
            Some(creds) => creds.clone(),
            None => ctx.run("credentials", self.credentials.credentials(provider)).await?,
        };
        let plan = self.plan(request, provider, tables, &credentials, ctx).await?;
        Ok((credentials, plan))
    }

    async fn plan(
        &self,
        request: &InvestigationRequest,
        provider: CloudProvider,
        tables: &[String],
        credentials: &Credentials,
        ctx: &CallContext,
    ) -> Result<Vec<PlannedStep>> {
        if self.learn_schemas {
            self.learn_missing_schemas(provider, tables, credentials, ctx).await?;
        }

        let enhanced = self
            .memory()
            .read(|m| enhance_with_schemas(request, m, provider, tables));
        debug!("Enhanced prompt:\n{}", enhanced);

        let mut plan = ctx
            .run("planning", self.planner.generate_plan(&enhanced, provider, tables))
            .await?
            .map_err(|e| {
                if matches!(e, InvestigatorError::Planner(_)) || e.is_interruption() {
                    e
                } else {
                    InvestigatorError::Planner(e.to_string())
                }
            })?;

        if plan.len() > self.max_steps {
            warn!(
                "Plan has {} steps, truncating to {}",
                plan.len(),
                self.max_steps
            );
            plan.truncate(self.max_steps);
        }
        info!("Plan ready with {} step(s)", plan.len());
        Ok(plan)
    }

    async fn learn_missing_schemas(
        &self,
        provider: CloudProvider,
        tables: &[String],
        credentials: &Credentials,
        ctx: &CallContext,
    ) -> Result<()> {
        for table in tables {
            if self.memory().read(|m| m.schema(provider, table).is_some()) {
                continue;
            }
            self.tool.learn_schema(provider, table, credentials, ctx).await?;
        }
        Ok(())
    }

    /// Run one planned step. `Err` carries the failed step and the reason the
    /// loop has to stop.
    async fn run_step(
        &self,
        step_number: usize,
        planned: &PlannedStep,
        request: &InvestigationRequest,
        provider: CloudProvider,
        credentials: &Credentials,
        ctx: &CallContext,
    ) -> std::result::Result<InvestigationStep, (InvestigationStep, Interruption)> {
        let started = Instant::now();
        let intent = if planned.description.trim().is_empty() {
            request.prompt.trim()
        } else {
            planned.description.trim()
        };

        let outcome = self
            .tool
            .execute_for_intent(provider, intent, &planned.query, credentials, ctx)
            .await;

        let response = match outcome {
            Ok(response) => response,
            Err(e) => {
                let failed = InvestigationStep {
                    step_number,
                    description: planned.description.clone(),
                    query: planned.query.clone(),
                    results: Vec::new(),
                    success: false,
                    error: Some(e.to_string()),
                    error_type: None,
                    execution_time_ms: started.elapsed().as_millis() as u64,
                    insights: Vec::new(),
                };
                return match Interruption::from_error(&e) {
                    Some(stop) => {
                        warn!("Step {} interrupted: {}", step_number, e);
                        Err((
                            InvestigationStep {
                                error_type: Some(stop.error_kind()),
                                ..failed
                            },
                            stop,
                        ))
                    }
                    None => {
                        // Rejected before execution; nothing was learned.
                        warn!("Step {} rejected: {}", step_number, e);
                        Ok(InvestigationStep {
                            error_type: Some(classify_error(&e.to_string())),
                            ..failed
                        })
                    }
                };
            }
        };

        let mut insights = response.insights;
        if response.success {
            match serde_json::to_string(&response.results) {
                Ok(rendered) => insights.extend(extract_from_text(&rendered, provider)),
                Err(e) => debug!("Could not render step {} rows: {}", step_number, e),
            }
        }

        Ok(InvestigationStep {
            step_number,
            description: planned.description.clone(),
            query: response.query,
            results: response.results,
            success: response.success,
            error: response.error,
            error_type: response.error_type,
            execution_time_ms: response.execution_time_ms,
            insights,
        })
    }
}

fn aggregate(
    request: &InvestigationRequest,
    provider: CloudProvider,
    steps: Vec<InvestigationStep>,
    interruption: Option<Interruption>,
    started: Instant,
) -> InvestigationResult {
    let attempted = steps.len();
    let succeeded = steps.iter().filter(|s| s.success).count();
    let confidence = if attempted == 0 {
        0.0
    } else {
        (succeeded as f64 / attempted as f64).clamp(0.0, 1.0)
    };
    let insights: Vec<Insight> = steps.iter().flat_map(|s| s.insights.iter().cloned()).collect();
    let summary = summarize(request, provider, &steps, &insights, interruption);

    info!(
        "Investigation finished: {}/{} step(s) succeeded, {} insight(s)",
        succeeded,
        attempted,
        insights.len()
    );

    InvestigationResult {
        id: uuid::Uuid::new_v4().to_string(),
        success: succeeded > 0,
        steps,
        summary,
        insights,
        query_count: attempted,
        duration_ms: started.elapsed().as_millis() as u64,
        confidence,
        interruption,
    }
}

/// One-paragraph summary built from step counts and the most severe findings.
pub fn summarize(
    request: &InvestigationRequest,
    provider: CloudProvider,
    steps: &[InvestigationStep],
    insights: &[Insight],
    interruption: Option<Interruption>,
) -> String {
    let succeeded = steps.iter().filter(|s| s.success).count();
    let rows: usize = steps.iter().map(|s| s.results.len()).sum();

    let mut summary = if steps.is_empty() {
        format!("No queries were run for '{}' on {}.", request.prompt.trim(), provider)
    } else {
        format!(
            "Investigated '{}' on {}: {} of {} quer{} succeeded, returning {} row{}.",
            request.prompt.trim(),
            provider,
            succeeded,
            steps.len(),
            if steps.len() == 1 { "y" } else { "ies" },
            rows,
            if rows == 1 { "" } else { "s" }
        )
    };

    let notable: Vec<&str> = insights
        .iter()
        .filter(|i| i.severity >= Severity::Medium)
        .sorted_by(|a, b| b.severity.cmp(&a.severity))
        .map(|i| i.title.as_str())
        .unique()
        .take(SUMMARY_FINDINGS)
        .collect();
    if !notable.is_empty() {
        summary.push_str(&format!(" Notable findings: {}.", notable.join("; ")));
    }

    match interruption {
        Some(Interruption::Cancelled) => summary.push_str(" Stopped early: cancelled by caller."),
        Some(Interruption::DeadlineExceeded) => summary.push_str(" Stopped early: deadline exceeded."),
        None => {}
    }
    summary
}
