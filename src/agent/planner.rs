//! Planner collaborator: turns the enhanced prompt into ordered query steps.

use crate::agent::contracts::PlannedStep;
use crate::error::{InvestigatorError, Result};
use crate::llm::{clean_json_response, LlmClient};
use crate::provider::CloudProvider;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Rows fetched per table by the offline plan.
pub const HEURISTIC_ROW_LIMIT: usize = 50;

#[async_trait]
pub trait Planner: Send + Sync {
    async fn generate_plan(
        &self,
        enhanced_prompt: &str,
        provider: CloudProvider,
        candidate_tables: &[String],
    ) -> Result<Vec<PlannedStep>>;
}

const SYSTEM_PROMPT: &str = "You are a cloud infrastructure investigator. \
Plan read-only Steampipe SQL queries (PostgreSQL dialect) that answer the user's question. \
Use only the candidate tables unless another table is clearly required. \
Return JSON only: {\"steps\": [{\"description\": \"...\", \"query\": \"SELECT ...\"}]}. \
One SQL statement per step, no semicolons.";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PlanPayload {
    Wrapped { steps: Vec<PlannedStep> },
    Bare(Vec<PlannedStep>),
}

/// Planner backed by an OpenAI-compatible chat model.
///
/// Without an API key it falls back to [`heuristic_plan`], so the agent
/// stays usable offline.
pub struct LlmPlanner {
    client: LlmClient,
}

impl LlmPlanner {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }

    fn build_prompt(enhanced_prompt: &str, provider: CloudProvider, tables: &[String]) -> String {
        format!(
            "{}\n\nCANDIDATE TABLES ({}):\n{}",
            enhanced_prompt,
            provider,
            tables
                .iter()
                .map(|t| format!("- {}", t))
                .collect::<Vec<_>>()
                .join("\n")
        )
    }
}

#[async_trait]
impl Planner for LlmPlanner {
    async fn generate_plan(
        &self,
        enhanced_prompt: &str,
        provider: CloudProvider,
        candidate_tables: &[String],
    ) -> Result<Vec<PlannedStep>> {
        if self.client.is_dummy() {
            info!("No LLM configured, using heuristic plan");
            return Ok(heuristic_plan(provider, candidate_tables));
        }

        let prompt = Self::build_prompt(enhanced_prompt, provider, candidate_tables);
        let response = self
            .client
            .call_llm(SYSTEM_PROMPT, &prompt)
            .await
            .map_err(|e| InvestigatorError::Planner(e.to_string()))?;
        debug!("Planner response: {}", response);

        let steps = parse_plan(&response)?;
        info!("Planner ({}) returned {} step(s)", self.client.model(), steps.len());
        Ok(steps)
    }
}

/// Parse a planner response: `{"steps": [...]}` or a bare array, optionally
/// fenced. Steps are kept as planned; unusable queries fail in their own step.
pub fn parse_plan(response: &str) -> Result<Vec<PlannedStep>> {
    let payload: PlanPayload = serde_json::from_str(clean_json_response(response))
        .map_err(|e| InvestigatorError::Planner(format!("unparseable plan: {}", e)))?;
    let steps = match payload {
        PlanPayload::Wrapped { steps } | PlanPayload::Bare(steps) => steps,
    };

    let blank = steps.iter().filter(|s| s.query.trim().is_empty()).count();
    if blank > 0 {
        warn!("{} planned step(s) have no query", blank);
    }
    if steps.is_empty() {
        return Err(InvestigatorError::Planner("planner returned no steps".to_string()));
    }
    Ok(steps)
}

/// One sampling query per candidate table, root table last. The root table
/// alone is queried only when nothing else matched.
pub fn heuristic_plan(provider: CloudProvider, candidate_tables: &[String]) -> Vec<PlannedStep> {
    let root = provider.root_table();
    let specific: Vec<&String> = candidate_tables.iter().filter(|t| *t != root).collect();

    if specific.is_empty() {
        return vec![PlannedStep::new(
            format!("Inspect {} context", provider),
            format!("SELECT * FROM {}", root),
        )];
    }

    specific
        .into_iter()
        .map(|t| {
            PlannedStep::new(
                format!("Inspect {}", t),
                format!("SELECT * FROM {} LIMIT {}", t, HEURISTIC_ROW_LIMIT),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::DUMMY_API_KEY;

    #[test]
    fn test_parse_wrapped_and_bare() {
        let wrapped = "```json\n{\"steps\":[{\"description\":\"list\",\"query\":\"SELECT name FROM aws_s3_bucket\"}]}\n```";
        assert_eq!(
            parse_plan(wrapped).unwrap(),
            vec![PlannedStep::new("list", "SELECT name FROM aws_s3_bucket")]
        );

        let bare = r#"[{"description":"a","query":"SELECT 1"},{"description":"b","query":"  "}]"#;
        assert_eq!(
            parse_plan(bare).unwrap(),
            vec![PlannedStep::new("a", "SELECT 1"), PlannedStep::new("b", "  ")]
        );
    }

    #[test]
    fn test_parse_rejects_garbage_and_empty() {
        assert!(matches!(parse_plan("I cannot help"), Err(InvestigatorError::Planner(_))));
        assert!(matches!(parse_plan(r#"{"steps":[]}"#), Err(InvestigatorError::Planner(_))));
    }

    #[test]
    fn test_heuristic_plan() {
        let tables = vec!["aws_lambda_function".to_string(), "aws_account".to_string()];
        let plan = heuristic_plan(CloudProvider::Aws, &tables);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].query, "SELECT * FROM aws_lambda_function LIMIT 50");

        let plan = heuristic_plan(CloudProvider::Gcp, &["gcp_project".to_string()]);
        assert_eq!(plan[0].query, "SELECT * FROM gcp_project");
    }

    #[tokio::test]
    async fn test_offline_planner_uses_heuristics() {
        let planner = LlmPlanner::new(LlmClient::new(
            DUMMY_API_KEY.to_string(),
            "gpt-4".to_string(),
            "http://127.0.0.1:1".to_string(),
        ));
        let plan = planner
            .generate_plan("list buckets", CloudProvider::Aws, &["aws_s3_bucket".to_string()])
            .await
            .unwrap();
        assert_eq!(plan[0].query, "SELECT * FROM aws_s3_bucket LIMIT 50");
    }
}
