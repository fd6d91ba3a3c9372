//! Prompt Enhancer
//!
//! Builds the planner context: the user's question, the target provider and
//! region, and lessons from earlier failures so they are not repeated.

use crate::agent::contracts::InvestigationRequest;
use crate::learning::schema_catalog::render_schemas;
use crate::learning::AgentMemory;
use crate::provider::CloudProvider;

pub const MAX_LESSONS: usize = 10;
pub const MAX_PROVEN_QUERIES: usize = 5;

pub fn enhance(request: &InvestigationRequest, memory: &AgentMemory) -> String {
    let mut out = request.prompt.trim().to_string();
    out.push_str(&format!(
        "\n\nTARGET PROVIDER: {}",
        request.provider.trim().to_lowercase()
    ));
    if let Some(region) = request.region() {
        out.push_str(&format!("\nREGION: {}", region));
    }

    let lessons = memory.recent_lessons(MAX_LESSONS);
    if !lessons.is_empty() {
        out.push_str("\n\nKNOWN ISSUES TO AVOID:");
        for lesson in lessons {
            out.push_str(&format!("\n- {}", lesson));
        }
    }
    out
}

/// [`enhance`] plus cached schemas for the candidate tables and the
/// provider's best proven queries.
pub fn enhance_with_schemas(
    request: &InvestigationRequest,
    memory: &AgentMemory,
    provider: CloudProvider,
    tables: &[String],
) -> String {
    let mut out = enhance(request, memory);

    let schemas: Vec<_> = tables
        .iter()
        .filter_map(|t| memory.schema(provider, t))
        .collect();
    if !schemas.is_empty() {
        out.push_str("\n\nAVAILABLE SCHEMAS:");
        out.push_str(render_schemas(&schemas).trim_end());
    }

    let patterns: Vec<_> = memory
        .top_patterns(provider, MAX_PROVEN_QUERIES)
        .into_iter()
        .filter(|p| p.success_rate > 0.0)
        .collect();
    if !patterns.is_empty() {
        out.push_str("\n\nPROVEN QUERIES:");
        for p in patterns {
            out.push_str(&format!(
                "\n- {} ({:.0}% success): {}",
                p.intent,
                p.success_rate * 100.0,
                p.template
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learning::{ColumnInfo, ErrorKind, QueryFailure, TableSchema};
    use chrono::Utc;

    fn failure(lesson: &str) -> QueryFailure {
        QueryFailure {
            original_intent: "x".to_string(),
            generated_query: "SELECT 1".to_string(),
            error_message: "boom".to_string(),
            error_type: ErrorKind::Schema,
            provider: CloudProvider::Aws,
            timestamp: Utc::now(),
            lesson_learned: lesson.to_string(),
        }
    }

    #[test]
    fn test_plain_prompt() {
        let req = InvestigationRequest::new("List S3 buckets", "AWS");
        assert_eq!(enhance(&req, &AgentMemory::new()), "List S3 buckets\n\nTARGET PROVIDER: aws");
    }

    #[test]
    fn test_region_and_lessons() {
        let mut memory = AgentMemory::new();
        memory.record_failure(failure("old lesson"));
        memory.record_failure(failure("new lesson"));
        memory.record_failure(failure("old lesson"));

        let req = InvestigationRequest::new("Find open ports", "aws").with_region("eu-west-1");
        let out = enhance(&req, &memory);
        assert!(out.contains("\nREGION: eu-west-1"));
        assert!(out.ends_with("KNOWN ISSUES TO AVOID:\n- old lesson\n- new lesson"));
    }

    #[test]
    fn test_lessons_capped() {
        let mut memory = AgentMemory::new();
        for n in 0..25 {
            memory.record_failure(failure(&format!("lesson {}", n)));
        }
        let out = enhance(&InvestigationRequest::new("x", "aws"), &memory);
        assert_eq!(out.matches("\n- ").count(), MAX_LESSONS);
        assert!(out.contains("- lesson 24"));
        assert!(!out.contains("- lesson 14\n"));
    }

    #[test]
    fn test_schemas_and_proven_queries() {
        let mut memory = AgentMemory::new();
        memory.store_schema(TableSchema {
            table_name: "aws_s3_bucket".to_string(),
            columns: vec![ColumnInfo {
                name: "name".to_string(),
                data_type: "text".to_string(),
                description: String::new(),
                required: true,
                examples: vec![],
            }],
            provider: CloudProvider::Aws,
            description: "S3 buckets".to_string(),
            last_updated: Utc::now(),
        });
        memory.learn_pattern(
            CloudProvider::Aws,
            "list buckets",
            "SELECT name FROM aws_s3_bucket",
            vec!["aws_s3_bucket".to_string()],
            true,
        );

        let req = InvestigationRequest::new("list buckets", "aws");
        let tables = vec!["aws_s3_bucket".to_string(), "aws_account".to_string()];
        let out = enhance_with_schemas(&req, &memory, CloudProvider::Aws, &tables);
        assert!(out.contains("AVAILABLE SCHEMAS:\nTable: aws_s3_bucket"));
        assert!(out.contains("PROVEN QUERIES:\n- list buckets (100% success): SELECT name FROM aws_s3_bucket"));
    }
}
