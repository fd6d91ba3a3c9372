//! Query Rewriter
//!
//! Normalizes planner-generated SQL before execution: single statement only,
//! then a fixed table of provider-specific substring substitutions learned
//! from past schema failures.

use crate::error::{InvestigatorError, Result};
use crate::provider::CloudProvider;
use tracing::{debug, info};

/// Exact-substring substitution. Keys within one provider table never overlap
/// and no replacement reintroduces a key, so application order is irrelevant
/// and rewriting is idempotent.
#[derive(Debug, Clone, Copy)]
pub struct SubstitutionRule {
    pub find: &'static str,
    pub replace: &'static str,
}

const AWS_RULES: &[SubstitutionRule] = &[
    SubstitutionRule { find: " state =", replace: " instance_state =" },
    SubstitutionRule { find: " state_name =", replace: " instance_state =" },
    SubstitutionRule { find: "WHERE running", replace: "WHERE instance_state = 'running'" },
    SubstitutionRule { find: "WHERE stopped", replace: "WHERE instance_state = 'stopped'" },
    SubstitutionRule { find: "sg.group_id", replace: "sg->>'GroupId'" },
    SubstitutionRule { find: "sg.group_name", replace: "sg->>'GroupName'" },
];

#[derive(Debug, Clone, Copy)]
pub struct QueryRewriter {
    rules: &'static [SubstitutionRule],
}

impl QueryRewriter {
    pub fn for_provider(provider: CloudProvider) -> Self {
        let rules: &'static [SubstitutionRule] = match provider {
            CloudProvider::Aws => AWS_RULES,
            CloudProvider::Azure | CloudProvider::Gcp => &[],
        };
        Self { rules }
    }

    pub fn rules(&self) -> &'static [SubstitutionRule] {
        self.rules
    }

    pub fn rewrite(&self, query: &str) -> Result<String> {
        let statement = first_statement(query)?;
        Ok(self.apply_rules(statement))
    }

    fn apply_rules(&self, query: &str) -> String {
        let mut improved = query.to_string();
        for rule in self.rules {
            if improved.contains(rule.find) {
                improved = improved.replace(rule.find, rule.replace);
                debug!("Applied query improvement: '{}' -> '{}'", rule.find, rule.replace);
            }
        }
        improved
    }
}

/// Trimmed query, cut down to its first statement when it holds several.
fn first_statement(query: &str) -> Result<&str> {
    let query = query.trim();
    if query.is_empty() {
        return Err(InvestigatorError::Validation("query is required".to_string()));
    }

    let statements: Vec<&str> = split_statements(query)
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    match statements.as_slice() {
        [] => Err(InvestigatorError::Validation(
            "query contains no statements".to_string(),
        )),
        [_] => Ok(query),
        [first, ..] => {
            info!(
                "Multiple statements detected ({}), using only the first",
                statements.len()
            );
            Ok(*first)
        }
    }
}

/// Split on `;` outside quoted literals and identifiers. A doubled quote
/// (`''`) toggles twice and so stays inside the literal.
fn split_statements(query: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in query.char_indices() {
        match (quote, c) {
            (None, '\'' | '"') => quote = Some(c),
            (Some(q), _) if c == q => quote = None,
            (None, ';') => {
                pieces.push(&query[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    pieces.push(&query[start..]);
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aws() -> QueryRewriter {
        QueryRewriter::for_provider(CloudProvider::Aws)
    }

    #[test]
    fn test_state_column_rewritten() {
        let out = aws()
            .rewrite("SELECT * FROM aws_ec2_instance WHERE state = 'running'")
            .unwrap();
        assert_eq!(out, "SELECT * FROM aws_ec2_instance WHERE instance_state = 'running'");
        assert_eq!(aws().rewrite(&out).unwrap(), out);
    }

    #[test]
    fn test_only_first_statement_kept() {
        assert_eq!(aws().rewrite("SELECT 1; DROP TABLE users; SELECT 2").unwrap(), "SELECT 1");
        assert_eq!(aws().rewrite("  SELECT 1 ;  ; DROP TABLE x").unwrap(), "SELECT 1");
    }

    #[test]
    fn test_semicolon_inside_literal_kept() {
        let q = "SELECT name FROM aws_s3_bucket WHERE name = 'a;b'";
        assert_eq!(aws().rewrite(q).unwrap(), q);

        let q = "SELECT \"odd;col\" FROM aws_s3_bucket WHERE name = 'it''s;here'";
        assert_eq!(aws().rewrite(q).unwrap(), q);

        assert_eq!(
            aws().rewrite("SELECT 'x;y' AS v; DROP TABLE users").unwrap(),
            "SELECT 'x;y' AS v"
        );
    }

    #[test]
    fn test_clean_query_unchanged() {
        for q in [
            "SELECT name FROM aws_s3_bucket",
            "SELECT instance_id FROM aws_ec2_instance WHERE instance_state = 'stopped';",
            "select count(*) from aws_iam_user",
        ] {
            assert_eq!(aws().rewrite(q).unwrap(), q);
        }
    }

    #[test]
    fn test_empty_query_rejected() {
        assert!(matches!(aws().rewrite("   "), Err(InvestigatorError::Validation(_))));
        assert!(matches!(aws().rewrite(" ; ;"), Err(InvestigatorError::Validation(_))));
    }

    #[test]
    fn test_security_group_fields() {
        let out = aws()
            .rewrite("SELECT sg.group_id, sg.group_name FROM aws_vpc_security_group sg")
            .unwrap();
        assert_eq!(out, "SELECT sg->>'GroupId', sg->>'GroupName' FROM aws_vpc_security_group sg");
    }

    #[test]
    fn test_rules_are_disjoint_and_stable() {
        for provider in CloudProvider::ALL {
            let rules = QueryRewriter::for_provider(provider).rules();
            for a in rules {
                assert!(!a.replace.contains(a.find), "{} reintroduces itself", a.find);
                for b in rules {
                    if a.find != b.find {
                        assert!(!a.find.contains(b.find), "{} overlaps {}", a.find, b.find);
                        assert!(!a.replace.contains(b.find), "{} reintroduces {}", a.replace, b.find);
                    }
                }
            }
        }
    }

    #[test]
    fn test_other_providers_have_no_rules() {
        let gcp = QueryRewriter::for_provider(CloudProvider::Gcp);
        let q = "SELECT * FROM gcp_compute_instance WHERE state = 'RUNNING'";
        assert_eq!(gcp.rewrite(q).unwrap(), q);
    }
}
