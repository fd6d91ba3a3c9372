//! Insight Extractor
//!
//! Pure functions that turn query results or narrative text into structured
//! findings. Nothing here touches memory or performs I/O.

use crate::provider::CloudProvider;
use crate::query::Row;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightKind {
    Security,
    Cost,
    Compliance,
    Performance,
    Inventory,
    Coverage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    #[serde(rename = "type")]
    pub kind: InsightKind,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub impact: String,
    #[serde(default)]
    pub recommendation: String,
    pub confidence: f64,
}

impl Insight {
    fn new(kind: InsightKind, severity: Severity, title: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            title: title.into(),
            description: String::new(),
            impact: String::new(),
            recommendation: String::new(),
            confidence: 1.0,
        }
    }

    fn describe(mut self, description: &str, impact: &str, recommendation: &str) -> Self {
        self.description = description.to_string();
        self.impact = impact.to_string();
        self.recommendation = recommendation.to_string();
        self
    }

    fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }
}

/// Insights for one executed query's rows.
pub fn extract_from_results(rows: &[Row], provider: CloudProvider, query: &str) -> Vec<Insight> {
    if rows.is_empty() {
        return vec![Insight::new(
            InsightKind::Coverage,
            Severity::Info,
            "No results found - consider broadening the query scope",
        )];
    }

    let count_title = if rows.len() == 1 {
        "Found 1 result".to_string()
    } else {
        format!("Found {} results", rows.len())
    };
    let mut insights = vec![Insight::new(InsightKind::Inventory, Severity::Info, count_title)];

    let query_lower = query.to_lowercase();
    if provider == CloudProvider::Aws && query_lower.contains("ec2") {
        insights.push(
            Insight::new(
                InsightKind::Security,
                Severity::Low,
                "Consider checking instance security groups and tags",
            )
            .describe(
                "Instances were returned without their network exposure or ownership context",
                "Unreviewed security groups can leave instances reachable from the internet",
                "Query aws_vpc_security_group and instance tags for the returned instances",
            )
            .with_confidence(0.6),
        );
    }
    if provider == CloudProvider::Aws && query_lower.contains("s3") {
        insights.push(
            Insight::new(
                InsightKind::Security,
                Severity::Low,
                "Consider checking bucket encryption and public access settings",
            )
            .describe(
                "Buckets were returned without their encryption or public access configuration",
                "Public or unencrypted buckets are a common source of data exposure",
                "Inspect server_side_encryption_configuration and block_public_acls for each bucket",
            )
            .with_confidence(0.6),
        );
    }

    insights
}

struct PhraseGroup {
    phrases: &'static [&'static str],
    build: fn() -> Insight,
}

fn public_exposure() -> Insight {
    Insight::new(InsightKind::Security, Severity::High, "Public Access Detected")
        .describe(
            "Found resources with public access that may pose security risks",
            "Resources reachable from any address are exposed to scanning and attack",
            "Review and restrict public access to essential services only",
        )
        .with_confidence(0.8)
}

fn missing_encryption() -> Insight {
    Insight::new(InsightKind::Security, Severity::High, "Encryption Issue")
        .describe(
            "Found resources without proper encryption",
            "Data at rest may be readable if storage is compromised",
            "Enable encryption for sensitive data and storage",
        )
        .with_confidence(0.8)
}

fn idle_spend() -> Insight {
    Insight::new(InsightKind::Cost, Severity::Medium, "Cost Optimization Opportunity")
        .describe(
            "Found unused or idle resources that may be costing money",
            "Stopped instances still bill for attached storage and reserved addresses",
            "Consider terminating or rightsizing unused resources",
        )
        .with_confidence(0.7)
}

fn compliance_gap() -> Insight {
    Insight::new(InsightKind::Compliance, Severity::High, "Compliance Issue")
        .describe(
            "Found potential compliance concerns",
            "Regulatory findings can block audits and certifications",
            "Review compliance requirements and implement necessary controls",
        )
        .with_confidence(0.7)
}

/// Checked in this order; each group fires at most once.
const PHRASE_GROUPS: &[PhraseGroup] = &[
    PhraseGroup {
        phrases: &["0.0.0.0/0", "::/0", "public access", "publicly accessible", "open to the internet"],
        build: public_exposure,
    },
    PhraseGroup {
        phrases: &["unencrypted", "no encryption", "not encrypted", "encryption disabled"],
        build: missing_encryption,
    },
    PhraseGroup {
        phrases: &["unused", "idle", "stopped", "cost"],
        build: idle_spend,
    },
    PhraseGroup {
        phrases: &["compliance", "regulation", "non-compliant"],
        build: compliance_gap,
    },
];

/// Insights from free text such as a planner narrative or rendered rows.
pub fn extract_from_text(narrative: &str, _provider: CloudProvider) -> Vec<Insight> {
    let text = narrative.to_lowercase();
    PHRASE_GROUPS
        .iter()
        .filter(|group| group.phrases.iter().any(|p| text.contains(*p)))
        .map(|group| (group.build)())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(n: usize) -> Vec<Row> {
        (0..n)
            .map(|i| json!({ "name": format!("bucket-{}", i) }).as_object().cloned().unwrap())
            .collect()
    }

    #[test]
    fn test_empty_results_single_informational_insight() {
        let insights = extract_from_results(&[], CloudProvider::Aws, "SELECT * FROM aws_ec2_instance");
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].severity, Severity::Info);
        assert_eq!(insights[0].title, "No results found - consider broadening the query scope");
    }

    #[test]
    fn test_count_and_keyword_suggestions() {
        let insights = extract_from_results(&rows(1), CloudProvider::Aws, "SELECT * FROM aws_ec2_instance");
        let titles: Vec<_> = insights.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Found 1 result", "Consider checking instance security groups and tags"]
        );

        let insights = extract_from_results(&rows(2), CloudProvider::Aws, "SELECT name FROM AWS_S3_BUCKET");
        assert_eq!(insights[0].title, "Found 2 results");
        assert_eq!(
            insights[1].title,
            "Consider checking bucket encryption and public access settings"
        );
    }

    #[test]
    fn test_keyword_suggestions_are_aws_only() {
        let insights = extract_from_results(&rows(3), CloudProvider::Gcp, "SELECT * FROM s3_mirror");
        assert_eq!(insights.len(), 1);
    }

    #[test]
    fn test_text_mode_groups_fire_in_order() {
        let text = "Port 22 open to 0.0.0.0/0; two unencrypted volumes; 4 stopped instances still billed";
        let kinds: Vec<_> = extract_from_text(text, CloudProvider::Aws)
            .into_iter()
            .map(|i| i.kind)
            .collect();
        assert_eq!(kinds, vec![InsightKind::Security, InsightKind::Security, InsightKind::Cost]);
    }

    #[test]
    fn test_text_mode_no_match() {
        assert!(extract_from_text("all instances are healthy", CloudProvider::Aws).is_empty());
    }

    #[test]
    fn test_insight_serializes_type_field() {
        let insight = extract_from_text("unencrypted", CloudProvider::Aws).remove(0);
        let v = serde_json::to_value(&insight).unwrap();
        assert_eq!(v["type"], "security");
        assert_eq!(v["severity"], "high");
    }
}
