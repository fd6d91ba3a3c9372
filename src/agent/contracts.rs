use crate::error::{InvestigatorError, Result};
use crate::insights::Insight;
use crate::learning::ErrorKind;
use crate::provider::CloudProvider;
use crate::query::{Credentials, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestigationRequest {
    pub prompt: String,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing)]
    pub credentials: Option<Credentials>,
}

impl InvestigationRequest {
    pub fn new(prompt: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            provider: provider.into(),
            region: None,
            credentials: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Check the request and resolve its provider.
    pub fn validate(&self) -> Result<CloudProvider> {
        if self.prompt.trim().is_empty() {
            return Err(InvestigatorError::Validation("prompt is required".to_string()));
        }
        self.provider.parse()
    }

    /// Region if set and non-blank.
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref().map(str::trim).filter(|r| !r.is_empty())
    }
}

/// One step proposed by the planner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedStep {
    pub description: String,
    pub query: String,
}

impl PlannedStep {
    pub fn new(description: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            query: query.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestigationStep {
    pub step_number: usize,
    pub description: String,
    /// Query as executed, or as planned when it never ran.
    pub query: String,
    #[serde(default)]
    pub results: Vec<Row>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorKind>,
    pub execution_time_ms: u64,
    #[serde(default)]
    pub insights: Vec<Insight>,
}

/// Why an investigation stopped before running its whole plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interruption {
    Cancelled,
    DeadlineExceeded,
}

impl Interruption {
    pub fn from_error(error: &InvestigatorError) -> Option<Self> {
        match error {
            InvestigatorError::Cancelled(_) => Some(Interruption::Cancelled),
            InvestigatorError::DeadlineExceeded(_) => Some(Interruption::DeadlineExceeded),
            _ => None,
        }
    }

    /// Tag recorded on the step that was in flight.
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            Interruption::Cancelled => ErrorKind::Cancelled,
            Interruption::DeadlineExceeded => ErrorKind::Timeout,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestigationResult {
    pub id: String,
    pub success: bool,
    pub steps: Vec<InvestigationStep>,
    pub summary: String,
    pub insights: Vec<Insight>,
    pub query_count: usize,
    pub duration_ms: u64,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interruption: Option<Interruption>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation() {
        assert_eq!(
            InvestigationRequest::new("List S3 buckets", "AWS").validate().unwrap(),
            CloudProvider::Aws
        );
        assert!(matches!(
            InvestigationRequest::new("   ", "aws").validate(),
            Err(InvestigatorError::Validation(_))
        ));
        assert!(matches!(
            InvestigationRequest::new("list vms", "oracle").validate(),
            Err(InvestigatorError::Validation(_))
        ));
        assert!(matches!(
            InvestigationRequest::new("list vms", "").validate(),
            Err(InvestigatorError::Validation(_))
        ));
    }

    #[test]
    fn test_credentials_never_serialized() {
        let mut creds = Credentials::new();
        creds.insert("AWS_SECRET_ACCESS_KEY".to_string(), "secret".to_string());
        let req = InvestigationRequest::new("x", "aws").with_credentials(creds);
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("secret"));
    }

    #[test]
    fn test_blank_region_ignored() {
        assert_eq!(InvestigationRequest::new("x", "aws").with_region("  ").region(), None);
        assert_eq!(
            InvestigationRequest::new("x", "aws").with_region("us-east-1").region(),
            Some("us-east-1")
        );
    }
}
