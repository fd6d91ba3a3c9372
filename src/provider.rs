//! Cloud provider model shared by every component.

use crate::error::{InvestigatorError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudProvider {
    Aws,
    Azure,
    Gcp,
}

impl CloudProvider {
    pub const ALL: [CloudProvider; 3] = [CloudProvider::Aws, CloudProvider::Azure, CloudProvider::Gcp];

    pub fn as_str(&self) -> &'static str {
        match self {
            CloudProvider::Aws => "aws",
            CloudProvider::Azure => "azure",
            CloudProvider::Gcp => "gcp",
        }
    }

    /// Account-level table that gives every investigation its provider context.
    pub fn root_table(&self) -> &'static str {
        match self {
            CloudProvider::Aws => "aws_account",
            CloudProvider::Azure => "azure_subscription",
            CloudProvider::Gcp => "gcp_project",
        }
    }

    /// Environment variables the query engine plugin reads for this provider.
    pub fn credential_env_keys(&self) -> &'static [&'static str] {
        match self {
            CloudProvider::Aws => &[
                "AWS_ACCESS_KEY_ID",
                "AWS_SECRET_ACCESS_KEY",
                "AWS_SESSION_TOKEN",
                "AWS_REGION",
                "AWS_PROFILE",
            ],
            CloudProvider::Azure => &[
                "AZURE_CLIENT_ID",
                "AZURE_CLIENT_SECRET",
                "AZURE_TENANT_ID",
                "AZURE_SUBSCRIPTION_ID",
            ],
            CloudProvider::Gcp => &[
                "GOOGLE_APPLICATION_CREDENTIALS",
                "GOOGLE_CLOUD_PROJECT",
                "GCLOUD_PROJECT",
            ],
        }
    }
}

impl fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CloudProvider {
    type Err = InvestigatorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "aws" => Ok(CloudProvider::Aws),
            "azure" => Ok(CloudProvider::Azure),
            "gcp" => Ok(CloudProvider::Gcp),
            "" => Err(InvestigatorError::Validation("provider is required".to_string())),
            other => Err(InvestigatorError::Validation(format!(
                "unsupported provider '{}', expected one of aws, azure, gcp",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("AWS".parse::<CloudProvider>().unwrap(), CloudProvider::Aws);
        assert_eq!(" gcp ".parse::<CloudProvider>().unwrap(), CloudProvider::Gcp);
    }

    #[test]
    fn test_rejects_unknown_and_empty() {
        assert!(matches!(
            "oracle".parse::<CloudProvider>(),
            Err(InvestigatorError::Validation(_))
        ));
        assert!(matches!("".parse::<CloudProvider>(), Err(InvestigatorError::Validation(_))));
    }
}
