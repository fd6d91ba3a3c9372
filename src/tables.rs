//! Table Relevance Resolver
//!
//! Maps a free-text prompt onto candidate query-engine tables for a provider.

use crate::provider::CloudProvider;
use itertools::Itertools;

/// Any keyword hit selects every table in the rule.
struct TableRule {
    keywords: &'static [&'static str],
    tables: &'static [&'static str],
}

const AWS_RULES: &[TableRule] = &[
    TableRule {
        keywords: &["instance", "ec2", "server", "compute"],
        tables: &["aws_ec2_instance"],
    },
    TableRule {
        keywords: &["security group", "security", "firewall", "0.0.0.0", "port"],
        tables: &["aws_vpc_security_group"],
    },
    TableRule {
        keywords: &["bucket", "s3", "storage"],
        tables: &["aws_s3_bucket"],
    },
    TableRule {
        keywords: &["iam", "user", "role", "permission", "policy"],
        tables: &["aws_iam_user", "aws_iam_role"],
    },
    TableRule {
        keywords: &["lambda", "function", "serverless"],
        tables: &["aws_lambda_function"],
    },
    TableRule {
        keywords: &["database", "rds", "mysql", "postgres"],
        tables: &["aws_rds_db_instance"],
    },
    TableRule {
        keywords: &["vpc", "network", "subnet"],
        tables: &["aws_vpc"],
    },
    TableRule {
        keywords: &["volume", "ebs", "disk"],
        tables: &["aws_ebs_volume"],
    },
];

const AZURE_RULES: &[TableRule] = &[
    TableRule {
        keywords: &["vm", "virtual machine", "compute", "instance"],
        tables: &["azure_compute_virtual_machine"],
    },
    TableRule {
        keywords: &["storage", "blob"],
        tables: &["azure_storage_account"],
    },
    TableRule {
        keywords: &["security group", "nsg", "firewall", "port"],
        tables: &["azure_network_security_group"],
    },
    TableRule {
        keywords: &["user", "identity", "active directory"],
        tables: &["azuread_user"],
    },
    TableRule {
        keywords: &["function", "serverless"],
        tables: &["azure_app_service_function_app"],
    },
    TableRule {
        keywords: &["database", "sql"],
        tables: &["azure_sql_server"],
    },
];

const GCP_RULES: &[TableRule] = &[
    TableRule {
        keywords: &["instance", "compute", "gce", "vm"],
        tables: &["gcp_compute_instance"],
    },
    TableRule {
        keywords: &["storage", "bucket", "gcs"],
        tables: &["gcp_storage_bucket"],
    },
    TableRule {
        keywords: &["firewall", "security", "port"],
        tables: &["gcp_compute_firewall"],
    },
    TableRule {
        keywords: &["iam", "service account", "user"],
        tables: &["gcp_service_account"],
    },
    TableRule {
        keywords: &["function", "serverless"],
        tables: &["gcp_cloudfunctions_function"],
    },
    TableRule {
        keywords: &["database", "sql"],
        tables: &["gcp_sql_database_instance"],
    },
];

fn rules_for(provider: CloudProvider) -> &'static [TableRule] {
    match provider {
        CloudProvider::Aws => AWS_RULES,
        CloudProvider::Azure => AZURE_RULES,
        CloudProvider::Gcp => GCP_RULES,
    }
}

/// Candidate tables for a prompt. Never empty: the provider's root table is
/// always the last entry.
pub fn resolve_tables(prompt: &str, provider: CloudProvider) -> Vec<String> {
    let prompt = prompt.to_lowercase();

    rules_for(provider)
        .iter()
        .filter(|rule| rule.keywords.iter().any(|k| prompt.contains(*k)))
        .flat_map(|rule| rule.tables.iter().copied())
        .chain(std::iter::once(provider.root_table()))
        .unique()
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_ec2_instances() {
        let tables = resolve_tables("Find all running EC2 instances", CloudProvider::Aws);
        assert!(tables.contains(&"aws_ec2_instance".to_string()));
        assert!(tables.contains(&"aws_account".to_string()));
    }

    #[test]
    fn test_no_match_returns_root_table() {
        assert_eq!(resolve_tables("hello there", CloudProvider::Aws), vec!["aws_account"]);
        assert_eq!(resolve_tables("", CloudProvider::Gcp), vec!["gcp_project"]);
        assert_eq!(resolve_tables("?", CloudProvider::Azure), vec!["azure_subscription"]);
    }

    #[test]
    fn test_union_of_matches_is_deterministic() {
        let prompt = "Which S3 buckets and IAM users have a security group problem?";
        let first = resolve_tables(prompt, CloudProvider::Aws);
        assert_eq!(first, resolve_tables(prompt, CloudProvider::Aws));
        for t in ["aws_s3_bucket", "aws_iam_user", "aws_iam_role", "aws_vpc_security_group"] {
            assert!(first.contains(&t.to_string()), "missing {}", t);
        }
        assert_eq!(first.last().map(String::as_str), Some("aws_account"));
    }

    #[test]
    fn test_lambda_functions() {
        let tables = resolve_tables("list lambda functions", CloudProvider::Aws);
        assert_eq!(tables, vec!["aws_lambda_function", "aws_account"]);
    }
}
