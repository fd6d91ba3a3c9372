//! Schema Catalog
//!
//! Builds `TableSchema` entries from `information_schema.columns` rows and
//! annotates well-known columns with descriptions and example values.

use crate::learning::memory::{ColumnInfo, TableSchema};
use crate::provider::CloudProvider;
use crate::query::Row;
use chrono::Utc;
use serde_json::Value;

/// Column discovery query for one table.
pub fn schema_query(table: &str) -> String {
    // Table names come from our own resolver, but never splice quotes through.
    let table = table.replace('\'', "");
    format!(
        "SELECT column_name, data_type, is_nullable FROM information_schema.columns WHERE table_name = '{}' ORDER BY ordinal_position",
        table
    )
}

pub fn build_schema(provider: CloudProvider, table: &str, rows: &[Row]) -> TableSchema {
    let columns = rows
        .iter()
        .filter_map(column_from_row)
        .map(annotate_column)
        .collect();

    TableSchema {
        table_name: table.to_string(),
        columns,
        provider,
        description: table_description(provider, table),
        last_updated: Utc::now(),
    }
}

fn column_from_row(row: &Row) -> Option<ColumnInfo> {
    let name = row.get("column_name")?.as_str()?.to_string();
    let data_type = row
        .get("data_type")
        .and_then(Value::as_str)
        .unwrap_or("text")
        .to_string();
    let required = row
        .get("is_nullable")
        .and_then(Value::as_str)
        .map(|v| v.eq_ignore_ascii_case("no"))
        .unwrap_or(false);

    Some(ColumnInfo {
        name,
        data_type,
        description: String::new(),
        required,
        examples: Vec::new(),
    })
}

fn annotate_column(mut col: ColumnInfo) -> ColumnInfo {
    let (description, examples): (&str, &[&str]) = match col.name.as_str() {
        "instance_id" => ("EC2 instance identifier", &["i-1234567890abcdef0"]),
        "instance_state" => (
            "Current state of the EC2 instance",
            &["running", "stopped", "pending", "terminated"],
        ),
        "instance_type" => ("EC2 instance type/size", &["t3.micro", "m5.large", "c5.xlarge"]),
        "vpc_id" => ("VPC identifier where resource is located", &["vpc-12345678"]),
        "region" | "aws_region" => (
            "Region where resource is located",
            &["us-east-1", "us-west-2", "eu-west-1"],
        ),
        "name" => ("Resource name or identifier", &[]),
        "tags" => (
            "Resource tags as JSON object",
            &[r#"{"Environment": "prod", "Team": "platform"}"#],
        ),
        _ => return col,
    };
    col.description = description.to_string();
    col.examples = examples.iter().map(|s| s.to_string()).collect();
    col
}

pub fn table_description(provider: CloudProvider, table: &str) -> String {
    let known = match table {
        "aws_account" => Some("AWS account details"),
        "aws_ec2_instance" => Some("EC2 virtual machine instances"),
        "aws_s3_bucket" => Some("S3 storage buckets"),
        "aws_rds_db_instance" => Some("RDS database instances"),
        "aws_vpc_security_group" => Some("VPC security groups and rules"),
        "aws_iam_user" => Some("IAM users and their configurations"),
        "aws_iam_role" => Some("IAM roles and their policies"),
        "aws_vpc" => Some("Virtual Private Clouds (VPCs)"),
        "aws_lambda_function" => Some("Lambda serverless functions"),
        "aws_ebs_volume" => Some("EBS block storage volumes"),
        "azure_subscription" => Some("Azure subscriptions"),
        "azure_compute_virtual_machine" => Some("Azure virtual machines"),
        "azure_storage_account" => Some("Azure storage accounts"),
        "gcp_project" => Some("GCP projects"),
        "gcp_compute_instance" => Some("Compute Engine instances"),
        "gcp_storage_bucket" => Some("Cloud Storage buckets"),
        _ => None,
    };
    match known {
        Some(d) => d.to_string(),
        None => format!("{} table for {} provider", table, provider),
    }
}

/// Render cached schemas as a planner context section.
pub fn render_schemas(schemas: &[&TableSchema]) -> String {
    let mut out = String::new();
    for schema in schemas {
        out.push_str(&format!("\nTable: {}\n", schema.table_name));
        out.push_str(&format!("Description: {}\n", schema.description));
        out.push_str("Columns:\n");
        for col in &schema.columns {
            if col.description.is_empty() {
                out.push_str(&format!("  - {} ({})\n", col.name, col.data_type));
            } else {
                out.push_str(&format!("  - {} ({}): {}\n", col.name, col.data_type, col.description));
            }
            if !col.examples.is_empty() {
                out.push_str(&format!("    Examples: {}\n", col.examples.join(", ")));
            }
        }
    }
    out
}
