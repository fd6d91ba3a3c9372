pub mod context;
pub mod executor;
pub mod rewriter;
pub mod tool;

pub use context::CallContext;
pub use executor::{parse_payload, ExecutorError, OutputFormat, QueryExecutor, SteampipeExecutor};
pub use rewriter::QueryRewriter;
pub use tool::{QueryTool, ToolRequest, ToolResponse};

/// One result row: column name to dynamically typed value.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Provider credentials passed to the query engine as environment variables.
pub type Credentials = std::collections::HashMap<String, String>;
