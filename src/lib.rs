pub mod agent;
pub mod config;
pub mod error;
pub mod insights;
pub mod learning;
pub mod llm;
pub mod provider;
pub mod query;
pub mod tables;

pub use agent::{
    CredentialProvider, EnvCredentialProvider, InvestigationAgent, InvestigationRequest,
    InvestigationResult, InvestigationStep, Interruption, LlmPlanner, PlannedStep, Planner,
};
pub use config::AgentConfig;
pub use error::{InvestigatorError, Result};
pub use insights::{Insight, InsightKind, Severity};
pub use learning::{AgentMemory, ErrorKind, MemoryHandle};
pub use provider::CloudProvider;
pub use query::{
    CallContext, Credentials, OutputFormat, QueryExecutor, QueryTool, Row, SteampipeExecutor,
    ToolRequest, ToolResponse,
};
