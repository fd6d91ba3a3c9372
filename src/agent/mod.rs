pub mod contracts;
pub mod credentials;
pub mod investigator;
pub mod planner;
pub mod prompt;

pub use contracts::{
    InvestigationRequest, InvestigationResult, InvestigationStep, Interruption, PlannedStep,
};
pub use credentials::{CredentialProvider, EnvCredentialProvider};
pub use investigator::InvestigationAgent;
pub use planner::{LlmPlanner, Planner};
