//! Runtime configuration read from the environment (after `.env` is loaded).

use crate::error::{InvestigatorError, Result};
use crate::llm::{LlmClient, DUMMY_API_KEY};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gpt-4";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_MAX_STEPS: usize = 10;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_base_url: String,
    /// JSON snapshot of agent memory; `None` keeps memory in-process only.
    pub memory_path: Option<PathBuf>,
    pub query_timeout: Duration,
    pub max_steps: usize,
    pub learn_schemas: bool,
    pub steampipe_bin: PathBuf,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            openai_api_key: DUMMY_API_KEY.to_string(),
            openai_model: DEFAULT_MODEL.to_string(),
            openai_base_url: DEFAULT_BASE_URL.to_string(),
            memory_path: None,
            query_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
            max_steps: DEFAULT_MAX_STEPS,
            learn_schemas: false,
            steampipe_bin: PathBuf::from("steampipe"),
        }
    }
}

impl AgentConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup. Unset or blank keys take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let max_steps: usize = parse_or(get("INVESTIGATOR_MAX_STEPS"), "INVESTIGATOR_MAX_STEPS", defaults.max_steps)?;
        if max_steps == 0 {
            return Err(InvestigatorError::Config(
                "INVESTIGATOR_MAX_STEPS must be at least 1".to_string(),
            ));
        }

        let timeout_secs: u64 = parse_or(
            get("INVESTIGATOR_QUERY_TIMEOUT_SECS"),
            "INVESTIGATOR_QUERY_TIMEOUT_SECS",
            DEFAULT_QUERY_TIMEOUT_SECS,
        )?;
        if timeout_secs == 0 {
            return Err(InvestigatorError::Config(
                "INVESTIGATOR_QUERY_TIMEOUT_SECS must be at least 1".to_string(),
            ));
        }

        let learn_schemas = match get("INVESTIGATOR_LEARN_SCHEMAS") {
            None => defaults.learn_schemas,
            Some(v) => parse_flag(&v).ok_or_else(|| {
                InvestigatorError::Config(format!("INVESTIGATOR_LEARN_SCHEMAS: invalid flag '{}'", v))
            })?,
        };

        Ok(Self {
            openai_api_key: get("OPENAI_API_KEY").unwrap_or(defaults.openai_api_key),
            openai_model: get("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            openai_base_url: get("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            memory_path: get("INVESTIGATOR_MEMORY_PATH").map(PathBuf::from),
            query_timeout: Duration::from_secs(timeout_secs),
            max_steps,
            learn_schemas,
            steampipe_bin: get("STEAMPIPE_BIN").map(PathBuf::from).unwrap_or(defaults.steampipe_bin),
        })
    }

    pub fn llm_client(&self) -> LlmClient {
        LlmClient::new(
            self.openai_api_key.clone(),
            self.openai_model.clone(),
            self.openai_base_url.clone(),
        )
    }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(v) => v
            .parse()
            .map_err(|e| InvestigatorError::Config(format!("{}: invalid value '{}': {}", key, v, e))),
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
