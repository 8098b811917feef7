//! Environment-driven configuration for the production adapter implementations.
//!
//! Centralised here (rather than read ad hoc per call, as the teacher
//! codebase does for its one-off `OPENAI_KEY` lookup) because this crate's
//! adapters are constructed once at process start and threaded through every
//! Request afterwards.

use std::env;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),
}

/// Default per-adapter-call timeout recommended by the design (§5).
pub const DEFAULT_ADAPTER_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct Config {
    pub knowledge_base_token: String,
    pub knowledge_base_database_id: String,
    pub helpdesk_token: String,
    pub helpdesk_admin_id: String,
    pub chat_token: String,
    pub llm_endpoint: String,
    pub llm_key: String,
    pub default_done_channel_id: String,
    pub adapter_timeout: Duration,
}

impl Config {
    /// Load configuration from the process environment. Fails closed: a
    /// missing variable is a `ConfigError`, never a panic or a silent default.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Config {
            knowledge_base_token: required("KNOWLEDGE_BASE_TOKEN")?,
            knowledge_base_database_id: required("KNOWLEDGE_BASE_DATABASE_ID")?,
            helpdesk_token: required("HELPDESK_TOKEN")?,
            helpdesk_admin_id: required("HELPDESK_ADMIN_ID")?,
            chat_token: required("CHAT_TOKEN")?,
            llm_endpoint: required("LLM_ENDPOINT")?,
            llm_key: required("LLM_KEY")?,
            default_done_channel_id: required("DEFAULT_DONE_CHANNEL_ID")?,
            adapter_timeout: env::var("ADAPTER_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_ADAPTER_TIMEOUT),
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingVar(name))
}
