//! Service configuration, built from environment variables.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default cool-down after a successful run, in seconds.
const DEFAULT_DEDUP_TTL_SECS: u64 = 60;

/// Default recency window for prior-correspondence retrieval.
const DEFAULT_HISTORY_WINDOW_DAYS: i64 = 365;

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP bind host.
    pub host: String,
    /// HTTP bind port.
    pub port: u16,
    /// Base URL of the mail provider's REST API.
    pub graph_base_url: String,
    /// Delegated access token for the mail provider. Token refresh is
    /// handled outside this service.
    pub graph_access_token: SecretString,
    /// API key for the text-generation provider.
    pub openai_api_key: SecretString,
    /// Model used for reply generation.
    pub openai_model: String,
    /// Expected `clientState` on incoming notifications. When set,
    /// notifications carrying a different value are dropped.
    pub client_state: Option<String>,
    /// Cool-down after a successful run before the same message id may
    /// be processed again.
    pub dedup_ttl: Duration,
    /// How far back to look for prior correspondence.
    pub history_window_days: i64,
    /// Cap on prior messages retrieved per sender.
    pub history_limit: usize,
    /// Cap on own drafts/sent items retrieved.
    pub drafts_limit: usize,
    /// Bounded retention of the draft-record log.
    pub record_capacity: usize,
    /// Timeout for mail-provider calls.
    pub request_timeout: Duration,
    /// Timeout for the generation call.
    pub generation_timeout: Duration,
}

impl Config {
    /// Build configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let graph_access_token = require_env("GRAPH_ACCESS_TOKEN")?;
        let openai_api_key = require_env("OPENAI_API_KEY")?;

        Ok(Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_env("PORT", 8000)?,
            graph_base_url: std::env::var("GRAPH_BASE_URL")
                .unwrap_or_else(|_| "https://graph.microsoft.com/v1.0".to_string()),
            graph_access_token: SecretString::from(graph_access_token),
            openai_api_key: SecretString::from(openai_api_key),
            openai_model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
            client_state: std::env::var("WEBHOOK_CLIENT_STATE")
                .ok()
                .filter(|s| !s.is_empty()),
            dedup_ttl: Duration::from_secs(parse_env("DEDUP_TTL_SECS", DEFAULT_DEDUP_TTL_SECS)?),
            history_window_days: parse_env("HISTORY_WINDOW_DAYS", DEFAULT_HISTORY_WINDOW_DAYS)?,
            history_limit: parse_env("HISTORY_LIMIT", 50)?,
            drafts_limit: parse_env("DRAFTS_LIMIT", 25)?,
            record_capacity: parse_env("RECORD_CAPACITY", 50)?,
            request_timeout: Duration::from_secs(parse_env("REQUEST_TIMEOUT_SECS", 30)?),
            generation_timeout: Duration::from_secs(parse_env("GENERATION_TIMEOUT_SECS", 60)?),
        })
    }
}

fn require_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
