//! Error types for Draft Assist.

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Mail store error: {0}")]
    Store(#[from] StoreError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Mail provider errors. Rate limits, auth expiry, and timeouts all
/// surface here; callers classify them per pipeline stage.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected response format: {0}")]
    Decode(String),

    #[error("No valid access token available: {0}")]
    Auth(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

/// Text generation errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Generation request timed out")]
    Timeout,

    #[error("Unexpected response format: {0}")]
    ResponseFormat(String),

    #[error("Provider returned status {status}: {body}")]
    Status { status: u16, body: String },
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(e.to_string())
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(e: serde_json::Error) -> Self {
        Self::ResponseFormat(e.to_string())
    }
}

/// Terminal pipeline failures. Context-assembly failures never appear
/// here — the assembler absorbs them and degrades to empty context.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Message fetch failed: {0}")]
    Fetch(StoreError),

    #[error("Generation failed: {0}")]
    Generation(#[from] LlmError),

    #[error("Draft persistence failed: {0}")]
    Persistence(StoreError),
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
