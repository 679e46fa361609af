//! Mail store seam — the provider interface the pipeline consumes.
//!
//! The pipeline never talks to a transport directly; it depends on
//! [`MessageStore`] so the orchestrator and its tests can substitute
//! deterministic fakes. The production implementation lives in
//! [`graph`] and speaks a Microsoft Graph-shaped REST API.

pub mod graph;

pub use graph::GraphMailStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};

use crate::error::StoreError;
use crate::pipeline::types::MailMessage;

/// Provider operations the core consumes. All calls are network calls
/// with provider-specific failure modes (rate limiting, auth expiry)
/// surfaced uniformly as [`StoreError`].
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Fetch a single message snapshot by id.
    async fn fetch_by_id(&self, id: &str) -> Result<MailMessage, StoreError>;

    /// Messages received from `address` since `since`, newest first.
    async fn query_by_sender(
        &self,
        address: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<MailMessage>, StoreError>;

    /// The operator's own outbound history since `since`. Recipient
    /// filtering is the caller's job.
    ///
    /// Resolution: retrieval is drafts-only (`isDraft`). The provider
    /// has no dependable single-query filter spanning drafts and sent
    /// items, so the drafts folder stands in for outbound history.
    async fn query_own_drafts_or_sent(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<MailMessage>, StoreError>;

    /// Save `body` (HTML) as a reply draft to the given message.
    /// Returns the provider's draft id.
    async fn save_reply_draft(&self, original_id: &str, body: &str) -> Result<String, StoreError>;
}

/// Supplies bearer tokens for provider calls. Token acquisition and
/// refresh are a collaborator's concern, not the pipeline's.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn bearer_token(&self) -> Result<String, StoreError>;
}

/// Token source backed by a fixed delegated token (e.g. injected via
/// environment). Suitable for wiring and tests.
pub struct StaticTokenSource {
    token: SecretString,
}

impl StaticTokenSource {
    pub fn new(token: SecretString) -> Self {
        Self { token }
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn bearer_token(&self) -> Result<String, StoreError> {
        let token = self.token.expose_secret();
        if token.is_empty() {
            return Err(StoreError::Auth("empty access token".to_string()));
        }
        Ok(token.to_string())
    }
}
