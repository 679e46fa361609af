//! Microsoft Graph-shaped mail store.
//!
//! Retrieval uses `$filter` over the message list — never `$search`, which
//! is unreliable for some account types. Drafts are filtered server-side
//! by `isDraft` and recency only; recipient filtering happens client-side
//! in the assembler for the same reliability reason.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::error::StoreError;
use crate::pipeline::types::MailMessage;
use crate::store::{MessageStore, TokenSource};

/// Page size for list queries.
const QUERY_TOP: usize = 50;

const MESSAGE_SELECT: &str =
    "id,subject,body,bodyPreview,from,toRecipients,receivedDateTime,lastModifiedDateTime,isDraft,categories";

/// Mail store over the Graph REST API.
pub struct GraphMailStore {
    http: reqwest::Client,
    base_url: String,
    tokens: std::sync::Arc<dyn TokenSource>,
}

impl GraphMailStore {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        tokens: std::sync::Arc<dyn TokenSource>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            tokens,
        }
    }

    async fn get(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<serde_json::Value, StoreError> {
        let token = self.tokens.bearer_token().await?;
        let url = format!("{}{path}", self.base_url);
        debug!(%url, "Graph GET");

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn list_messages(
        &self,
        filter: String,
        order_by: &str,
    ) -> Result<Vec<MailMessage>, StoreError> {
        let value = self
            .get(
                "/me/messages",
                &[
                    ("$filter", filter),
                    ("$orderby", order_by.to_string()),
                    ("$top", QUERY_TOP.to_string()),
                    ("$select", MESSAGE_SELECT.to_string()),
                ],
            )
            .await?;
        let page: ListResponse = serde_json::from_value(value)?;
        Ok(page.value.into_iter().map(GraphMessage::into_message).collect())
    }
}

#[async_trait]
impl MessageStore for GraphMailStore {
    async fn fetch_by_id(&self, id: &str) -> Result<MailMessage, StoreError> {
        let value = self.get(&format!("/me/messages/{id}"), &[]).await?;
        let message: GraphMessage = serde_json::from_value(value)?;
        Ok(message.into_message())
    }

    async fn query_by_sender(
        &self,
        address: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<MailMessage>, StoreError> {
        let filter = format!(
            "receivedDateTime ge {} and from/emailAddress/address eq '{}'",
            rfc3339(since),
            escape_odata(address),
        );
        self.list_messages(filter, "receivedDateTime desc").await
    }

    async fn query_own_drafts_or_sent(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<MailMessage>, StoreError> {
        self.list_messages(drafts_filter(since), "lastModifiedDateTime desc")
            .await
    }

    async fn save_reply_draft(&self, original_id: &str, body: &str) -> Result<String, StoreError> {
        let token = self.tokens.bearer_token().await?;
        let url = format!("{}/me/messages/{original_id}/createReply", self.base_url);
        debug!(%url, "Graph POST createReply");

        let payload = serde_json::json!({
            "message": {
                "body": {
                    "contentType": "HTML",
                    "content": body,
                }
            }
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let draft: DraftResponse = serde_json::from_str(&text)?;
        Ok(draft.id)
    }
}

fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

// Outbound history is drafts-only; see the trait doc for the
// resolution.
fn drafts_filter(since: DateTime<Utc>) -> String {
    format!("isDraft eq true and lastModifiedDateTime ge {}", rfc3339(since))
}

/// OData string literals escape single quotes by doubling them.
fn escape_odata(value: &str) -> String {
    value.replace('\'', "''")
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    value: Vec<GraphMessage>,
}

#[derive(Debug, Deserialize)]
struct DraftResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphMessage {
    id: String,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    body: Option<GraphBody>,
    #[serde(default)]
    body_preview: Option<String>,
    #[serde(default)]
    from: Option<GraphRecipient>,
    #[serde(default)]
    to_recipients: Vec<GraphRecipient>,
    #[serde(default)]
    received_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    last_modified_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    is_draft: bool,
    #[serde(default)]
    categories: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GraphBody {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphRecipient {
    #[serde(default)]
    email_address: Option<GraphEmailAddress>,
}

#[derive(Debug, Deserialize)]
struct GraphEmailAddress {
    #[serde(default)]
    address: Option<String>,
}

impl GraphRecipient {
    fn address(&self) -> Option<String> {
        self.email_address.as_ref()?.address.clone()
    }
}

impl GraphMessage {
    fn into_message(self) -> MailMessage {
        // Drafts carry no receivedDateTime; fall back to last modified.
        let received_at = self
            .received_date_time
            .or(self.last_modified_date_time)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        MailMessage {
            id: self.id,
            sender: self.from.as_ref().and_then(GraphRecipient::address).unwrap_or_default(),
            subject: self.subject.unwrap_or_default(),
            body: self
                .body
                .and_then(|b| b.content)
                .or(self.body_preview)
                .unwrap_or_default(),
            received_at,
            is_draft: self.is_draft,
            to: self
                .to_recipients
                .iter()
                .filter_map(GraphRecipient::address)
                .collect(),
            categories: self.categories,
        }
    }
}
