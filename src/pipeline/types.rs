//! Shared types for the notification-to-draft pipeline.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Notifications ───────────────────────────────────────────────────

/// Envelope the push channel POSTs to the webhook: `{ "value": [...] }`.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationEnvelope {
    #[serde(default)]
    pub value: Vec<Notification>,
}

/// A single change notification. Delivered at-least-once; the guard makes
/// redelivery harmless.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(default)]
    pub change_type: String,
    #[serde(default)]
    pub subscription_id: String,
    #[serde(default)]
    pub client_state: Option<String>,
    /// Resource path, e.g. `me/mailFolders('inbox')/messages('<id>')`.
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub resource_data: Option<ResourceData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceData {
    #[serde(default)]
    pub id: Option<String>,
}

static RESOURCE_MESSAGE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"messages\('([^']+)'\)").expect("valid resource-id regex"));

impl Notification {
    /// Resolve the message id, preferring `resourceData.id` and falling
    /// back to the id embedded in the resource path. Some provider
    /// configurations omit one or the other.
    pub fn message_id(&self) -> Option<String> {
        if let Some(id) = self
            .resource_data
            .as_ref()
            .and_then(|d| d.id.as_deref())
            .filter(|id| !id.is_empty())
        {
            return Some(id.to_string());
        }
        RESOURCE_MESSAGE_ID
            .captures(&self.resource)
            .map(|c| c[1].to_string())
    }
}

// ── Messages & context ──────────────────────────────────────────────

/// Immutable snapshot of a mail message, fetched from the provider at
/// processing time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailMessage {
    pub id: String,
    /// Sender address (empty for some drafts).
    pub sender: String,
    pub subject: String,
    /// Body content, possibly HTML.
    pub body: String,
    pub received_at: DateTime<Utc>,
    pub is_draft: bool,
    /// Recipient addresses.
    pub to: Vec<String>,
    /// Provider-assigned categories (used by the skip filter).
    #[serde(default)]
    pub categories: Vec<String>,
}

/// Prior correspondence with one counterpart, built fresh per run.
///
/// Both sequences are ordered most-recent-first and never contain the
/// message currently being processed.
#[derive(Debug, Clone, Default)]
pub struct ContextSet {
    pub sender: String,
    /// Messages received from the counterpart.
    pub prior_messages: Vec<MailMessage>,
    /// Own drafts/sent mail addressed to the counterpart.
    pub prior_drafts: Vec<MailMessage>,
}

impl ContextSet {
    pub fn is_empty(&self) -> bool {
        self.prior_messages.is_empty() && self.prior_drafts.is_empty()
    }
}

// ── Selection ───────────────────────────────────────────────────────

/// Which side of the correspondence a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    /// Received from the counterpart.
    Received,
    /// Our own draft/sent mail to the counterpart.
    Draft,
}

/// Per-term contributions to a candidate's score.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreBreakdown {
    pub subject_overlap: f64,
    pub body_overlap: f64,
    pub recency: f64,
}

/// A scored prior item. Exists only during selection.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub message: MailMessage,
    pub kind: CandidateKind,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

/// Outcome of similarity selection.
#[derive(Debug, Clone, Default)]
pub struct SelectionResult {
    /// The single most relevant prior exchange, if any survived the
    /// counterpart filter.
    pub best_match: Option<Candidate>,
    /// Short digests of the remaining context items.
    pub summaries: Vec<String>,
}

/// A generated reply body, ready for draft persistence.
#[derive(Debug, Clone)]
pub struct GeneratedReply {
    pub body: String,
}

// ── Observability ───────────────────────────────────────────────────

/// Record of one completed run, published for the UI. Append-only with
/// bounded retention.
#[derive(Debug, Clone, Serialize)]
pub struct DraftRecord {
    pub id: Uuid,
    pub message_id: String,
    pub sender: String,
    pub subject: String,
    pub similar_sender: Option<String>,
    pub similar_subject: Option<String>,
    pub draft_preview: String,
    pub created_at: DateTime<Utc>,
}

// ── Text helpers ────────────────────────────────────────────────────

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid tag regex"));

/// Replace HTML tags with spaces and collapse whitespace.
pub fn strip_html(text: &str) -> String {
    let stripped = HTML_TAG.replace_all(text, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max` characters, ellipsis included when cut.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{cut}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(resource: &str, data_id: Option<&str>) -> Notification {
        Notification {
            change_type: "created".into(),
            subscription_id: "sub-1".into(),
            client_state: None,
            resource: resource.into(),
            resource_data: data_id.map(|id| ResourceData {
                id: Some(id.to_string()),
            }),
        }
    }

    #[test]
    fn message_id_prefers_resource_data() {
        let n = notification("me/mailFolders('inbox')/messages('path-id')", Some("data-id"));
        assert_eq!(n.message_id().as_deref(), Some("data-id"));
    }

    #[test]
    fn message_id_falls_back_to_resource_path() {
        let n = notification("me/mailFolders('inbox')/messages('AAMkAD-xyz_123')", None);
        assert_eq!(n.message_id().as_deref(), Some("AAMkAD-xyz_123"));
    }

    #[test]
    fn message_id_absent_when_unresolvable() {
        let n = notification("me/mailFolders('inbox')", None);
        assert_eq!(n.message_id(), None);
    }

    #[test]
    fn envelope_deserializes_provider_payload() {
        let payload = serde_json::json!({
            "value": [{
                "changeType": "created",
                "subscriptionId": "sub-9",
                "clientState": "secret",
                "resource": "me/mailFolders('inbox')/messages('m-1')",
                "resourceData": { "id": "m-1" }
            }]
        });
        let env: NotificationEnvelope = serde_json::from_value(payload).unwrap();
        assert_eq!(env.value.len(), 1);
        assert_eq!(env.value[0].change_type, "created");
        assert_eq!(env.value[0].client_state.as_deref(), Some("secret"));
        assert_eq!(env.value[0].message_id().as_deref(), Some("m-1"));
    }

    #[test]
    fn strip_html_removes_tags_and_collapses_whitespace() {
        assert_eq!(
            strip_html("<div>Hello <b>there</b>,\n  world</div>"),
            "Hello there, world"
        );
    }

    #[test]
    fn truncate_chars_never_exceeds_the_bound() {
        assert_eq!(truncate_chars("abcdef", 4), "abc…");
        assert_eq!(truncate_chars("abcdef", 4).chars().count(), 4);
        assert_eq!(truncate_chars("abcd", 4), "abcd");
        assert_eq!(truncate_chars("abc", 4), "abc");
    }
}
