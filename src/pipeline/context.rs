//! Context assembly — per-sender retrieval of prior correspondence.
//!
//! Retrieval is sender-equality plus a recency window, never provider
//! full-text search (unreliable for some account types). Drafts/sent mail
//! is filtered server-side by flag and recency only; recipient equality is
//! applied client-side because server-side recipient filtering on that
//! path is equally unreliable.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use crate::pipeline::types::ContextSet;
use crate::store::MessageStore;

/// Builds a fresh [`ContextSet`] per run.
pub struct ContextAssembler {
    store: Arc<dyn MessageStore>,
    window_days: i64,
    history_limit: usize,
    drafts_limit: usize,
}

impl ContextAssembler {
    pub fn new(
        store: Arc<dyn MessageStore>,
        window_days: i64,
        history_limit: usize,
        drafts_limit: usize,
    ) -> Self {
        Self {
            store,
            window_days,
            history_limit,
            drafts_limit,
        }
    }

    /// Assemble prior correspondence with `sender`, excluding the message
    /// currently being processed.
    ///
    /// Provider failures never abort the run: each leg degrades to an
    /// empty sequence with a warning. Drafting without history beats
    /// silently dropping the notification.
    pub async fn assemble(
        &self,
        sender: &str,
        exclude_message_id: &str,
        now: DateTime<Utc>,
    ) -> ContextSet {
        if sender.is_empty() {
            return ContextSet::default();
        }

        let since = now - Duration::days(self.window_days);

        let mut prior_messages = match self.store.query_by_sender(sender, since).await {
            Ok(items) => items,
            Err(e) => {
                warn!(sender, error = %e, "Sender history unavailable, degrading to empty");
                Vec::new()
            }
        };

        let mut prior_drafts = match self.store.query_own_drafts_or_sent(since).await {
            Ok(items) => items,
            Err(e) => {
                warn!(sender, error = %e, "Draft history unavailable, degrading to empty");
                Vec::new()
            }
        };

        prior_messages.retain(|m| m.id != exclude_message_id);
        prior_drafts.retain(|m| {
            m.id != exclude_message_id && m.to.iter().any(|a| a.eq_ignore_ascii_case(sender))
        });

        prior_messages.sort_by(|a, b| b.received_at.cmp(&a.received_at));
        prior_drafts.sort_by(|a, b| b.received_at.cmp(&a.received_at));
        prior_messages.truncate(self.history_limit);
        prior_drafts.truncate(self.drafts_limit);

        ContextSet {
            sender: sender.to_string(),
            prior_messages,
            prior_drafts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::pipeline::types::MailMessage;
    use async_trait::async_trait;

    struct FakeStore {
        by_sender: Result<Vec<MailMessage>, ()>,
        drafts: Result<Vec<MailMessage>, ()>,
    }

    #[async_trait]
    impl MessageStore for FakeStore {
        async fn fetch_by_id(&self, _id: &str) -> Result<MailMessage, StoreError> {
            unimplemented!("not used by assembler tests")
        }

        async fn query_by_sender(
            &self,
            _address: &str,
            _since: DateTime<Utc>,
        ) -> Result<Vec<MailMessage>, StoreError> {
            self.by_sender
                .clone()
                .map_err(|_| StoreError::Http("boom".into()))
        }

        async fn query_own_drafts_or_sent(
            &self,
            _since: DateTime<Utc>,
        ) -> Result<Vec<MailMessage>, StoreError> {
            self.drafts
                .clone()
                .map_err(|_| StoreError::Http("boom".into()))
        }

        async fn save_reply_draft(
            &self,
            _original_id: &str,
            _body: &str,
        ) -> Result<String, StoreError> {
            unimplemented!("not used by assembler tests")
        }
    }

    fn msg(id: &str, sender: &str, to: &[&str], age_days: i64) -> MailMessage {
        MailMessage {
            id: id.into(),
            sender: sender.into(),
            subject: "subject".into(),
            body: "body".into(),
            received_at: Utc::now() - Duration::days(age_days),
            is_draft: false,
            to: to.iter().map(|s| s.to_string()).collect(),
            categories: vec![],
        }
    }

    fn assembler(store: FakeStore) -> ContextAssembler {
        ContextAssembler::new(Arc::new(store), 365, 50, 25)
    }

    #[tokio::test]
    async fn excludes_the_in_flight_message() {
        let store = FakeStore {
            by_sender: Ok(vec![msg("current", "a@x.com", &[], 0), msg("m1", "a@x.com", &[], 1)]),
            drafts: Ok(vec![]),
        };
        let context = assembler(store).assemble("a@x.com", "current", Utc::now()).await;
        assert_eq!(context.prior_messages.len(), 1);
        assert!(context.prior_messages.iter().all(|m| m.id != "current"));
    }

    #[tokio::test]
    async fn drafts_filtered_by_recipient_client_side() {
        let store = FakeStore {
            by_sender: Ok(vec![]),
            drafts: Ok(vec![
                msg("d1", "me@corp.com", &["a@x.com"], 1),
                msg("d2", "me@corp.com", &["A@X.COM"], 2),
                msg("d3", "me@corp.com", &["other@x.com"], 1),
            ]),
        };
        let context = assembler(store).assemble("a@x.com", "current", Utc::now()).await;
        let ids: Vec<_> = context.prior_drafts.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["d1", "d2"]);
    }

    #[tokio::test]
    async fn results_are_most_recent_first() {
        let store = FakeStore {
            by_sender: Ok(vec![
                msg("old", "a@x.com", &[], 30),
                msg("new", "a@x.com", &[], 1),
                msg("mid", "a@x.com", &[], 10),
            ]),
            drafts: Ok(vec![]),
        };
        let context = assembler(store).assemble("a@x.com", "x", Utc::now()).await;
        let ids: Vec<_> = context.prior_messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[tokio::test]
    async fn store_failure_degrades_to_empty_context() {
        let store = FakeStore {
            by_sender: Err(()),
            drafts: Err(()),
        };
        let context = assembler(store).assemble("a@x.com", "x", Utc::now()).await;
        assert!(context.is_empty());
        assert_eq!(context.sender, "a@x.com");
    }

    #[tokio::test]
    async fn one_leg_failing_keeps_the_other() {
        let store = FakeStore {
            by_sender: Err(()),
            drafts: Ok(vec![msg("d1", "me@corp.com", &["a@x.com"], 1)]),
        };
        let context = assembler(store).assemble("a@x.com", "x", Utc::now()).await;
        assert!(context.prior_messages.is_empty());
        assert_eq!(context.prior_drafts.len(), 1);
    }

    #[tokio::test]
    async fn empty_sender_yields_empty_context() {
        let store = FakeStore {
            by_sender: Ok(vec![msg("m1", "", &[], 1)]),
            drafts: Ok(vec![]),
        };
        let context = assembler(store).assemble("", "x", Utc::now()).await;
        assert!(context.is_empty());
    }
}
