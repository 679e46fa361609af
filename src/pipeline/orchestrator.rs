//! Pipeline orchestration — the per-notification state machine.
//!
//! One run per admitted notification:
//! `RECEIVED → GUARDED → CONTEXT_BUILT → SELECTED → SYNTHESIZED →
//! PERSISTED → DONE`, with `FAILED` reachable from any non-done state.
//! The guard is acquired once per run and released exactly once on every
//! exit path; a rejected acquire ends the run silently with no release.
//! A failed run never blocks other message ids.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::guard::{AcquireOutcome, DedupGuard, RejectReason, RunOutcome as GuardOutcome};
use crate::llm::TextGenerator;
use crate::pipeline::context::ContextAssembler;
use crate::pipeline::select::select;
use crate::pipeline::synth::{ReplySynthesizer, format_draft_html};
use crate::pipeline::types::{
    DraftRecord, MailMessage, Notification, SelectionResult, strip_html, truncate_chars,
};
use crate::pipeline::verify::{evidence_text, verify_and_filter};
use crate::records::DraftLog;
use crate::store::MessageStore;

/// Preview length stored on draft records.
const PREVIEW_CHARS: usize = 280;

/// Subject fragments marking auto-generated mail we never reply to.
const SKIP_SUBJECTS: [&str; 4] = [
    "out of office",
    "automatic reply",
    "delivery failure",
    "undeliverable",
];

/// States of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Received,
    Guarded,
    ContextBuilt,
    Selected,
    Synthesized,
    Persisted,
    Done,
    Failed,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Received => "received",
            Self::Guarded => "guarded",
            Self::ContextBuilt => "context_built",
            Self::Selected => "selected",
            Self::Synthesized => "synthesized",
            Self::Persisted => "persisted",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Terminal result of one run.
#[derive(Debug)]
pub enum RunResult {
    /// A draft was created and a record published.
    Drafted,
    /// Guard rejection — expected under at-least-once delivery.
    Suppressed(RejectReason),
    /// Auto-generated or unaddressable mail, completed without a draft.
    Skipped,
    /// Terminal failure; the guard entry was released as Failure.
    Failed(PipelineError),
}

/// Knobs for the orchestrator, split out so tests can tighten them.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub dedup_ttl: Duration,
    pub history_window_days: i64,
    pub history_limit: usize,
    pub drafts_limit: usize,
    /// Expected notification `clientState`; mismatches are dropped.
    pub client_state: Option<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            dedup_ttl: crate::guard::DEFAULT_TTL,
            history_window_days: 365,
            history_limit: 50,
            drafts_limit: 25,
            client_state: None,
        }
    }
}

/// Drives notification-to-draft runs.
pub struct Orchestrator {
    guard: DedupGuard,
    store: Arc<dyn MessageStore>,
    assembler: ContextAssembler,
    synthesizer: ReplySynthesizer,
    records: Arc<DraftLog>,
    client_state: Option<String>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn MessageStore>,
        generator: Arc<dyn TextGenerator>,
        records: Arc<DraftLog>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            guard: DedupGuard::new(config.dedup_ttl),
            assembler: ContextAssembler::new(
                Arc::clone(&store),
                config.history_window_days,
                config.history_limit,
                config.drafts_limit,
            ),
            synthesizer: ReplySynthesizer::new(generator),
            store,
            records,
            client_state: config.client_state,
        }
    }

    /// Admission check + run. Notifications that are not `created`
    /// events, carry the wrong client state, or have no resolvable
    /// message id never enter the pipeline.
    pub async fn handle_notification(&self, notification: &Notification) {
        if notification.change_type != "created" {
            debug!(
                change_type = %notification.change_type,
                "Skipping notification: not a created event"
            );
            return;
        }

        if let Some(expected) = &self.client_state {
            if notification.client_state.as_deref() != Some(expected.as_str()) {
                debug!(
                    subscription_id = %notification.subscription_id,
                    "Dropping notification: clientState mismatch"
                );
                return;
            }
        }

        let Some(message_id) = notification.message_id() else {
            debug!(
                resource = %notification.resource,
                "Skipping notification: no resolvable message id"
            );
            return;
        };

        self.process(&message_id).await;
    }

    /// Run the state machine for one message id.
    pub async fn process(&self, message_id: &str) -> RunResult {
        let mut state = RunState::Received;

        match self.guard.acquire(message_id) {
            AcquireOutcome::Granted => {}
            AcquireOutcome::Rejected(reason) => {
                // Expected under redelivery; no side effects, no release.
                debug!(message_id, reason = ?reason, "Duplicate suppressed");
                return RunResult::Suppressed(reason);
            }
        }
        advance(&mut state, RunState::Guarded, message_id);

        let incoming = match self.store.fetch_by_id(message_id).await {
            Ok(message) => message,
            Err(e) => {
                return self.fail(message_id, state, PipelineError::Fetch(e));
            }
        };

        if should_skip(&incoming) {
            // Completed-as-success so redeliveries stay suppressed.
            info!(message_id, sender = %incoming.sender, "Skipping auto-generated or unaddressable mail");
            self.guard.release(message_id, GuardOutcome::Success);
            return RunResult::Skipped;
        }

        let context = self
            .assembler
            .assemble(&incoming.sender, message_id, Utc::now())
            .await;
        advance(&mut state, RunState::ContextBuilt, message_id);

        let selection = select(&incoming, &context);
        advance(&mut state, RunState::Selected, message_id);

        let reply = match self.synthesizer.synthesize(&incoming, &selection).await {
            Ok(reply) => reply,
            Err(e) => {
                return self.fail(message_id, state, PipelineError::Generation(e));
            }
        };
        advance(&mut state, RunState::Synthesized, message_id);

        let verified = verify_and_filter(&reply.body, &evidence_text(&incoming, &selection));
        if verified.removed > 0 {
            info!(
                message_id,
                removed = verified.removed,
                "Removed unsupported sentences from generated draft"
            );
        }

        let html = format_draft_html(&verified.body);
        if let Err(e) = self.store.save_reply_draft(message_id, &html).await {
            return self.fail(message_id, state, PipelineError::Persistence(e));
        }
        advance(&mut state, RunState::Persisted, message_id);

        self.records
            .publish(build_record(message_id, &incoming, &selection, &html))
            .await;
        self.guard.release(message_id, GuardOutcome::Success);
        advance(&mut state, RunState::Done, message_id);

        info!(message_id, sender = %incoming.sender, "Draft reply created");
        RunResult::Drafted
    }

    fn fail(&self, message_id: &str, from: RunState, error: PipelineError) -> RunResult {
        error!(message_id, from = %from, error = %error, "Run failed");
        // Immediate removal: redelivery may retry without a TTL penalty.
        self.guard.release(message_id, GuardOutcome::Failure);
        RunResult::Failed(error)
    }
}

fn advance(state: &mut RunState, to: RunState, message_id: &str) {
    debug!(message_id, from = %state, to = %to, "Run transition");
    *state = to;
}

/// Auto-generated mail and mail without a sender address never get a
/// draft reply.
fn should_skip(message: &MailMessage) -> bool {
    if message.sender.is_empty() {
        return true;
    }
    let subject = message.subject.to_lowercase();
    if SKIP_SUBJECTS.iter().any(|term| subject.contains(term)) {
        return true;
    }
    message.categories.iter().any(|c| {
        let c = c.to_lowercase();
        c.contains("auto") || c.contains("notification")
    })
}

fn build_record(
    message_id: &str,
    incoming: &MailMessage,
    selection: &SelectionResult,
    draft_html: &str,
) -> DraftRecord {
    let best = selection.best_match.as_ref();
    DraftRecord {
        id: Uuid::new_v4(),
        message_id: message_id.to_string(),
        sender: incoming.sender.clone(),
        subject: incoming.subject.clone(),
        similar_sender: best.map(|c| c.message.sender.clone()),
        similar_subject: best.map(|c| c.message.subject.clone()),
        draft_preview: truncate_chars(&strip_html(draft_html), PREVIEW_CHARS),
        created_at: Utc::now(),
    }
}
