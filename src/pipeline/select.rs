//! Similarity selection — picks the single most relevant prior exchange.
//!
//! Pure lexical scoring over the assembled context. Weights are policy,
//! not structure: overlap dominates, recency acts as a bonus and
//! tie-breaker. Swapping in an embedding-based scorer only requires
//! preserving the `Candidate`/`SelectionResult` contract and the
//! deterministic tie-break.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::pipeline::types::{
    Candidate, CandidateKind, ContextSet, MailMessage, ScoreBreakdown, SelectionResult,
    strip_html, truncate_chars,
};

/// Share of the total score carried by lexical overlap.
const OVERLAP_WEIGHT: f64 = 0.8;
/// Share of the total score carried by recency.
const RECENCY_WEIGHT: f64 = 0.2;
/// Subject overlap counts more than body overlap.
const SUBJECT_WEIGHT: f64 = 0.7;
const BODY_WEIGHT: f64 = 0.3;
/// Age at which the recency score halves.
const RECENCY_HALF_LIFE_DAYS: f64 = 30.0;
/// Only the first chunk of a body participates in overlap. Long quoted
/// threads would otherwise dominate the token sets.
const BODY_TOKEN_CAP: usize = 120;

/// Cap on summary digests handed to the synthesizer.
const MAX_SUMMARIES: usize = 10;
/// Per-digest preview length.
const SUMMARY_PREVIEW_CHARS: usize = 200;

/// Rank the assembled context against the incoming message and pick the
/// single best match plus digests of the rest.
///
/// Candidates that do not match the incoming counterpart address are
/// excluded entirely, never scored. With no surviving candidate the
/// result is a cold start: `best_match` is `None` and synthesis proceeds
/// without a similar item.
pub fn select(incoming: &MailMessage, context: &ContextSet) -> SelectionResult {
    let candidates = score_candidates(incoming, context);

    let best = candidates
        .iter()
        .enumerate()
        .fold(None::<(usize, &Candidate)>, |best, (i, c)| match best {
            Some((_, b)) if !beats(c, b) => best,
            _ => Some((i, c)),
        });

    let (best_index, best_match) = match best {
        Some((i, c)) => (Some(i), Some(c.clone())),
        None => (None, None),
    };

    let summaries = candidates
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != best_index)
        .take(MAX_SUMMARIES)
        .map(|(_, c)| digest(&c.message))
        .collect();

    SelectionResult {
        best_match,
        summaries,
    }
}

fn score_candidates(incoming: &MailMessage, context: &ContextSet) -> Vec<Candidate> {
    let incoming_subject = tokens(&incoming.subject, usize::MAX);
    let incoming_body = tokens(&strip_html(&incoming.body), BODY_TOKEN_CAP);

    let received = context
        .prior_messages
        .iter()
        .map(|m| (m, CandidateKind::Received));
    let drafts = context
        .prior_drafts
        .iter()
        .map(|m| (m, CandidateKind::Draft));

    received
        .chain(drafts)
        .filter(|(m, kind)| matches_counterpart(m, *kind, &incoming.sender))
        .map(|(m, kind)| {
            let breakdown = ScoreBreakdown {
                subject_overlap: jaccard(&incoming_subject, &tokens(&m.subject, usize::MAX)),
                body_overlap: jaccard(
                    &incoming_body,
                    &tokens(&strip_html(&m.body), BODY_TOKEN_CAP),
                ),
                recency: recency_score(incoming.received_at, m.received_at),
            };
            let overlap =
                SUBJECT_WEIGHT * breakdown.subject_overlap + BODY_WEIGHT * breakdown.body_overlap;
            Candidate {
                message: m.clone(),
                kind,
                score: OVERLAP_WEIGHT * overlap + RECENCY_WEIGHT * breakdown.recency,
                breakdown,
            }
        })
        .collect()
}

/// Deterministic ordering: higher score, then more recent, then a
/// received message over a draft.
fn beats(a: &Candidate, b: &Candidate) -> bool {
    if a.score != b.score {
        return a.score > b.score;
    }
    if a.message.received_at != b.message.received_at {
        return a.message.received_at > b.message.received_at;
    }
    a.kind == CandidateKind::Received && b.kind == CandidateKind::Draft
}

/// A prior received message must be *from* the counterpart; a prior
/// draft must be addressed *to* it.
fn matches_counterpart(message: &MailMessage, kind: CandidateKind, sender: &str) -> bool {
    match kind {
        CandidateKind::Received => message.sender.eq_ignore_ascii_case(sender),
        CandidateKind::Draft => message.to.iter().any(|a| a.eq_ignore_ascii_case(sender)),
    }
}

/// Case-insensitive, punctuation-stripped word tokens.
fn tokens(text: &str, cap: usize) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .take(cap)
        .map(|w| w.to_lowercase())
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    intersection / union
}

/// Monotonically decreasing in candidate age, clamped so candidates
/// newer than the incoming message score a full 1.0 rather than going
/// negative.
fn recency_score(incoming_at: DateTime<Utc>, candidate_at: DateTime<Utc>) -> f64 {
    let age_days = (incoming_at - candidate_at).num_seconds().max(0) as f64 / 86_400.0;
    1.0 / (1.0 + age_days / RECENCY_HALF_LIFE_DAYS)
}

fn digest(message: &MailMessage) -> String {
    format!(
        "Subject: {}\nPreview: {}",
        message.subject,
        truncate_chars(&strip_html(&message.body), SUMMARY_PREVIEW_CHARS)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn message(id: &str, sender: &str, subject: &str, body: &str, age_days: i64) -> MailMessage {
        MailMessage {
            id: id.into(),
            sender: sender.into(),
            subject: subject.into(),
            body: body.into(),
            received_at: Utc::now() - Duration::days(age_days),
            is_draft: false,
            to: vec![],
            categories: vec![],
        }
    }

    fn draft_to(id: &str, recipient: &str, subject: &str, body: &str, age_days: i64) -> MailMessage {
        MailMessage {
            id: id.into(),
            sender: "me@corp.com".into(),
            subject: subject.into(),
            body: body.into(),
            received_at: Utc::now() - Duration::days(age_days),
            is_draft: true,
            to: vec![recipient.into()],
            categories: vec![],
        }
    }

    #[test]
    fn cold_start_returns_no_best_match() {
        let incoming = message("in", "a@x.com", "Invoice #42", "Please advise", 0);
        let result = select(&incoming, &ContextSet::default());
        assert!(result.best_match.is_none());
        assert!(result.summaries.is_empty());
    }

    #[test]
    fn counterpart_mismatch_is_excluded_not_scored() {
        let incoming = message("in", "a@x.com", "Invoice #42", "", 0);
        let context = ContextSet {
            sender: "a@x.com".into(),
            prior_messages: vec![message("m1", "other@x.com", "Invoice #42", "", 1)],
            prior_drafts: vec![draft_to("d1", "someone-else@x.com", "Invoice #42", "", 1)],
        };
        let result = select(&incoming, &context);
        assert!(result.best_match.is_none());
        assert!(result.summaries.is_empty());
    }

    #[test]
    fn best_match_sender_always_equals_incoming_sender() {
        let incoming = message("in", "a@x.com", "Quarterly report", "numbers attached", 0);
        let context = ContextSet {
            sender: "a@x.com".into(),
            prior_messages: vec![
                message("m1", "a@x.com", "Quarterly report", "numbers", 3),
                message("m2", "b@x.com", "Quarterly report numbers attached", "", 1),
            ],
            prior_drafts: vec![],
        };
        let best = select(&incoming, &context).best_match.unwrap();
        assert_eq!(best.message.sender, "a@x.com");
    }

    #[test]
    fn equal_overlap_prefers_more_recent() {
        let incoming = message("in", "a@x.com", "Project update", "", 0);
        let context = ContextSet {
            sender: "a@x.com".into(),
            prior_messages: vec![
                message("old", "a@x.com", "Project update", "", 10),
                message("new", "a@x.com", "Project update", "", 2),
            ],
            prior_drafts: vec![],
        };
        let best = select(&incoming, &context).best_match.unwrap();
        assert_eq!(best.message.id, "new");
    }

    #[test]
    fn equal_score_prefers_received_over_draft() {
        let when = Utc::now() - Duration::days(5);
        let incoming = message("in", "a@x.com", "Project update", "", 0);
        let mut received = message("m1", "a@x.com", "Project update", "", 5);
        received.received_at = when;
        let mut draft = draft_to("d1", "a@x.com", "Project update", "", 5);
        draft.received_at = when;
        let context = ContextSet {
            sender: "a@x.com".into(),
            prior_messages: vec![received],
            prior_drafts: vec![draft],
        };
        let best = select(&incoming, &context).best_match.unwrap();
        assert_eq!(best.kind, CandidateKind::Received);
        assert_eq!(best.message.id, "m1");
    }

    #[test]
    fn strong_overlap_beats_pure_recency() {
        // Scenario: prior message "Project update" (high overlap, 2 days old)
        // vs prior draft "Unrelated" (no overlap, 1 day old).
        let incoming = message("in", "b@x.com", "Project update — final", "", 0);
        let context = ContextSet {
            sender: "b@x.com".into(),
            prior_messages: vec![message("m1", "b@x.com", "Project update", "", 2)],
            prior_drafts: vec![draft_to("d1", "b@x.com", "Unrelated", "", 1)],
        };
        let best = select(&incoming, &context).best_match.unwrap();
        assert_eq!(best.message.id, "m1");
        assert!(best.breakdown.subject_overlap > 0.5);
    }

    #[test]
    fn candidate_newer_than_incoming_clamps_recency() {
        let incoming = message("in", "a@x.com", "Ping", "", 1);
        let newer = message("m1", "a@x.com", "Ping", "", 0);
        let score = recency_score(incoming.received_at, newer.received_at);
        assert_eq!(score, 1.0);
    }

    #[test]
    fn summaries_exclude_best_match_and_are_bounded() {
        let incoming = message("in", "a@x.com", "Renewal terms", "", 0);
        let prior_messages: Vec<_> = (0..15)
            .map(|i| {
                message(
                    &format!("m{i}"),
                    "a@x.com",
                    if i == 0 { "Renewal terms" } else { "Misc note" },
                    "body text",
                    i + 1,
                )
            })
            .collect();
        let context = ContextSet {
            sender: "a@x.com".into(),
            prior_messages,
            prior_drafts: vec![],
        };
        let result = select(&incoming, &context);
        let best = result.best_match.unwrap();
        assert_eq!(best.message.id, "m0");
        assert_eq!(result.summaries.len(), MAX_SUMMARIES);
        assert!(result.summaries.iter().all(|s| !s.contains("Renewal terms")));
    }

    #[test]
    fn tokens_are_case_insensitive_and_punctuation_free() {
        let set = tokens("Invoice #42, overdue!", usize::MAX);
        assert!(set.contains("invoice"));
        assert!(set.contains("42"));
        assert!(set.contains("overdue"));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn jaccard_of_disjoint_sets_is_zero() {
        let a = tokens("alpha beta", usize::MAX);
        let b = tokens("gamma delta", usize::MAX);
        assert_eq!(jaccard(&a, &b), 0.0);
    }
}
