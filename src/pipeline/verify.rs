//! Post-generation verification of draft replies.
//!
//! The generator is instructed to stay inside the supplied evidence, but
//! a model can still slip a date, time, amount, or link into the draft
//! that appears nowhere in the correspondence. Before persistence, each
//! sentence carrying such a high-risk token unsupported by the evidence
//! is removed. Purely lexical, no extra model call.

use std::sync::LazyLock;

use regex::Regex;

use crate::pipeline::types::{MailMessage, SelectionResult, strip_html};

/// Calendar words that must be evidence-backed: months, weekdays, and
/// common weekday abbreviations. Matched as lowercase substrings.
const CALENDAR_TERMS: [&str; 30] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
    "mon",
    "tue",
    "tues",
    "wed",
    "weds",
    "thu",
    "thur",
    "thurs",
    "fri",
    "sat",
    "sun",
];

// Clock times: 3:30, 3pm, 11 am.
static TIME_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{1,2}:\d{2}\b|\b\d{1,2}\s?(?:am|pm)\b").expect("valid time regex")
});

// Currency amounts, decimals, and 4-digit figures (years).
static AMOUNT_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\d+[\d,]*(?:\.\d+)?|\b\d+\.\d+\b|\b\d{4}\b").expect("valid amount regex")
});

// URLs and mail addresses.
static LINK_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://\S+|\b[\w.-]+@[\w.-]+\b").expect("valid link regex")
});

/// Outcome of a verification pass.
#[derive(Debug)]
pub struct VerifiedDraft {
    pub body: String,
    /// Number of sentences removed as unsupported.
    pub removed: usize,
}

/// Remove draft sentences whose high-risk tokens do not all appear in
/// `evidence`.
///
/// A draft with nothing to cut passes through unchanged. If every
/// sentence would be removed, the draft is kept whole: an empty reply
/// is worse for the operator than a flagged one.
pub fn verify_and_filter(draft: &str, evidence: &str) -> VerifiedDraft {
    let evidence = evidence.to_lowercase();
    let sentences = split_sentences(draft);
    let kept: Vec<&str> = sentences
        .iter()
        .copied()
        .filter(|s| supported(s, &evidence))
        .collect();
    let removed = sentences.len() - kept.len();

    if removed == 0 || kept.is_empty() {
        return VerifiedDraft {
            body: draft.trim().to_string(),
            removed,
        };
    }
    VerifiedDraft {
        body: kept.join(" "),
        removed,
    }
}

/// The evidence a draft is checked against: the incoming message, the
/// best prior match, and the history digests — the same material the
/// prompt presented to the generator.
pub fn evidence_text(incoming: &MailMessage, selection: &SelectionResult) -> String {
    let mut evidence = format!("{}\n{}", incoming.subject, strip_html(&incoming.body));
    if let Some(best) = &selection.best_match {
        evidence.push('\n');
        evidence.push_str(&best.message.subject);
        evidence.push('\n');
        evidence.push_str(&strip_html(&best.message.body));
    }
    for summary in &selection.summaries {
        evidence.push('\n');
        evidence.push_str(summary);
    }
    evidence
}

fn supported(sentence: &str, evidence: &str) -> bool {
    risky_tokens(sentence)
        .iter()
        .all(|token| evidence.contains(token.as_str()))
}

fn risky_tokens(sentence: &str) -> Vec<String> {
    let lower = sentence.to_lowercase();
    let mut tokens = Vec::new();
    for term in CALENDAR_TERMS {
        if lower.contains(term) {
            tokens.push(term.to_string());
        }
    }
    for pattern in [&TIME_TOKEN, &AMOUNT_TOKEN, &LINK_TOKEN] {
        for found in pattern.find_iter(&lower) {
            tokens.push(found.as_str().to_string());
        }
    }
    tokens
}

/// Split on sentence-terminal punctuation followed by whitespace.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut after_terminal = false;
    for (i, c) in text.char_indices() {
        if after_terminal && c.is_whitespace() {
            let sentence = text[start..i].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = i;
        }
        after_terminal = matches!(c, '.' | '!' | '?');
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}
