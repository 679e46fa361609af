//! Reply synthesis — fixed prompt templates around the generation call.
//!
//! Prompt text lives here so tone and strategy can be tuned without
//! touching orchestration. Every template carries the same guardrail:
//! ground every statement in the supplied evidence, never invent facts,
//! dates, or availability.

use std::sync::Arc;

use crate::error::LlmError;
use crate::llm::{GenerationRequest, TextGenerator};
use crate::pipeline::types::{
    GeneratedReply, MailMessage, SelectionResult, strip_html, truncate_chars,
};

/// Body text handed to the prompt is capped to keep calls bounded.
const BODY_PROMPT_CHARS: usize = 2000;
const REPLY_MAX_TOKENS: u32 = 500;
const REPLY_TEMPERATURE: f32 = 0.7;

pub(crate) const SYSTEM_PROMPT: &str = "You are a professional email assistant. Ground every \
statement strictly in the provided evidence (current email, similar emails, and additional \
context). Do not invent facts, figures, prices, commitments, dates, or availability. If \
something is not present in the evidence, either ask a concise clarifying question or omit \
it. Never propose dates/times unless explicitly present in the evidence. Prefer concise, \
courteous, and unambiguous language.";

/// Turns (incoming, selection) into a generated reply body.
pub struct ReplySynthesizer {
    generator: Arc<dyn TextGenerator>,
}

impl ReplySynthesizer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Generate a reply for `incoming`, informed by the selection result.
    ///
    /// Failure here is terminal for the run: no partial draft is created,
    /// and retry happens only via natural redelivery of the notification.
    pub async fn synthesize(
        &self,
        incoming: &MailMessage,
        selection: &SelectionResult,
    ) -> Result<GeneratedReply, LlmError> {
        let request = GenerationRequest {
            system: SYSTEM_PROMPT.to_string(),
            user: build_prompt(incoming, selection),
            max_tokens: REPLY_MAX_TOKENS,
            temperature: REPLY_TEMPERATURE,
        };
        let body = self.generator.generate(request).await?;
        Ok(GeneratedReply { body })
    }
}

/// Assemble the user prompt from the incoming message, the best match
/// (labeled as how we previously replied in a similar situation), and the
/// bounded summaries of broader history.
pub(crate) fn build_prompt(incoming: &MailMessage, selection: &SelectionResult) -> String {
    let mut prompt = String::from("Using only the evidence below, write a professional reply.\n");

    prompt.push_str("\nEVIDENCE — CURRENT EMAIL\n");
    prompt.push_str(&render_message(incoming));

    if let Some(best) = &selection.best_match {
        prompt.push_str(
            "\n\nEVIDENCE — HOW YOU PREVIOUSLY REPLIED IN A SIMILAR SITUATION\n",
        );
        prompt.push_str(&render_message(&best.message));
    }

    if !selection.summaries.is_empty() {
        prompt.push_str("\n\nEVIDENCE — OTHER PRIOR MESSAGES & DRAFTS WITH THIS SENDER\n");
        prompt.push_str(&selection.summaries.join("\n\n"));
    }

    prompt.push_str(
        "\n\nRequirements:\n\
         - Use only facts present in the evidence. Do not invent details.\n\
         - If information is missing, ask a concise clarifying question.\n\
         - Never propose specific dates/times unless they appear in the evidence.\n\
         - Keep it concise, helpful, and actionable.\n\
         \nReply:",
    );
    prompt
}

fn render_message(message: &MailMessage) -> String {
    format!(
        "From: {}\nSubject: {}\nBody: {}",
        message.sender,
        message.subject,
        truncate_chars(&strip_html(&message.body), BODY_PROMPT_CHARS)
    )
}

/// Wrap generated plain text for the provider's HTML draft body.
pub(crate) fn format_draft_html(body: &str) -> String {
    let wrapped = if body.trim_start().starts_with('<') {
        body.to_string()
    } else {
        format!("<div>{body}</div>")
    };
    wrapped.replace('\n', "<br>")
}
