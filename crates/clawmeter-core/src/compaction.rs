use crate::types::{ChatMessage, Role};

/// Messages kept verbatim at the end of the history when summarizing.
pub const DEFAULT_KEEP_RECENT: usize = 6;

/// Split a conversation into `(older, recent)`.
///
/// `recent` is the last `keep_recent` messages plus any leading system
/// messages, which are never summarized. `older` is what gets handed to the
/// summarizer; it is empty when there's nothing worth compacting.
pub fn split_for_summary(
    messages: &[ChatMessage],
    keep_recent: usize,
) -> (Vec<ChatMessage>, Vec<ChatMessage>) {
    let pinned = messages
        .iter()
        .take_while(|m| m.role == Role::System)
        .count();
    let body = &messages[pinned..];
    let cut = body.len().saturating_sub(keep_recent);

    let older = body[..cut].to_vec();
    let mut recent = messages[..pinned].to_vec();
    recent.extend_from_slice(&body[cut..]);
    (older, recent)
}

/// Build the prompt sent to the summarization model for the given messages.
pub fn build_summarization_prompt(older: &[ChatMessage]) -> String {
    let transcript = older
        .iter()
        .map(|m| {
            let speaker = match &m.name {
                Some(name) => format!("{} ({})", m.role.as_str(), name),
                None => m.role.as_str().to_string(),
            };
            format!("{}: {}", speaker, m.display_text())
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Please summarize the key points, decisions, and context from the conversation \
         below. Focus on: active tasks, important decisions made, user preferences \
         learned, and any open questions. Keep it under 2000 characters. Output only \
         the summary, no preamble.\n\n<conversation>\n{}\n</conversation>",
        transcript
    )
}
