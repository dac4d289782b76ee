//! Prompt templates for transcript Q&A and free-form meeting replies

use crate::server::services::orchestrator::ChatTurn;
use crate::server::services::vector_index::ScoredChunk;

/// Persona used by smart replies when the caller does not supply one
pub const DEFAULT_ROLE: &str = "You are a senior software engineer. Respond with smart, friendly, high-energy insights that add value.";

const QA_INSTRUCTIONS: &str = "Use the following pieces of a meeting transcript to answer the question at the end.\nIf you don't know the answer, just say that you don't know, don't try to make up an answer.";

/// Build the retrieval-augmented prompt.
///
/// Order is fixed: retrieved context, then prior turns, then the question.
pub fn qa_prompt(context: &[ScoredChunk], history: &[ChatTurn], question: &str) -> String {
  let mut prompt = String::from(QA_INSTRUCTIONS);

  prompt.push_str("\n\nContext:\n");
  let passages: Vec<&str> = context.iter().map(|scored| scored.chunk.text.as_str()).collect();
  prompt.push_str(&passages.join("\n\n"));

  if !history.is_empty() {
    prompt.push_str("\n\nChat history:");
    for turn in history {
      prompt.push_str(&format!("\nHuman: {}\nAssistant: {}", turn.question, turn.answer));
    }
  }

  prompt.push_str(&format!("\n\nQuestion: {}\nHelpful Answer:", question.trim()));
  prompt
}

/// Build the direct reply prompt; blank roles fall back to [`DEFAULT_ROLE`]
pub fn smart_reply_prompt(role: Option<&str>, transcript: &str) -> String {
  let role = role.map(str::trim).filter(|r| !r.is_empty()).unwrap_or(DEFAULT_ROLE);
  format!("{role}\n\nMeeting transcript: {transcript}\n\nReply:")
}
