//! Generative model abstraction and its OpenAI chat-completions implementation

use std::collections::VecDeque;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::server::services::errors::ServiceError;
use crate::server::services::openai::{self, OpenAiSettings};

/// Fragments of a model answer in generation order
pub type TokenStream = BoxStream<'static, Result<String, ServiceError>>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationService: Send + Sync {
  /// Complete a prompt and return the whole answer
  async fn complete(&self, prompt: &str) -> Result<String, ServiceError>;

  /// Complete a prompt, yielding the answer as it is generated
  async fn stream(&self, prompt: &str) -> Result<TokenStream, ServiceError>;
}

/// Sampling parameters sent with every completion
#[derive(Debug, Clone, Copy)]
pub struct GenerationParams {
  pub temperature: f32,
  pub max_tokens: usize,
}

impl Default for GenerationParams {
  fn default() -> Self {
    Self { temperature: 0.0, max_tokens: 512 }
  }
}

/// Chat client for OpenAI-compatible `/chat/completions` endpoints
#[derive(Clone)]
pub struct OpenAiChat {
  client: Client,
  endpoint: String,
  model: String,
  params: GenerationParams,
  timeout: Duration,
}

impl OpenAiChat {
  pub fn new(settings: &OpenAiSettings, model: String, params: GenerationParams) -> Result<Self> {
    anyhow::ensure!(!model.trim().is_empty(), "missing chat model name");
    Ok(Self {
      client: openai::build_client(settings)?,
      endpoint: settings.endpoint("chat/completions"),
      model,
      params,
      timeout: settings.timeout,
    })
  }

  pub fn model(&self) -> &str {
    &self.model
  }

  fn request<'a>(&'a self, prompt: &'a str, stream: bool) -> ChatRequest<'a> {
    ChatRequest {
      model: &self.model,
      temperature: self.params.temperature,
      max_tokens: self.params.max_tokens,
      stream,
      messages: vec![ChatMessage { role: "user", content: prompt }],
    }
  }
}

#[async_trait]
impl GenerationService for OpenAiChat {
  async fn complete(&self, prompt: &str) -> Result<String, ServiceError> {
    let response = self
      .client
      .post(&self.endpoint)
      .timeout(self.timeout)
      .json(&self.request(prompt, false))
      .send()
      .await?;
    let response = openai::check_status(response).await?;
    let body = response.text().await?;
    parse_chat_response(&body)
  }

  async fn stream(&self, prompt: &str) -> Result<TokenStream, ServiceError> {
    let response = self.client.post(&self.endpoint).json(&self.request(prompt, true)).send().await?;
    let response = openai::check_status(response).await?;
    let bytes = response.bytes_stream().map(|chunk| chunk.map_err(ServiceError::from)).boxed();
    Ok(decode_event_stream(bytes))
  }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
  model: &'a str,
  temperature: f32,
  max_tokens: usize,
  #[serde(skip_serializing_if = "std::ops::Not::not")]
  stream: bool,
  messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
  role: &'a str,
  content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
  choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
  message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
  content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkResponse {
  #[serde(default)]
  choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
  #[serde(default)]
  delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
  content: Option<String>,
}

fn parse_chat_response(body: &str) -> Result<String, ServiceError> {
  let parsed: ChatResponse = serde_json::from_str(body)
    .map_err(|e| ServiceError::malformed(format!("failed to parse chat response: {e}")))?;
  parsed
    .choices
    .into_iter()
    .next()
    .and_then(|choice| choice.message.content)
    .ok_or_else(|| ServiceError::malformed("chat response has no message content"))
}

/// One decoded server-sent event line
#[derive(Debug, PartialEq)]
enum SseLine {
  Fragment(String),
  Done,
  Skip,
}

fn parse_sse_line(line: &str) -> Result<SseLine, ServiceError> {
  let line = line.trim_end_matches('\r');
  let Some(payload) = line.strip_prefix("data:") else {
    // blank separators, `:` comments, `event:`/`id:` fields
    return Ok(SseLine::Skip);
  };
  let payload = payload.trim_start();
  if payload == "[DONE]" {
    return Ok(SseLine::Done);
  }

  let chunk: ChunkResponse = serde_json::from_str(payload)
    .map_err(|e| ServiceError::malformed(format!("failed to parse stream chunk: {e}")))?;
  let content = chunk.choices.into_iter().next().and_then(|choice| choice.delta.content);
  Ok(match content {
    Some(text) if !text.is_empty() => SseLine::Fragment(text),
    _ => SseLine::Skip,
  })
}

struct DecodeState<S> {
  bytes: S,
  buffer: Vec<u8>,
  pending: VecDeque<Result<String, ServiceError>>,
  finished: bool,
}

impl<S> DecodeState<S> {
  /// Move every complete line out of the buffer into `pending`
  fn drain_lines(&mut self) {
    while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
      let raw: Vec<u8> = self.buffer.drain(..=newline).collect();
      self.push_line(&raw[..raw.len() - 1]);
      if self.finished {
        return;
      }
    }
  }

  fn push_line(&mut self, raw: &[u8]) {
    let line = String::from_utf8_lossy(raw);
    match parse_sse_line(&line) {
      Ok(SseLine::Fragment(text)) => self.pending.push_back(Ok(text)),
      Ok(SseLine::Skip) => {}
      Ok(SseLine::Done) => self.finished = true,
      Err(e) => {
        self.pending.push_back(Err(e));
        self.finished = true;
      }
    }
  }
}

/// Turn a raw SSE byte stream into answer fragments.
///
/// Lines split across network reads are buffered until complete. The stream
/// ends at `[DONE]`, at the end of the body, or right after the first error.
pub fn decode_event_stream<S, B>(bytes: S) -> TokenStream
where
  S: futures::Stream<Item = Result<B, ServiceError>> + Send + Unpin + 'static,
  B: AsRef<[u8]> + Send + 'static,
{
  let state = DecodeState { bytes, buffer: Vec::new(), pending: VecDeque::new(), finished: false };

  stream::unfold(state, |mut state| async move {
    loop {
      if let Some(item) = state.pending.pop_front() {
        return Some((item, state));
      }
      if state.finished {
        return None;
      }
      match state.bytes.next().await {
        Some(Ok(chunk)) => {
          state.buffer.extend_from_slice(chunk.as_ref());
          state.drain_lines();
        }
        Some(Err(e)) => {
          state.pending.push_back(Err(e));
          state.finished = true;
        }
        None => {
          // flush a final line that had no trailing newline
          if !state.buffer.is_empty() {
            let rest = std::mem::take(&mut state.buffer);
            state.push_line(&rest);
          }
          state.finished = true;
        }
      }
    }
  })
  .boxed()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn chunk(content: &str) -> String {
    format!("data: {}\n\n", serde_json::json!({"choices": [{"delta": {"content": content}}]}))
  }

  async fn collect(parts: Vec<String>) -> Vec<Result<String, ServiceError>> {
    let bytes = stream::iter(parts.into_iter().map(|p| Ok::<_, ServiceError>(p.into_bytes())));
    decode_event_stream(bytes).collect().await
  }

  async fn fragments(parts: Vec<String>) -> Vec<String> {
    collect(parts).await.into_iter().map(Result::unwrap).collect()
  }

  #[test]
  fn test_parse_chat_response_takes_first_choice() {
    let body = r#"{"choices":[{"message":{"role":"assistant","content":"FAISS is a library."}}]}"#;
    assert_eq!(parse_chat_response(body).unwrap(), "FAISS is a library.");
  }

  #[test]
  fn test_parse_chat_response_without_choices_is_malformed() {
    assert!(matches!(parse_chat_response(r#"{"choices":[]}"#), Err(ServiceError::Malformed { .. })));
  }

  #[test]
  fn test_parse_chat_response_with_null_content_is_malformed() {
    let body = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
    assert!(matches!(parse_chat_response(body), Err(ServiceError::Malformed { .. })));
  }

  #[test]
  fn test_parse_sse_line_variants() {
    assert_eq!(parse_sse_line("").unwrap(), SseLine::Skip);
    assert_eq!(parse_sse_line(": keep-alive").unwrap(), SseLine::Skip);
    assert_eq!(parse_sse_line("event: message").unwrap(), SseLine::Skip);
    assert_eq!(parse_sse_line("data: [DONE]").unwrap(), SseLine::Done);
    assert_eq!(parse_sse_line("data:[DONE]\r").unwrap(), SseLine::Done);
    assert_eq!(
      parse_sse_line(r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#).unwrap(),
      SseLine::Fragment("Hel".to_string())
    );
    assert_eq!(
      parse_sse_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#).unwrap(),
      SseLine::Skip
    );
    assert!(parse_sse_line("data: {not json").is_err());
  }

  #[tokio::test]
  async fn test_decode_yields_fragments_in_order() {
    let body = format!("{}{}data: [DONE]\n\n", chunk("Hel"), chunk("lo"));
    let fragments = fragments(vec![body]).await;
    assert_eq!(fragments, vec!["Hel", "lo"]);
    assert_eq!(fragments.concat(), "Hello");
  }

  #[tokio::test]
  async fn test_decode_buffers_lines_split_across_reads() {
    let parts = [
      "data: {\"choices\":[{\"del",
      "ta\":{\"content\":\"Hel\"}}]}\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}",
      "\n\ndata: [DO",
      "NE]\n\n",
    ];
    let fragments = fragments(parts.iter().map(|p| p.to_string()).collect()).await;
    assert_eq!(fragments, vec!["Hel", "lo"]);
  }

  #[tokio::test]
  async fn test_decode_stops_at_done() {
    let body = format!("{}data: [DONE]\n\n{}", chunk("kept"), chunk("dropped"));
    assert_eq!(fragments(vec![body]).await, vec!["kept"]);
  }

  #[tokio::test]
  async fn test_decode_flushes_unterminated_last_line() {
    let body = "data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}".to_string();
    assert_eq!(fragments(vec![body]).await, vec!["tail"]);
  }

  #[tokio::test]
  async fn test_decode_ends_after_malformed_chunk() {
    let items = collect(vec![chunk("ok"), "data: nope\n".to_string(), chunk("never")]).await;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().unwrap(), "ok");
    assert!(matches!(items[1], Err(ServiceError::Malformed { .. })));
  }

  #[tokio::test]
  async fn test_decode_forwards_transport_errors() {
    let bytes = stream::iter(vec![
      Ok::<&[u8], ServiceError>(b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n"),
      Err(ServiceError::transport("connection reset")),
    ]);
    let items: Vec<_> = decode_event_stream(bytes).collect().await;
    assert_eq!(items.len(), 2);
    assert_eq!(items[1], Err(ServiceError::transport("connection reset")));
  }

  #[test]
  fn test_request_omits_stream_flag_unless_streaming() {
    let settings = OpenAiSettings {
      api_key: "sk-test".to_string(),
      base_url: "http://localhost:1".to_string(),
      timeout: Duration::from_secs(1),
    };
    let chat = OpenAiChat::new(&settings, "gpt-4".to_string(), GenerationParams::default()).unwrap();

    let plain = serde_json::to_value(chat.request("hi", false)).unwrap();
    assert!(plain.get("stream").is_none());
    assert_eq!(plain["model"], "gpt-4");
    assert_eq!(plain["messages"][0]["role"], "user");
    assert_eq!(plain["messages"][0]["content"], "hi");

    let streaming = serde_json::to_value(chat.request("hi", true)).unwrap();
    assert_eq!(streaming["stream"], true);
  }
}
