use std::convert::Infallible;
use std::time::Duration;

use axum::{body::Body, http::header, routing::post, Router};
use futures::stream::{self, StreamExt};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header as header_is, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use huddle::server::services::embeddings::{EmbeddingService, OpenAiEmbeddings};
use huddle::server::services::errors::ServiceError;
use huddle::server::services::generation::{GenerationParams, GenerationService, OpenAiChat};
use huddle::server::services::openai::OpenAiSettings;

const API_KEY: &str = "sk-test";

fn settings(base_url: &str, timeout: Duration) -> OpenAiSettings {
  OpenAiSettings { api_key: API_KEY.to_string(), base_url: base_url.to_string(), timeout }
}

fn embeddings(server: &MockServer, batch_size: usize) -> OpenAiEmbeddings {
  let settings = settings(&server.uri(), Duration::from_secs(5));
  OpenAiEmbeddings::new(&settings, "text-embedding-3-small".to_string(), batch_size).unwrap()
}

fn chat(base_url: &str, timeout: Duration) -> OpenAiChat {
  OpenAiChat::new(&settings(base_url, timeout), "gpt-4o-mini".to_string(), GenerationParams::default()).unwrap()
}

fn chunk(content: &str) -> String {
  format!("data: {}\n\n", json!({"choices": [{"delta": {"content": content}}]}))
}

async fn collect(chat: &OpenAiChat) -> Vec<Result<String, ServiceError>> {
  chat.stream("Summarize the meeting").await.unwrap().collect().await
}

/// Serve `/chat/completions` as an event stream, sleeping before each part
async fn serve_paced_stream(parts: Vec<(Duration, String)>) -> String {
  let app = Router::new().route(
    "/chat/completions",
    post(move || {
      let parts = parts.clone();
      async move {
        let body = stream::iter(parts).then(|(delay, part)| async move {
          tokio::time::sleep(delay).await;
          Ok::<_, Infallible>(part)
        });
        ([(header::CONTENT_TYPE, "text/event-stream")], Body::from_stream(body))
      }
    }),
  );

  let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  tokio::spawn(async move {
    axum::serve(listener, app).await.unwrap();
  });
  format!("http://{addr}")
}

#[tokio::test]
async fn test_embed_sends_bearer_token_and_model() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .and(path("/embeddings"))
    .and(header_is("authorization", "Bearer sk-test"))
    .and(body_partial_json(json!({"model": "text-embedding-3-small"})))
    .respond_with(
      ResponseTemplate::new(200).set_body_json(json!({"data": [{"index": 0, "embedding": [0.5, 0.25]}]})),
    )
    .expect(1)
    .mount(&server)
    .await;

  let vector = embeddings(&server, 32).embed("standup notes").await.unwrap();
  assert_eq!(vector, vec![0.5, 0.25]);
}

#[tokio::test]
async fn test_embed_401_is_unauthorized() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .and(path("/embeddings"))
    .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
    .mount(&server)
    .await;

  let err = embeddings(&server, 32).embed("hello").await.unwrap_err();
  assert_eq!(err, ServiceError::Unauthorized { status: 401, body: "invalid api key".to_string() });
}

#[tokio::test]
async fn test_embed_429_is_rate_limited() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .and(path("/embeddings"))
    .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
    .mount(&server)
    .await;

  let err = embeddings(&server, 32).embed("hello").await.unwrap_err();
  assert_eq!(err, ServiceError::RateLimited { body: "slow down".to_string() });
}

#[tokio::test]
async fn test_embed_batch_splits_requests_and_keeps_input_order() {
  let server = MockServer::start().await;
  // Answers out of order; each vector is the numeric suffix of its input
  Mock::given(method("POST"))
    .and(path("/embeddings"))
    .respond_with(|request: &Request| {
      let body: Value = request.body_json().unwrap();
      let data: Vec<Value> = body["input"]
        .as_array()
        .unwrap()
        .iter()
        .enumerate()
        .rev()
        .map(|(index, input)| {
          let n: f32 = input.as_str().unwrap()[1..].parse().unwrap();
          json!({"index": index, "embedding": [n]})
        })
        .collect();
      ResponseTemplate::new(200).set_body_json(json!({"data": data}))
    })
    .expect(3)
    .mount(&server)
    .await;

  let texts: Vec<String> = (0..70).map(|i| format!("t{i}")).collect();
  let vectors = embeddings(&server, 32).embed_batch(&texts).await.unwrap();

  let expected: Vec<Vec<f32>> = (0..70).map(|i| vec![i as f32]).collect();
  assert_eq!(vectors, expected);

  let sizes: Vec<usize> = server
    .received_requests()
    .await
    .unwrap()
    .iter()
    .map(|request| request.body_json::<Value>().unwrap()["input"].as_array().unwrap().len())
    .collect();
  assert_eq!(sizes, vec![32, 32, 6]);
}

#[tokio::test]
async fn test_embed_batch_stops_at_first_failed_batch() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .and(path("/embeddings"))
    .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
    .expect(1)
    .mount(&server)
    .await;

  let texts: Vec<String> = (0..10).map(|i| format!("t{i}")).collect();
  let err = embeddings(&server, 4).embed_batch(&texts).await.unwrap_err();
  assert_eq!(err, ServiceError::Status { status: 500, body: "overloaded".to_string() });
}

#[tokio::test]
async fn test_complete_returns_first_choice_content() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .and(path("/chat/completions"))
    .and(header_is("authorization", "Bearer sk-test"))
    .and(body_partial_json(json!({"model": "gpt-4o-mini", "temperature": 0.0, "max_tokens": 512})))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
      "choices": [{"index": 0, "message": {"role": "assistant", "content": "We ship on Friday."}}]
    })))
    .expect(1)
    .mount(&server)
    .await;

  let answer = chat(&server.uri(), Duration::from_secs(5)).complete("When do we ship?").await.unwrap();
  assert_eq!(answer, "We ship on Friday.");
}

#[tokio::test]
async fn test_complete_gives_up_after_timeout() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .and(path("/chat/completions"))
    .respond_with(
      ResponseTemplate::new(200)
        .set_delay(Duration::from_secs(3))
        .set_body_json(json!({"choices": [{"message": {"content": "too late"}}]})),
    )
    .mount(&server)
    .await;

  let err = chat(&server.uri(), Duration::from_millis(300)).complete("Anyone there?").await.unwrap_err();
  assert!(matches!(err, ServiceError::Transport { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_stream_yields_fragments_in_order() {
  let server = MockServer::start().await;
  let body = format!("{}{}data: [DONE]\n\n", chunk("Hel"), chunk("lo"));
  Mock::given(method("POST"))
    .and(path("/chat/completions"))
    .and(body_partial_json(json!({"stream": true})))
    .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
    .expect(1)
    .mount(&server)
    .await;

  let items = collect(&chat(&server.uri(), Duration::from_secs(5))).await;
  let fragments: Vec<String> = items.into_iter().map(Result::unwrap).collect();
  assert_eq!(fragments, vec!["Hel", "lo"]);
}

#[tokio::test]
async fn test_stream_ends_after_malformed_chunk() {
  let server = MockServer::start().await;
  let body = format!("{}data: {{oops\n\n{}", chunk("Hel"), chunk("lo"));
  Mock::given(method("POST"))
    .and(path("/chat/completions"))
    .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
    .mount(&server)
    .await;

  let items = collect(&chat(&server.uri(), Duration::from_secs(5))).await;
  assert_eq!(items.len(), 2);
  assert_eq!(items[0], Ok("Hel".to_string()));
  assert!(matches!(items[1], Err(ServiceError::Malformed { .. })));
}

#[tokio::test]
async fn test_stream_error_status_fails_before_first_fragment() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .and(path("/chat/completions"))
    .respond_with(ResponseTemplate::new(429).set_body_string("quota"))
    .mount(&server)
    .await;

  let err = chat(&server.uri(), Duration::from_secs(5)).stream("hi").await.err().unwrap();
  assert_eq!(err, ServiceError::RateLimited { body: "quota".to_string() });
}

#[tokio::test]
async fn test_stalled_stream_fails_as_transport_error() {
  let base_url = serve_paced_stream(vec![
    (Duration::ZERO, chunk("Hel")),
    (Duration::from_secs(3), chunk("lo")),
  ])
  .await;

  let items = collect(&chat(&base_url, Duration::from_millis(300))).await;
  assert_eq!(items.len(), 2);
  assert_eq!(items[0], Ok("Hel".to_string()));
  assert!(matches!(items[1], Err(ServiceError::Transport { .. })), "got {:?}", items[1]);
}

#[tokio::test]
async fn test_steady_stream_may_outlast_the_timeout() {
  let mut parts: Vec<(Duration, String)> =
    ["a", "b", "c", "d", "e"].iter().map(|part| (Duration::from_millis(200), chunk(part))).collect();
  parts.push((Duration::ZERO, "data: [DONE]\n\n".to_string()));
  let base_url = serve_paced_stream(parts).await;

  let items = collect(&chat(&base_url, Duration::from_millis(500))).await;
  let fragments: Vec<String> = items.into_iter().map(Result::unwrap).collect();
  assert_eq!(fragments.concat(), "abcde");
}
