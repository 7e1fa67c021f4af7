//! Minimal Gemini client for our use-cases.
//!
//! We only call `models/{model}:generateContent` with a single user text part and
//! read back the first candidate's first text part.
//! Calls are instrumented and log model names, latencies, and response sizes (not contents).
//!
//! NOTE: the API key travels in the query string, so request URLs are never logged.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, instrument};

use crate::config::GeminiSettings;

/// Sampling parameters for one upstream call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GenerationParams {
  pub temperature: f32,
  pub max_output_tokens: u32,
}

#[derive(Debug, Error)]
pub enum GenerationError {
  #[error("GEMINI_API_KEY not found")]
  MissingCredential,

  /// The request could not be sent or the response body could not be read.
  #[error("Upstream transport error: {0}")]
  Transport(String),

  /// The upstream answered with a non-success status.
  #[error("Upstream API error {status}: {message}")]
  Api { status: u16, message: String },

  /// The upstream answered 2xx but the body is not a generateContent response.
  #[error("Upstream returned malformed body: {0}")]
  Malformed(String),
}

/// Anything that turns a prompt into text. `Ok(None)` means the upstream
/// answered but produced no usable text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
  async fn generate(&self, prompt: &str, params: GenerationParams) -> Result<Option<String>, GenerationError>;
}

#[derive(Clone)]
pub struct GeminiClient {
  client: reqwest::Client,
  api_key: String,
  pub base_url: String,
  pub model: String,
}

impl GeminiClient {
  /// Build the client; fails with `MissingCredential` when no API key is configured.
  pub fn from_settings(settings: &GeminiSettings) -> Result<Self, GenerationError> {
    let api_key = settings.api_key.clone().ok_or(GenerationError::MissingCredential)?;
    let client = reqwest::Client::builder()
      .connect_timeout(Duration::from_secs(10))
      .build()
      .map_err(|e| GenerationError::Transport(e.to_string()))?;

    Ok(Self {
      client,
      api_key,
      base_url: settings.base_url.trim_end_matches('/').to_string(),
      model: settings.model.clone(),
    })
  }

  fn api_url(&self, method: &str) -> String {
    format!("{}/models/{}:{}?key={}", self.base_url, self.model, method, self.api_key)
  }
}

#[async_trait]
impl TextGenerator for GeminiClient {
  #[instrument(level = "info", skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
  async fn generate(&self, prompt: &str, params: GenerationParams) -> Result<Option<String>, GenerationError> {
    let req = GenerateContentRequest::single_prompt(prompt, params);
    let start = Instant::now();

    let res = self
      .client
      .post(self.api_url("generateContent"))
      .header(USER_AGENT, "codementor-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .json(&req)
      .send()
      .await
      .map_err(|e| GenerationError::Transport(e.without_url().to_string()))?;

    let status = res.status();
    let body = res
      .text()
      .await
      .map_err(|e| GenerationError::Transport(e.without_url().to_string()))?;
    let elapsed = start.elapsed();

    if !status.is_success() {
      let message = extract_gemini_error(&body).unwrap_or_else(|| crate::util::trunc_for_log(&body, 200));
      error!(?elapsed, status = status.as_u16(), "Gemini call failed");
      return Err(GenerationError::Api { status: status.as_u16(), message });
    }

    let text = parse_generate_response(&body)?;
    info!(?elapsed, body_len = body.len(), text_len = text.as_deref().map_or(0, str::len), "Gemini response received");
    Ok(text)
  }
}

/// Pull the first candidate's first text part out of a generateContent body.
/// Blank text counts as no text.
pub fn parse_generate_response(body: &str) -> Result<Option<String>, GenerationError> {
  let parsed: GenerateContentResponse =
    serde_json::from_str(body).map_err(|e| GenerationError::Malformed(e.to_string()))?;

  if let Some(usage) = &parsed.usage_metadata {
    info!(prompt_tokens = ?usage.prompt_token_count, candidates_tokens = ?usage.candidates_token_count, total_tokens = ?usage.total_token_count, "Gemini usage");
  }

  let text = parsed
    .candidates
    .into_iter()
    .next()
    .and_then(|c| c.content)
    .and_then(|c| c.parts.into_iter().next())
    .and_then(|p| p.text)
    .filter(|t| !t.trim().is_empty());
  Ok(text)
}

// --- generateContent DTOs ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
  contents: Vec<ContentReq>,
  generation_config: GenerationConfig,
}

impl GenerateContentRequest {
  fn single_prompt(prompt: &str, params: GenerationParams) -> Self {
    Self {
      contents: vec![ContentReq { parts: vec![PartReq { text: prompt.to_string() }] }],
      generation_config: GenerationConfig {
        temperature: params.temperature,
        max_output_tokens: params.max_output_tokens,
      },
    }
  }
}

#[derive(Serialize)]
struct ContentReq { parts: Vec<PartReq> }
#[derive(Serialize)]
struct PartReq { text: String }
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
  temperature: f32,
  max_output_tokens: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
  #[serde(default)] candidates: Vec<Candidate>,
  #[serde(default)] usage_metadata: Option<UsageMetadata>,
}
#[derive(Deserialize)]
struct Candidate { #[serde(default)] content: Option<ContentResp> }
#[derive(Deserialize)]
struct ContentResp { #[serde(default)] parts: Vec<PartResp> }
#[derive(Deserialize)]
struct PartResp { #[serde(default)] text: Option<String> }
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
  #[serde(default)] prompt_token_count: Option<u32>,
  #[serde(default)] candidates_token_count: Option<u32>,
  #[serde(default)] total_token_count: Option<u32>,
}

/// Try to extract a clean error message from a Gemini error body.
fn extract_gemini_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn request_body_matches_generate_content_shape() {
    let req = GenerateContentRequest::single_prompt("hello", GenerationParams { temperature: 0.5, max_output_tokens: 1000 });
    let v = serde_json::to_value(&req).unwrap();
    assert_eq!(v["contents"][0]["parts"][0]["text"], "hello");
    assert_eq!(v["generationConfig"]["temperature"], 0.5);
    assert_eq!(v["generationConfig"]["maxOutputTokens"], 1000);
  }

  #[test]
  fn parses_first_candidate_text() {
    let body = r#"{"candidates":[{"content":{"parts":[{"text":"first"},{"text":"second"}]}},
      {"content":{"parts":[{"text":"other"}]}}],"usageMetadata":{"totalTokenCount":12}}"#;
    assert_eq!(parse_generate_response(body).unwrap().as_deref(), Some("first"));
  }

  #[test]
  fn missing_or_blank_text_is_none() {
    assert_eq!(parse_generate_response("{}").unwrap(), None);
    assert_eq!(parse_generate_response(r#"{"candidates":[]}"#).unwrap(), None);
    assert_eq!(parse_generate_response(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).unwrap(), None);
    assert_eq!(parse_generate_response(r#"{"candidates":[{"content":{"parts":[{"text":"  "}]}}]}"#).unwrap(), None);
  }

  #[test]
  fn non_json_body_is_malformed() {
    assert!(matches!(parse_generate_response("<html>"), Err(GenerationError::Malformed(_))));
  }

  #[test]
  fn extracts_api_error_message() {
    let body = r#"{"error":{"code":400,"message":"API key not valid.","status":"INVALID_ARGUMENT"}}"#;
    assert_eq!(extract_gemini_error(body).as_deref(), Some("API key not valid."));
    assert_eq!(extract_gemini_error("nope"), None);
  }

  #[test]
  fn client_requires_api_key() {
    let settings = GeminiSettings {
      api_key: None,
      base_url: "http://localhost:1".into(),
      model: "gemini-pro".into(),
    };
    assert!(matches!(GeminiClient::from_settings(&settings), Err(GenerationError::MissingCredential)));
  }

  #[test]
  fn api_url_uses_model_and_trimmed_base() {
    let settings = GeminiSettings {
      api_key: Some("k".into()),
      base_url: "http://example.test/v1beta/".into(),
      model: "gemini-pro".into(),
    };
    let c = GeminiClient::from_settings(&settings).unwrap();
    assert_eq!(c.api_url("generateContent"), "http://example.test/v1beta/models/gemini-pro:generateContent?key=k");
  }

  mod http {
    use serde_json::{json, Value};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const KEY: &str = "test-key-9f2c";
    const PARAMS: GenerationParams = GenerationParams { temperature: 0.5, max_output_tokens: 1000 };

    fn client_for(base_url: &str) -> GeminiClient {
      GeminiClient::from_settings(&GeminiSettings {
        api_key: Some(KEY.into()),
        base_url: base_url.into(),
        model: "gemini-pro".into(),
      })
      .unwrap()
    }

    async fn serve(response: ResponseTemplate) -> MockServer {
      let server = MockServer::start().await;
      Mock::given(method("POST"))
        .and(path("/models/gemini-pro:generateContent"))
        .and(query_param("key", KEY))
        .respond_with(response)
        .expect(1)
        .mount(&server)
        .await;
      server
    }

    #[tokio::test]
    async fn returns_candidate_text_and_sends_prompt() {
      let server = serve(
        ResponseTemplate::new(200).set_body_json(json!({"candidates": [{"content": {"parts": [{"text": "It adds."}]}}]})),
      )
      .await;

      let text = client_for(&server.uri()).generate("explain a+b", PARAMS).await.unwrap();
      assert_eq!(text.as_deref(), Some("It adds."));

      let received = server.received_requests().await.unwrap();
      assert_eq!(received.len(), 1);
      let sent: Value = serde_json::from_slice(&received[0].body).unwrap();
      assert_eq!(sent["contents"][0]["parts"][0]["text"], "explain a+b");
      assert_eq!(sent["generationConfig"], json!({"temperature": 0.5, "maxOutputTokens": 1000}));
    }

    #[tokio::test]
    async fn no_candidates_is_none() {
      let server = serve(ResponseTemplate::new(200).set_body_json(json!({"candidates": []}))).await;
      assert_eq!(client_for(&server.uri()).generate("p", PARAMS).await.unwrap(), None);
    }

    #[tokio::test]
    async fn error_status_carries_gemini_message() {
      let server = serve(ResponseTemplate::new(400).set_body_json(
        json!({"error": {"code": 400, "message": "API key not valid.", "status": "INVALID_ARGUMENT"}}),
      ))
      .await;

      let err = client_for(&server.uri()).generate("p", PARAMS).await.unwrap_err();
      match &err {
        GenerationError::Api { status, message } => {
          assert_eq!(*status, 400);
          assert_eq!(message, "API key not valid.");
        }
        other => panic!("expected Api error, got {other:?}"),
      }
      assert!(!err.to_string().contains(KEY));
    }

    #[tokio::test]
    async fn error_status_without_gemini_body_keeps_raw_text() {
      let server = serve(ResponseTemplate::new(503).set_body_string("upstream overloaded")).await;
      let err = client_for(&server.uri()).generate("p", PARAMS).await.unwrap_err();
      assert!(matches!(&err, GenerationError::Api { status: 503, message } if message == "upstream overloaded"));
    }

    #[tokio::test]
    async fn non_json_success_body_is_malformed() {
      let server = serve(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>")).await;
      let err = client_for(&server.uri()).generate("p", PARAMS).await.unwrap_err();
      assert!(matches!(err, GenerationError::Malformed(_)));
      assert!(!err.to_string().contains(KEY));
    }

    #[tokio::test]
    async fn unreachable_upstream_is_transport_without_key() {
      let err = client_for("http://127.0.0.1:1").generate("p", PARAMS).await.unwrap_err();
      assert!(matches!(err, GenerationError::Transport(_)));
      assert!(!err.to_string().contains(KEY), "{err}");
    }
  }
}
