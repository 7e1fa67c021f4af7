//! Public request/response shapes for the HTTP endpoints (serde ready).
//! Incoming bodies are validated here and turned into domain requests.

use serde::{Deserialize, Serialize};

use crate::domain::{ExplanationMode, ExplanationRequest, ExplanationResult, PracticeProblemRequest};
use crate::error::ApiError;

pub const PROVENANCE: &str = "AI Generated";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainIn {
  pub code: Option<String>,
  pub language: Option<String>,
  pub line_number: Option<u32>,
  pub mode: Option<ExplanationMode>,
}

impl TryFrom<ExplainIn> for ExplanationRequest {
  type Error = ApiError;

  fn try_from(body: ExplainIn) -> Result<Self, Self::Error> {
    let code = body.code.filter(|c| !c.is_empty()).ok_or_else(|| missing("code"))?;
    let language = required(body.language, "language")?;
    if body.line_number == Some(0) {
      return Err(ApiError::InvalidRequest("`lineNumber` must be a positive integer".into()));
    }
    Ok(ExplanationRequest {
      code,
      language,
      line_number: body.line_number,
      mode: body.mode.unwrap_or_default(),
    })
  }
}

#[derive(Debug, Serialize)]
pub struct ExplainOut {
  pub explanation: String,
  pub confidence: u8,
  pub provenance: &'static str,
}

impl From<ExplanationResult> for ExplainOut {
  fn from(r: ExplanationResult) -> Self {
    Self { explanation: r.explanation, confidence: r.confidence, provenance: PROVENANCE }
  }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePracticeIn {
  pub language: Option<String>,
  pub difficulty: Option<String>,
  pub topic: Option<String>,
  pub user_id: Option<String>,
}

impl TryFrom<GeneratePracticeIn> for PracticeProblemRequest {
  type Error = ApiError;

  fn try_from(body: GeneratePracticeIn) -> Result<Self, Self::Error> {
    Ok(PracticeProblemRequest {
      language: required(body.language, "language")?,
      difficulty: required(body.difficulty, "difficulty")?,
      topic: required(body.topic, "topic")?,
      requesting_user_id: required(body.user_id, "userId")?,
    })
  }
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
  pub limit: Option<u32>,
}

impl RecentQuery {
  pub const DEFAULT_LIMIT: u32 = 10;
  pub const MAX_LIMIT: u32 = 50;

  pub fn effective_limit(&self) -> u32 {
    self.limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT)
  }
}

#[derive(Serialize)]
pub struct HealthOut {
  pub ok: bool,
  pub generator: bool,
  pub store: &'static str,
}

/// Parse a JSON body regardless of Content-Type.
pub fn parse_body<T: for<'a> Deserialize<'a>>(bytes: &[u8]) -> Result<T, ApiError> {
  serde_json::from_slice(bytes).map_err(|e| ApiError::InvalidRequest(format!("Invalid JSON body: {}", e)))
}

fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
  value
    .map(|v| v.trim().to_string())
    .filter(|v| !v.is_empty())
    .ok_or_else(|| missing(field))
}

fn missing(field: &str) -> ApiError {
  ApiError::InvalidRequest(format!("`{}` is required", field))
}
