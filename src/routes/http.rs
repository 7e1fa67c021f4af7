//! HTTP endpoint handlers. These are thin wrappers that parse the body and forward
//! to `explain` / `practice`.

use std::sync::Arc;

use axum::{
  body::Bytes,
  extract::{rejection::QueryRejection, Query, State},
  Json,
};
use tracing::{info, instrument};

use crate::domain::{ExplanationRequest, PracticeProblem, PracticeProblemRequest};
use crate::error::ApiError;
use crate::protocol::*;
use crate::state::AppState;
use crate::{explain, practice};

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> Json<HealthOut> {
  Json(HealthOut { ok: true, generator: state.generator.is_some(), store: state.store.backend() })
}

#[instrument(level = "info", skip(state, body), fields(body_len = body.len()))]
pub async fn http_post_explain_code(
  State(state): State<Arc<AppState>>,
  body: Bytes,
) -> Result<Json<ExplainOut>, ApiError> {
  let req = ExplanationRequest::try_from(parse_body::<ExplainIn>(&body)?)?;
  let result = explain::explain_code(&state, &req).await?;
  info!(target: "explain", confidence = result.confidence, explanation_len = result.explanation.len(), "HTTP explanation served");
  Ok(Json(result.into()))
}

#[instrument(level = "info", skip(state, body), fields(body_len = body.len()))]
pub async fn http_post_generate_practice(
  State(state): State<Arc<AppState>>,
  body: Bytes,
) -> Result<Json<PracticeProblem>, ApiError> {
  let req = PracticeProblemRequest::try_from(parse_body::<GeneratePracticeIn>(&body)?)?;
  let problem = practice::generate_problem(&state, &req).await?;
  Ok(Json(problem))
}

#[instrument(level = "info", skip(state, query))]
pub async fn http_get_recent_problems(
  State(state): State<Arc<AppState>>,
  query: Result<Query<RecentQuery>, QueryRejection>,
) -> Result<Json<Vec<PracticeProblem>>, ApiError> {
  let Query(q) = query.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
  let problems = state.store.recent(q.effective_limit()).await?;
  Ok(Json(problems))
}
