//! Router assembly: function endpoints, auxiliary API, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
  http::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    HeaderName, Method,
  },
  routing::{get, post},
  Router,
};
use tower_http::{
  cors::{Any, CorsLayer},
  trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;

/// Preflight responses allow exactly these request headers.
pub fn cors_layer() -> CorsLayer {
  CorsLayer::new()
    .allow_origin(Any)
    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
    .allow_headers([
      AUTHORIZATION,
      HeaderName::from_static("x-client-info"),
      HeaderName::from_static("apikey"),
      CONTENT_TYPE,
    ])
}

/// Build the application router with:
/// - the two function endpoints under `/functions/v1/...`
/// - health and recent-problems reads under `/api/v1/...`
/// - CORS: any origin; OPTIONS on any route is answered by the layer without reaching a handler
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
  Router::new()
    .route("/functions/v1/explain-code", post(http::http_post_explain_code))
    .route("/functions/v1/generate-practice", post(http::http_post_generate_practice))
    .route("/api/v1/health", get(http::http_health))
    .route("/api/v1/problems", get(http::http_get_recent_problems))
    .with_state(state)
    .layer(cors_layer())
    .layer(
      TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
}
