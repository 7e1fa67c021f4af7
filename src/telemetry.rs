//! Telemetry initialization (tracing/tracing-subscriber).
//!
//! Behavior:
//! - LOG_LEVEL controls the filter (e.g. "debug" or detailed directives like
//!   "info,codementor=debug,explain=debug,practice=debug,tower_http=info").
//! - LOG_FORMAT selects "pretty" (default) or "json" structured logs.
//!
//! Request spans come from the tower-http TraceLayer in `routes`; handlers and
//! upstream calls add their own `#[instrument]` spans on top.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,codementor=debug,explain=debug,practice=debug,tower_http=info,axum=info,sqlx=warn";

pub fn init_tracing() {
  let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_target(true)
    .with_file(true)
    .with_line_number(true);

  match std::env::var("LOG_FORMAT").as_deref() {
    Ok("json") => builder.json().init(),
    _ => builder.init(),
  }
}
