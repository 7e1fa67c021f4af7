//! CodeMentor · code explanation and practice problem backend
//!
//! - Axum HTTP API (explain-code, generate-practice, recent problems, health)
//! - Gemini integration (via environment variables)
//! - PostgreSQL persistence, or an in-memory store when no database is configured
//!
//! Important env variables:
//!   PORT                     : u16 (default 3000)
//!   GEMINI_API_KEY           : upstream credential; requests fail with a configuration error without it
//!   GEMINI_BASE_URL          : default "https://generativelanguage.googleapis.com/v1beta"
//!   GEMINI_MODEL             : default "gemini-pro"
//!   DATABASE_URL             : PostgreSQL URL; unset keeps problems in memory
//!   DATABASE_MAX_CONNECTIONS : pool size (default 5)
//!   PROMPTS_CONFIG_PATH      : path to TOML config (prompt templates + generation parameters)
//!   LOG_LEVEL                : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT               : "pretty" (default) or "json"

mod config;
mod domain;
mod error;
mod explain;
mod gemini;
mod practice;
mod protocol;
mod routes;
mod state;
mod store;
mod telemetry;
mod util;

#[cfg(test)]
mod testing;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::AppConfig;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let cfg = AppConfig::from_env();

  // Gemini client (if keyed) and the problem store.
  let state = Arc::new(AppState::from_config(&cfg).await?);

  let app = build_router(state);

  let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
  let listener = TcpListener::bind(addr).await?;
  info!(target: "codementor", %addr, "HTTP server listening");
  axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
  info!(target: "codementor", "HTTP server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "codementor", error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  info!(target: "codementor", "Shutdown signal received");
}
