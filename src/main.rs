//! SmartDoc · Document Assistant Backend
//!
//! - Upload a PDF/TXT document, get an automatic summary
//! - "Ask Anything": questions answered from the document with chat memory
//! - "Challenge Me": three generated questions, graded answers with snippets
//! - Axum HTTP + WebSocket API, one isolated session per user
//!
//! Important env variables:
//!   PORT                       : u16 (default 3000)
//!   OPENAI_API_KEY             : enables the completion model if present
//!   OPENAI_BASE_URL            : default "https://api.openai.com/v1" (any compatible endpoint)
//!   OPENAI_MODEL               : default "gpt-4o-mini"
//!   OPENAI_TIMEOUT_SECS        : request timeout, default 60
//!   SMARTDOC_CONFIG_PATH       : path to TOML config (prompts + limits)
//!   SMARTDOC_MAX_BODY_BYTES    : largest request body, default 32 MiB (base64 uploads)
//!   SMARTDOC_SESSION_IDLE_SECS : idle sessions are swept after this, default 3600
//!   SMARTDOC_MAX_SESSIONS      : live session cap (LRU eviction), default 1000
//!   LOG_LEVEL                  : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT                 : "pretty" (default) or "json"

mod telemetry;
mod util;
mod error;
mod config;
mod document;
mod locator;
mod completion;
mod summary;
mod qa;
mod challenge;
mod session;
mod state;
mod logic;
mod protocol;
mod routes;

use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared application state (completion client, prompts, session registry).
  let state = Arc::new(AppState::from_env());

  // Sweep idle sessions in the background; HTTP clients may never DELETE theirs.
  let sweeper = state.clone();
  tokio::spawn(async move {
    let mut tick = tokio::time::interval(Duration::from_secs(60));
    loop {
      tick.tick().await;
      sweeper.sweep_idle().await;
    }
  });

  // Build the HTTP router with routes, CORS and tracing layers.
  let app = build_router(state.clone());

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "smartdoc", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "smartdoc", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "smartdoc", error = %e, "Failed to listen for shutdown signal");
  }
}
