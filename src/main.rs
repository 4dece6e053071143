//! Challenge of the Week · Backend
//!
//! - Axum HTTP API for weekly challenge templates, submissions and reviews
//! - In-memory template and submission stores
//! - Actor identity taken from headers set by the upstream identity proxy
//!
//! Important env variables:
//!   PORT              : u16 (default 3000)
//!   COTW_CONFIG_PATH  : path to TOML config (progress defaults + optional template bank)
//!   LOG_LEVEL         : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT        : "pretty" (default) or "json"

mod access;
mod config;
mod domain;
mod error;
mod grader;
mod lifecycle;
mod progress;
mod protocol;
mod routes;
mod seeds;
mod state;
mod store;
mod telemetry;
mod templates;
mod util;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

use crate::config::load_service_config_from_env;
use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Build shared application state (template bank, seeds, submission store).
  let cfg = load_service_config_from_env().unwrap_or_default();
  let state = Arc::new(AppState::from_config(cfg, chrono::Utc::now().date_naive()).await);

  // Build the HTTP router with routes, CORS and tracing layers.
  let app = build_router(state.clone());

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "cotw_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(target: "cotw_backend", error = %e, "Failed to listen for Ctrl+C");
    std::future::pending::<()>().await;
  }
  warn!(target: "cotw_backend", "Shutdown signal received, draining connections");
}
