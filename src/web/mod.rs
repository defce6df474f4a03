// HTTP trigger API — Axum-based service surface.
//
// Two operations: POST /api/scrape runs a one-click sweep of a post and
// responds with the same terminal status string the CLI prints, and
// POST /api/ocr extracts structured fields from a receipt image URL.
// No sessions, no state beyond the shared Config — each scrape request
// assembles its own pipeline, exactly like a CLI invocation.

use std::sync::Arc;

use anyhow::Result;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;

pub mod handlers;

/// Shared application state threaded through all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
}

/// Start the web server and block until it exits.
pub async fn run_server(config: Config, port: u16, bind: &str) -> Result<()> {
    let state = AppState {
        config: Arc::new(config),
    };

    let app = build_router(state);

    let addr = format!("{bind}:{port}");
    info!("Magpie trigger API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/scrape", post(handlers::scrape))
        .route("/api/ocr", post(handlers::ocr))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
