//! HTTP surface: axum router, shared state, and the serve loop.

pub mod chat;
pub mod client_id;
pub mod score;
pub mod upload;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::AppError;
use crate::llm::CompletionBackend;
use crate::quota::QuotaStore;
use crate::tickets::{TicketCache, TICKET_TTL};

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub backend: Arc<dyn CompletionBackend>,
    pub quota: Arc<dyn QuotaStore>,
    pub tickets: Arc<TicketCache>,
    pub config: Config,
}

/// Build the application router over the shared state.
pub fn build_router(state: Arc<AppState>) -> Router {
    // Room for a handful of files plus multipart framing overhead.
    let body_limit = state.config.max_file_bytes * 4 + 64 * 1024;

    Router::new()
        .route("/upload", post(upload::handle_upload))
        .route("/chat", post(chat::handle_chat))
        .route("/score", get(score::handle_score))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok", "service": "twintalk" }))
}

/// Bind and serve until ctrl-c. Also runs the periodic ticket prune so
/// never-polled scoring results don't accumulate for the process lifetime.
pub async fn serve(state: Arc<AppState>) -> Result<(), AppError> {
    let app = build_router(state.clone());

    let listener = tokio::net::TcpListener::bind(&state.config.bind_addr)
        .await
        .map_err(|e| AppError::Internal(format!("failed to bind {}: {e}", state.config.bind_addr)))?;
    tracing::info!("Twintalk listening on http://{}", state.config.bind_addr);

    let tickets = state.tickets.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            tickets.prune(TICKET_TTL);
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))
}
