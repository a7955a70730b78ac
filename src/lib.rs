//! Twintalk — derive persona style profiles from uploaded chat exports and
//! let the user practice-chat against an AI impersonating each persona.
//!
//! The interesting machinery is the upload pipeline under [`ingest`]
//! (format parsing, thread reconstruction, representative sampling) and the
//! defensive profile extraction in [`extractor`]; everything else is thin
//! orchestration over the completion backend.

pub mod config;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod llm;
pub mod logging;
pub mod profile;
pub mod prompts;
pub mod quota;
pub mod server;
pub mod tickets;
pub mod validation;

use std::sync::Arc;

use config::Config;
use error::AppError;
use llm::HttpLlmClient;
use quota::InMemoryQuotaStore;
use server::AppState;
use tickets::TicketCache;

/// Boot the service: env, logging, config, shared state, HTTP server.
pub async fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    logging::init();

    tracing::info!("Starting Twintalk v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    let backend = Arc::new(HttpLlmClient::new(
        config.llm_base_url.clone(),
        config.llm_api_key.clone(),
        config.llm_model.clone(),
        config.llm_timeout,
    ));

    let state = Arc::new(AppState {
        backend,
        quota: Arc::new(InMemoryQuotaStore::new()),
        tickets: Arc::new(TicketCache::new()),
        config,
    });

    server::serve(state).await
}
