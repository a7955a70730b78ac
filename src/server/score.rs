//! `GET /score?id=` — at-most-once poll for an asynchronous scoring result.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use super::AppState;
use crate::tickets::TicketLookup;

#[derive(Deserialize)]
pub struct ScoreQuery {
    pub id: String,
}

pub async fn handle_score(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ScoreQuery>,
) -> Response {
    match state.tickets.take(&query.id) {
        TicketLookup::Pending => Json(json!({ "status": "pending" })).into_response(),
        TicketLookup::Complete(result) => Json(json!({
            "status": "complete",
            "score": result.score,
            "tips": result.tips,
        }))
        .into_response(),
        // Scoring infrastructure broke for this turn: report the sentinel
        // rather than punishing the user with a hard failure.
        TicketLookup::Error => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "status": "error", "score": 0, "tips": [] })),
        )
            .into_response(),
        TicketLookup::NotFound => (
            StatusCode::NOT_FOUND,
            Json(json!({ "status": "not_found" })),
        )
            .into_response(),
    }
}
