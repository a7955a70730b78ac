//! `POST /chat` — one practice turn against a persona.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use super::client_id::derive_client_id;
use super::AppState;
use crate::engine::chat::{run_turn, TurnRequest};
use crate::error::AppError;
use crate::ingest::Message;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub twin_reply: String,
    pub score: u8,
    pub tips: Vec<String>,
    pub user_message: Message,
    pub persona_message: Message,
    /// Same result, polled asynchronously via `GET /score?id=`.
    pub score_ticket_id: String,
}

pub async fn handle_chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<TurnRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    // Missing or mis-typed fields are the caller's problem, not a 422.
    let Json(request) = payload
        .map_err(|e| AppError::Validation(format!("Invalid chat request: {}", e.body_text())))?;

    let client_id = derive_client_id(&headers);
    let outcome = run_turn(
        state.backend.as_ref(),
        state.quota.as_ref(),
        &state.tickets,
        &state.config,
        &client_id,
        request,
    )
    .await?;

    Ok(Json(ChatResponse {
        twin_reply: outcome.reply,
        score: outcome.score,
        tips: outcome.tips,
        user_message: outcome.user_message,
        persona_message: outcome.persona_message,
        score_ticket_id: outcome.ticket_id,
    }))
}
