//! `POST /upload` — multipart chat-export upload, producing personas.

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use super::client_id::derive_client_id;
use super::AppState;
use crate::engine::upload::{process_upload, Persona, UploadedFile};
use crate::error::AppError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub session_id: String,
    pub personas: Vec<Persona>,
    pub total_personas_created: u32,
    /// Present only when eligible participants were skipped due to quota.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_info: Option<LimitInfo>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitInfo {
    pub skipped: u32,
    pub message: String,
}

pub async fn handle_upload(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let client_id = derive_client_id(&headers);

    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        // Non-file form fields carry no export data.
        let filename = match field.file_name() {
            Some(name) => name.to_string(),
            None => continue,
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read {filename}: {e}")))?;
        files.push(UploadedFile {
            filename,
            bytes: bytes.to_vec(),
        });
    }

    tracing::info!(client = %client_id, files = files.len(), "Upload received");

    let outcome = process_upload(
        state.backend.as_ref(),
        state.quota.as_ref(),
        &state.config,
        &client_id,
        files,
    )
    .await?;

    let limit_info = (outcome.skipped > 0).then(|| LimitInfo {
        skipped: outcome.skipped,
        message: format!(
            "{} participant(s) skipped: the {}-persona limit was reached",
            outcome.skipped, state.config.persona_cap
        ),
    });

    Ok(Json(UploadResponse {
        session_id: outcome.session_id,
        total_personas_created: outcome.personas.len() as u32,
        personas: outcome.personas,
        limit_info,
    }))
}
