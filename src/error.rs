use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

/// App-wide error type. Every fallible function returns `Result<T, AppError>`.
/// Serializes cleanly so HTTP handlers can hand back structured error bodies.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unsupported file type: {0}. Supported formats: .csv, .json, .txt, .xml")]
    UnsupportedFormat(String),

    #[error("File {filename} exceeds the {limit_mb} MB size limit")]
    FileTooLarge { filename: String, limit_mb: usize },

    #[error("No valid messages found in the uploaded files")]
    NoValidMessages,

    #[error(
        "Persona limit reached: {used} of {limit} personas already created. \
         This is a permanent limit — deleting personas does not free up slots."
    )]
    PersonaLimit { used: u32, limit: u32 },

    #[error(
        "Message limit reached: {used} of {limit} practice messages already used. \
         This is a permanent limit."
    )]
    MessageLimit { used: u32, limit: u32 },

    #[error("The AI provider rejected the request due to exhausted quota")]
    UpstreamQuota,

    #[error("AI provider error: {0}")]
    Upstream(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::UnsupportedFormat(_) => "unsupported_format",
            AppError::FileTooLarge { .. } => "file_too_large",
            AppError::NoValidMessages => "no_valid_messages",
            AppError::PersonaLimit { .. } => "persona_limit",
            AppError::MessageLimit { .. } => "message_limit",
            AppError::UpstreamQuota => "quota_exceeded",
            AppError::Upstream(_) => "upstream",
            AppError::Config(_) => "config",
            AppError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::UnsupportedFormat(_)
            | AppError::FileTooLarge { .. }
            | AppError::NoValidMessages => StatusCode::BAD_REQUEST,
            AppError::PersonaLimit { .. } | AppError::MessageLimit { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            AppError::UpstreamQuota => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Upstream(_) | AppError::Config(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Serializes as `{ error: "...", kind: "..." }` for frontend consumption.
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("AppError", 2)?;
        s.serialize_field("error", &self.to_string())?;
        s.serialize_field("kind", self.kind())?;
        s.end()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        // The upstream-quota case carries a redirect hint so the client can
        // navigate to the out-of-service view (contract with the frontend).
        let body = match &self {
            AppError::UpstreamQuota => json!({
                "error": self.to_string(),
                "errorType": "quota_exceeded",
                "redirectTo": "/limit-reached",
            }),
            _ => serde_json::to_value(&self)
                .unwrap_or_else(|_| json!({ "error": self.to_string() })),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::UnsupportedFormat("a.pdf".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::PersonaLimit { used: 2, limit: 2 }.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::UpstreamQuota.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::Upstream("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_serializes_error_and_kind() {
        let err = AppError::NoValidMessages;
        let val = serde_json::to_value(&err).unwrap();
        assert_eq!(val["kind"], "no_valid_messages");
        assert!(val["error"].as_str().unwrap().contains("No valid messages"));
    }

    #[test]
    fn test_persona_limit_message_names_the_count() {
        let err = AppError::PersonaLimit { used: 2, limit: 2 };
        let msg = err.to_string();
        assert!(msg.contains("2 of 2"));
        assert!(msg.contains("permanent"));
    }
}
