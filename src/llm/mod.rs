//! Completion backend seam. The rest of the crate talks to the hosted model
//! through [`CompletionBackend`] so tests can inject a scripted double and a
//! multi-provider future only has to add another client.

pub mod client;

use async_trait::async_trait;
use serde_json::Value;

pub use client::HttpLlmClient;

/// Errors from a completion call, classified so callers can tell a
/// quota/ceiling rejection apart from transient transport trouble.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("completion call timed out")]
    Timeout,

    #[error("provider quota exhausted")]
    Quota,

    #[error("provider HTTP error: {0}")]
    Http(String),

    #[error("provider returned an unusable payload: {0}")]
    Malformed(String),
}

/// A structured-output request: ask the model to "call" this function with
/// evidence-based arguments instead of replying in prose.
#[derive(Debug, Clone)]
pub struct StructuredSchema {
    pub name: String,
    pub description: String,
    /// JSON Schema for the function parameters.
    pub parameters: Value,
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// When set, the call requests a function-call style structured response.
    pub schema: Option<StructuredSchema>,
}

impl CompletionRequest {
    pub fn text(system: impl Into<String>, user: impl Into<String>) -> CompletionRequest {
        CompletionRequest {
            system: system.into(),
            user: user.into(),
            temperature: 0.7,
            max_tokens: 1024,
            schema: None,
        }
    }

    pub fn structured(
        system: impl Into<String>,
        user: impl Into<String>,
        schema: StructuredSchema,
    ) -> CompletionRequest {
        CompletionRequest {
            system: system.into(),
            user: user.into(),
            temperature: 0.3,
            max_tokens: 4096,
            schema: Some(schema),
        }
    }
}

/// What came back. `structured` is set when the provider produced parseable
/// function-call arguments; `text` carries prose replies and also the raw
/// argument string when it failed to parse, so callers can attempt repair.
#[derive(Debug, Clone, Default)]
pub struct CompletionResponse {
    pub text: Option<String>,
    pub structured: Option<Value>,
}

/// Black-box completion capability: prompt in, text or structured arguments
/// out, with the possibility of quota/rate errors.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}
