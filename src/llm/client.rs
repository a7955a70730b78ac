//! HTTP client for an OpenAI-compatible chat-completions endpoint.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use super::{CompletionBackend, CompletionRequest, CompletionResponse, LlmError};

/// HTTP client wrapping the hosted completion endpoint.
pub struct HttpLlmClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl HttpLlmClient {
    /// Create a client with the given endpoint, key and model.
    ///
    /// The underlying `reqwest::Client` is configured with the supplied
    /// per-request timeout; a timed-out call maps to [`LlmError::Timeout`].
    pub fn new(
        base_url: String,
        api_key: String,
        model: String,
        timeout: std::time::Duration,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build reqwest client");

        Self {
            http,
            base_url,
            api_key,
            model,
        }
    }

    fn request_body(&self, request: &CompletionRequest) -> Value {
        let messages = vec![
            ChatMessage { role: "system", content: &request.system },
            ChatMessage { role: "user", content: &request.user },
        ];
        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        if let Some(schema) = &request.schema {
            body["tools"] = json!([{
                "type": "function",
                "function": {
                    "name": schema.name,
                    "description": schema.description,
                    "parameters": schema.parameters,
                },
            }]);
            body["tool_choice"] = json!({
                "type": "function",
                "function": { "name": schema.name },
            });
        }

        body
    }

    fn classify_send_error(e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Http(e.to_string())
        }
    }
}

/// Pull the assistant message out of a chat-completions payload.
///
/// Function-call arguments arrive as a JSON *string*; when that string fails
/// to parse (typically a token-limit truncation) it is surfaced as `text`
/// so the extractor can attempt repair instead of losing the payload.
fn parse_completion_payload(payload: &Value) -> Result<CompletionResponse, LlmError> {
    let message = payload
        .pointer("/choices/0/message")
        .ok_or_else(|| LlmError::Malformed("response has no choices".into()))?;

    if let Some(arguments) = message
        .pointer("/tool_calls/0/function/arguments")
        .and_then(|a| a.as_str())
    {
        return Ok(match serde_json::from_str::<Value>(arguments) {
            Ok(parsed) => CompletionResponse {
                text: None,
                structured: Some(parsed),
            },
            Err(_) => CompletionResponse {
                text: Some(arguments.to_string()),
                structured: None,
            },
        });
    }

    let content = message
        .get("content")
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| LlmError::Malformed("assistant message has no content".into()))?;

    Ok(CompletionResponse {
        text: Some(content),
        structured: None,
    })
}

#[async_trait]
impl CompletionBackend for HttpLlmClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(&request))
            .send()
            .await
            .map_err(Self::classify_send_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::Quota);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // Some providers report exhausted credit as a 4xx with a
            // quota-flavored body rather than a 429.
            if body.contains("insufficient_quota") || body.contains("quota") {
                return Err(LlmError::Quota);
            }
            return Err(LlmError::Http(format!(
                "status {status}: {}",
                truncate(&body, 300)
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| LlmError::Malformed(e.to_string()))?;
        parse_completion_payload(&payload)
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((byte_offset, _)) => format!("{}...", &s[..byte_offset]),
        None => s.to_string(),
    }
}
