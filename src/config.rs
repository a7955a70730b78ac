use std::time::Duration;

use crate::error::AppError;

/// Runtime configuration, read once at boot from environment variables.
/// `.env` files are honored via dotenvy before this is built.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub bind_addr: String,
    /// Base URL of the OpenAI-compatible completion endpoint.
    pub llm_base_url: String,
    pub llm_api_key: String,
    pub llm_model: String,
    /// Per-request timeout for completion calls.
    pub llm_timeout: Duration,
    /// Per-file upload size ceiling in bytes.
    pub max_file_bytes: usize,
    /// Permanent per-client persona ceiling.
    pub persona_cap: u32,
    /// Permanent per-client practice-message ceiling.
    pub message_ceiling: u32,
    /// Max messages per speaker sent to style profiling.
    pub sample_cap: usize,
}

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8780";
const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 45;
const DEFAULT_MAX_FILE_BYTES: usize = 5 * 1024 * 1024;
const DEFAULT_PERSONA_CAP: u32 = 2;
const DEFAULT_MESSAGE_CEILING: u32 = 200;
const DEFAULT_SAMPLE_CAP: usize = 60;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Build from environment. Fails fast when the API key is absent —
    /// every useful endpoint needs the completion backend.
    pub fn from_env() -> Result<Config, AppError> {
        let llm_api_key = std::env::var("LLM_API_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| AppError::Config("LLM_API_KEY is not set".into()))?;

        Ok(Config {
            bind_addr: env_or("TWINTALK_BIND_ADDR", DEFAULT_BIND_ADDR),
            llm_base_url: env_or("LLM_BASE_URL", DEFAULT_LLM_BASE_URL),
            llm_api_key,
            llm_model: env_or("LLM_MODEL", DEFAULT_LLM_MODEL),
            llm_timeout: Duration::from_secs(env_parse(
                "LLM_TIMEOUT_SECS",
                DEFAULT_LLM_TIMEOUT_SECS,
            )),
            max_file_bytes: env_parse("TWINTALK_MAX_FILE_BYTES", DEFAULT_MAX_FILE_BYTES),
            persona_cap: env_parse("TWINTALK_PERSONA_CAP", DEFAULT_PERSONA_CAP),
            message_ceiling: env_parse("TWINTALK_MESSAGE_CEILING", DEFAULT_MESSAGE_CEILING),
            sample_cap: env_parse("TWINTALK_SAMPLE_CAP", DEFAULT_SAMPLE_CAP),
        })
    }

    /// Fixed defaults with a caller-supplied key. Used by tests.
    pub fn for_tests() -> Config {
        Config {
            bind_addr: DEFAULT_BIND_ADDR.into(),
            llm_base_url: DEFAULT_LLM_BASE_URL.into(),
            llm_api_key: "test-key".into(),
            llm_model: DEFAULT_LLM_MODEL.into(),
            llm_timeout: Duration::from_secs(5),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            persona_cap: DEFAULT_PERSONA_CAP,
            message_ceiling: DEFAULT_MESSAGE_CEILING,
            sample_cap: DEFAULT_SAMPLE_CAP,
        }
    }
}
