//! Upload pipeline orchestrator.
//!
//! The stages run strictly in order:
//!   quota pre-check → parse → aggregate → select senders → quota reserve →
//!   thread reconstruction → per-speaker sampling → profile extraction
//!
//! The persona-count check runs twice on purpose: once before any parsing
//! work (cost control — reject obviously-over-quota clients for free), and
//! again as an atomic reservation after sender selection, when the number
//! of personas about to be created is actually known.

use std::collections::HashSet;

use serde::Serialize;

use crate::config::Config;
use crate::error::AppError;
use crate::extractor;
use crate::ingest::{aggregator, parsers, sampler, threads, Message};
use crate::llm::{CompletionBackend, LlmError};
use crate::profile::StyleProfile;
use crate::quota::QuotaStore;

/// One file from the multipart upload.
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// A created persona: the reconstructed transcript plus the derived style
/// profile. `chat_history` starts empty and is owned by the client from
/// here on.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    pub id: String,
    pub name: String,
    pub transcript: Vec<Message>,
    pub chat_history: Vec<Message>,
    pub style_profile: StyleProfile,
}

/// Result of one upload request.
#[derive(Debug)]
pub struct UploadOutcome {
    pub session_id: String,
    pub personas: Vec<Persona>,
    /// Eligible participants that were skipped because the quota ran out.
    pub skipped: u32,
}

/// Run the full upload pipeline for one client request.
pub async fn process_upload(
    backend: &dyn CompletionBackend,
    quota: &dyn QuotaStore,
    config: &Config,
    client_id: &str,
    files: Vec<UploadedFile>,
) -> Result<UploadOutcome, AppError> {
    if files.is_empty() {
        return Err(AppError::Validation("No files uploaded".into()));
    }

    // Cheap pre-check before any parsing work.
    let used = quota.snapshot(client_id).persona_count;
    if used >= config.persona_cap {
        return Err(AppError::PersonaLimit {
            used,
            limit: config.persona_cap,
        });
    }

    let mut parsed = Vec::with_capacity(files.len());
    for file in &files {
        parsed.push(parsers::parse_export(
            &file.bytes,
            &file.filename,
            config.max_file_bytes,
        )?);
    }

    let all = aggregator::aggregate(parsed);
    aggregator::require_messages(&all)?;

    let participants = aggregator::select_top(aggregator::group_by_sender(&all), 2);
    let eligible = participants.len() as u32;

    // Second check, now that the participant count is known. The store
    // grants atomically, so concurrent uploads cannot overshoot the cap.
    let granted = quota.reserve_personas(client_id, eligible, config.persona_cap);
    if granted == 0 {
        return Err(AppError::PersonaLimit {
            used: quota.snapshot(client_id).persona_count,
            limit: config.persona_cap,
        });
    }
    let skipped = eligible - granted;

    let keep: HashSet<&str> = participants
        .iter()
        .map(|(name, _)| name.as_str())
        .collect();
    let two_party: Vec<Message> = all
        .iter()
        .filter(|m| keep.contains(m.sender.as_str()))
        .cloned()
        .collect();
    let transcript = threads::reconstruct(&two_party);

    tracing::info!(
        client = %client_id,
        total = all.len(),
        transcript = transcript.len(),
        eligible,
        granted,
        "Upload pipeline: transcript reconstructed"
    );

    let mut personas = Vec::with_capacity(granted as usize);
    for (name, bucket) in participants.into_iter().take(granted as usize) {
        let mut speaker_messages: Vec<Message> = transcript
            .iter()
            .filter(|m| m.sender == name)
            .cloned()
            .collect();
        // A speaker whose every message fell to thread pruning still gets
        // profiled from their raw bucket rather than an empty sample.
        if speaker_messages.is_empty() {
            tracing::debug!(speaker = %name, "No dialogue survived pruning, sampling raw bucket");
            speaker_messages = bucket;
        }
        let samples = sampler::sample(&speaker_messages, config.sample_cap);

        let style_profile = extractor::extract(backend, &samples, &name)
            .await
            .map_err(|e| match e {
                LlmError::Quota => AppError::UpstreamQuota,
                other => AppError::Upstream(other.to_string()),
            })?;

        personas.push(Persona {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            transcript: transcript.clone(),
            chat_history: Vec::new(),
            style_profile,
        });
    }

    Ok(UploadOutcome {
        session_id: uuid::Uuid::new_v4().to_string(),
        personas,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    use crate::llm::{CompletionRequest, CompletionResponse};
    use crate::quota::InMemoryQuotaStore;

    struct StubBackend;

    #[async_trait]
    impl CompletionBackend for StubBackend {
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            Ok(CompletionResponse {
                text: None,
                structured: Some(json!({
                    "tone": "warm", "formality": "casual",
                    "vocabulary": [], "quirks": [], "examples": []
                })),
            })
        }
    }

    struct QuotaDeniedBackend;

    #[async_trait]
    impl CompletionBackend for QuotaDeniedBackend {
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            Err(LlmError::Quota)
        }
    }

    fn whatsapp_fixture() -> UploadedFile {
        let mut content = String::new();
        for i in 0..20 {
            content.push_str(&format!("[1/2/23, 10:{:02}] Alice: hey what about {i}?\n", i * 2));
            content.push_str(&format!("[1/2/23, 10:{:02}] Bob: sounds good {i}\n", i * 2 + 1));
        }
        UploadedFile {
            filename: "chat.txt".into(),
            bytes: content.into_bytes(),
        }
    }

    #[tokio::test]
    async fn test_creates_two_personas() {
        let quota = InMemoryQuotaStore::new();
        let config = Config::for_tests();
        let outcome = process_upload(&StubBackend, &quota, &config, "c1", vec![whatsapp_fixture()])
            .await
            .unwrap();

        assert_eq!(outcome.personas.len(), 2);
        assert_eq!(outcome.skipped, 0);
        let names: Vec<&str> = outcome.personas.iter().map(|p| p.name.as_str()).collect();
        assert!(names.contains(&"Alice") && names.contains(&"Bob"));
        assert!(!outcome.personas[0].transcript.is_empty());
        assert!(outcome.personas[0].chat_history.is_empty());
        assert_eq!(outcome.personas[0].style_profile.tone, "warm");
    }

    #[tokio::test]
    async fn test_quota_pre_check_denies_before_parsing() {
        let quota = InMemoryQuotaStore::new();
        quota.reserve_personas("c1", 2, 2);
        let config = Config::for_tests();

        let err = process_upload(&StubBackend, &quota, &config, "c1", vec![whatsapp_fixture()])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PersonaLimit { used: 2, .. }));
    }

    #[tokio::test]
    async fn test_partial_grant_reports_skipped() {
        let quota = InMemoryQuotaStore::new();
        quota.reserve_personas("c1", 1, 2);
        let config = Config::for_tests();

        let outcome = process_upload(&StubBackend, &quota, &config, "c1", vec![whatsapp_fixture()])
            .await
            .unwrap();
        assert_eq!(outcome.personas.len(), 1);
        assert_eq!(outcome.skipped, 1);
        // Ranked order: the most active sender gets the remaining slot.
        assert_eq!(outcome.personas[0].name, "Alice");
    }

    #[tokio::test]
    async fn test_no_files() {
        let quota = InMemoryQuotaStore::new();
        let config = Config::for_tests();
        let err = process_upload(&StubBackend, &quota, &config, "c1", vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_zero_valid_messages() {
        let quota = InMemoryQuotaStore::new();
        let config = Config::for_tests();
        let files = vec![UploadedFile {
            filename: "chat.txt".into(),
            bytes: b"no matching lines here\nat all\n".to_vec(),
        }];
        let err = process_upload(&StubBackend, &quota, &config, "c1", files)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NoValidMessages));
    }

    #[tokio::test]
    async fn test_upstream_quota_maps_to_service_unavailable() {
        let quota = InMemoryQuotaStore::new();
        let config = Config::for_tests();
        let err = process_upload(&QuotaDeniedBackend, &quota, &config, "c1", vec![whatsapp_fixture()])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UpstreamQuota));
    }
}
