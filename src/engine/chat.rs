//! Turn-taking conversation engine.
//!
//! Each practice turn makes two independent model calls: one for the
//! in-character reply, one for the authenticity score. The reply call is
//! fatal to the turn when it fails; the scoring call never is — the user
//! must always get the persona's message, with a sentinel score of 0 and no
//! tips when grading breaks.

use chrono::Utc;
use serde::Deserialize;

use crate::config::Config;
use crate::error::AppError;
use crate::extractor;
use crate::ingest::Message;
use crate::llm::{CompletionBackend, CompletionRequest, LlmError};
use crate::profile::StyleProfile;
use crate::prompts;
use crate::quota::QuotaStore;
use crate::tickets::{ScoreResult, TicketCache};
use crate::validation::require_non_empty;

/// One practice turn as submitted by the client.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    pub persona_name: String,
    pub transcript: Vec<Message>,
    pub chat_history: Vec<Message>,
    pub user_message: String,
    pub style_profile: StyleProfile,
}

/// A completed turn: the reply always, the score possibly degraded.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub reply: String,
    pub score: u8,
    pub tips: Vec<String>,
    pub user_message: Message,
    pub persona_message: Message,
    pub ticket_id: String,
}

/// Run one practice turn: reply call, then scoring call.
pub async fn run_turn(
    backend: &dyn CompletionBackend,
    quota: &dyn QuotaStore,
    tickets: &TicketCache,
    config: &Config,
    client_id: &str,
    request: TurnRequest,
) -> Result<TurnOutcome, AppError> {
    require_non_empty("personaName", &request.persona_name)?;
    require_non_empty("userMessage", &request.user_message)?;

    if let Err(used) = quota.record_message(client_id, config.message_ceiling) {
        return Err(AppError::MessageLimit {
            used,
            limit: config.message_ceiling,
        });
    }

    // Reply call — no safe synthetic substitute exists, so failure here is
    // the turn's failure.
    let system = prompts::impersonation_system(
        &request.persona_name,
        &request.style_profile,
        &request.transcript,
        &request.chat_history,
    );
    let reply_response = backend
        .complete(CompletionRequest::text(system, request.user_message.clone()))
        .await
        .map_err(|e| match e {
            LlmError::Quota => AppError::UpstreamQuota,
            other => AppError::Upstream(other.to_string()),
        })?;
    let reply = reply_response
        .text
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Upstream("model returned an empty reply".into()))?;

    // Scoring call — degraded, never fatal.
    let ticket_id = tickets.create();
    let score_result = score_turn(backend, &request.style_profile, &request.user_message, &reply).await;
    let (score, tips) = match score_result {
        Some(result) => {
            tickets.resolve(&ticket_id, result.clone());
            (result.score, result.tips)
        }
        None => {
            tracing::warn!(persona = %request.persona_name, "Scoring failed, returning sentinel score");
            tickets.fail(&ticket_id);
            (0, Vec::new())
        }
    };

    let now = Utc::now();
    Ok(TurnOutcome {
        user_message: Message::new("user", request.user_message.clone(), now),
        persona_message: Message::new(request.persona_name.clone(), reply.clone(), now),
        reply,
        score,
        tips,
        ticket_id,
    })
}

/// Invoke the scoring call and defensively parse its strict-JSON payload.
/// Any failure — transport, timeout, malformed JSON, wrong shape — yields
/// `None` and the caller substitutes the sentinel.
async fn score_turn(
    backend: &dyn CompletionBackend,
    profile: &StyleProfile,
    user_message: &str,
    reply: &str,
) -> Option<ScoreResult> {
    let request = CompletionRequest::text(
        prompts::scoring_system(profile),
        prompts::scoring_user(user_message, reply),
    );
    let response = match backend.complete(request).await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "Scoring call failed");
            return None;
        }
    };

    let text = response.text?;
    parse_score_payload(&text)
}

/// Parse `{"score": 0-100, "tips": [...]}` out of the scoring response,
/// tolerating prose wrapping and truncation. An unreadable score rejects
/// the payload; unreadable tips degrade to an empty list.
fn parse_score_payload(text: &str) -> Option<ScoreResult> {
    let value = extractor::extract_json_by_key(text, &["score"])?;
    let score = value.get("score")?.as_i64()?.clamp(0, 100) as u8;
    let tips = value
        .get("tips")
        .and_then(|t| t.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|e| e.as_str())
                .map(|s| s.to_string())
                .take(3)
                .collect()
        })
        .unwrap_or_default();
    Some(ScoreResult { score, tips })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::llm::CompletionResponse;
    use crate::quota::InMemoryQuotaStore;
    use crate::tickets::TicketLookup;

    /// Replies in character on the first call, scores on the second.
    struct TwoCallBackend {
        score_payload: Option<&'static str>,
        calls: std::sync::Mutex<u32>,
    }

    impl TwoCallBackend {
        fn new(score_payload: Option<&'static str>) -> Self {
            Self {
                score_payload,
                calls: std::sync::Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl CompletionBackend for TwoCallBackend {
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls == 1 {
                return Ok(CompletionResponse {
                    text: Some("haha yeah, long day tbh".into()),
                    structured: None,
                });
            }
            match self.score_payload {
                Some(payload) => Ok(CompletionResponse {
                    text: Some(payload.into()),
                    structured: None,
                }),
                None => Err(LlmError::Timeout),
            }
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl CompletionBackend for FailingBackend {
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            Err(LlmError::Http("connection refused".into()))
        }
    }

    fn turn_request() -> TurnRequest {
        TurnRequest {
            persona_name: "Alice".into(),
            transcript: Vec::new(),
            chat_history: Vec::new(),
            user_message: "hey, how was your day?".into(),
            style_profile: StyleProfile::fallback(),
        }
    }

    #[tokio::test]
    async fn test_successful_turn() {
        let backend =
            TwoCallBackend::new(Some(r#"{"score": 78, "tips": ["shorter", "more slang", "ask back"]}"#));
        let quota = InMemoryQuotaStore::new();
        let tickets = TicketCache::new();
        let config = Config::for_tests();

        let outcome = run_turn(&backend, &quota, &tickets, &config, "c1", turn_request())
            .await
            .unwrap();
        assert_eq!(outcome.reply, "haha yeah, long day tbh");
        assert_eq!(outcome.score, 78);
        assert_eq!(outcome.tips.len(), 3);
        assert_eq!(outcome.user_message.sender, "user");
        assert_eq!(outcome.persona_message.sender, "Alice");

        // The ticket resolved with the same result the sync path returned.
        match tickets.take(&outcome.ticket_id) {
            TicketLookup::Complete(result) => assert_eq!(result.score, 78),
            other => panic!("expected Complete, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_scoring_failure_keeps_the_reply() {
        let backend = TwoCallBackend::new(None);
        let quota = InMemoryQuotaStore::new();
        let tickets = TicketCache::new();
        let config = Config::for_tests();

        let outcome = run_turn(&backend, &quota, &tickets, &config, "c1", turn_request())
            .await
            .unwrap();
        assert_eq!(outcome.reply, "haha yeah, long day tbh");
        assert_eq!(outcome.score, 0);
        assert!(outcome.tips.is_empty());
        assert_eq!(tickets.take(&outcome.ticket_id), TicketLookup::Error);
    }

    #[tokio::test]
    async fn test_reply_failure_fails_the_turn() {
        let quota = InMemoryQuotaStore::new();
        let tickets = TicketCache::new();
        let config = Config::for_tests();

        let err = run_turn(&FailingBackend, &quota, &tickets, &config, "c1", turn_request())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));
    }

    #[tokio::test]
    async fn test_message_ceiling_denies_turn() {
        let backend = TwoCallBackend::new(Some(r#"{"score": 50, "tips": []}"#));
        let quota = InMemoryQuotaStore::new();
        let tickets = TicketCache::new();
        let mut config = Config::for_tests();
        config.message_ceiling = 1;

        run_turn(&backend, &quota, &tickets, &config, "c1", turn_request())
            .await
            .unwrap();
        let backend2 = TwoCallBackend::new(Some(r#"{"score": 50, "tips": []}"#));
        let err = run_turn(&backend2, &quota, &tickets, &config, "c1", turn_request())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::MessageLimit { .. }));
    }

    #[tokio::test]
    async fn test_empty_user_message_rejected() {
        let backend = TwoCallBackend::new(None);
        let quota = InMemoryQuotaStore::new();
        let tickets = TicketCache::new();
        let config = Config::for_tests();

        let mut request = turn_request();
        request.user_message = "   ".into();
        let err = run_turn(&backend, &quota, &tickets, &config, "c1", request)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_parse_score_payload_strict_json() {
        let result = parse_score_payload(r#"{"score": 91, "tips": ["a", "b", "c"]}"#).unwrap();
        assert_eq!(result.score, 91);
        assert_eq!(result.tips, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_parse_score_payload_wrapped_in_prose() {
        let result =
            parse_score_payload("Here's my grade: {\"score\": 40, \"tips\": [\"x\",\"y\",\"z\"]}").unwrap();
        assert_eq!(result.score, 40);
    }

    #[test]
    fn test_parse_score_payload_clamps_range() {
        let result = parse_score_payload(r#"{"score": 400, "tips": []}"#).unwrap();
        assert_eq!(result.score, 100);
    }

    #[test]
    fn test_parse_score_payload_wrong_shape() {
        assert!(parse_score_payload(r#"{"score": "great"}"#).is_none());
        assert!(parse_score_payload("no json at all").is_none());
    }

    #[test]
    fn test_parse_score_payload_bad_tips_degrade() {
        let result = parse_score_payload(r#"{"score": 70, "tips": "be better"}"#).unwrap();
        assert_eq!(result.score, 70);
        assert!(result.tips.is_empty());
    }
}
