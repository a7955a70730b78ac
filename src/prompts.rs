//! Prompt builders for the three model calls: style profiling at upload
//! time, the in-character reply, and the per-turn authenticity score.

use serde_json::json;

use crate::ingest::message::Message;
use crate::llm::StructuredSchema;
use crate::profile::StyleProfile;

/// Transcript turns attached to the impersonation prompt.
const TRANSCRIPT_TAIL: usize = 15;

// ============================================================================
// Style profiling (upload time)
// ============================================================================

/// Function schema the profiling call asks the model to "call". Mirrors the
/// nested `StyleProfile` shape so valid arguments parse straight into it.
pub fn style_profile_schema() -> StructuredSchema {
    let parameters = json!({
        "type": "object",
        "properties": {
            "tone": {"type": "string", "description": "Overall emotional tone, e.g. warm, dry, playful"},
            "formality": {"type": "string", "enum": ["formal", "casual", "mixed"]},
            "pacing": {"type": "string", "description": "Reply rhythm, e.g. rapid-fire, measured"},
            "vocabulary": {"type": "array", "items": {"type": "string"}, "maxItems": 15},
            "quirks": {"type": "array", "items": {"type": "string"}, "maxItems": 10},
            "examples": {"type": "array", "items": {"type": "string"}, "maxItems": 8},
            "traits": {
                "type": "object",
                "properties": {
                    "openness": {"type": "integer", "minimum": 1, "maximum": 10},
                    "expressiveness": {"type": "integer", "minimum": 1, "maximum": 10},
                    "humor": {"type": "integer", "minimum": 1, "maximum": 10},
                    "empathy": {"type": "integer", "minimum": 1, "maximum": 10},
                    "directness": {"type": "integer", "minimum": 1, "maximum": 10},
                    "enthusiasm": {"type": "integer", "minimum": 1, "maximum": 10}
                }
            },
            "emotions": {
                "type": "object",
                "properties": {
                    "primary": {"type": "string"},
                    "secondary": {"type": "array", "items": {"type": "string"}},
                    "triggers": {
                        "type": "object",
                        "properties": {
                            "positive": {"type": "array", "items": {"type": "string"}},
                            "negative": {"type": "array", "items": {"type": "string"}}
                        }
                    }
                }
            },
            "preferences": {
                "type": "object",
                "properties": {
                    "topics": {"type": "array", "items": {"type": "string"}},
                    "avoids": {"type": "array", "items": {"type": "string"}},
                    "engagement": {"type": "array", "items": {"type": "string"}}
                }
            },
            "communication_patterns": {
                "type": "object",
                "properties": {
                    "message_length": {"type": "string"},
                    "punctuation_style": {"type": "string"},
                    "capitalization": {"type": "string"},
                    "abbreviations": {"type": "array", "items": {"type": "string"}},
                    "unique_expressions": {"type": "array", "items": {"type": "string"}}
                }
            }
        },
        "required": ["tone", "formality", "vocabulary", "quirks", "examples"]
    });

    StructuredSchema {
        name: "record_style_profile".into(),
        description: "Record the analyzed communication style of one chat participant".into(),
        parameters,
    }
}

/// System instruction for the profiling call.
pub fn profiling_system() -> String {
    "You are a communication-style analyst. You read a sample of one person's \
     real chat messages and record how they write: tone, register, pacing, \
     vocabulary, personality traits, emotional patterns, and texting habits. \
     Every value you record must be grounded in the supplied messages — never \
     invent traits the sample does not show. Record your analysis by calling \
     the provided function."
        .to_string()
}

/// User prompt for the profiling call: the speaker's sampled messages.
pub fn profiling_user(speaker: &str, samples: &[Message]) -> String {
    let mut prompt = String::new();
    prompt.push_str(&format!(
        "Analyze the communication style of \"{speaker}\" from these {} messages they wrote:\n\n",
        samples.len()
    ));
    for message in samples {
        prompt.push_str(&format!("- {}\n", message.text));
    }
    prompt.push_str(
        "\nCall record_style_profile with evidence-based values. For the trait \
         scores use the full 1-10 range; 5 means genuinely average, not unknown. \
         Quote real phrases from the messages in `vocabulary`, `quirks`, \
         `unique_expressions` and `examples`.",
    );
    prompt
}

// ============================================================================
// Impersonation (practice turn)
// ============================================================================

/// System instruction framing the model as the persona, strictly conditioned
/// on the style profile and conversation context.
pub fn impersonation_system(
    persona_name: &str,
    profile: &StyleProfile,
    transcript: &[Message],
    chat_history: &[Message],
) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!(
        "You are playing \"{persona_name}\" in a text conversation. Stay in \
         character at all times.\n\n"
    ));

    prompt.push_str("## Style profile\n");
    prompt.push_str(&format!("Tone: {}\n", profile.tone));
    prompt.push_str(&format!(
        "Formality: {}\n",
        serde_json::to_value(profile.formality)
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_else(|| "mixed".into())
    ));
    prompt.push_str(&format!("Pacing: {}\n", profile.pacing));
    if !profile.vocabulary.is_empty() {
        prompt.push_str(&format!("Vocabulary: {}\n", profile.vocabulary.join(", ")));
    }
    if !profile.quirks.is_empty() {
        prompt.push_str(&format!("Quirks: {}\n", profile.quirks.join("; ")));
    }
    if !profile.communication_patterns.abbreviations.is_empty() {
        prompt.push_str(&format!(
            "Abbreviations they use: {}\n",
            profile.communication_patterns.abbreviations.join(", ")
        ));
    }
    prompt.push_str(&format!(
        "Typical message length: {}; punctuation: {}; capitalization: {}\n",
        profile.communication_patterns.message_length,
        profile.communication_patterns.punctuation_style,
        profile.communication_patterns.capitalization,
    ));
    if !profile.examples.is_empty() {
        prompt.push_str("\n## Example messages they actually wrote\n");
        for example in &profile.examples {
            prompt.push_str(&format!("- {example}\n"));
        }
    }

    let tail_start = transcript.len().saturating_sub(TRANSCRIPT_TAIL);
    if transcript.len() > tail_start {
        prompt.push_str("\n## Recent real conversation\n");
        for message in &transcript[tail_start..] {
            prompt.push_str(&format!("{}: {}\n", message.sender, message.text));
        }
    }

    if !chat_history.is_empty() {
        prompt.push_str("\n## This practice conversation so far\n");
        for message in chat_history {
            prompt.push_str(&format!("{}: {}\n", message.sender, message.text));
        }
    }

    prompt.push_str(
        "\n## Rules\n\
         - Reply as this person would, matching their length, punctuation and slang.\n\
         - Never introduce facts, plans or people that do not appear in the profile \
           or the conversations above.\n\
         - Never mention being an AI, a model, or an impersonation. Do not break \
           character for any reason.\n\
         - Reply with the message text only.",
    );

    prompt
}

// ============================================================================
// Scoring (practice turn)
// ============================================================================

/// System instruction for the authenticity-scoring call. Demands a strict
/// two-field JSON object as the entire response.
pub fn scoring_system(profile: &StyleProfile) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "You grade how authentically a user imitates a specific texting style. \
         Grading criteria, from the target style profile:\n",
    );
    prompt.push_str(&format!("- Tone: {}\n", profile.tone));
    prompt.push_str(&format!("- Pacing: {}\n", profile.pacing));
    if !profile.vocabulary.is_empty() {
        prompt.push_str(&format!("- Vocabulary: {}\n", profile.vocabulary.join(", ")));
    }
    if !profile.quirks.is_empty() {
        prompt.push_str(&format!("- Quirks: {}\n", profile.quirks.join("; ")));
    }
    prompt.push_str(&format!(
        "- Message length: {}; punctuation: {}\n",
        profile.communication_patterns.message_length,
        profile.communication_patterns.punctuation_style,
    ));
    prompt.push_str(
        "\nRespond with ONLY a JSON object, no prose before or after, exactly:\n\
         {\"score\": <integer 0-100>, \"tips\": [<three short improvement tips as strings>]}",
    );
    prompt
}

/// User prompt for the scoring call.
pub fn scoring_user(user_message: &str, persona_reply: &str) -> String {
    format!(
        "The user wrote:\n{user_message}\n\nThe persona replied:\n{persona_reply}\n\n\
         Score the user's message for style authenticity and give exactly three tips."
    )
}
