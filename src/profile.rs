//! Canonical style-profile record and its merge-with-defaults constructors.
//!
//! Every nested type knows how to build itself from a (possibly partial,
//! possibly absent) JSON object, so the defaults live in exactly one place
//! and the extractor can guarantee a total, schema-complete record no matter
//! what the model returned.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Formality {
    Formal,
    Casual,
    Mixed,
}

impl Formality {
    fn from_value(value: Option<&Value>) -> Option<Formality> {
        match value?.as_str()? {
            "formal" => Some(Formality::Formal),
            "casual" => Some(Formality::Casual),
            "mixed" => Some(Formality::Mixed),
            _ => None,
        }
    }
}

/// Numeric personality traits, each 1-10.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Traits {
    pub openness: u8,
    pub expressiveness: u8,
    pub humor: u8,
    pub empathy: u8,
    pub directness: u8,
    pub enthusiasm: u8,
}

impl Default for Traits {
    fn default() -> Self {
        Traits {
            openness: 5,
            expressiveness: 5,
            humor: 5,
            empathy: 5,
            directness: 5,
            enthusiasm: 5,
        }
    }
}

impl Traits {
    /// Merge a partial `traits` object over the defaults.
    pub fn merged(value: Option<&Value>) -> Traits {
        let d = Traits::default();
        Traits {
            openness: trait_score(value, "openness", d.openness),
            expressiveness: trait_score(value, "expressiveness", d.expressiveness),
            humor: trait_score(value, "humor", d.humor),
            empathy: trait_score(value, "empathy", d.empathy),
            directness: trait_score(value, "directness", d.directness),
            enthusiasm: trait_score(value, "enthusiasm", d.enthusiasm),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Triggers {
    pub positive: Vec<String>,
    pub negative: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Emotions {
    pub primary: String,
    pub secondary: Vec<String>,
    pub triggers: Triggers,
}

impl Default for Emotions {
    fn default() -> Self {
        Emotions {
            primary: "neutral".into(),
            secondary: Vec::new(),
            triggers: Triggers::default(),
        }
    }
}

impl Emotions {
    pub fn merged(value: Option<&Value>) -> Emotions {
        let triggers = value.and_then(|v| v.get("triggers"));
        Emotions {
            primary: str_field(value, "primary", "neutral"),
            secondary: string_array(value, "secondary"),
            triggers: Triggers {
                positive: string_array(triggers, "positive"),
                negative: string_array(triggers, "negative"),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Preferences {
    pub topics: Vec<String>,
    pub avoids: Vec<String>,
    pub engagement: Vec<String>,
}

impl Preferences {
    pub fn merged(value: Option<&Value>) -> Preferences {
        Preferences {
            topics: string_array(value, "topics"),
            avoids: string_array(value, "avoids"),
            engagement: string_array(value, "engagement"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunicationPatterns {
    pub message_length: String,
    pub punctuation_style: String,
    pub capitalization: String,
    pub abbreviations: Vec<String>,
    pub unique_expressions: Vec<String>,
}

impl Default for CommunicationPatterns {
    fn default() -> Self {
        CommunicationPatterns {
            message_length: "medium".into(),
            punctuation_style: "standard".into(),
            capitalization: "standard".into(),
            abbreviations: Vec::new(),
            unique_expressions: Vec::new(),
        }
    }
}

impl CommunicationPatterns {
    pub fn merged(value: Option<&Value>) -> CommunicationPatterns {
        CommunicationPatterns {
            message_length: str_field(value, "message_length", "medium"),
            punctuation_style: str_field(value, "punctuation_style", "standard"),
            capitalization: str_field(value, "capitalization", "standard"),
            abbreviations: string_array(value, "abbreviations"),
            unique_expressions: string_array(value, "unique_expressions"),
        }
    }
}

/// The structured description of a persona's voice used to condition the
/// impersonation. Created once per persona at upload time; immutable after.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleProfile {
    pub tone: String,
    pub formality: Formality,
    pub pacing: String,
    pub vocabulary: Vec<String>,
    pub quirks: Vec<String>,
    pub examples: Vec<String>,
    pub traits: Traits,
    pub emotions: Emotions,
    pub preferences: Preferences,
    pub communication_patterns: CommunicationPatterns,
}

// ============================================================================
// Construction
// ============================================================================

impl StyleProfile {
    /// The one fixed, fully-defaulted profile substituted whenever the model
    /// output is unusable. Total by construction.
    pub fn fallback() -> StyleProfile {
        StyleProfile {
            tone: "friendly".into(),
            formality: Formality::Mixed,
            pacing: "moderate".into(),
            vocabulary: Vec::new(),
            quirks: Vec::new(),
            examples: Vec::new(),
            traits: Traits::default(),
            emotions: Emotions::default(),
            preferences: Preferences::default(),
            communication_patterns: CommunicationPatterns::default(),
        }
    }

    /// Validate and merge a model payload into a complete profile.
    ///
    /// Validation: non-empty `tone` string, `formality` in the enum, and
    /// `vocabulary`/`quirks`/`examples` must be arrays *when present*
    /// (absent ones default to empty). Any violation rejects the whole
    /// payload — the caller substitutes [`fallback`], never a partial merge.
    /// Optional nested objects are merged over defaults so the result is
    /// always total.
    pub fn from_model_value(value: &Value) -> Option<StyleProfile> {
        let obj = value.as_object()?;

        let tone = obj.get("tone")?.as_str()?.trim();
        if tone.is_empty() {
            return None;
        }
        let formality = Formality::from_value(obj.get("formality"))?;
        let vocabulary = array_if_present(obj.get("vocabulary"))?;
        let quirks = array_if_present(obj.get("quirks"))?;
        let examples = array_if_present(obj.get("examples"))?;

        Some(StyleProfile {
            tone: tone.to_string(),
            formality,
            pacing: str_field(Some(value), "pacing", "moderate"),
            vocabulary,
            quirks,
            examples,
            traits: Traits::merged(obj.get("traits")),
            emotions: Emotions::merged(obj.get("emotions")),
            preferences: Preferences::merged(obj.get("preferences")),
            communication_patterns: CommunicationPatterns::merged(
                obj.get("communication_patterns"),
            ),
        })
    }
}

// ============================================================================
// Field helpers
// ============================================================================

fn str_field(value: Option<&Value>, key: &str, default: &str) -> String {
    value
        .and_then(|v| v.get(key))
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(default)
        .to_string()
}

/// Lenient array reader: absent or wrong-typed fields become empty, and
/// non-string elements are dropped.
fn string_array(value: Option<&Value>, key: &str) -> Vec<String> {
    value
        .and_then(|v| v.get(key))
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|e| e.as_str())
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// Strict array reader for the top-level arrays: absent defaults to empty,
/// but a present non-array value fails validation (`None`).
fn array_if_present(value: Option<&Value>) -> Option<Vec<String>> {
    let value = match value {
        Some(v) => v,
        None => return Some(Vec::new()),
    };
    let arr = value.as_array()?;
    Some(
        arr.iter()
            .filter_map(|e| e.as_str())
            .map(|s| s.to_string())
            .collect(),
    )
}

fn trait_score(value: Option<&Value>, key: &str, default: u8) -> u8 {
    value
        .and_then(|v| v.get(key))
        .and_then(|v| v.as_i64())
        .map(|n| n.clamp(1, 10) as u8)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_payload_round_trips() {
        let payload = json!({
            "tone": "warm",
            "formality": "casual",
            "pacing": "rapid",
            "vocabulary": ["tbh", "lowkey"],
            "quirks": ["double texts"],
            "examples": ["omg no way"],
            "traits": {"openness": 8, "humor": 9},
            "emotions": {"primary": "upbeat", "secondary": ["curious"],
                          "triggers": {"positive": ["plans"], "negative": ["flaking"]}},
            "preferences": {"topics": ["food"], "avoids": ["politics"], "engagement": ["questions"]},
            "communication_patterns": {"message_length": "short", "abbreviations": ["u", "rn"]}
        });
        let profile = StyleProfile::from_model_value(&payload).unwrap();
        assert_eq!(profile.tone, "warm");
        assert_eq!(profile.formality, Formality::Casual);
        assert_eq!(profile.traits.openness, 8);
        // Unspecified trait falls back to the default midpoint.
        assert_eq!(profile.traits.empathy, 5);
        assert_eq!(profile.emotions.triggers.negative, vec!["flaking"]);
        assert_eq!(profile.communication_patterns.message_length, "short");
        // Unspecified pattern fields keep their defaults.
        assert_eq!(profile.communication_patterns.punctuation_style, "standard");
    }

    #[test]
    fn test_partial_payload_merges_over_defaults() {
        let payload = json!({
            "tone": "dry",
            "formality": "formal",
            "vocabulary": [],
            "quirks": [],
            "examples": []
        });
        let profile = StyleProfile::from_model_value(&payload).unwrap();
        assert_eq!(profile.pacing, "moderate");
        assert_eq!(profile.traits, Traits::default());
        assert_eq!(profile.emotions.primary, "neutral");
        assert_eq!(profile.communication_patterns, CommunicationPatterns::default());
    }

    #[test]
    fn test_absent_arrays_default_to_empty() {
        // A truncated-but-repaired payload often carries only the leading
        // fields; the arrays default rather than reject.
        let payload = json!({"tone": "warm", "formality": "casual"});
        let profile = StyleProfile::from_model_value(&payload).unwrap();
        assert!(profile.vocabulary.is_empty());
        assert!(profile.examples.is_empty());
    }

    #[test]
    fn test_non_array_vocabulary_rejects_whole_payload() {
        let payload = json!({
            "tone": "warm",
            "formality": "casual",
            "vocabulary": "tbh, lowkey"
        });
        assert!(StyleProfile::from_model_value(&payload).is_none());
    }

    #[test]
    fn test_missing_tone_rejects_whole_payload() {
        let payload = json!({"formality": "casual", "vocabulary": []});
        assert!(StyleProfile::from_model_value(&payload).is_none());
    }

    #[test]
    fn test_bad_formality_rejects() {
        let payload = json!({
            "tone": "warm",
            "formality": "extremely chill",
            "vocabulary": [],
            "quirks": [],
            "examples": []
        });
        assert!(StyleProfile::from_model_value(&payload).is_none());
    }

    #[test]
    fn test_empty_tone_rejects() {
        let payload = json!({
            "tone": "  ",
            "formality": "mixed",
            "vocabulary": [],
            "quirks": [],
            "examples": []
        });
        assert!(StyleProfile::from_model_value(&payload).is_none());
    }

    #[test]
    fn test_trait_scores_clamped_to_range() {
        let traits = Traits::merged(Some(&json!({"openness": 42, "humor": -3})));
        assert_eq!(traits.openness, 10);
        assert_eq!(traits.humor, 1);
    }

    #[test]
    fn test_fallback_is_total_and_serializable() {
        let profile = StyleProfile::fallback();
        let val = serde_json::to_value(&profile).unwrap();
        assert_eq!(val["formality"], "mixed");
        assert!(val["traits"]["openness"].is_number());
        assert!(val["communication_patterns"]["abbreviations"].is_array());
    }
}
