//! Style-profile extractor — invokes the model for a structured profile and
//! defensively repairs/validates/defaults the payload.
//!
//! This component's entire purpose is to guarantee the rest of the system
//! never has to handle a missing or partial profile: whatever the model
//! returns (well-formed, truncated, garbage) or however the call fails,
//! the result is a total [`StyleProfile`]. The single exception is a
//! provider quota rejection, which is surfaced so the upload endpoint can
//! answer with its out-of-service contract.

use serde_json::Value;

use crate::ingest::message::Message;
use crate::llm::{CompletionBackend, CompletionRequest, LlmError};
use crate::profile::StyleProfile;
use crate::prompts;

// ============================================================================
// JSON extraction & repair
// ============================================================================

/// Append missing closing braces to a payload that looks like it was cut off
/// mid-object (the model hit its token limit), then parse.
///
/// Only truncation is handled: the input must start with `{`, the deficit
/// must be small, and anything that still fails to parse is rejected. This
/// is a truncation patch, not a JSON-repair library.
pub fn repair_truncated_object(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return value.is_object().then_some(value);
    }

    let deficit = brace_deficit(trimmed);
    if deficit == 0 || deficit > 8 {
        return None;
    }
    let mut patched = trimmed.to_string();
    // A truncation mid-string leaves an unterminated quote; close it first.
    if in_open_string(trimmed) {
        patched.push('"');
    }
    patched.extend(std::iter::repeat('}').take(deficit));
    if !patched.ends_with('}') {
        return None;
    }
    serde_json::from_str::<Value>(&patched)
        .ok()
        .filter(|v| v.is_object())
}

/// Count unclosed `{` braces, ignoring braces inside string literals.
fn brace_deficit(s: &str) -> usize {
    let mut depth: isize = 0;
    let mut in_string = false;
    let mut escaped = false;
    for c in s.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => depth -= 1,
            _ => {}
        }
    }
    depth.max(0) as usize
}

/// Whether the payload ends inside an unterminated string literal.
fn in_open_string(s: &str) -> bool {
    let mut in_string = false;
    let mut escaped = false;
    for c in s.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            _ => {}
        }
    }
    in_string
}

/// Find the index of the matching closing brace for an opening brace at
/// `start`, or None if the object never closes.
fn find_matching_brace(chars: &[char], start: usize) -> Option<usize> {
    let mut depth = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate().skip(start) {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Extract a JSON object from free-form model output. Tries a fenced
/// ```json block first, then scans for bare objects containing any of the
/// given discriminant keys, then the truncation-repair path.
pub fn extract_json_by_key(output: &str, keys: &[&str]) -> Option<Value> {
    // Strategy 1: fenced JSON code block
    if let Some(fenced) = extract_fenced(output) {
        if let Ok(value) = serde_json::from_str::<Value>(fenced.trim()) {
            if keys.iter().any(|k| value.get(*k).is_some()) {
                return Some(value);
            }
        }
    }

    // Strategy 2: bare JSON object with a discriminant key
    let chars: Vec<char> = output.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '{' {
            if let Some(end) = find_matching_brace(&chars, i) {
                let candidate: String = chars[i..=end].iter().collect();
                if let Ok(value) = serde_json::from_str::<Value>(&candidate) {
                    if keys.iter().any(|k| value.get(*k).is_some()) {
                        return Some(value);
                    }
                }
                i = end + 1;
                continue;
            }
        }
        i += 1;
    }

    // Strategy 3: the whole output is one truncated object
    repair_truncated_object(output).filter(|v| keys.iter().any(|k| v.get(*k).is_some()))
}

fn extract_fenced(output: &str) -> Option<&str> {
    let start = output.find("```json").map(|i| i + "```json".len())?;
    let rest = &output[start..];
    let end = rest.find("```")?;
    Some(&rest[..end])
}

// ============================================================================
// Extraction
// ============================================================================

/// Derive a style profile for `speaker` from their sampled messages.
///
/// Never fails with a partial result: every outcome except a provider quota
/// rejection produces a usable profile, falling back to the fixed default
/// when the payload is beyond repair.
pub async fn extract(
    backend: &dyn CompletionBackend,
    samples: &[Message],
    speaker: &str,
) -> Result<StyleProfile, LlmError> {
    let request = CompletionRequest::structured(
        prompts::profiling_system(),
        prompts::profiling_user(speaker, samples),
        prompts::style_profile_schema(),
    );

    let response = match backend.complete(request).await {
        Ok(r) => r,
        Err(LlmError::Quota) => return Err(LlmError::Quota),
        Err(e) => {
            tracing::warn!(speaker = %speaker, error = %e, "Profile extraction call failed, using fallback profile");
            return Ok(StyleProfile::fallback());
        }
    };

    let payload = response
        .structured
        .or_else(|| response.text.as_deref().and_then(payload_from_text));

    let profile = payload
        .as_ref()
        .and_then(StyleProfile::from_model_value)
        .unwrap_or_else(|| {
            tracing::warn!(speaker = %speaker, "Model profile payload failed validation, using fallback profile");
            StyleProfile::fallback()
        });

    Ok(profile)
}

/// Recover a profile object from a prose or truncated text payload.
fn payload_from_text(text: &str) -> Option<Value> {
    extract_json_by_key(text, &["tone", "formality"])
}
