//! Representative sampler — when a speaker has more messages than the
//! profiling call can afford, select a bounded, diverse, quality-weighted
//! subset instead of naive recency or length cuts.
//!
//! Selection is a weighted union of four strata applied in order, later
//! strata excluding messages already chosen:
//!   40% top quality, 30% across content categories, 20% across behavioral
//!   categories, remainder most-recent. The union is truncated to exactly
//!   the cap.

use std::collections::HashSet;

use crate::ingest::message::Message;

/// Markers of informal register. Lowercased containment check.
const INFORMAL_MARKERS: &[&str] = &["lol", "omg", "haha", "lmao", "idk", "btw", "tbh"];

/// Words that signal plans being made.
const LOGISTICS_MARKERS: &[&str] = &[
    "tomorrow", "today", "tonight", "when", "where", "meet", "plan", "time",
];

/// Words that signal emotional content beyond punctuation.
const EMOTION_MARKERS: &[&str] = &[
    "love", "hate", "miss", "sorry", "happy", "sad", "excited", "worried",
];

/// Openers that read as starting a topic rather than replying to one.
const PROACTIVE_OPENERS: &[&str] = &["hey", "so ", "btw", "guess", "did you", "have you", "quick q"];

/// Words that signal reasoning rather than reaction.
const ANALYTICAL_MARKERS: &[&str] = &["because", "think", "actually", "probably", "basically"];

// ============================================================================
// Quality score
// ============================================================================

/// Heuristic per-message quality score; higher is more revealing of voice.
///
/// The 10-200 char sweet spot scores highest; questions, exclamations and
/// trailing thoughts get fixed bonuses; lexical diversity contributes
/// continuously; informal markers and emoji add small flat bonuses.
pub fn quality_score(message: &Message) -> f64 {
    let text = &message.text;
    let chars = text.chars().count();
    let lower = text.to_lowercase();

    let mut score = match chars {
        10..=200 => 3.0,
        201..=400 => 1.5,
        _ => 0.5,
    };

    if text.contains('?') {
        score += 2.0;
    }
    if text.contains('!') {
        score += 1.5;
    }
    if text.contains("...") || text.contains('…') {
        score += 1.0;
    }

    let words: Vec<&str> = lower.split_whitespace().collect();
    if !words.is_empty() {
        let unique: HashSet<&&str> = words.iter().collect();
        score += (unique.len() as f64 / words.len() as f64) * 2.0;
    }

    if INFORMAL_MARKERS.iter().any(|m| lower.contains(m)) {
        score += 1.0;
    }
    if has_emoji(text) {
        score += 0.5;
    }

    score
}

fn has_emoji(text: &str) -> bool {
    text.chars().any(|c| {
        let code = c as u32;
        (0x1F300..=0x1FAFF).contains(&code) || (0x2600..=0x27BF).contains(&code)
    })
}

// ============================================================================
// Category predicates
// ============================================================================

/// Independent content-shape predicates. A message may match several; it is
/// still taken at most once.
fn content_categories(message: &Message) -> [bool; 5] {
    let text = &message.text;
    let lower = text.to_lowercase();
    let chars = text.chars().count();
    [
        text.contains('?'),
        chars > 100,
        text.contains('!') || text.contains("...") || text.contains('…'),
        LOGISTICS_MARKERS.iter().any(|m| lower.contains(m)),
        INFORMAL_MARKERS.iter().any(|m| lower.contains(m)) || has_emoji(text),
    ]
}

/// Independent behavioral-register predicates, same style as content.
fn behavioral_categories(message: &Message) -> [bool; 5] {
    let text = &message.text;
    let lower = text.to_lowercase();
    let chars = text.chars().count();
    [
        PROACTIVE_OPENERS.iter().any(|o| lower.starts_with(o)),
        chars <= 12,
        text.contains('!') || has_emoji(text) || EMOTION_MARKERS.iter().any(|m| lower.contains(m)),
        chars > 150 || ANALYTICAL_MARKERS.iter().any(|m| lower.contains(m)),
        INFORMAL_MARKERS.iter().any(|m| lower.contains(m)),
    ]
}

// ============================================================================
// Selection
// ============================================================================

/// Select up to `cap` representative messages. Returns the input unchanged
/// when it already fits; otherwise exactly `cap` distinct messages drawn
/// from the input, in chronological (input) order.
pub fn sample(messages: &[Message], cap: usize) -> Vec<Message> {
    if messages.len() <= cap {
        return messages.to_vec();
    }
    if cap == 0 {
        return Vec::new();
    }

    let scores: Vec<f64> = messages.iter().map(quality_score).collect();
    let mut chosen: HashSet<usize> = HashSet::new();

    // Stratum 1 — 40% of the cap: highest quality first.
    let quality_n = cap * 40 / 100;
    let mut by_quality: Vec<usize> = (0..messages.len()).collect();
    by_quality.sort_by(|a, b| scores[*b].partial_cmp(&scores[*a]).unwrap_or(std::cmp::Ordering::Equal));
    for &idx in by_quality.iter().take(quality_n) {
        chosen.insert(idx);
    }

    // Stratum 2 — 30% split across the five content categories.
    pick_by_category(messages, &by_quality, &mut chosen, cap * 30 / 100, content_categories);

    // Stratum 3 — 20% split across the five behavioral categories.
    pick_by_category(messages, &by_quality, &mut chosen, cap * 20 / 100, behavioral_categories);

    // Stratum 4 — whatever budget is left goes to the most recent messages
    // not already chosen. Filling the remainder here (instead of a fixed
    // 10%) is what guarantees exactly `cap` results.
    for idx in (0..messages.len()).rev() {
        if chosen.len() >= cap {
            break;
        }
        chosen.insert(idx);
    }

    let mut indices: Vec<usize> = chosen.into_iter().collect();
    indices.sort_unstable();
    indices.truncate(cap);
    indices.into_iter().map(|i| messages[i].clone()).collect()
}

/// Take up to `budget` messages split evenly across five categories, best
/// quality first within each category, skipping already-chosen messages.
fn pick_by_category(
    messages: &[Message],
    by_quality: &[usize],
    chosen: &mut HashSet<usize>,
    budget: usize,
    categorize: fn(&Message) -> [bool; 5],
) {
    if budget == 0 {
        return;
    }
    let per_category = (budget / 5).max(1);
    let mut taken = 0usize;

    for category in 0..5 {
        let mut taken_here = 0usize;
        // by_quality is already sorted best-first, so the first matching
        // unchosen indices are the best representatives of the category.
        for &idx in by_quality {
            if taken >= budget || taken_here >= per_category {
                break;
            }
            if chosen.contains(&idx) {
                continue;
            }
            if categorize(&messages[idx])[category] {
                chosen.insert(idx);
                taken += 1;
                taken_here += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn msg(text: &str, minute: i64) -> Message {
        Message::new(
            "Alice",
            text,
            Utc.with_ymd_and_hms(2023, 1, 2, 10, 0, 0).unwrap() + Duration::minutes(minute),
        )
    }

    fn corpus(n: usize) -> Vec<Message> {
        (0..n)
            .map(|i| match i % 5 {
                0 => msg(&format!("do you want to grab dinner later? {i}"), i as i64),
                1 => msg(&format!("lol that was wild {i}"), i as i64),
                2 => msg("k", i as i64),
                3 => msg(
                    &format!(
                        "I actually think the plan makes sense because the timing works out \
                         and nobody else volunteered to organize anything this month {i}"
                    ),
                    i as i64,
                ),
                _ => msg(&format!("omg!! no way {i}"), i as i64),
            })
            .collect()
    }

    #[test]
    fn test_identity_under_cap() {
        let messages = corpus(10);
        let out = sample(&messages, 20);
        assert_eq!(out, messages);
    }

    #[test]
    fn test_exactly_cap_no_duplicates_all_from_input() {
        let messages = corpus(100);
        let out = sample(&messages, 30);
        assert_eq!(out.len(), 30);

        let mut seen = HashSet::new();
        for m in &out {
            assert!(seen.insert(m.text.clone()), "duplicate: {}", m.text);
            assert!(messages.contains(m), "not from input: {}", m.text);
        }
    }

    #[test]
    fn test_output_is_chronological() {
        let messages = corpus(80);
        let out = sample(&messages, 25);
        for pair in out.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[test]
    fn test_recent_slice_is_represented() {
        let messages = corpus(100);
        let out = sample(&messages, 30);
        // The remainder stratum pulls from the tail, so the very last
        // message is always present.
        assert!(out.iter().any(|m| m.text == messages[99].text));
    }

    #[test]
    fn test_questions_score_higher_than_filler() {
        let question = msg("want to come along tomorrow?", 0);
        let filler = msg("k", 1);
        assert!(quality_score(&question) > quality_score(&filler));
    }

    #[test]
    fn test_sweet_spot_beats_wall_of_text() {
        let sweet = msg("that movie honestly surprised me, great pick", 0);
        let wall = msg(&"word ".repeat(120), 1);
        assert!(quality_score(&sweet) > quality_score(&wall));
    }

    #[test]
    fn test_cap_zero() {
        let messages = corpus(10);
        assert!(sample(&messages, 0).is_empty());
    }
}
