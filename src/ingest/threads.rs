//! Thread reconstructor — segments the sorted two-party stream into
//! believable back-and-forth exchanges and discards everything else.
//!
//! Raw exports are full of one-sided bursts and days-apart unrelated
//! messages; only segments that look like genuine dialogue are worth
//! training a persona on.

use chrono::Duration;

use crate::ingest::message::Message;

/// A message continues the current thread only if it arrives within this
/// window of the previous message.
const THREAD_GAP: Duration = Duration::minutes(10);

/// A same-sender burst stays in the thread only while the exchange keeps
/// moving: the next raw message must arrive within this tighter window.
const BURST_GAP: Duration = Duration::minutes(5);

/// Walk `messages` (sorted, two senders) and return the flattened, pruned,
/// still-chronological transcript.
///
/// Boundary semantics, pinned: message `i` extends the current thread iff
/// its gap to the previous message is under [`THREAD_GAP`] AND either the
/// sender alternates, or the *raw stream's* next message arrives within
/// [`BURST_GAP`] of message `i`. The final message has no lookahead and
/// extends only by alternation. Threads where one sender never appears are
/// dropped whole.
pub fn reconstruct(messages: &[Message]) -> Vec<Message> {
    if messages.is_empty() {
        return Vec::new();
    }

    let mut threads: Vec<Vec<Message>> = Vec::new();
    let mut current: Vec<Message> = vec![messages[0].clone()];

    for i in 1..messages.len() {
        let message = &messages[i];
        let previous = current.last().expect("current thread is never empty");

        let within_gap = message.timestamp - previous.timestamp < THREAD_GAP;
        let alternates = message.sender != previous.sender;
        let burst_active = messages
            .get(i + 1)
            .map(|next| next.timestamp - message.timestamp < BURST_GAP)
            .unwrap_or(false);

        if within_gap && (alternates || burst_active) {
            current.push(message.clone());
        } else {
            threads.push(std::mem::replace(&mut current, vec![message.clone()]));
        }
    }
    threads.push(current);

    threads
        .into_iter()
        .filter(|thread| has_both_senders(thread))
        .flatten()
        .collect()
}

/// A thread counts as dialogue only if more than one distinct sender appears.
fn has_both_senders(thread: &[Message]) -> bool {
    let first = match thread.first() {
        Some(m) => &m.sender,
        None => return false,
    };
    thread.iter().any(|m| m.sender != *first)
}
