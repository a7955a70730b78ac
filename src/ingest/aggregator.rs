//! Message aggregator — merges parser outputs from all uploaded files into
//! one chronological stream and picks the two most active senders as the
//! personas. Everyone else is fully discarded (one persona is "self", one is
//! "other"; that is a business rule, not an accident).

use crate::error::AppError;
use crate::ingest::message::Message;

/// Flatten all parsed files into one list sorted by timestamp ascending.
/// The sort is stable, so same-timestamp messages keep their input order.
pub fn aggregate(files: Vec<Vec<Message>>) -> Vec<Message> {
    let mut all: Vec<Message> = files.into_iter().flatten().collect();
    all.sort_by_key(|m| m.timestamp);
    all
}

/// Group messages by exact sender string (case-sensitive, no normalization),
/// preserving first-encounter order of the buckets.
pub fn group_by_sender(messages: &[Message]) -> Vec<(String, Vec<Message>)> {
    let mut buckets: Vec<(String, Vec<Message>)> = Vec::new();
    for message in messages {
        match buckets.iter_mut().find(|(name, _)| *name == message.sender) {
            Some((_, bucket)) => bucket.push(message.clone()),
            None => buckets.push((message.sender.clone(), vec![message.clone()])),
        }
    }
    buckets
}

/// Keep only the top `k` buckets by message count (descending). Ties are
/// broken by encounter order. Buckets outside the top-k are dropped whole —
/// no partial inclusion.
pub fn select_top(mut buckets: Vec<(String, Vec<Message>)>, k: usize) -> Vec<(String, Vec<Message>)> {
    buckets.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
    buckets.truncate(k);
    buckets
}

/// Fail when parsing produced nothing usable at all.
pub fn require_messages(messages: &[Message]) -> Result<(), AppError> {
    if messages.is_empty() {
        return Err(AppError::NoValidMessages);
    }
    Ok(())
}
