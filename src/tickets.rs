//! Scoring-ticket cache: a short-lived, at-most-once keyed store mapping an
//! opaque scoring-request id to a pending/resolved result, polled by the
//! client. Resolved and failed entries are removed the first time they are
//! read; entries nobody polls are evicted by the periodic prune.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A resolved authenticity score with its improvement tips.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreResult {
    pub score: u8,
    pub tips: Vec<String>,
}

#[derive(Debug)]
enum TicketState {
    Pending,
    Resolved(ScoreResult),
    Failed,
}

struct Entry {
    state: TicketState,
    created: Instant,
}

/// What a poll observes. `Complete` and `Error` are terminal: the entry is
/// gone after this read.
#[derive(Debug, PartialEq, Eq)]
pub enum TicketLookup {
    Pending,
    Complete(ScoreResult),
    Error,
    NotFound,
}

/// Entries older than this are eligible for pruning regardless of state.
pub const TICKET_TTL: Duration = Duration::from_secs(600);

/// In-memory ticket store. Shared across requests behind one mutex.
pub struct TicketCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl TicketCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Register a new pending ticket and return its id.
    pub fn create(&self) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            id.clone(),
            Entry {
                state: TicketState::Pending,
                created: Instant::now(),
            },
        );
        id
    }

    /// Resolve a pending ticket. A ticket transitions at most once; resolve
    /// on an already-terminal or unknown ticket is a no-op.
    pub fn resolve(&self, id: &str, result: ScoreResult) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = entries.get_mut(id) {
            if matches!(entry.state, TicketState::Pending) {
                entry.state = TicketState::Resolved(result);
            }
        }
    }

    /// Mark a pending ticket as failed. Same at-most-once rule as `resolve`.
    pub fn fail(&self, id: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = entries.get_mut(id) {
            if matches!(entry.state, TicketState::Pending) {
                entry.state = TicketState::Failed;
            }
        }
    }

    /// Look up a ticket, consuming terminal entries (at-most-once delivery).
    pub fn take(&self, id: &str) -> TicketLookup {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let is_pending = match entries.get(id) {
            None => return TicketLookup::NotFound,
            Some(entry) => matches!(entry.state, TicketState::Pending),
        };
        if is_pending {
            return TicketLookup::Pending;
        }
        match entries.remove(id) {
            Some(Entry {
                state: TicketState::Resolved(result),
                ..
            }) => TicketLookup::Complete(result),
            _ => TicketLookup::Error,
        }
    }

    /// Drop entries older than `max_age`. Called opportunistically from a
    /// background task, not on every request.
    pub fn prune(&self, max_age: Duration) {
        let cutoff = Instant::now() - max_age;
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, entry| entry.created > cutoff);
        let dropped = before - entries.len();
        if dropped > 0 {
            tracing::debug!(dropped, "Pruned expired scoring tickets");
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

impl Default for TicketCache {
    fn default() -> Self {
        Self::new()
    }
}
