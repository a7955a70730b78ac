//! Per-client quota ledger using in-memory counters.
//!
//! The counters are monotonic: deleting a persona never decrements the
//! ledger. This is a permanent ceiling, not a usage meter the user can
//! reset. The store is a trait so a multi-instance deployment can swap in
//! an external key-value backend; the in-memory impl serializes every
//! check-and-increment under one lock, which closes the race where two
//! concurrent uploads from the same client both pass the persona check
//! before either commits.

use std::collections::HashMap;
use std::sync::Mutex;

/// Per-client usage counters. Mutated monotonically upward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuotaRecord {
    pub persona_count: u32,
    pub messages_used: u32,
}

/// Injectable quota store. All operations are atomic with respect to each
/// other for a given client.
pub trait QuotaStore: Send + Sync {
    /// Current counters for the client (zeroes when never seen).
    fn snapshot(&self, client: &str) -> QuotaRecord;

    /// Atomically grant up to `requested` persona slots under `cap`,
    /// incrementing the counter by the granted amount. Returns the grant,
    /// which may be zero.
    fn reserve_personas(&self, client: &str, requested: u32, cap: u32) -> u32;

    /// Atomically count one practice message against `ceiling`. Returns
    /// `Ok(used)` with the new total, or `Err(used)` when the ceiling was
    /// already reached (the counter is not advanced past it).
    fn record_message(&self, client: &str, ceiling: u32) -> Result<u32, u32>;
}

/// Process-memory ledger: per-client records behind one mutex.
pub struct InMemoryQuotaStore {
    records: Mutex<HashMap<String, QuotaRecord>>,
}

impl InMemoryQuotaStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryQuotaStore {
    fn default() -> Self {
        Self::new()
    }
}

impl QuotaStore for InMemoryQuotaStore {
    fn snapshot(&self, client: &str) -> QuotaRecord {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.get(client).copied().unwrap_or_default()
    }

    fn reserve_personas(&self, client: &str, requested: u32, cap: u32) -> u32 {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let record = records.entry(client.to_string()).or_default();
        let remaining = cap.saturating_sub(record.persona_count);
        let granted = requested.min(remaining);
        record.persona_count += granted;
        if granted < requested {
            tracing::info!(
                client = %client,
                requested,
                granted,
                "Persona reservation partially granted"
            );
        }
        granted
    }

    fn record_message(&self, client: &str, ceiling: u32) -> Result<u32, u32> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let record = records.entry(client.to_string()).or_default();
        if record.messages_used >= ceiling {
            return Err(record.messages_used);
        }
        record.messages_used += 1;
        Ok(record.messages_used)
    }
}
