//! Durable request lifecycle records.

use crate::error::StoreError;
use crate::ttl::TtlStore;
use conclave_types::{DeliberationThread, InitialResponse, StoredRequest};
use std::time::Duration;
use uuid::Uuid;

/// Retention for every registry key space.
pub const REQUEST_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Durable map from request id to its lifecycle record, deliberation
/// thread, and round-0 responses.
///
/// Every save refreshes the 24 h TTL. Writes are last-writer-wins while
/// a request is `processing`; once a record is terminal, writes that
/// would change its status are rejected.
#[derive(Debug, Default)]
pub struct RequestRegistry {
    records: TtlStore<StoredRequest>,
    threads: TtlStore<DeliberationThread>,
    responses: TtlStore<Vec<InitialResponse>>,
}

impl RequestRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Saves a lifecycle record, refreshing its TTL.
    pub fn save(&self, record: StoredRequest) -> Result<(), StoreError> {
        let key = record.id.to_string();
        if let Some(existing) = self.records.get(&key) {
            if existing.status.is_terminal() && existing.status != record.status {
                return Err(StoreError::TerminalStatus(record.id));
            }
        }
        self.records.put(key, record, REQUEST_TTL);
        Ok(())
    }

    /// Fetches a lifecycle record.
    pub fn fetch(&self, id: Uuid) -> Option<StoredRequest> {
        self.records.get(&id.to_string())
    }

    /// Saves the deliberation thread for a request.
    pub fn save_thread(&self, thread: DeliberationThread) {
        self.threads
            .put(thread.request_id.to_string(), thread, REQUEST_TTL);
    }

    /// Fetches the retained deliberation thread.
    pub fn fetch_thread(&self, id: Uuid) -> Option<DeliberationThread> {
        self.threads.get(&id.to_string())
    }

    /// Saves the round-0 responses for transparency inspection.
    pub fn save_responses(&self, id: Uuid, responses: Vec<InitialResponse>) {
        self.responses.put(id.to_string(), responses, REQUEST_TTL);
    }

    /// Fetches the retained round-0 responses.
    pub fn fetch_responses(&self, id: Uuid) -> Option<Vec<InitialResponse>> {
        self.responses.get(&id.to_string())
    }

    /// Sweeps expired entries from all key spaces.
    pub fn sweep(&self) -> usize {
        self.records.sweep() + self.threads.sweep() + self.responses.sweep()
    }
}
