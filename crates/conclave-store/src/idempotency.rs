//! At-most-once request deduplication.

use crate::error::StoreError;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use uuid::Uuid;

/// Upper bound on how long a losing submission waits for the winner.
pub const WAIT_TIMEOUT_CAP: Duration = Duration::from_secs(30);

/// Lifecycle of an idempotency entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdempotencyState {
    /// The winning submission is still orchestrating.
    InProgress,
    /// The winning submission completed; `result` holds its response.
    Completed,
    /// The winning submission failed; `result` holds its error payload.
    Failed,
}

/// One cached submission outcome.
#[derive(Debug, Clone)]
pub struct IdempotencyRecord {
    /// Hash-scoped key the entry is stored under.
    pub scoped_key: String,
    /// Entry state.
    pub state: IdempotencyState,
    /// Request id assigned to the winning submission.
    pub request_id: Uuid,
    /// Cached response payload, present once terminal.
    pub result: Option<serde_json::Value>,
    /// Expiry for clients inspecting the record.
    pub expires_at: DateTime<Utc>,
}

struct CacheEntry {
    record: IdempotencyRecord,
    notify: Arc<Notify>,
    deadline: Instant,
}

/// Derives the storage key: `hex(sha256(user_id ‖ ":" ‖ client_key))`.
///
/// Scoping by user means the same client key from different users never
/// collides.
pub fn scoped_key(user_id: &str, client_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update(b":");
    hasher.update(client_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// At-most-once dedup cache with atomic set-if-absent and completion
/// waiters.
///
/// All mutations happen under a single mutex, which gives
/// [`IdempotencyCache::mark_in_progress`] its required set-if-absent
/// atomicity.
#[derive(Debug, Default)]
pub struct IdempotencyCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl std::fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("record", &self.record)
            .finish()
    }
}

impl IdempotencyCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the live record for a key.
    pub fn check(&self, key: &str) -> Option<IdempotencyRecord> {
        let entries = self.entries.lock();
        entries.get(key).and_then(|e| {
            (e.deadline > Instant::now()).then(|| e.record.clone())
        })
    }

    /// Atomically claims a key for a new submission.
    ///
    /// Returns `true` when this caller won the race and owns the entry;
    /// `false` when a live entry already exists.
    pub fn mark_in_progress(&self, key: &str, request_id: Uuid, ttl: Duration) -> bool {
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(key) {
            if existing.deadline > Instant::now() {
                return false;
            }
        }
        entries.insert(
            key.to_string(),
            CacheEntry {
                record: IdempotencyRecord {
                    scoped_key: key.to_string(),
                    state: IdempotencyState::InProgress,
                    request_id,
                    result: None,
                    expires_at: Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_default(),
                },
                notify: Arc::new(Notify::new()),
                deadline: Instant::now() + ttl,
            },
        );
        true
    }

    fn terminalize(&self, key: &str, state: IdempotencyState, result: serde_json::Value) {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(key) {
            entry.record.state = state;
            entry.record.result = Some(result);
            entry.notify.notify_waiters();
        }
    }

    /// Caches the successful response for a key and wakes waiters.
    pub fn cache_result(&self, key: &str, result: serde_json::Value) {
        self.terminalize(key, IdempotencyState::Completed, result);
    }

    /// Caches a failure for a key and wakes waiters.
    ///
    /// Called on every failure path, including panics converted at the
    /// orchestration boundary, so no waiter hangs.
    pub fn cache_error(&self, key: &str, error: serde_json::Value) {
        self.terminalize(key, IdempotencyState::Failed, error);
    }

    /// Blocks until the entry for `key` becomes terminal, up to
    /// `timeout` (capped at [`WAIT_TIMEOUT_CAP`]).
    pub async fn wait_for_completion(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<IdempotencyRecord, StoreError> {
        let deadline = Instant::now() + timeout.min(WAIT_TIMEOUT_CAP);
        loop {
            let notify = {
                let entries = self.entries.lock();
                match entries.get(key) {
                    None => return Err(StoreError::IdempotencyMissing(key.to_string())),
                    Some(e) if e.record.state != IdempotencyState::InProgress => {
                        return Ok(e.record.clone());
                    }
                    Some(e) => e.notify.clone(),
                }
            };

            let notified = notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            // Entry may have terminalized between the lock drop and
            // enabling interest.
            if let Some(record) = self.check(key) {
                if record.state != IdempotencyState::InProgress {
                    return Ok(record);
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(StoreError::WaitTimeout(key.to_string()));
            }
            if tokio::time::timeout(remaining, notified).await.is_err() {
                return Err(StoreError::WaitTimeout(key.to_string()));
            }
        }
    }

    /// Drops expired entries.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| e.deadline > now);
        before - entries.len()
    }
}
