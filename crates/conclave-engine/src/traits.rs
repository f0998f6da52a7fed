//! Collaborator boundaries of the engine.

use async_trait::async_trait;
use conclave_types::{ConsensusDecision, SessionContext};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use uuid::Uuid;

/// Conversation history lookup and append.
///
/// Real deployments back this with the session service; the engine only
/// relies on the bounded-context contract.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetches bounded context for a session.
    async fn fetch_context(&self, session_id: Uuid) -> SessionContext;

    /// Appends a completed exchange to session history.
    ///
    /// Called exactly once per completed request.
    async fn append_decision(&self, session_id: Uuid, query: &str, decision: &ConsensusDecision);
}

/// Cost and decision telemetry.
pub trait MetricsSink: Send + Sync {
    /// Records the cost of a completed request. Called exactly once.
    fn log_cost(&self, request_id: Uuid, cost_usd: f64, prompt_tokens: u64, completion_tokens: u64);

    /// Records the consensus decision. Called exactly once.
    fn log_consensus_decision(&self, request_id: Uuid, decision: &ConsensusDecision);
}

/// Session store backed by process memory.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    contexts: Mutex<HashMap<Uuid, SessionContext>>,
    appended: Mutex<Vec<(Uuid, String)>>,
}

impl InMemorySessionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the context returned for a session.
    pub fn seed_context(&self, session_id: Uuid, context: SessionContext) {
        self.contexts.lock().insert(session_id, context);
    }

    /// How many exchanges were appended for a session.
    pub fn append_count(&self, session_id: Uuid) -> usize {
        self.appended
            .lock()
            .iter()
            .filter(|(id, _)| *id == session_id)
            .count()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn fetch_context(&self, session_id: Uuid) -> SessionContext {
        self.contexts
            .lock()
            .get(&session_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn append_decision(&self, session_id: Uuid, query: &str, _decision: &ConsensusDecision) {
        self.appended.lock().push((session_id, query.to_string()));
    }
}

/// Metrics sink that counts calls, for tests and local runs.
#[derive(Debug, Default)]
pub struct RecordingMetricsSink {
    cost_calls: AtomicU32,
    decision_calls: AtomicU32,
    total_cost: Mutex<f64>,
}

impl RecordingMetricsSink {
    /// Creates a fresh sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times `log_cost` was called.
    pub fn cost_calls(&self) -> u32 {
        self.cost_calls.load(Ordering::SeqCst)
    }

    /// How many times `log_consensus_decision` was called.
    pub fn decision_calls(&self) -> u32 {
        self.decision_calls.load(Ordering::SeqCst)
    }

    /// Sum of all costs logged.
    pub fn total_cost(&self) -> f64 {
        *self.total_cost.lock()
    }
}

impl MetricsSink for RecordingMetricsSink {
    fn log_cost(
        &self,
        request_id: Uuid,
        cost_usd: f64,
        prompt_tokens: u64,
        completion_tokens: u64,
    ) {
        self.cost_calls.fetch_add(1, Ordering::SeqCst);
        *self.total_cost.lock() += cost_usd;
        tracing::debug!(
            request_id = %request_id,
            cost_usd = cost_usd,
            prompt_tokens = prompt_tokens,
            completion_tokens = completion_tokens,
            "Cost logged"
        );
    }

    fn log_consensus_decision(&self, request_id: Uuid, decision: &ConsensusDecision) {
        self.decision_calls.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(
            request_id = %request_id,
            confidence = %decision.confidence,
            "Consensus decision logged"
        );
    }
}
