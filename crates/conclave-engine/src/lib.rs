//! # Conclave Engine
//!
//! The orchestration engine: drives one request through dispatch →
//! deliberation → synthesis → persistence, with strict timeout and
//! partial-failure handling.
//!
//! The engine performs no I/O of its own — providers, session history,
//! and metrics are reached through collaborator traits, and durable
//! state goes through the registry and idempotency cache.

mod deliberation;
mod error;
mod metrics;
mod orchestrator;
mod traits;

pub use deliberation::{deliberation_prompt, round_reached_consensus};
pub use error::OrchestrationError;
pub use metrics::OrchestrationMetrics;
pub use orchestrator::{EngineOptions, Orchestrator};
pub use traits::{InMemorySessionStore, MetricsSink, RecordingMetricsSink, SessionStore};
