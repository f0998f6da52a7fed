//! Error types for the store crate.

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur in registry and idempotency operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A write attempted to move a record out of a terminal status.
    #[error("request {0} is already terminal")]
    TerminalStatus(Uuid),

    /// The idempotency entry vanished while a waiter was blocked on it.
    #[error("idempotency entry missing for key {0}")]
    IdempotencyMissing(String),

    /// An idempotency entry was neither in progress nor terminal with a result.
    #[error("idempotency entry for key {0} is in an invalid state")]
    IdempotencyStateInvalid(String),

    /// Waiting for another submission to complete timed out.
    #[error("timed out waiting for completion of key {0}")]
    WaitTimeout(String),

    /// A stored payload could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
