//! Provider call failures.

use conclave_types::ProviderErrorKind;
use thiserror::Error;

/// A failed provider call, classified for retry decisions.
#[derive(Debug, Clone, Error)]
#[error("provider call failed ({kind}): {message}")]
pub struct ProviderError {
    /// Failure classification.
    pub kind: ProviderErrorKind,
    /// Provider- or transport-level detail.
    pub message: String,
}

impl ProviderError {
    /// Creates an error of the given kind.
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// A timeout failure.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Timeout, message)
    }

    /// A transport failure.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Network, message)
    }

    /// An unparseable or empty provider response.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::InvalidResponse, message)
    }

    /// A cancellation.
    pub fn cancelled() -> Self {
        Self::new(ProviderErrorKind::Cancelled, "call cancelled")
    }
}
