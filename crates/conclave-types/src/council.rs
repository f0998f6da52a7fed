//! Council membership and per-member retry behavior.

use crate::error::ValidationError;
use crate::MemberId;
use serde::{Deserialize, Serialize};

/// Classification of a failed provider call.
///
/// The kind decides both retry eligibility and how the failure is
/// reported in the member's [`crate::InitialResponse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// The call exceeded the member's timeout.
    Timeout,
    /// The provider rejected the call with a rate-limit response.
    RateLimited,
    /// The provider reported itself overloaded.
    Overloaded,
    /// Transport-level failure (DNS, connect, reset).
    Network,
    /// The provider answered with an unparseable or empty body.
    InvalidResponse,
    /// Credentials were rejected by the provider.
    Auth,
    /// The request itself was malformed for this provider.
    BadRequest,
    /// The call was cancelled by the request-scoped signal.
    Cancelled,
}

impl ProviderErrorKind {
    /// Whether this kind is retryable when no explicit policy says otherwise.
    pub fn retryable_by_default(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::RateLimited | Self::Overloaded | Self::Network
        )
    }
}

impl std::fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::Overloaded => "overloaded",
            Self::Network => "network",
            Self::InvalidResponse => "invalid_response",
            Self::Auth => "auth",
            Self::BadRequest => "bad_request",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Retry policy for one member's provider calls.
///
/// Delays grow as `initial_delay_ms * multiplier^(attempt-1)` capped at
/// `max_delay_ms`. Only error kinds listed in `retryable_kinds` are
/// retried; everything else fails the call on the first attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub initial_delay_ms: u64,
    /// Upper bound on any single delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Multiplier applied per retry.
    pub backoff_multiplier: f64,
    /// Error kinds that are retried.
    pub retryable_kinds: Vec<ProviderErrorKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 8_000,
            backoff_multiplier: 2.0,
            retryable_kinds: vec![
                ProviderErrorKind::Timeout,
                ProviderErrorKind::RateLimited,
                ProviderErrorKind::Overloaded,
                ProviderErrorKind::Network,
            ],
        }
    }
}

impl RetryPolicy {
    /// Validates the policy parameters.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attempts < 1 {
            return Err(ValidationError::InvalidRetryPolicy(
                "max_attempts must be at least 1".into(),
            ));
        }
        if self.initial_delay_ms == 0 {
            return Err(ValidationError::InvalidRetryPolicy(
                "initial_delay_ms must be positive".into(),
            ));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(ValidationError::InvalidRetryPolicy(
                "max_delay_ms must be at least initial_delay_ms".into(),
            ));
        }
        if !(self.backoff_multiplier > 0.0) {
            return Err(ValidationError::InvalidRetryPolicy(
                "backoff_multiplier must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Whether a failure of `kind` should be retried under this policy.
    pub fn is_retryable(&self, kind: ProviderErrorKind) -> bool {
        self.retryable_kinds.contains(&kind)
    }
}

/// One member of a council: a provider+model pair with its own timeout
/// and retry behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouncilMember {
    /// Identifier unique within the council config.
    pub id: MemberId,
    /// Provider tag the pool routes by (e.g. `openai`, `anthropic`).
    pub provider: String,
    /// Model name sent to the provider.
    pub model: String,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
    /// Retry behavior for this member's calls.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Optional weight used by weighted-fusion synthesis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

impl CouncilMember {
    /// Validates the member's own fields.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::InvalidCouncil(
                "member id cannot be empty".into(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidCouncil(format!(
                "member '{}' has zero timeout",
                self.id
            )));
        }
        if let Some(w) = self.weight {
            if !(w >= 0.0) {
                return Err(ValidationError::InvalidCouncil(format!(
                    "member '{}' has negative or NaN weight",
                    self.id
                )));
            }
        }
        self.retry.validate()
    }
}
