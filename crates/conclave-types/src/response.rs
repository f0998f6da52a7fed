//! Per-member responses from a dispatch round.

use crate::council::ProviderErrorKind;
use crate::MemberId;
use serde::{Deserialize, Serialize};

/// Outcome of one member's attempt in a dispatch round.
///
/// Exactly one of these exists per attempted member per round, whether
/// the call succeeded or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialResponse {
    /// The member that was called.
    pub member_id: MemberId,
    /// Response text; empty on failure.
    pub content: String,
    /// Wall-clock latency of the attempt chain, in milliseconds.
    pub latency_ms: u64,
    /// Cost attributed to the call, in USD.
    pub cost_usd: f64,
    /// Prompt tokens reported by the provider.
    pub prompt_tokens: u32,
    /// Completion tokens reported by the provider.
    pub completion_tokens: u32,
    /// Whether the call produced usable content.
    pub ok: bool,
    /// Failure classification when `ok` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ProviderErrorKind>,
}

impl InitialResponse {
    /// Builds a successful response.
    pub fn success(
        member_id: impl Into<MemberId>,
        content: impl Into<String>,
        latency_ms: u64,
    ) -> Self {
        Self {
            member_id: member_id.into(),
            content: content.into(),
            latency_ms,
            cost_usd: 0.0,
            prompt_tokens: 0,
            completion_tokens: 0,
            ok: true,
            error_kind: None,
        }
    }

    /// Builds a failed response carrying the error classification.
    pub fn failure(
        member_id: impl Into<MemberId>,
        kind: ProviderErrorKind,
        latency_ms: u64,
    ) -> Self {
        Self {
            member_id: member_id.into(),
            content: String::new(),
            latency_ms,
            cost_usd: 0.0,
            prompt_tokens: 0,
            completion_tokens: 0,
            ok: false,
            error_kind: Some(kind),
        }
    }

    /// Sets token usage and cost.
    pub fn with_usage(mut self, prompt_tokens: u32, completion_tokens: u32, cost_usd: f64) -> Self {
        self.prompt_tokens = prompt_tokens;
        self.completion_tokens = completion_tokens;
        self.cost_usd = cost_usd;
        self
    }
}
