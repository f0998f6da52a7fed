//! Per-request orchestration metrics.

use conclave_types::InitialResponse;
use serde::Serialize;

/// Accumulated usage and outcome counters for one orchestration.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OrchestrationMetrics {
    /// Total cost across every provider call, in USD.
    pub total_cost_usd: f64,
    /// Prompt tokens across every provider call.
    pub prompt_tokens: u64,
    /// Completion tokens across every provider call.
    pub completion_tokens: u64,
    /// Wall-clock duration of the orchestration, in milliseconds.
    pub duration_ms: u64,
    /// Deliberation rounds actually run.
    pub deliberation_rounds: u32,
    /// Member calls that produced usable content.
    pub members_succeeded: u32,
    /// Member calls that settled as failures.
    pub members_failed: u32,
}

impl OrchestrationMetrics {
    /// Folds one member response into the counters.
    pub fn absorb(&mut self, response: &InitialResponse) {
        self.total_cost_usd += response.cost_usd;
        self.prompt_tokens += response.prompt_tokens as u64;
        self.completion_tokens += response.completion_tokens as u64;
        if response.ok {
            self.members_succeeded += 1;
        } else {
            self.members_failed += 1;
        }
    }
}
