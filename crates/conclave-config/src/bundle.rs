//! The six typed configs that drive orchestration.

use crate::error::ConfigError;
use crate::strategy::SynthesisStrategy;
use conclave_types::{CouncilMember, MemberId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Who the council is and what quorum it needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouncilConfig {
    /// Council members; at least two, ids unique.
    pub members: Vec<CouncilMember>,
    /// Minimum successful responses required for consensus.
    pub minimum_size: usize,
    /// Whether falling below `minimum_size` fails the request.
    #[serde(default = "default_true")]
    pub require_minimum_for_consensus: bool,
}

fn default_true() -> bool {
    true
}

impl CouncilConfig {
    /// Validates council composition.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.members.len() < 2 {
            return Err(ConfigError::Invalid(format!(
                "council needs at least 2 members, got {}",
                self.members.len()
            )));
        }
        let mut seen = HashSet::new();
        for member in &self.members {
            member.validate()?;
            if !seen.insert(member.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate member id '{}'",
                    member.id
                )));
            }
        }
        if self.minimum_size < 1 || self.minimum_size > self.members.len() {
            return Err(ConfigError::Invalid(format!(
                "minimum_size {} outside [1, {}]",
                self.minimum_size,
                self.members.len()
            )));
        }
        Ok(())
    }

    /// Looks up a member by id.
    pub fn member(&self, id: &str) -> Option<&CouncilMember> {
        self.members.iter().find(|m| m.id == id)
    }

    /// The set of member ids.
    pub fn member_ids(&self) -> Vec<MemberId> {
        self.members.iter().map(|m| m.id.clone()).collect()
    }
}

/// How many deliberation rounds run and when they stop early.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliberationConfig {
    /// Deliberation rounds after the initial dispatch, 0..=5.
    pub rounds: u32,
    /// Pairwise similarity at which a round counts as consensus.
    pub early_termination_threshold: f64,
    /// Whether a member's own previous answer is redacted from its prompt.
    #[serde(default)]
    pub redact_own_response: bool,
}

impl Default for DeliberationConfig {
    fn default() -> Self {
        Self {
            rounds: 1,
            early_termination_threshold: 0.95,
            redact_own_response: false,
        }
    }
}

impl DeliberationConfig {
    /// Maximum deliberation rounds the engine will run.
    pub const MAX_ROUNDS: u32 = 5;

    /// Validates the deliberation parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rounds > Self::MAX_ROUNDS {
            return Err(ConfigError::Invalid(format!(
                "rounds {} exceeds maximum of {}",
                self.rounds,
                Self::MAX_ROUNDS
            )));
        }
        if !(0.0..=1.0).contains(&self.early_termination_threshold) {
            return Err(ConfigError::Invalid(format!(
                "early_termination_threshold {} outside [0, 1]",
                self.early_termination_threshold
            )));
        }
        Ok(())
    }
}

/// Synthesis strategy selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// The strategy and its parameters.
    #[serde(flatten)]
    pub strategy: SynthesisStrategy,
}

impl SynthesisConfig {
    /// Validates the strategy parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.strategy.validate()
    }
}

/// Hard ceilings on one orchestration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// Global orchestration deadline, in milliseconds.
    pub global_timeout_ms: u64,
    /// Optional cost cap in USD; once exceeded no further rounds dispatch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cost_usd: Option<f64>,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            global_timeout_ms: 60_000,
            max_cost_usd: None,
        }
    }
}

impl PerformanceConfig {
    /// The global deadline as a [`Duration`].
    pub fn global_timeout(&self) -> Duration {
        Duration::from_millis(self.global_timeout_ms)
    }

    /// Validates the performance parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.global_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "global_timeout_ms must be positive".into(),
            ));
        }
        if let Some(cap) = self.max_cost_usd {
            if !cap.is_finite() || cap <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "max_cost_usd must be positive and finite, got {}",
                    cap
                )));
            }
        }
        Ok(())
    }
}

/// What per-request material is retained for inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransparencyConfig {
    /// Retain round-0 member responses for the transparency endpoint.
    pub retain_initial_responses: bool,
    /// Retain the deliberation thread.
    pub retain_thread: bool,
}

impl Default for TransparencyConfig {
    fn default() -> Self {
        Self {
            retain_initial_responses: true,
            retain_thread: true,
        }
    }
}

/// The optional critique/rewrite pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevilsAdvocateConfig {
    /// Master switch.
    pub enabled: bool,
    /// Apply to code-shaped queries.
    #[serde(default = "default_true")]
    pub apply_to_code_requests: bool,
    /// Apply to prose queries.
    #[serde(default = "default_true")]
    pub apply_to_text_requests: bool,
    /// Member used as the critic; defaults to the first council member.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critic_member_id: Option<MemberId>,
}

impl Default for DevilsAdvocateConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            apply_to_code_requests: true,
            apply_to_text_requests: true,
            critic_member_id: None,
        }
    }
}

/// An immutable snapshot of every config type, valid for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigBundle {
    /// Council composition and quorum.
    pub council: CouncilConfig,
    /// Deliberation rounds and early termination.
    #[serde(default)]
    pub deliberation: DeliberationConfig,
    /// Synthesis strategy.
    #[serde(default)]
    pub synthesis: SynthesisConfig,
    /// Deadlines and cost caps.
    #[serde(default)]
    pub performance: PerformanceConfig,
    /// Retention for inspection endpoints.
    #[serde(default)]
    pub transparency: TransparencyConfig,
    /// Optional critique pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devils_advocate: Option<DevilsAdvocateConfig>,
}

impl ConfigBundle {
    /// Validates every config in the bundle.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.council.validate()?;
        self.deliberation.validate()?;
        self.synthesis.validate()?;
        self.performance.validate()?;
        if let Some(da) = &self.devils_advocate {
            if let Some(critic) = &da.critic_member_id {
                if self.council.member(critic).is_none() {
                    return Err(ConfigError::Invalid(format!(
                        "critic member '{}' is not in the council",
                        critic
                    )));
                }
            }
        }
        Ok(())
    }
}
