//! Synthesis strategy variants.

use crate::error::ConfigError;
use conclave_types::{MemberId, SynthesisStrategyKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default agreement threshold for consensus extraction.
pub const DEFAULT_AGREEMENT_THRESHOLD: f64 = 0.8;

fn default_agreement_threshold() -> f64 {
    DEFAULT_AGREEMENT_THRESHOLD
}

/// How the meta-synthesis moderator is chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "lowercase")]
pub enum ModeratorStrategy {
    /// Always the named member.
    Permanent {
        /// The moderator member; must belong to the council.
        member_id: MemberId,
    },
    /// Round-robin over the council by request count.
    Rotate,
    /// Highest-ranked member per the model rankings table.
    Strongest,
}

/// The synthesis algorithm and its parameters, as a tagged union so
/// invalid combinations are unrepresentable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "kebab-case")]
pub enum SynthesisStrategy {
    /// Pick the maximal agreement subset and answer from its centroid.
    ConsensusExtraction {
        /// Pairwise similarity needed to join the agreement subset.
        #[serde(default = "default_agreement_threshold")]
        agreement_threshold: f64,
    },
    /// Fuse member answers ordered by weight share.
    WeightedFusion {
        /// Per-member weights; must be non-empty with positive finite values.
        weights: HashMap<MemberId, f64>,
    },
    /// A moderator member synthesizes the whole thread.
    MetaSynthesis {
        /// Moderator selection policy.
        moderator: ModeratorStrategy,
    },
}

impl SynthesisStrategy {
    /// The tag recorded on decisions produced by this strategy.
    pub fn kind(&self) -> SynthesisStrategyKind {
        match self {
            Self::ConsensusExtraction { .. } => SynthesisStrategyKind::ConsensusExtraction,
            Self::WeightedFusion { .. } => SynthesisStrategyKind::WeightedFusion,
            Self::MetaSynthesis { .. } => SynthesisStrategyKind::MetaSynthesis,
        }
    }

    /// Validates strategy parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::ConsensusExtraction {
                agreement_threshold,
            } => {
                if !(0.0..=1.0).contains(agreement_threshold) {
                    return Err(ConfigError::Invalid(format!(
                        "agreement_threshold {} outside [0, 1]",
                        agreement_threshold
                    )));
                }
                Ok(())
            }
            Self::WeightedFusion { weights } => validate_weights(weights),
            Self::MetaSynthesis { moderator } => {
                if let ModeratorStrategy::Permanent { member_id } = moderator {
                    if member_id.is_empty() {
                        return Err(ConfigError::Invalid(
                            "permanent moderator requires a member id".into(),
                        ));
                    }
                }
                Ok(())
            }
        }
    }
}

impl Default for SynthesisStrategy {
    fn default() -> Self {
        Self::ConsensusExtraction {
            agreement_threshold: DEFAULT_AGREEMENT_THRESHOLD,
        }
    }
}

/// Validates a weighted-fusion weight map: non-empty, all values finite
/// and strictly positive.
pub fn validate_weights(weights: &HashMap<MemberId, f64>) -> Result<(), ConfigError> {
    if weights.is_empty() {
        return Err(ConfigError::InvalidWeights("weights map is empty".into()));
    }
    for (member, &w) in weights {
        if !w.is_finite() || w <= 0.0 {
            return Err(ConfigError::InvalidWeights(format!(
                "weight for member '{}' must be a positive finite number, got {}",
                member, w
            )));
        }
    }
    Ok(())
}
