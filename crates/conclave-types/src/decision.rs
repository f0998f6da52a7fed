//! Consensus decisions and confidence banding.

use crate::error::ValidationError;
use crate::MemberId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Agreement score below which confidence is low.
pub const LOW_CONFIDENCE_BELOW: f64 = 0.6;

/// Agreement score above which confidence is high.
pub const HIGH_CONFIDENCE_ABOVE: f64 = 0.85;

/// Confidence band of a consensus decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// Members disagreed substantially, or quorum was partial.
    Low,
    /// Moderate agreement.
    Medium,
    /// Near-unanimous agreement.
    High,
}

impl Confidence {
    /// Derives the band from an agreement score in `[0, 1]`.
    pub fn from_score(score: f64) -> Self {
        if score < LOW_CONFIDENCE_BELOW {
            Self::Low
        } else if score > HIGH_CONFIDENCE_ABOVE {
            Self::High
        } else {
            Self::Medium
        }
    }

    /// Caps the band at `limit`, keeping the lower of the two.
    pub fn capped_at(self, limit: Confidence) -> Self {
        self.min(limit)
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Which synthesis strategy produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SynthesisStrategyKind {
    /// Maximal-agreement-subset extraction.
    ConsensusExtraction,
    /// Weight-ordered fusion of member answers.
    WeightedFusion,
    /// A moderator member synthesizes the thread.
    MetaSynthesis,
}

impl std::fmt::Display for SynthesisStrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConsensusExtraction => write!(f, "consensus-extraction"),
            Self::WeightedFusion => write!(f, "weighted-fusion"),
            Self::MetaSynthesis => write!(f, "meta-synthesis"),
        }
    }
}

/// The single consensus answer returned to the user, with provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusDecision {
    /// Decision text; never empty.
    pub content: String,
    /// Confidence band derived from `agreement_level`.
    pub confidence: Confidence,
    /// Mean pairwise agreement of the contributing subset, in `[0, 1]`.
    pub agreement_level: f64,
    /// Strategy that produced the decision.
    pub synthesis_strategy: SynthesisStrategyKind,
    /// Members whose answers shaped the decision; never empty.
    pub contributing_member_ids: Vec<MemberId>,
    /// When synthesis produced the decision.
    pub timestamp: DateTime<Utc>,
}

impl ConsensusDecision {
    /// Constructs a decision, enforcing its invariants.
    pub fn new(
        content: impl Into<String>,
        agreement_level: f64,
        synthesis_strategy: SynthesisStrategyKind,
        contributing_member_ids: Vec<MemberId>,
    ) -> Result<Self, ValidationError> {
        let content = content.into();
        if content.is_empty() {
            return Err(ValidationError::InvalidDecision(
                "decision content cannot be empty".into(),
            ));
        }
        if contributing_member_ids.is_empty() {
            return Err(ValidationError::InvalidDecision(
                "decision must name at least one contributing member".into(),
            ));
        }
        if !(0.0..=1.0).contains(&agreement_level) {
            return Err(ValidationError::InvalidDecision(format!(
                "agreement level {} outside [0, 1]",
                agreement_level
            )));
        }
        Ok(Self {
            content,
            confidence: Confidence::from_score(agreement_level),
            agreement_level,
            synthesis_strategy,
            contributing_member_ids,
            timestamp: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_bands() {
        assert_eq!(Confidence::from_score(0.0), Confidence::Low);
        assert_eq!(Confidence::from_score(0.59), Confidence::Low);
        assert_eq!(Confidence::from_score(0.6), Confidence::Medium);
        assert_eq!(Confidence::from_score(0.85), Confidence::Medium);
        assert_eq!(Confidence::from_score(0.86), Confidence::High);
        assert_eq!(Confidence::from_score(1.0), Confidence::High);
    }

    #[test]
    fn test_confidence_cap() {
        assert_eq!(Confidence::High.capped_at(Confidence::Medium), Confidence::Medium);
        assert_eq!(Confidence::Low.capped_at(Confidence::Medium), Confidence::Low);
    }

    #[test]
    fn test_decision_invariants() {
        assert!(ConsensusDecision::new(
            "",
            0.9,
            SynthesisStrategyKind::ConsensusExtraction,
            vec!["m1".into()],
        )
        .is_err());

        assert!(ConsensusDecision::new(
            "answer",
            0.9,
            SynthesisStrategyKind::ConsensusExtraction,
            vec![],
        )
        .is_err());

        assert!(ConsensusDecision::new(
            "answer",
            1.5,
            SynthesisStrategyKind::ConsensusExtraction,
            vec!["m1".into()],
        )
        .is_err());
    }

    #[test]
    fn test_decision_derives_confidence() {
        let d = ConsensusDecision::new(
            "answer",
            0.9,
            SynthesisStrategyKind::MetaSynthesis,
            vec!["m1".into(), "m2".into()],
        )
        .unwrap();
        assert_eq!(d.confidence, Confidence::High);
        assert_eq!(d.synthesis_strategy, SynthesisStrategyKind::MetaSynthesis);
    }

    #[test]
    fn test_strategy_kind_serde_tags() {
        let json = serde_json::to_string(&SynthesisStrategyKind::ConsensusExtraction).unwrap();
        assert_eq!(json, "\"consensus-extraction\"");
        let json = serde_json::to_string(&SynthesisStrategyKind::WeightedFusion).unwrap();
        assert_eq!(json, "\"weighted-fusion\"");
    }
}
