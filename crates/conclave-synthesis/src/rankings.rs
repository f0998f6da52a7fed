//! Model strength rankings for the `strongest` moderator policy.

use conclave_types::MemberId;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Stored strength scores per member.
///
/// Fed by whatever evaluation pipeline the operator runs; the
/// `strongest` moderator policy ranks council members by these scores
/// and falls back to council order for unranked members.
#[derive(Debug, Default)]
pub struct ModelRankings {
    scores: RwLock<HashMap<MemberId, f64>>,
}

impl ModelRankings {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a member's strength score.
    pub fn set(&self, member_id: impl Into<MemberId>, score: f64) {
        self.scores.write().insert(member_id.into(), score);
    }

    /// The stored score for a member.
    pub fn score(&self, member_id: &str) -> Option<f64> {
        self.scores.read().get(member_id).copied()
    }

    /// The highest-scored member among `candidates`, if any is ranked.
    pub fn best_of(&self, candidates: &[MemberId]) -> Option<MemberId> {
        let scores = self.scores.read();
        candidates
            .iter()
            .filter_map(|id| scores.get(id).map(|&s| (id, s)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id.clone())
    }
}
