//! Deliberation rounds and threads.

use crate::error::ValidationError;
use crate::MemberId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One member's contribution to a deliberation round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    /// Request the exchange belongs to.
    pub request_id: Uuid,
    /// Round number, starting at 1.
    pub round: u32,
    /// Authoring member.
    pub member_id: MemberId,
    /// Revised or restated answer.
    pub content: String,
    /// Member the exchange addresses, if directed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_member_id: Option<MemberId>,
    /// When the exchange was recorded.
    pub timestamp: DateTime<Utc>,
}

/// A completed deliberation round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliberationRound {
    /// Round number, starting at 1.
    pub number: u32,
    /// Exchanges collected this round.
    pub exchanges: Vec<Exchange>,
    /// Whether the round's exchanges were near-identical.
    pub consensus_reached: bool,
    /// When the round settled.
    pub timestamp: DateTime<Utc>,
}

/// The ordered, gap-free sequence of deliberation rounds for a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliberationThread {
    /// Request the thread belongs to.
    pub request_id: Uuid,
    /// Rounds ordered by number, starting at 1 with no gaps.
    pub rounds: Vec<DeliberationRound>,
}

impl DeliberationThread {
    /// Creates an empty thread for a request.
    pub fn new(request_id: Uuid) -> Self {
        Self {
            request_id,
            rounds: Vec::new(),
        }
    }

    /// Appends a round, enforcing contiguous numbering from 1.
    pub fn push_round(&mut self, round: DeliberationRound) -> Result<(), ValidationError> {
        let expected = self.rounds.len() as u32 + 1;
        if round.number != expected {
            return Err(ValidationError::RoundGap {
                expected,
                got: round.number,
            });
        }
        self.rounds.push(round);
        Ok(())
    }

    /// Exchanges of the most recent round, if any.
    pub fn last_round(&self) -> Option<&DeliberationRound> {
        self.rounds.last()
    }

    /// Whether any round reached consensus.
    pub fn consensus_reached(&self) -> bool {
        self.rounds.iter().any(|r| r.consensus_reached)
    }
}
