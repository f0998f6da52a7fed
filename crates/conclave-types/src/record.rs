//! Request lifecycle records.

use crate::decision::ConsensusDecision;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a stored request.
///
/// Transitions are monotonic: `processing → completed` or
/// `processing → failed`, nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    /// Orchestration is running.
    Processing,
    /// A consensus decision was produced.
    Completed,
    /// Orchestration ended without a decision.
    Failed,
}

impl RequestStatus {
    /// Whether the status admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// The durable lifecycle record of one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRequest {
    /// Request identifier.
    pub id: Uuid,
    /// Current lifecycle status.
    pub status: RequestStatus,
    /// The decision, present once completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<ConsensusDecision>,
    /// Failure reason, present once failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the request was submitted.
    pub created_at: DateTime<Utc>,
    /// When the request reached a terminal status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Whether a deliberation thread was retained for this request.
    #[serde(default)]
    pub has_deliberation: bool,
}

impl StoredRequest {
    /// Creates the initial `processing` record for a new request.
    pub fn processing(id: Uuid, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            status: RequestStatus::Processing,
            decision: None,
            error: None,
            created_at,
            completed_at: None,
            has_deliberation: false,
        }
    }

    /// Produces the `completed` successor carrying the decision.
    pub fn completed(mut self, decision: ConsensusDecision) -> Self {
        self.status = RequestStatus::Completed;
        self.decision = Some(decision);
        self.error = None;
        self.completed_at = Some(Utc::now());
        self
    }

    /// Produces the `failed` successor carrying the reason.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.status = RequestStatus::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
        self
    }
}
