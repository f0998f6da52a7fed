//! Validation errors for the core data model.

use thiserror::Error;

/// Errors raised when constructing or validating core model types.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Query is empty after sanitization.
    #[error("query is empty after sanitization")]
    EmptyQuery,

    /// Query exceeds the maximum length.
    #[error("query length {0} exceeds the maximum")]
    QueryTooLong(usize),

    /// Council composition is invalid.
    #[error("invalid council: {0}")]
    InvalidCouncil(String),

    /// Retry policy parameters are invalid.
    #[error("invalid retry policy: {0}")]
    InvalidRetryPolicy(String),

    /// Deliberation rounds must be contiguous and start at 1.
    #[error("round number {got} breaks ordering, expected {expected}")]
    RoundGap {
        /// The round number the thread expected next.
        expected: u32,
        /// The round number that was pushed.
        got: u32,
    },

    /// A consensus decision failed an invariant.
    #[error("invalid decision: {0}")]
    InvalidDecision(String),
}
