//! Common types used throughout `conclave`.
//!
//! This crate provides the core data model for the Conclave AI council
//! proxy: submitted requests, council membership, member responses,
//! deliberation threads, consensus decisions, and the closed set of API
//! error codes.

mod codes;
mod council;
mod decision;
mod deliberation;
mod error;
mod record;
mod request;
mod response;
mod sanitize;

pub use codes::ErrorCode;
pub use council::{CouncilMember, ProviderErrorKind, RetryPolicy};
pub use decision::{Confidence, ConsensusDecision, SynthesisStrategyKind};
pub use deliberation::{DeliberationRound, DeliberationThread, Exchange};
pub use error::ValidationError;
pub use record::{RequestStatus, StoredRequest};
pub use request::{ContextMessage, MessageRole, SessionContext, ToolDefinition, UserRequest};
pub use response::InitialResponse;
pub use sanitize::sanitize_query;

/// Identifier of a council member, unique within one council config.
pub type MemberId = String;

/// Identifier of an authenticated user.
pub type UserId = String;

/// Maximum query length in characters, enforced post-sanitization.
pub const MAX_QUERY_LENGTH: usize = 100_000;

/// Maximum token budget for conversation context attached to a request.
pub const MAX_CONTEXT_TOKENS: u32 = 4_000;
