//! # Conclave Provider
//!
//! The boundary between the orchestration engine and LLM providers:
//!
//! - **ProviderPool**: the single trait through which the engine talks
//!   to council members. Real implementations hold the provider HTTP
//!   clients; this crate ships only the contract and a mock.
//! - **call_member**: the resilient wrapper around one member's call —
//!   per-attempt timeout, retries on retryable error kinds only,
//!   exponential backoff with jitter, and request-scoped cancellation.

mod call;
mod error;
mod mock;
mod pool;

pub use call::{backoff_delay, call_member};
pub use error::ProviderError;
pub use mock::MockProviderPool;
pub use pool::{PromptMessage, ProviderPool, ProviderReply, ProviderRequest};
