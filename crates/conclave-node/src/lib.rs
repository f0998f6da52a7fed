//! # Conclave Node
//!
//! The HTTP surface of the Conclave AI council proxy:
//!
//! - **Request lifecycle API**: submit, poll, stream (SSE), and
//!   deliberation inspection under `/api/v1/requests`.
//! - **Auth**: `Bearer <JWT>` and `ApiKey <key>` schemes; every protected
//!   endpoint authenticates before any other validation runs.
//! - **Rate limiting**: per-IP token bucket on `/api/*`, disabled in
//!   test mode.
//! - **Error envelope**: every failure is
//!   `{ error: { code, message, details?, retryable }, requestId?, timestamp }`
//!   with the closed code set.
//! - **Observability**: structured logging, request IDs, Prometheus
//!   metrics, health probes.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod health;
pub mod observability;
pub mod rate_limit;
pub mod stream_api;

pub use api::{create_router, AppState};
pub use config::{Environment, FeatureFlags, NodeConfig};
pub use error::ApiError;
