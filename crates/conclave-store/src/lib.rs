//! # Conclave Store
//!
//! In-process durable state for the Conclave AI council proxy:
//!
//! - **TtlStore**: a Redis-like key-value map with per-entry TTL and
//!   periodic sweeping.
//! - **RequestRegistry**: the lifecycle record of every request
//!   (`request:<uuid>`), retained deliberation threads
//!   (`deliberation:<uuid>`), and round-0 responses, all on a 24 h TTL.
//! - **IdempotencyCache**: at-most-once request dedup keyed by
//!   `sha256(user ‖ client-key)`, with atomic set-if-absent and
//!   completion waiters.

mod error;
mod idempotency;
mod registry;
mod ttl;

pub use error::StoreError;
pub use idempotency::{
    scoped_key, IdempotencyCache, IdempotencyRecord, IdempotencyState, WAIT_TIMEOUT_CAP,
};
pub use registry::{RequestRegistry, REQUEST_TTL};
pub use ttl::TtlStore;
