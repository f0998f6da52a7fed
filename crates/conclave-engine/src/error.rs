//! Orchestration failures.

use thiserror::Error;

/// Terminal failure of one orchestration.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// Fewer members than the configured quorum responded.
    #[error("insufficient council: {returned} of {required} required members responded")]
    InsufficientCouncil {
        /// Members that returned a usable answer.
        returned: usize,
        /// Configured `minimum_size`.
        required: usize,
    },

    /// Effective configuration could not be resolved.
    #[error(transparent)]
    Config(#[from] conclave_config::ConfigError),

    /// Synthesis produced no decision.
    #[error(transparent)]
    Synthesis(#[from] conclave_synthesis::SynthesisError),

    /// Durable state could not be written.
    #[error(transparent)]
    Store(#[from] conclave_store::StoreError),

    /// A data-model invariant failed mid-orchestration.
    #[error(transparent)]
    Model(#[from] conclave_types::ValidationError),

    /// The orchestration task panicked; converted at the boundary.
    #[error("orchestration panicked: {0}")]
    Panicked(String),
}
