//! Synthesis error type.

use thiserror::Error;

/// Errors raised while reducing responses to a decision.
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// No usable responses were available to synthesize from.
    #[error("no successful responses to synthesize")]
    NoResponses,

    /// Strategy configuration was invalid at synthesis time.
    #[error(transparent)]
    Config(#[from] conclave_config::ConfigError),

    /// The moderator or critic call failed.
    #[error("provider call failed during synthesis: {0}")]
    Provider(#[from] conclave_provider::ProviderError),

    /// A decision invariant failed.
    #[error(transparent)]
    Model(#[from] conclave_types::ValidationError),
}
