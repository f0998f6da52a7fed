//! Configuration error type.

use thiserror::Error;

/// Errors raised by config validation, the store, and the preset resolver.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Preset name is not in the known catalog.
    #[error("unknown preset: {0}")]
    UnknownPreset(String),

    /// Preset name is known but the store holds no record for it.
    #[error("preset not found in store: {0}")]
    PresetNotFound(String),

    /// Weighted-fusion weights are empty or non-positive.
    #[error("invalid synthesis weights: {0}")]
    InvalidWeights(String),

    /// A config value failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// No active record for a config type.
    #[error("no active configuration of type {0}")]
    Missing(&'static str),

    /// A stored payload could not be (de)serialized.
    #[error("config serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A data-model invariant failed during validation.
    #[error(transparent)]
    Model(#[from] conclave_types::ValidationError),
}
