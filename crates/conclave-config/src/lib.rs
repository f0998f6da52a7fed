//! # Conclave Config
//!
//! Configuration for the Conclave AI council proxy:
//!
//! - **Config bundle**: the six typed configs that together define how a
//!   request is orchestrated (council, deliberation, synthesis,
//!   performance, transparency, devil's advocate).
//! - **Versioned store**: one active record per config type; updates
//!   insert a new version and deactivate old ones atomically, with an
//!   immutable snapshot cache in front.
//! - **Presets**: a static catalog of named council setups; preset names
//!   are validated against the catalog before any store lookup.

mod bundle;
mod error;
mod preset;
mod store;
mod strategy;

pub use bundle::{
    ConfigBundle, CouncilConfig, DeliberationConfig, DevilsAdvocateConfig, PerformanceConfig,
    SynthesisConfig, TransparencyConfig,
};
pub use error::ConfigError;
pub use preset::{builtin_presets, is_known_preset, Preset, PresetResolver, KNOWN_PRESET_NAMES};
pub use store::{ConfigRecord, ConfigStore, ConfigType};
pub use strategy::{
    validate_weights, ModeratorStrategy, SynthesisStrategy, DEFAULT_AGREEMENT_THRESHOLD,
};
