//! Named council presets.
//!
//! The catalog of preset *names* is static; the preset *contents* live in
//! the resolver's store so operators can re-seed them. Name validation
//! always happens before any store lookup, so an unknown name fails fast
//! without touching stored state.

use crate::bundle::{CouncilConfig, DeliberationConfig, SynthesisConfig};
use crate::error::ConfigError;
use crate::strategy::SynthesisStrategy;
use conclave_types::{CouncilMember, RetryPolicy};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Every preset name the resolver will accept.
pub const KNOWN_PRESET_NAMES: &[&str] = &["default", "fast", "deliberative", "redacted"];

/// Whether `name` is in the static preset catalog.
pub fn is_known_preset(name: &str) -> bool {
    KNOWN_PRESET_NAMES.contains(&name)
}

/// A named council setup.
#[derive(Debug, Clone, PartialEq)]
pub struct Preset {
    /// Catalog name.
    pub name: String,
    /// Council for this preset.
    pub council: CouncilConfig,
    /// Deliberation behavior for this preset.
    pub deliberation: DeliberationConfig,
    /// Synthesis strategy for this preset.
    pub synthesis: SynthesisConfig,
}

/// Resolves preset names to stored presets.
#[derive(Debug, Default)]
pub struct PresetResolver {
    presets: RwLock<HashMap<String, Preset>>,
}

impl PresetResolver {
    /// Creates an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a resolver seeded with the built-in presets.
    pub fn with_builtins() -> Self {
        let resolver = Self::new();
        for preset in builtin_presets() {
            resolver.insert(preset);
        }
        resolver
    }

    /// Inserts or replaces a preset.
    pub fn insert(&self, preset: Preset) {
        self.presets.write().insert(preset.name.clone(), preset);
    }

    /// Resolves a preset by name.
    ///
    /// The name is validated against [`KNOWN_PRESET_NAMES`] first;
    /// unknown names fail with [`ConfigError::UnknownPreset`] without any
    /// store access. A known name missing from the store fails with
    /// [`ConfigError::PresetNotFound`].
    pub fn resolve(&self, name: &str) -> Result<Preset, ConfigError> {
        if !is_known_preset(name) {
            return Err(ConfigError::UnknownPreset(name.to_string()));
        }
        self.presets
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::PresetNotFound(name.to_string()))
    }
}

fn standard_member(id: &str, provider: &str, model: &str, timeout_secs: u64) -> CouncilMember {
    CouncilMember {
        id: id.to_string(),
        provider: provider.to_string(),
        model: model.to_string(),
        timeout_secs,
        retry: RetryPolicy::default(),
        weight: None,
    }
}

fn standard_council(timeout_secs: u64) -> CouncilConfig {
    CouncilConfig {
        members: vec![
            standard_member("gpt", "openai", "gpt-4o", timeout_secs),
            standard_member("claude", "anthropic", "claude-sonnet-4", timeout_secs),
            standard_member("gemini", "google", "gemini-2.0-pro", timeout_secs),
        ],
        minimum_size: 2,
        require_minimum_for_consensus: true,
    }
}

/// The built-in preset catalog.
pub fn builtin_presets() -> Vec<Preset> {
    vec![
        Preset {
            name: "default".to_string(),
            council: standard_council(60),
            deliberation: DeliberationConfig::default(),
            synthesis: SynthesisConfig::default(),
        },
        Preset {
            name: "fast".to_string(),
            council: standard_council(20),
            deliberation: DeliberationConfig {
                rounds: 0,
                ..Default::default()
            },
            synthesis: SynthesisConfig::default(),
        },
        Preset {
            name: "deliberative".to_string(),
            council: standard_council(90),
            deliberation: DeliberationConfig {
                rounds: 3,
                ..Default::default()
            },
            synthesis: SynthesisConfig {
                strategy: SynthesisStrategy::MetaSynthesis {
                    moderator: crate::strategy::ModeratorStrategy::Strongest,
                },
            },
        },
        Preset {
            name: "redacted".to_string(),
            council: standard_council(60),
            deliberation: DeliberationConfig {
                rounds: 2,
                redact_own_response: true,
                ..Default::default()
            },
            synthesis: SynthesisConfig::default(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_presets_are_known_and_valid() {
        for preset in builtin_presets() {
            assert!(is_known_preset(&preset.name), "{}", preset.name);
            assert!(preset.council.validate().is_ok());
            assert!(preset.deliberation.validate().is_ok());
            assert!(preset.synthesis.validate().is_ok());
        }
    }

    #[test]
    fn test_unknown_preset_fails_before_lookup() {
        // Empty resolver: if validation did not precede lookup, the error
        // would be PresetNotFound.
        let resolver = PresetResolver::new();
        let err = resolver.resolve("invalid-preset").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownPreset(_)));
    }

    #[test]
    fn test_known_but_unseeded_preset_is_not_found() {
        let resolver = PresetResolver::new();
        let err = resolver.resolve("fast").unwrap_err();
        assert!(matches!(err, ConfigError::PresetNotFound(_)));
    }

    #[test]
    fn test_resolve_seeded_preset() {
        let resolver = PresetResolver::with_builtins();
        let preset = resolver.resolve("deliberative").unwrap();
        assert_eq!(preset.deliberation.rounds, 3);
        let preset = resolver.resolve("redacted").unwrap();
        assert!(preset.deliberation.redact_own_response);
    }
}
