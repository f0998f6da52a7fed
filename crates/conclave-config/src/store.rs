//! Versioned configuration store with a snapshot cache.

use crate::bundle::{
    ConfigBundle, CouncilConfig, DeliberationConfig, DevilsAdvocateConfig, PerformanceConfig,
    SynthesisConfig, TransparencyConfig,
};
use crate::error::ConfigError;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;

/// The six stored config types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigType {
    /// Council composition and quorum.
    Council,
    /// Deliberation rounds.
    Deliberation,
    /// Synthesis strategy.
    Synthesis,
    /// Deadlines and caps.
    Performance,
    /// Retention for inspection.
    Transparency,
    /// Critique pass.
    DevilsAdvocate,
}

impl ConfigType {
    /// Stable name used in stored rows and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Council => "council",
            Self::Deliberation => "deliberation",
            Self::Synthesis => "synthesis",
            Self::Performance => "performance",
            Self::Transparency => "transparency",
            Self::DevilsAdvocate => "devils_advocate",
        }
    }
}

/// One versioned config row: `(id, config_type, config_data, version,
/// created_at, active)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigRecord {
    /// Row identifier.
    pub id: u64,
    /// Which config this row holds.
    pub config_type: ConfigType,
    /// The config payload.
    pub config_data: serde_json::Value,
    /// Version number, monotonic per type.
    pub version: u32,
    /// Insertion time.
    pub created_at: DateTime<Utc>,
    /// Whether this is the active row for its type.
    pub active: bool,
}

#[derive(Debug, Default)]
struct Tables {
    rows: Vec<ConfigRecord>,
    next_id: u64,
}

/// Persisted versioned configs with an immutable snapshot cache in front.
///
/// Only one row per type is active. Updating a type inserts a new
/// version and deactivates the old rows atomically under the write lock;
/// the cached bundle snapshot is invalidated in the same critical
/// section, so readers never observe a half-updated bundle.
#[derive(Debug, Default)]
pub struct ConfigStore {
    tables: RwLock<Tables>,
    cache: RwLock<Option<Arc<ConfigBundle>>>,
}

impl ConfigStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with a validated bundle.
    pub fn seeded(bundle: ConfigBundle) -> Result<Self, ConfigError> {
        bundle.validate()?;
        let store = Self::new();
        store.update(ConfigType::Council, &bundle.council)?;
        store.update(ConfigType::Deliberation, &bundle.deliberation)?;
        store.update(ConfigType::Synthesis, &bundle.synthesis)?;
        store.update(ConfigType::Performance, &bundle.performance)?;
        store.update(ConfigType::Transparency, &bundle.transparency)?;
        if let Some(da) = &bundle.devils_advocate {
            store.update(ConfigType::DevilsAdvocate, da)?;
        }
        Ok(store)
    }

    /// Inserts a new version of `config_type` and deactivates prior
    /// versions. Returns the new version number.
    pub fn update<T: Serialize>(
        &self,
        config_type: ConfigType,
        value: &T,
    ) -> Result<u32, ConfigError> {
        let config_data = serde_json::to_value(value)?;
        let mut tables = self.tables.write();

        let version = tables
            .rows
            .iter()
            .filter(|r| r.config_type == config_type)
            .map(|r| r.version)
            .max()
            .unwrap_or(0)
            + 1;

        for row in tables
            .rows
            .iter_mut()
            .filter(|r| r.config_type == config_type)
        {
            row.active = false;
        }

        tables.next_id += 1;
        let id = tables.next_id;
        tables.rows.push(ConfigRecord {
            id,
            config_type,
            config_data,
            version,
            created_at: Utc::now(),
            active: true,
        });

        // Invalidate the snapshot while still holding the table lock.
        *self.cache.write() = None;

        tracing::info!(
            config_type = config_type.as_str(),
            version = version,
            "Configuration updated"
        );
        Ok(version)
    }

    /// The active row for a config type, if any.
    pub fn active_record(&self, config_type: ConfigType) -> Option<ConfigRecord> {
        self.tables
            .read()
            .rows
            .iter()
            .find(|r| r.config_type == config_type && r.active)
            .cloned()
    }

    /// All versions of a config type, oldest first.
    pub fn history(&self, config_type: ConfigType) -> Vec<ConfigRecord> {
        let mut rows: Vec<ConfigRecord> = self
            .tables
            .read()
            .rows
            .iter()
            .filter(|r| r.config_type == config_type)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.version);
        rows
    }

    fn active_typed<T: DeserializeOwned>(&self, config_type: ConfigType) -> Result<T, ConfigError> {
        let record = self
            .active_record(config_type)
            .ok_or(ConfigError::Missing(config_type.as_str()))?;
        Ok(serde_json::from_value(record.config_data)?)
    }

    /// The active bundle as an immutable snapshot, served from cache.
    pub fn active_bundle(&self) -> Result<Arc<ConfigBundle>, ConfigError> {
        if let Some(cached) = self.cache.read().clone() {
            return Ok(cached);
        }

        let bundle = ConfigBundle {
            council: self.active_typed::<CouncilConfig>(ConfigType::Council)?,
            deliberation: self
                .active_typed::<DeliberationConfig>(ConfigType::Deliberation)
                .unwrap_or_default(),
            synthesis: self
                .active_typed::<SynthesisConfig>(ConfigType::Synthesis)
                .unwrap_or_default(),
            performance: self
                .active_typed::<PerformanceConfig>(ConfigType::Performance)
                .unwrap_or_default(),
            transparency: self
                .active_typed::<TransparencyConfig>(ConfigType::Transparency)
                .unwrap_or_default(),
            devils_advocate: self
                .active_typed::<DevilsAdvocateConfig>(ConfigType::DevilsAdvocate)
                .ok(),
        };

        let snapshot = Arc::new(bundle);
        *self.cache.write() = Some(snapshot.clone());
        Ok(snapshot)
    }
}
