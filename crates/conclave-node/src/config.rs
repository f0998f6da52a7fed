//! # Node Configuration
//!
//! Environment-driven configuration built once at boot:
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `NODE_ENV` | `development`, `test`, or `production` | `development` |
//! | `CONCLAVE_API_ADDR` | HTTP API address | `127.0.0.1:8080` |
//! | `CONCLAVE_LOG_LEVEL` | Log level | `info` |
//! | `CONCLAVE_LOG_FORMAT` | Log format (json/pretty) | `json` |
//! | `JWT_SECRET` | JWT signing secret | *required in production* |
//! | `ADMIN_API_TOKEN` | ApiKey granting the dashboard identity | unset |
//! | `ENABLE_METRICS_TRACKING` | Cost tracking switch | `false` |
//! | `ENABLE_IDEMPOTENCY` | Idempotency-key dedup | `false` |
//! | `ENABLE_TOOL_USE` | Tool definition pass-through | `false` |
//! | `ENABLE_DEVILS_ADVOCATE` | Critique pass | `false` |
//! | `ENABLE_BUDGET_CAPS` | Per-request cost cap | `false` |
//! | `ENABLE_PER_REQUEST_TRANSPARENCY` | Responses endpoint | `false` |
//!
//! Feature flags parse the strict string `"true"`; anything else is
//! false. Tests never read the environment mid-run — they construct the
//! config directly.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use thiserror::Error;

/// Configuration errors that refuse boot.
#[derive(Debug, Error)]
pub enum NodeConfigError {
    /// A variable could not be parsed.
    #[error("failed to parse environment variable {key}: {message}")]
    EnvParse {
        /// Variable name.
        key: String,
        /// Parse failure detail.
        message: String,
    },

    /// A required variable is missing.
    #[error("missing required configuration: {0}")]
    Missing(String),

    /// A value failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// The config file could not be loaded.
    #[error("failed to load configuration file: {0}")]
    FileLoad(String),
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development; 500 bodies include internal messages.
    Development,
    /// Test mode; rate limiting off, static test credentials seeded.
    Test,
    /// Production; requires `JWT_SECRET`, masks internal errors.
    Production,
}

impl Environment {
    /// Parses `NODE_ENV`; unrecognized values are development.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" => Self::Production,
            "test" => Self::Test,
            _ => Self::Development,
        }
    }

    /// Whether 500 bodies may echo internal messages.
    pub fn exposes_internal_errors(&self) -> bool {
        matches!(self, Self::Development)
    }

    /// Whether rate limiting is disabled entirely.
    pub fn is_test(&self) -> bool {
        matches!(self, Self::Test)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::Development
    }
}

/// Immutable feature-flag snapshot, constructed at boot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    /// Cost/token tracking to the metrics registry.
    pub metrics_tracking: bool,
    /// Idempotency-key deduplication.
    pub idempotency: bool,
    /// Forward tool definitions to providers.
    pub tool_use: bool,
    /// Devil's-advocate critique pass.
    pub devils_advocate: bool,
    /// Per-request cost caps.
    pub budget_caps: bool,
    /// Round-0 responses inspection endpoint.
    pub per_request_transparency: bool,
}

impl FeatureFlags {
    /// Reads every `ENABLE_*` flag with strict `"true"` parsing.
    pub fn from_env() -> Self {
        Self {
            metrics_tracking: flag_set("ENABLE_METRICS_TRACKING"),
            idempotency: flag_set("ENABLE_IDEMPOTENCY"),
            tool_use: flag_set("ENABLE_TOOL_USE"),
            devils_advocate: flag_set("ENABLE_DEVILS_ADVOCATE"),
            budget_caps: flag_set("ENABLE_BUDGET_CAPS"),
            per_request_transparency: flag_set("ENABLE_PER_REQUEST_TRANSPARENCY"),
        }
    }
}

/// Strict flag parsing: only the exact string `"true"` enables.
fn flag_set(key: &str) -> bool {
    std::env::var(key).map(|v| v == "true").unwrap_or(false)
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
    /// Log format (json, pretty).
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

/// Main node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// HTTP listen address.
    pub addr: SocketAddr,
    /// Deployment environment.
    pub environment: Environment,
    /// JWT signing secret; required in production.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt_secret: Option<String>,
    /// ApiKey value that grants the internal dashboard identity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_api_token: Option<String>,
    /// Logging configuration.
    pub logging: LoggingConfig,
    /// Feature flags.
    pub flags: FeatureFlags,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8080".parse().expect("Invalid default address"),
            environment: Environment::Development,
            jwt_secret: None,
            admin_api_token: None,
            logging: LoggingConfig::default(),
            flags: FeatureFlags::default(),
        }
    }
}

impl NodeConfig {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, NodeConfigError> {
        let mut config = Self::default();

        if let Ok(env) = std::env::var("NODE_ENV") {
            config.environment = Environment::parse(&env);
        }
        if let Ok(addr) = std::env::var("CONCLAVE_API_ADDR") {
            config.addr = addr.parse().map_err(|_| NodeConfigError::EnvParse {
                key: "CONCLAVE_API_ADDR".to_string(),
                message: "Invalid socket address".to_string(),
            })?;
        }
        if let Ok(level) = std::env::var("CONCLAVE_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(format) = std::env::var("CONCLAVE_LOG_FORMAT") {
            config.logging.format = format;
        }
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            config.jwt_secret = Some(secret);
        }
        if let Ok(token) = std::env::var("ADMIN_API_TOKEN") {
            config.admin_api_token = Some(token);
        }
        config.flags = FeatureFlags::from_env();

        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, NodeConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeConfigError::FileLoad(e.to_string()))?;
        serde_yaml::from_str(&content).map_err(|e| NodeConfigError::FileLoad(e.to_string()))
    }

    /// Validates the configuration; production refuses to boot without
    /// an externally supplied JWT secret.
    pub fn validate(&self) -> Result<(), NodeConfigError> {
        if self.environment == Environment::Production
            && self.jwt_secret.as_deref().unwrap_or("").is_empty()
        {
            return Err(NodeConfigError::Missing(
                "JWT_SECRET must be provided in production".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(NodeConfigError::Invalid(format!(
                "Invalid log level '{}'. Valid values: {:?}",
                self.logging.level, valid_levels
            )));
        }
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.to_lowercase().as_str()) {
            return Err(NodeConfigError::Invalid(format!(
                "Invalid log format '{}'. Valid values: {:?}",
                self.logging.format, valid_formats
            )));
        }
        Ok(())
    }

    /// The JWT secret in effect: the configured one, or the fixed
    /// development fallback outside production.
    pub fn effective_jwt_secret(&self) -> &str {
        self.jwt_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or("conclave-development-secret")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::parse("production"), Environment::Production);
        assert_eq!(Environment::parse("TEST"), Environment::Test);
        assert_eq!(Environment::parse("development"), Environment::Development);
        assert_eq!(Environment::parse("anything"), Environment::Development);
    }

    #[test]
    fn test_default_config_valid() {
        assert!(NodeConfig::default().validate().is_ok());
    }

    #[test]
    fn test_production_requires_jwt_secret() {
        let config = NodeConfig {
            environment: Environment::Production,
            jwt_secret: None,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(NodeConfigError::Missing(_))
        ));

        let config = NodeConfig {
            environment: Environment::Production,
            jwt_secret: Some(String::new()),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = NodeConfig {
            environment: Environment::Production,
            jwt_secret: Some("secret".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_log_level_validation() {
        let mut config = NodeConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_error_exposure_by_environment() {
        assert!(Environment::Development.exposes_internal_errors());
        assert!(!Environment::Test.exposes_internal_errors());
        assert!(!Environment::Production.exposes_internal_errors());
    }

    #[test]
    fn test_effective_jwt_secret_fallback() {
        let config = NodeConfig::default();
        assert_eq!(
            config.effective_jwt_secret(),
            "conclave-development-secret"
        );

        let config = NodeConfig {
            jwt_secret: Some("supplied".to_string()),
            ..Default::default()
        };
        assert_eq!(config.effective_jwt_secret(), "supplied");
    }
}
