//! Configuration management

pub mod validation;

pub use validation::{Validate, ValidationError};

use crate::infrastructure::rate_limiter::{FairnessPolicy, Quota, RateLimitError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Prefix for environment variable overrides (`RIFTWATCH__RATE_LIMIT__EPSILON_MS`)
pub const ENV_PREFIX: &str = "RIFTWATCH";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub rate_limit: RateLimiterConfig,
    pub logging: LoggingConfig,
}

/// One window quota (serializable version)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Length of the trailing window (in milliseconds)
    pub window_ms: u64,
    /// Maximum permits granted inside any such window
    pub max_permits: u32,
}

impl QuotaConfig {
    /// Convert to the runtime Quota
    pub fn to_quota(&self) -> Result<Quota, RateLimitError> {
        Quota::from_millis(self.window_ms, self.max_permits)
    }
}

/// Rate limiter configuration for the outbound match API
///
/// The defaults allow 9 requests per second and 100 requests per 120 seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimiterConfig {
    /// Quotas enforced simultaneously
    pub quotas: Vec<QuotaConfig>,
    /// Buffer added to every computed wait (in milliseconds)
    pub epsilon_ms: u64,
    /// Order in which waiting callers are served
    pub fairness: FairnessPolicy,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            quotas: vec![
                QuotaConfig {
                    window_ms: 1_000,
                    max_permits: 9,
                },
                QuotaConfig {
                    window_ms: 120_000,
                    max_permits: 100,
                },
            ],
            epsilon_ms: 1,
            fairness: FairnessPolicy::Fifo,
        }
    }
}

impl RateLimiterConfig {
    /// Convert every quota to its runtime form
    pub fn to_quotas(&self) -> Result<Vec<Quota>, RateLimitError> {
        self.quotas.iter().map(QuotaConfig::to_quota).collect()
    }

    pub fn epsilon(&self) -> Duration {
        Duration::from_millis(self.epsilon_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,
    /// One of `json`, `pretty`, `compact`
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

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigLoadError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false));

        // Add environment-specific config if ENV is set
        if let Ok(env) = std::env::var("ENV") {
            builder = builder
                .add_source(config::File::with_name(&format!("config/{}", env)).required(false));
        }

        // Add local config and environment variables last (highest priority)
        builder = builder
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"));

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from an explicit file, still honouring environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigLoadError> {
        let config: Config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()?;

        config.validate()?;

        Ok(config)
    }
}

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Configuration file error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration validation error: {0}")]
    Validation(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_quotas() {
        let config = RateLimiterConfig::default();
        let quotas = config.to_quotas().unwrap();

        assert_eq!(quotas.len(), 2);
        assert_eq!(quotas[0].window(), Duration::from_secs(1));
        assert_eq!(quotas[0].max_permits(), 9);
        assert_eq!(quotas[1].window(), Duration::from_secs(120));
        assert_eq!(quotas[1].max_permits(), 100);
        assert_eq!(config.epsilon(), Duration::from_millis(1));
    }

    #[test]
    fn test_invalid_quota_conversion() {
        let quota = QuotaConfig {
            window_ms: 1000,
            max_permits: 0,
        };
        assert!(matches!(
            quota.to_quota(),
            Err(RateLimitError::InvalidQuota { .. })
        ));
    }

    #[test]
    fn test_fairness_deserializes_snake_case() {
        let config: RateLimiterConfig = serde_json::from_str(
            r#"{"quotas": [{"window_ms": 500, "max_permits": 3}], "fairness": "polling"}"#,
        )
        .unwrap();

        assert_eq!(config.fairness, FairnessPolicy::Polling);
        assert_eq!(config.epsilon_ms, 1);
        assert_eq!(config.quotas.len(), 1);
    }
}
