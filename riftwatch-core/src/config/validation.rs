//! Configuration validation module

use crate::config::{Config, LoggingConfig, QuotaConfig, RateLimiterConfig};
use crate::infrastructure::rate_limiter::MAX_WINDOW;

/// Log output formats understood by [`crate::logging::init_tracing`]
pub const LOG_FORMATS: &[&str] = &["json", "pretty", "compact"];

/// Trait for validating configuration sections
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Rate limit configuration error: {message}")]
    RateLimit { message: String },

    #[error("Logging configuration error: {message}")]
    Logging { message: String },
}

impl ValidationError {
    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::RateLimit {
            message: message.into(),
        }
    }

    pub fn logging(message: impl Into<String>) -> Self {
        Self::Logging {
            message: message.into(),
        }
    }
}

impl Validate for QuotaConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.window_ms == 0 {
            return Err(ValidationError::rate_limit(
                "quota window_ms must be greater than 0",
            ));
        }

        let max_window_ms = MAX_WINDOW.as_millis() as u64;
        if self.window_ms > max_window_ms {
            return Err(ValidationError::rate_limit(format!(
                "quota window_ms must be at most {} (got {})",
                max_window_ms, self.window_ms
            )));
        }

        if self.max_permits == 0 {
            return Err(ValidationError::rate_limit(format!(
                "quota max_permits must be greater than 0 (window_ms = {})",
                self.window_ms
            )));
        }

        Ok(())
    }
}

impl Validate for RateLimiterConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.quotas.is_empty() {
            return Err(ValidationError::rate_limit(
                "at least one quota must be configured",
            ));
        }

        for quota in &self.quotas {
            quota.validate()?;
        }

        if self.epsilon_ms == 0 {
            return Err(ValidationError::rate_limit(
                "epsilon_ms must be greater than 0",
            ));
        }

        // A buffer as long as a window would double every wait on that window
        if let Some(shortest) = self.quotas.iter().map(|quota| quota.window_ms).min()
            && self.epsilon_ms >= shortest
        {
            return Err(ValidationError::rate_limit(format!(
                "epsilon_ms ({}) must be smaller than the shortest quota window ({}ms)",
                self.epsilon_ms, shortest
            )));
        }

        Ok(())
    }
}

impl Validate for LoggingConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.level.trim().is_empty() {
            return Err(ValidationError::logging("log level cannot be empty"));
        }

        if !LOG_FORMATS.contains(&self.format.as_str()) {
            return Err(ValidationError::logging(format!(
                "log format must be one of {}, got: {}",
                LOG_FORMATS.join(", "),
                self.format
            )));
        }

        Ok(())
    }
}

impl Validate for Config {
    fn validate(&self) -> Result<(), ValidationError> {
        self.rate_limit.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}
