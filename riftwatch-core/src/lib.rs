//! Riftwatch Core - Admission control for the Riot match API
//!
//! The match ingestion pipeline fans out many concurrent calls to a
//! third-party API that enforces several quotas at once. This crate provides
//! the shared limiter those calls go through.
//!
//! # Modules
//!
//! - [`config`] - Strongly-typed configuration with TOML and environment variable support
//! - [`infrastructure`] - The multi-window rate limiter
//! - [`logging`] - Structured logging with tracing
//!
//! # Usage
//!
//! Build one limiter at startup and clone it into every task that calls the API:
//!
//! ```rust,ignore
//! use riftwatch_core::{Config, RateLimiter};
//!
//! let config = Config::load()?;
//! let limiter = RateLimiter::from_config(&config.rate_limit)?;
//!
//! let permit = limiter.acquire().await;
//! // call the API
//! ```
//!
//! Environment variables use the `RIFTWATCH__` prefix with double underscore separators:
//!
//! ```bash
//! RIFTWATCH__RATE_LIMIT__EPSILON_MS=2
//! RIFTWATCH__LOGGING__LEVEL=debug
//! ```
//!
//! # Logging
//!
//! ```rust,ignore
//! use riftwatch_core::init_tracing;
//!
//! init_tracing(&config.logging)?;
//! ```

pub mod config;
pub mod infrastructure;
pub mod logging;

pub use config::Config;
pub use infrastructure::rate_limiter::{
    FairnessPolicy, Permit, Quota, RateLimitError, RateLimitStatus, RateLimiter,
};
pub use logging::init_tracing;
