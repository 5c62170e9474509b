//! Ingress configuration loaded from the environment

use core_config::redis::RedisConfig;
use core_config::server::ServerConfig;
use core_config::{env_parse_or, ConfigError, FromEnv};
use email::QueueConfig;

/// Rate limiter settings for the accept path.
///
/// Loaded, validated and logged at startup. Nothing enforces them yet: the
/// bucket model (token vs. leaky, per caller vs. global) is undecided.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimiterConfig {
    pub requests_per_second: f64,
    pub burst: u32,
    pub enabled: bool,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 2.0,
            burst: 4,
            enabled: true,
        }
    }
}

impl FromEnv for RateLimiterConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            requests_per_second: env_parse_or("LIMITER_RPS", defaults.requests_per_second)?,
            burst: env_parse_or("LIMITER_BURST", defaults.burst)?,
            enabled: env_parse_or("LIMITER_ENABLED", defaults.enabled)?,
        };

        if !(config.requests_per_second.is_finite() && config.requests_per_second > 0.0) {
            return Err(ConfigError::ParseError {
                key: "LIMITER_RPS".to_string(),
                details: format!("must be positive, got {}", config.requests_per_second),
            });
        }
        if config.burst == 0 {
            return Err(ConfigError::ParseError {
                key: "LIMITER_BURST".to_string(),
                details: "must be at least 1".to_string(),
            });
        }

        Ok(config)
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub server: ServerConfig,
    pub redis: RedisConfig,
    pub queue: QueueConfig,
    pub limiter: RateLimiterConfig,
}

impl FromEnv for ApiConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig::from_env()?,
            redis: RedisConfig::from_env()?,
            queue: QueueConfig::from_env()?,
            limiter: RateLimiterConfig::from_env()?,
        })
    }
}
