//! Worker configuration loaded from the environment

use core_config::redis::RedisConfig;
use core_config::{env_parse_or, ConfigError, FromEnv};
use email::{QueueConfig, SmtpConfig};
use stream_worker::WorkerConfig;

/// Delivery pool knobs (`WORKER_*`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_concurrency: usize,
    pub max_reconnect_attempts: u32,
    pub reconnect_base_ms: u64,
    pub reconnect_max_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 32,
            max_reconnect_attempts: 5,
            reconnect_base_ms: 1_000,
            reconnect_max_ms: 30_000,
            poll_interval_ms: 250,
        }
    }
}

impl FromEnv for PoolConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            max_concurrency: env_parse_or("WORKER_MAX_CONCURRENCY", defaults.max_concurrency)?,
            max_reconnect_attempts: env_parse_or(
                "WORKER_MAX_RECONNECT_ATTEMPTS",
                defaults.max_reconnect_attempts,
            )?,
            reconnect_base_ms: env_parse_or("WORKER_RECONNECT_BASE_MS", defaults.reconnect_base_ms)?,
            reconnect_max_ms: env_parse_or("WORKER_RECONNECT_MAX_MS", defaults.reconnect_max_ms)?,
            poll_interval_ms: env_parse_or("WORKER_POLL_INTERVAL_MS", defaults.poll_interval_ms)?,
        };

        if config.max_concurrency == 0 {
            return Err(ConfigError::ParseError {
                key: "WORKER_MAX_CONCURRENCY".to_string(),
                details: "must be at least 1".to_string(),
            });
        }
        if config.reconnect_base_ms == 0 || config.reconnect_max_ms < config.reconnect_base_ms {
            return Err(ConfigError::ParseError {
                key: "WORKER_RECONNECT_MAX_MS".to_string(),
                details: format!(
                    "backoff bounds must satisfy 0 < base ({}) <= max ({})",
                    config.reconnect_base_ms, config.reconnect_max_ms
                ),
            });
        }

        Ok(config)
    }
}

#[derive(Debug, Clone)]
pub struct EmailWorkerConfig {
    pub redis: RedisConfig,
    pub queue: QueueConfig,
    pub pool: PoolConfig,
    pub smtp: SmtpConfig,
}

impl FromEnv for EmailWorkerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            redis: RedisConfig::from_env()?,
            queue: QueueConfig::from_env()?,
            pool: PoolConfig::from_env()?,
            smtp: SmtpConfig::from_env()?,
        })
    }
}

impl EmailWorkerConfig {
    pub fn worker_config(&self) -> WorkerConfig {
        self.queue
            .worker_config()
            .with_max_concurrent_jobs(self.pool.max_concurrency)
            .with_max_reconnect_attempts(self.pool.max_reconnect_attempts)
            .with_reconnect_backoff_ms(self.pool.reconnect_base_ms, self.pool.reconnect_max_ms)
            .with_poll_interval_ms(self.pool.poll_interval_ms)
    }
}
