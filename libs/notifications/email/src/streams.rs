//! Stream definitions for email processing

use core_config::{env_or_default, env_parse_or, ConfigError, FromEnv};
use stream_worker::{StreamDef, WorkerConfig};

/// Topic carrying every e-mail job.
///
/// Shared by the ingress producer and the delivery workers so that both agree
/// on topic name and partition count.
pub struct EmailStream;

impl StreamDef for EmailStream {
    const STREAM_NAME: &'static str = "general-email";
    const CONSUMER_GROUP: &'static str = "email_workers";
}

/// Queue settings shared by the ingress and worker processes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    pub topic: String,
    pub partitions: u32,
    pub consumer_group: String,
    /// Generated per process when unset
    pub consumer_id: Option<String>,
    /// Pending entries idle this long are claimed from their previous owner
    pub claim_idle_ms: u64,
}

const DEFAULT_CLAIM_IDLE_MS: u64 = 60_000;

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            topic: EmailStream::STREAM_NAME.to_string(),
            partitions: EmailStream::PARTITIONS,
            consumer_group: EmailStream::CONSUMER_GROUP.to_string(),
            consumer_id: None,
            claim_idle_ms: DEFAULT_CLAIM_IDLE_MS,
        }
    }
}

impl FromEnv for QueueConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let partitions = env_parse_or("QUEUE_PARTITIONS", EmailStream::PARTITIONS)?;
        if partitions == 0 {
            return Err(ConfigError::ParseError {
                key: "QUEUE_PARTITIONS".to_string(),
                details: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            topic: env_or_default("QUEUE_TOPIC", EmailStream::STREAM_NAME),
            partitions,
            consumer_group: env_or_default("QUEUE_CONSUMER_GROUP", EmailStream::CONSUMER_GROUP),
            consumer_id: std::env::var("QUEUE_CONSUMER_ID").ok().filter(|id| !id.is_empty()),
            claim_idle_ms: env_parse_or("QUEUE_CLAIM_IDLE_MS", DEFAULT_CLAIM_IDLE_MS)?,
        })
    }
}

impl QueueConfig {
    /// Worker settings for this topic, pool knobs left at their defaults
    pub fn worker_config(&self) -> WorkerConfig {
        let config = WorkerConfig::new(&self.topic, &self.consumer_group)
            .with_partitions(self.partitions)
            .with_claim_idle_ms(self.claim_idle_ms);

        match &self.consumer_id {
            Some(id) => config.with_consumer_id(id),
            None => config,
        }
    }
}
