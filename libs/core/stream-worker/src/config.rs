//! Worker configuration
//!
//! This module provides `WorkerConfig` for configuring the consumer and the
//! delivery pool.

use crate::backoff::Backoff;
use crate::error::StreamError;
use crate::registry::StreamDef;
use uuid::Uuid;

/// Configuration for the stream worker
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Topic name (partition streams are `"{stream_name}:{p}"`)
    pub stream_name: String,

    /// Consumer group name
    pub consumer_group: String,

    /// Unique consumer ID (auto-generated if not provided)
    pub consumer_id: String,

    /// Number of partitions in the topic
    pub partitions: u32,

    /// Entries fetched per read
    pub batch_size: usize,

    /// Poll interval in milliseconds when no messages available
    pub poll_interval_ms: u64,

    /// Maximum deliveries in flight
    pub max_concurrent_jobs: usize,

    /// Consecutive connection failures tolerated before the pool stops
    pub max_reconnect_attempts: u32,

    /// First reconnect delay in milliseconds
    pub reconnect_base_ms: u64,

    /// Reconnect delay cap in milliseconds
    pub reconnect_max_ms: u64,

    /// Idle time after which another consumer's pending entry is claimed.
    /// Also the interval between claim passes.
    pub claim_idle_ms: u64,
}

impl WorkerConfig {
    /// Create a new WorkerConfig from a StreamDef
    pub fn from_stream_def<S: StreamDef>() -> Self {
        Self::new(S::STREAM_NAME, S::CONSUMER_GROUP).with_partitions(S::PARTITIONS)
    }

    /// Create a new WorkerConfig with explicit values
    pub fn new(stream_name: impl Into<String>, consumer_group: impl Into<String>) -> Self {
        Self {
            stream_name: stream_name.into(),
            consumer_group: consumer_group.into(),
            consumer_id: format!("worker-{}", Uuid::new_v4()),
            partitions: 8,
            batch_size: 10,
            poll_interval_ms: 250,
            max_concurrent_jobs: 32,
            max_reconnect_attempts: 5,
            reconnect_base_ms: 1_000,
            reconnect_max_ms: 30_000,
            claim_idle_ms: 60_000,
        }
    }

    /// Set the consumer ID
    pub fn with_consumer_id(mut self, id: impl Into<String>) -> Self {
        self.consumer_id = id.into();
        self
    }

    pub fn with_partitions(mut self, partitions: u32) -> Self {
        self.partitions = partitions.max(1);
        self
    }

    /// Set the batch size
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Set the poll interval
    pub fn with_poll_interval_ms(mut self, interval: u64) -> Self {
        self.poll_interval_ms = interval;
        self
    }

    /// Set the maximum concurrent jobs
    pub fn with_max_concurrent_jobs(mut self, count: usize) -> Self {
        self.max_concurrent_jobs = count.max(1);
        self
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Set the reconnect backoff bounds
    pub fn with_reconnect_backoff_ms(mut self, base: u64, max: u64) -> Self {
        self.reconnect_base_ms = base;
        self.reconnect_max_ms = max;
        self
    }

    /// Set the idle time before abandoned entries are claimed
    pub fn with_claim_idle_ms(mut self, idle: u64) -> Self {
        self.claim_idle_ms = idle;
        self
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::from_millis(self.reconnect_base_ms, self.reconnect_max_ms)
    }

    /// Reject values the pool cannot run with
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.stream_name.is_empty() {
            return Err(StreamError::Config("stream name must not be empty".into()));
        }
        if self.consumer_group.is_empty() {
            return Err(StreamError::Config("consumer group must not be empty".into()));
        }
        if self.max_concurrent_jobs == 0 {
            return Err(StreamError::Config("max_concurrent_jobs must be at least 1".into()));
        }
        if self.reconnect_base_ms == 0 {
            return Err(StreamError::Config("reconnect base delay must be positive".into()));
        }
        Ok(())
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::new("general-email", "email_workers")
    }
}
