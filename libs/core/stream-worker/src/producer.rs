//! Redis Streams producer
//!
//! Appends opaque payloads to the partition stream selected by the message key.
//!
//! # Example
//!
//! ```rust,ignore
//! use stream_worker::{QueueProducer, RedisStreamProducer};
//!
//! let producer = RedisStreamProducer::from_stream_def::<EmailStream>(redis);
//! let ack = producer.publish("1activationemail", &payload).await?;
//! ```

use crate::error::StreamError;
use crate::partition::{partition_for, partition_stream};
use crate::queue::{PublishAck, QueueProducer};
use crate::registry::{MessageField, StreamDef};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Partitioned stream producer.
///
/// Cheap to clone; clones share the connection and the closed flag.
pub struct RedisStreamProducer {
    redis: Arc<ConnectionManager>,
    topic: String,
    partitions: u32,
    max_length: i64,
    closed: Arc<AtomicBool>,
}

impl RedisStreamProducer {
    pub fn new(redis: ConnectionManager, topic: impl Into<String>, partitions: u32) -> Self {
        Self {
            redis: Arc::new(redis),
            topic: topic.into(),
            partitions: partitions.max(1),
            max_length: 100_000,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a producer from a `StreamDef` implementation.
    ///
    /// Keeps topic name and partition count consistent with the workers.
    pub fn from_stream_def<S: StreamDef>(redis: ConnectionManager) -> Self {
        Self::new(redis, S::STREAM_NAME, S::PARTITIONS).with_max_length(S::MAX_LENGTH)
    }

    /// Set the maximum stream length (MAXLEN ~).
    pub fn with_max_length(mut self, max_length: i64) -> Self {
        self.max_length = max_length;
        self
    }

    /// Override the partition count.
    pub fn with_partitions(mut self, partitions: u32) -> Self {
        self.partitions = partitions.max(1);
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn partitions(&self) -> u32 {
        self.partitions
    }

    /// Current length of one partition stream.
    pub async fn partition_length(&self, partition: u32) -> Result<i64, StreamError> {
        let mut conn = (*self.redis).clone();
        let len: i64 = redis::cmd("XLEN")
            .arg(partition_stream(&self.topic, partition))
            .query_async(&mut conn)
            .await?;
        Ok(len)
    }
}

#[async_trait]
impl QueueProducer for RedisStreamProducer {
    async fn publish(
        &self,
        partition_key: &str,
        payload: &[u8],
    ) -> Result<PublishAck, StreamError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StreamError::Closed);
        }

        let partition = partition_for(partition_key, self.partitions);
        let stream = partition_stream(&self.topic, partition);
        let mut conn = (*self.redis).clone();

        // MAXLEN ~ trims approximately
        let stream_id: String = redis::cmd("XADD")
            .arg(&stream)
            .arg("MAXLEN")
            .arg("~")
            .arg(self.max_length)
            .arg("*")
            .arg(MessageField::Key.as_ref())
            .arg(partition_key)
            .arg(MessageField::Payload.as_ref())
            .arg(payload)
            .query_async(&mut conn)
            .await?;

        debug!(
            stream = %stream,
            stream_id = %stream_id,
            partition_key = %partition_key,
            "Published message"
        );

        Ok(PublishAck {
            stream,
            partition,
            stream_id,
        })
    }

    async fn close(&self) -> Result<(), StreamError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(topic = %self.topic, "Producer closed");
        }
        Ok(())
    }
}

impl Clone for RedisStreamProducer {
    fn clone(&self) -> Self {
        Self {
            redis: self.redis.clone(),
            topic: self.topic.clone(),
            partitions: self.partitions,
            max_length: self.max_length,
            closed: self.closed.clone(),
        }
    }
}
