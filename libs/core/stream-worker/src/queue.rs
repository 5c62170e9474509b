//! Durable queue contract shared by producers and consumers.
//!
//! Messages sharing a partition key are read in the order they were published.
//! There is no ordering guarantee across keys. Delivery is at-least-once: a
//! message that was read but never acknowledged is handed out again.

use crate::error::StreamError;
use crate::event::StreamMessage;
use async_trait::async_trait;

/// Broker acknowledgment of a durable write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishAck {
    /// Stream (partition) the message was appended to
    pub stream: String,
    /// Partition index within the topic
    pub partition: u32,
    /// Entry ID assigned by the broker
    pub stream_id: String,
}

/// Write side of the queue
#[async_trait]
pub trait QueueProducer: Send + Sync {
    /// Append `payload` to the partition selected by `partition_key`.
    ///
    /// Returns only after the broker has durably accepted the write.
    async fn publish(&self, partition_key: &str, payload: &[u8])
    -> Result<PublishAck, StreamError>;

    /// Release writer resources
    async fn close(&self) -> Result<(), StreamError>;
}

/// Read side of the queue
#[async_trait]
pub trait QueueConsumer: Send + Sync {
    /// Wait for the next message in partition order.
    ///
    /// Connection failures surface as errors for which
    /// [`StreamError::is_connection_error`] is true.
    async fn next_message(&self) -> Result<StreamMessage, StreamError>;

    /// Mark a message as handled so it is not redelivered
    async fn ack(&self, message: &StreamMessage) -> Result<(), StreamError>;

    /// Release reader resources
    async fn close(&self) -> Result<(), StreamError>;
}
