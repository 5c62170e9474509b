//! Queue message envelope
//!
//! Wraps an opaque payload with its partition key and stream metadata.

use chrono::{DateTime, Utc};

/// A message read from the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMessage {
    /// Stream (partition) the message was read from, e.g. "general-email:3"
    pub stream: String,

    /// Stream entry ID (e.g., "1234567890123-0")
    pub stream_id: String,

    /// Key that selected the partition
    pub partition_key: String,

    /// Encoded job bytes
    pub payload: Vec<u8>,

    /// When the entry was appended (parsed from the stream ID)
    pub timestamp: DateTime<Utc>,

    /// Number of times this message has been handed to a reader
    pub delivery_count: u32,
}

impl StreamMessage {
    pub fn new(
        stream: impl Into<String>,
        stream_id: impl Into<String>,
        partition_key: impl Into<String>,
        payload: Vec<u8>,
    ) -> Self {
        let stream_id = stream_id.into();
        let timestamp = Self::parse_timestamp(&stream_id);
        Self {
            stream: stream.into(),
            stream_id,
            partition_key: partition_key.into(),
            payload,
            timestamp,
            delivery_count: 1,
        }
    }

    /// Mark as a redelivery (recovered from the pending list)
    pub fn with_delivery_count(mut self, delivery_count: u32) -> Self {
        self.delivery_count = delivery_count;
        self
    }

    /// Stream IDs are in format "timestamp_ms-sequence"
    fn parse_timestamp(stream_id: &str) -> DateTime<Utc> {
        stream_id
            .split('-')
            .next()
            .and_then(|ts| ts.parse::<i64>().ok())
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or_else(Utc::now)
    }

    pub fn is_redelivery(&self) -> bool {
        self.delivery_count > 1
    }

    /// Get age in milliseconds
    pub fn age_ms(&self) -> i64 {
        (Utc::now() - self.timestamp).num_milliseconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp() {
        let now_ms = Utc::now().timestamp_millis();
        let message = StreamMessage::new(
            "general-email:0",
            format!("{}-0", now_ms),
            "1activationemail",
            b"{}".to_vec(),
        );

        assert!(message.age_ms() < 1000);
        assert!(!message.is_redelivery());
        assert_eq!(message.timestamp.timestamp_millis(), now_ms);
    }

    #[test]
    fn test_redelivery() {
        let message = StreamMessage::new("t:1", "1234567890123-0", "k", vec![1, 2, 3])
            .with_delivery_count(3);

        assert!(message.is_redelivery());
        assert_eq!(message.delivery_count, 3);
    }
}
