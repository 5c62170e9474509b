//! Queue and worker error types
//!
//! Errors are split by where they stop:
//! - **Connection**: the queue is unreachable; the read loop backs off and eventually drains
//! - **MalformedJob**: one payload cannot be decoded; it is skipped
//! - **Processing**: one delivery attempt failed; the task ends

use thiserror::Error;

/// Queue and worker errors
#[derive(Error, Debug)]
pub enum StreamError {
    /// Redis command error
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Broker could not be reached or the connection was lost
    #[error("Queue connection error: {0}")]
    Connection(String),

    /// Payload could not be decoded into a job
    #[error("Malformed job: {0}")]
    MalformedJob(String),

    /// A delivery attempt failed
    #[error("Processing error: {0}")]
    Processing(String),

    /// The queue handle was closed
    #[error("Queue closed")]
    Closed,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Shutdown requested
    #[error("Shutdown requested")]
    Shutdown,
}

impl StreamError {
    pub fn connection(message: impl Into<String>) -> Self {
        StreamError::Connection(message.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        StreamError::MalformedJob(message.into())
    }

    pub fn processing(message: impl Into<String>) -> Self {
        StreamError::Processing(message.into())
    }

    /// Whether the error means the broker itself is unavailable.
    ///
    /// Redis I/O failures, refused or dropped connections and timeouts count;
    /// command-level errors (wrong type, NOGROUP, ...) do not.
    pub fn is_connection_error(&self) -> bool {
        match self {
            StreamError::Connection(_) | StreamError::Closed => true,
            StreamError::Redis(e) => {
                e.is_io_error()
                    || e.is_connection_dropped()
                    || e.is_connection_refusal()
                    || e.is_timeout()
            }
            _ => false,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, StreamError::MalformedJob(_))
    }

    /// Redis reports a missing consumer group
    pub fn is_nogroup_error(&self) -> bool {
        matches!(self, StreamError::Redis(e) if e.to_string().contains("NOGROUP"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_classification() {
        assert!(StreamError::connection("lost").is_connection_error());
        assert!(StreamError::Closed.is_connection_error());
        assert!(!StreamError::malformed("bad bytes").is_connection_error());
        assert!(!StreamError::processing("smtp 550").is_connection_error());
    }

    #[test]
    fn test_redis_io_error_is_connection_error() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let err = StreamError::from(redis::RedisError::from(io));
        assert!(err.is_connection_error());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            StreamError::malformed("expected value").to_string(),
            "Malformed job: expected value"
        );
        assert!(StreamError::malformed("x").is_malformed());
    }
}
