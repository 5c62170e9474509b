//! Error types for the notification pipeline.
//!
//! Ingress errors (`Validation`, `DeliveryUnavailable`) go back to the caller.
//! Everything raised after the queue boundary only ends up in logs.

use stream_worker::StreamError;
use thiserror::Error;
use tonic::Status;

/// Result type for notification operations.
pub type NotificationResult<T> = Result<T, NotificationError>;

#[derive(Debug, Error)]
pub enum NotificationError {
    /// Bad input, rejected before any I/O
    #[error("Invalid input: {0}")]
    Validation(String),

    /// The queue did not accept the job
    #[error("Delivery unavailable: {0}")]
    DeliveryUnavailable(String),

    /// Queued bytes could not be decoded
    #[error("Malformed job: {0}")]
    MalformedJob(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Transport error: {0}")]
    Transport(String),

    /// The queue stayed unreachable for the read loop
    #[error("Queue connection error: {0}")]
    QueueConnection(String),

    /// A job could not be turned into queue bytes
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl NotificationError {
    /// Wrap a publish failure for the caller
    pub fn from_publish(err: StreamError) -> Self {
        NotificationError::DeliveryUnavailable(err.to_string())
    }
}

impl From<StreamError> for NotificationError {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::MalformedJob(msg) => NotificationError::MalformedJob(msg),
            StreamError::Config(msg) => NotificationError::Config(msg),
            e if e.is_connection_error() => NotificationError::QueueConnection(e.to_string()),
            e => NotificationError::DeliveryUnavailable(e.to_string()),
        }
    }
}

/// Delivery-stage errors reported back to the worker pool
impl From<NotificationError> for StreamError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::MalformedJob(msg) => StreamError::MalformedJob(msg),
            NotificationError::QueueConnection(msg) => StreamError::Connection(msg),
            other => StreamError::Processing(other.to_string()),
        }
    }
}

impl From<NotificationError> for Status {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::Validation(msg) => Status::invalid_argument(msg),
            NotificationError::DeliveryUnavailable(msg) | NotificationError::QueueConnection(msg) => {
                Status::unavailable(msg)
            }
            other => Status::internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn test_status_mapping() {
        let status: Status = NotificationError::Validation("recipient: email".into()).into();
        assert_eq!(status.code(), Code::InvalidArgument);

        let status: Status = NotificationError::DeliveryUnavailable("redis down".into()).into();
        assert_eq!(status.code(), Code::Unavailable);
        assert_eq!(status.message(), "redis down");

        let status: Status = NotificationError::Template("missing".into()).into();
        assert_eq!(status.code(), Code::Internal);
    }

    #[test]
    fn test_publish_failure_is_delivery_unavailable() {
        let err = NotificationError::from_publish(StreamError::connection("refused"));
        assert!(matches!(err, NotificationError::DeliveryUnavailable(_)));
    }

    #[test]
    fn test_stream_error_conversions() {
        assert!(matches!(
            NotificationError::from(StreamError::malformed("eof")),
            NotificationError::MalformedJob(_)
        ));
        assert!(matches!(
            NotificationError::from(StreamError::Closed),
            NotificationError::QueueConnection(_)
        ));
        assert!(matches!(
            StreamError::from(NotificationError::Transport("550".into())),
            StreamError::Processing(_)
        ));
    }

    #[test]
    fn test_serialization_error_is_internal() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = NotificationError::from(json_err);

        assert!(matches!(err, NotificationError::Serialization(_)));
        assert!(err.to_string().starts_with("Serialization error"));

        let status: Status = err.into();
        assert_eq!(status.code(), Code::Internal);
    }
}
