//! Ingress service: validate, encode and durably queue notification jobs.
//!
//! `submit` only returns `Ok` after the queue has acknowledged the write.
//! A failed publish becomes [`NotificationError::DeliveryUnavailable`] for
//! that one caller; nothing else is affected.

use crate::error::{NotificationError, NotificationResult};
use crate::job::{ActivationEmailJob, DeliveryJob};
use crate::models::{Ack, NotificationRequest};
use metrics::counter;
use std::sync::Arc;
use stream_worker::QueueProducer;
use tracing::{info, warn};
use validator::Validate;

/// Explicit context shared by every request handler.
///
/// Owns the queue producer for the lifetime of the ingress process; call
/// [`NotificationService::close`] once the server has stopped.
#[derive(Clone)]
pub struct NotificationService {
    producer: Arc<dyn QueueProducer>,
}

impl NotificationService {
    pub fn new(producer: Arc<dyn QueueProducer>) -> Self {
        Self { producer }
    }

    /// Queue an activation e-mail.
    pub async fn submit(&self, request: NotificationRequest) -> NotificationResult<Ack> {
        if let Err(e) = request.validate() {
            counter!("notification_requests_total", "outcome" => "rejected").increment(1);
            return Err(NotificationError::Validation(e.to_string()));
        }

        let job = DeliveryJob::from(ActivationEmailJob::from_request(&request));
        let partition_key = job.partition_key();
        let payload = job.encode()?;

        let published = self
            .producer
            .publish(&partition_key, &payload)
            .await
            .map_err(NotificationError::from_publish);

        let receipt = match published {
            Ok(receipt) => receipt,
            Err(e) => {
                counter!("notification_requests_total", "outcome" => "unavailable").increment(1);
                warn!(
                    recipient = %request.recipient,
                    user_id = %request.user_id,
                    partition_key = %partition_key,
                    error = %e,
                    "Failed to queue activation email"
                );
                return Err(e);
            }
        };

        counter!("notification_requests_total", "outcome" => "accepted").increment(1);
        info!(
            job_id = %job.id(),
            recipient = %request.recipient,
            user_id = %request.user_id,
            partition_key = %partition_key,
            stream = %receipt.stream,
            message_id = %receipt.stream_id,
            "Queued activation email"
        );

        Ok(Ack {
            job_id: job.id().to_string(),
            partition_key,
            message_id: receipt.stream_id,
        })
    }

    /// Release the queue producer
    pub async fn close(&self) -> NotificationResult<()> {
        self.producer.close().await.map_err(NotificationError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mockall::mock;
    use mockall::predicate::{always, eq};
    use stream_worker::{PublishAck, StreamError};

    mock! {
        Producer {}

        #[async_trait]
        impl QueueProducer for Producer {
            async fn publish(&self, partition_key: &str, payload: &[u8]) -> Result<PublishAck, StreamError>;
            async fn close(&self) -> Result<(), StreamError>;
        }
    }

    fn receipt() -> PublishAck {
        PublishAck {
            stream: "general-email:3".into(),
            partition: 3,
            stream_id: "1700000000000-0".into(),
        }
    }

    #[tokio::test]
    async fn test_submit_publishes_with_partition_key() {
        let mut producer = MockProducer::new();
        producer
            .expect_publish()
            .with(eq("1activationemail"), always())
            .times(1)
            .returning(|_, payload| {
                let job = DeliveryJob::decode(payload).unwrap();
                assert_eq!(job.recipient(), "a@x.com");
                assert_eq!(job.template_name(), "user_welcome.tmpl");
                Ok(receipt())
            });

        let service = NotificationService::new(Arc::new(producer));
        let ack = service
            .submit(NotificationRequest::new("a@x.com", "1", "tok"))
            .await
            .unwrap();

        assert_eq!(ack.partition_key, "1activationemail");
        assert_eq!(ack.message_id, "1700000000000-0");
        assert!(!ack.job_id.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_request_never_publishes() {
        let mut producer = MockProducer::new();
        producer.expect_publish().never();

        let service = NotificationService::new(Arc::new(producer));

        for request in [
            NotificationRequest::new("", "1", "tok"),
            NotificationRequest::new("a@x.com", "", "tok"),
            NotificationRequest::new("a@x.com", "1", ""),
        ] {
            let err = service.submit(request).await.unwrap_err();
            assert!(matches!(err, NotificationError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn test_publish_failure_is_delivery_unavailable() {
        let mut producer = MockProducer::new();
        producer
            .expect_publish()
            .times(1)
            .returning(|_, _| Err(StreamError::connection("connection refused")));

        let service = NotificationService::new(Arc::new(producer));
        let err = service
            .submit(NotificationRequest::new("a@x.com", "1", "tok"))
            .await
            .unwrap_err();

        assert!(matches!(err, NotificationError::DeliveryUnavailable(ref m) if m.contains("refused")));
    }

    #[tokio::test]
    async fn test_close_releases_producer() {
        let mut producer = MockProducer::new();
        producer.expect_close().times(1).returning(|| Ok(()));

        let service = NotificationService::new(Arc::new(producer));
        service.close().await.unwrap();
    }
}
