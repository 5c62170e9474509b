//! gRPC service implementation for EMailService
//!
//! Thin adapter between the protobuf surface and [`NotificationService`].

use email::{NotificationRequest, NotificationService};
use protos::notifications::v1::{
    e_mail_service_server::EMailService, SendActivationEmailRequest, SendActivationEmailResponse,
};
use tonic::{Request, Response, Status};

pub struct EMailServiceImpl {
    notifications: NotificationService,
}

impl EMailServiceImpl {
    pub fn new(notifications: NotificationService) -> Self {
        Self { notifications }
    }
}

#[tonic::async_trait]
impl EMailService for EMailServiceImpl {
    async fn send_activation_email(
        &self,
        request: Request<SendActivationEmailRequest>,
    ) -> Result<Response<SendActivationEmailResponse>, Status> {
        let req = request.into_inner();

        let ack = self
            .notifications
            .submit(NotificationRequest::new(req.recipient, req.user_id, req.token))
            .await?;

        Ok(Response::new(SendActivationEmailResponse {
            message_id: ack.message_id,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use stream_worker::InMemoryQueue;
    use tonic::Code;

    fn service(queue: &InMemoryQueue) -> EMailServiceImpl {
        EMailServiceImpl::new(NotificationService::new(Arc::new(queue.clone())))
    }

    fn request(recipient: &str, user_id: &str, token: &str) -> Request<SendActivationEmailRequest> {
        Request::new(SendActivationEmailRequest {
            recipient: recipient.to_string(),
            user_id: user_id.to_string(),
            token: token.to_string(),
        })
    }

    #[tokio::test]
    async fn test_accepted_request_returns_queue_id() {
        let queue = InMemoryQueue::new("general-email", 8);

        let response = service(&queue)
            .send_activation_email(request("a@x.com", "1", "tok"))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(queue.len(), 1);
        assert_eq!(response.message_id, queue.messages()[0].stream_id);
    }

    #[tokio::test]
    async fn test_missing_field_is_invalid_argument() {
        let queue = InMemoryQueue::new("general-email", 8);

        let status = service(&queue)
            .send_activation_email(request("a@x.com", "1", ""))
            .await
            .unwrap_err();

        assert_eq!(status.code(), Code::InvalidArgument);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_publish_failure_is_unavailable() {
        let queue = InMemoryQueue::new("general-email", 8);
        queue.fail_publish(true);

        let status = service(&queue)
            .send_activation_email(request("a@x.com", "1", "tok"))
            .await
            .unwrap_err();

        assert_eq!(status.code(), Code::Unavailable);
    }
}
