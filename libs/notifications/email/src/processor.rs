//! EmailProcessor - one delivery attempt per dequeued job
//!
//! Maps the job to renderer parameters, renders its template and hands the
//! result to the transport. Failures are returned to the pool, which logs them
//! with the job context; nothing is retried.

use crate::job::DeliveryJob;
use crate::provider::EmailProvider;
use crate::templates::TemplateRenderer;
use async_trait::async_trait;
use std::sync::Arc;
use stream_worker::{StreamError, StreamProcessor};
use tracing::debug;

/// Email processor that sends emails using a provider
pub struct EmailProcessor<P: EmailProvider> {
    provider: Arc<P>,
    templates: Arc<dyn TemplateRenderer>,
}

impl<P: EmailProvider> EmailProcessor<P> {
    pub fn new(provider: P, templates: impl TemplateRenderer + 'static) -> Self {
        Self::with_shared(Arc::new(provider), Arc::new(templates))
    }

    /// Share an existing provider and renderer
    pub fn with_shared(provider: Arc<P>, templates: Arc<dyn TemplateRenderer>) -> Self {
        Self {
            provider,
            templates,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}

#[async_trait]
impl<P: EmailProvider + 'static> StreamProcessor<DeliveryJob> for EmailProcessor<P> {
    async fn process(&self, job: &DeliveryJob) -> Result<(), StreamError> {
        let content = self
            .templates
            .render(job.template_name(), &job.render_params())?;

        let result = self.provider.send(job.recipient(), &content).await?;

        debug!(
            provider = self.provider.name(),
            provider_message_id = %result.message_id,
            "Transport accepted message"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "EmailProcessor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotificationError;
    use crate::job::ActivationEmailJob;
    use crate::models::{NotificationRequest, RenderedEmail};
    use crate::provider::MockSmtpProvider;
    use crate::templates::{MockTemplateRenderer, TemplateEngine};
    use mockall::predicate::eq;
    use serde_json::json;

    fn job() -> DeliveryJob {
        ActivationEmailJob::from_request(&NotificationRequest::new("a@x.com", "1", "tok")).into()
    }

    #[tokio::test]
    async fn test_renders_template_with_job_params() {
        let mut renderer = MockTemplateRenderer::new();
        renderer
            .expect_render()
            .with(
                eq("user_welcome.tmpl"),
                eq(json!({"activationToken": "tok", "userID": "1"})),
            )
            .times(1)
            .returning(|_, _| {
                Ok(RenderedEmail {
                    subject: "Welcome".into(),
                    body_text: "rendered".into(),
                    body_html: None,
                })
            });

        let processor = EmailProcessor::new(MockSmtpProvider::new(), renderer);
        processor.process(&job()).await.unwrap();

        let sent = processor.provider().sent_emails().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "a@x.com");
        assert_eq!(sent[0].content.body_text, "rendered");
    }

    #[tokio::test]
    async fn test_template_error_skips_transport() {
        let mut renderer = MockTemplateRenderer::new();
        renderer
            .expect_render()
            .returning(|_, _| Err(NotificationError::Template("boom".into())));

        let processor = EmailProcessor::new(MockSmtpProvider::new(), renderer);
        let err = processor.process(&job()).await.unwrap_err();

        assert!(matches!(err, StreamError::Processing(ref m) if m.contains("Template error")));
        assert_eq!(processor.provider().sent_count().await, 0);
    }

    #[tokio::test]
    async fn test_transport_error_is_reported() {
        let processor = EmailProcessor::new(
            MockSmtpProvider::failing("550 mailbox unavailable"),
            TemplateEngine::new().unwrap(),
        );

        let err = processor.process(&job()).await.unwrap_err();
        assert!(err.to_string().contains("550 mailbox unavailable"));
    }
}
