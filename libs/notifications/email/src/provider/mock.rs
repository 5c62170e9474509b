//! Mock email provider for testing

use super::{EmailProvider, SendResult};
use crate::error::{NotificationError, NotificationResult};
use crate::models::RenderedEmail;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// An email captured by [`MockSmtpProvider`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub to: String,
    pub content: RenderedEmail,
}

/// Mock email provider that captures sent emails
#[derive(Clone)]
pub struct MockSmtpProvider {
    sent_emails: Arc<Mutex<Vec<SentEmail>>>,
    should_fail: Arc<AtomicBool>,
    failure_message: String,
}

impl MockSmtpProvider {
    /// Create a new mock provider
    pub fn new() -> Self {
        Self {
            sent_emails: Arc::new(Mutex::new(Vec::new())),
            should_fail: Arc::new(AtomicBool::new(false)),
            failure_message: "Mock failure".to_string(),
        }
    }

    /// Create a mock provider that always fails
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            should_fail: Arc::new(AtomicBool::new(true)),
            failure_message: message.into(),
            ..Self::new()
        }
    }

    /// Toggle failures at runtime
    pub fn set_failing(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::Release);
    }

    /// Get all sent emails
    pub async fn sent_emails(&self) -> Vec<SentEmail> {
        self.sent_emails.lock().await.clone()
    }

    /// Get the count of sent emails
    pub async fn sent_count(&self) -> usize {
        self.sent_emails.lock().await.len()
    }

    /// Clear all sent emails
    pub async fn clear(&self) {
        self.sent_emails.lock().await.clear();
    }

    /// Check if an email was sent to a specific address
    pub async fn was_sent_to(&self, email: &str) -> bool {
        self.sent_emails.lock().await.iter().any(|e| e.to == email)
    }
}

impl Default for MockSmtpProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmailProvider for MockSmtpProvider {
    async fn send(&self, recipient: &str, content: &RenderedEmail) -> NotificationResult<SendResult> {
        if self.should_fail.load(Ordering::Acquire) {
            return Err(NotificationError::Transport(self.failure_message.clone()));
        }

        let mut sent = self.sent_emails.lock().await;
        sent.push(SentEmail {
            to: recipient.to_string(),
            content: content.clone(),
        });

        Ok(SendResult {
            message_id: format!("mock-{}", sent.len()),
        })
    }

    async fn health_check(&self) -> NotificationResult<()> {
        if self.should_fail.load(Ordering::Acquire) {
            return Err(NotificationError::Transport("Mock health check failed".into()));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content() -> RenderedEmail {
        RenderedEmail {
            subject: "Test Subject".into(),
            body_text: "Test body".into(),
            body_html: None,
        }
    }

    #[tokio::test]
    async fn test_mock_provider_sends_email() {
        let provider = MockSmtpProvider::new();

        let result = provider.send("test@example.com", &content()).await.unwrap();
        assert_eq!(result.message_id, "mock-1");

        let sent = provider.sent_emails().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "test@example.com");
        assert_eq!(sent[0].content.subject, "Test Subject");
    }

    #[tokio::test]
    async fn test_mock_provider_fails() {
        let provider = MockSmtpProvider::failing("Simulated failure");

        let err = provider.send("test@example.com", &content()).await.unwrap_err();
        assert!(matches!(err, NotificationError::Transport(ref m) if m == "Simulated failure"));
        assert_eq!(provider.sent_count().await, 0);
        assert!(provider.health_check().await.is_err());
    }

    #[tokio::test]
    async fn test_mock_provider_was_sent_to() {
        let provider = MockSmtpProvider::new();
        provider.send("user@example.com", &content()).await.unwrap();

        assert!(provider.was_sent_to("user@example.com").await);
        assert!(!provider.was_sent_to("other@example.com").await);

        provider.clear().await;
        assert_eq!(provider.sent_count().await, 0);
    }
}
