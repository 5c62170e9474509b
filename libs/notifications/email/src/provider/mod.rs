//! Delivery transports

pub mod mock;
pub mod smtp;

pub use mock::{MockSmtpProvider, SentEmail};
pub use smtp::{SmtpConfig, SmtpProvider};

use crate::error::NotificationResult;
use crate::models::RenderedEmail;
use async_trait::async_trait;

/// Result of sending an email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendResult {
    /// Provider-specific message ID
    pub message_id: String,
}

/// Sends a fully rendered message to one recipient
#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send(&self, recipient: &str, content: &RenderedEmail) -> NotificationResult<SendResult>;

    /// Check if the provider is reachable
    async fn health_check(&self) -> NotificationResult<()>;

    /// Get provider name
    fn name(&self) -> &'static str;
}
