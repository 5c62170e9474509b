//! SMTP email provider using lettre

use super::{EmailProvider, SendResult};
use crate::error::{NotificationError, NotificationResult};
use crate::models::RenderedEmail;
use async_trait::async_trait;
use core_config::{env_or_default, env_parse_or, ConfigError, FromEnv};
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

/// SMTP provider configuration
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Sender mailbox, e.g. `Notifications <no-reply@example.com>`
    pub sender: String,
    /// Upgrade the session with STARTTLS
    pub use_tls: bool,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("sender", &self.sender)
            .field("use_tls", &self.use_tls)
            .finish()
    }
}

impl FromEnv for SmtpConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            host: env_or_default("SMTP_HOST", "sandbox.smtp.mailtrap.io"),
            port: env_parse_or("SMTP_PORT", 2525)?,
            username: env_or_default("SMTP_USERNAME", ""),
            password: env_or_default("SMTP_PASSWORD", ""),
            sender: env_or_default("SMTP_SENDER", "Notifications <no-reply@notifications.local>"),
            use_tls: env_parse_or("SMTP_USE_TLS", true)?,
        };

        config.sender_mailbox().map_err(|e| ConfigError::ParseError {
            key: "SMTP_SENDER".to_string(),
            details: e.to_string(),
        })?;

        Ok(config)
    }
}

impl SmtpConfig {
    pub fn sender_mailbox(&self) -> NotificationResult<Mailbox> {
        self.sender
            .parse()
            .map_err(|e| NotificationError::Config(format!("invalid sender {}: {}", self.sender, e)))
    }

    fn credentials(&self) -> Option<Credentials> {
        (!self.username.is_empty())
            .then(|| Credentials::new(self.username.clone(), self.password.clone()))
    }
}

/// SMTP email provider
pub struct SmtpProvider {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpProvider {
    /// Create a new SMTP provider
    pub fn new(config: SmtpConfig) -> NotificationResult<Self> {
        let sender = config.sender_mailbox()?;

        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| NotificationError::Config(format!("failed to create SMTP relay: {}", e)))?
        } else {
            // Plain SMTP (Mailpit/Mailhog)
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };

        let builder = match config.credentials() {
            Some(creds) => builder.credentials(creds),
            None => builder,
        };

        Ok(Self {
            transport: builder.port(config.port).build(),
            sender,
        })
    }

    fn build_message(&self, recipient: &str, content: &RenderedEmail) -> NotificationResult<Message> {
        let to: Mailbox = recipient
            .parse()
            .map_err(|e| NotificationError::Transport(format!("invalid recipient {}: {}", recipient, e)))?;

        let builder = Message::builder()
            .from(self.sender.clone())
            .to(to)
            .subject(&content.subject);

        let message = match &content.body_html {
            Some(html) => builder.multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(content.body_text.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html.clone()),
                    ),
            ),
            None => builder
                .header(ContentType::TEXT_PLAIN)
                .body(content.body_text.clone()),
        };

        message.map_err(|e| NotificationError::Transport(format!("failed to build message: {}", e)))
    }
}

#[async_trait]
impl EmailProvider for SmtpProvider {
    async fn send(&self, recipient: &str, content: &RenderedEmail) -> NotificationResult<SendResult> {
        let message = self.build_message(recipient, content)?;

        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| NotificationError::Transport(e.to_string()))?;

        let message_id = response
            .message()
            .next()
            .map(|s| s.to_string())
            .unwrap_or_default();

        Ok(SendResult { message_id })
    }

    async fn health_check(&self) -> NotificationResult<()> {
        self.transport
            .test_connection()
            .await
            .map_err(|e| NotificationError::Transport(format!("SMTP health check failed: {}", e)))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}
