//! Request and delivery models

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use validator::Validate;

/// Caller-supplied send request. Immutable once accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct NotificationRequest {
    #[validate(email)]
    pub recipient: String,

    /// Opaque user identifier, also used for partition affinity
    #[validate(length(min = 1))]
    pub user_id: String,

    #[validate(length(min = 1))]
    pub token: String,
}

impl NotificationRequest {
    pub fn new(
        recipient: impl Into<String>,
        user_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            recipient: recipient.into(),
            user_id: user_id.into(),
            token: token.into(),
        }
    }
}

/// Notification kinds the pipeline knows how to deliver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobKind {
    ActivationEmail,
}

impl JobKind {
    /// Template chosen by ingress for this kind
    pub fn template_name(&self) -> &'static str {
        match self {
            JobKind::ActivationEmail => "user_welcome.tmpl",
        }
    }

    /// Event type suffix of the partition key
    pub fn event_type(&self) -> &'static str {
        match self {
            JobKind::ActivationEmail => "activationemail",
        }
    }

    /// All notifications of one kind for one user share a partition
    pub fn partition_key(&self, user_id: &str) -> String {
        format!("{}{}", user_id, self.event_type())
    }
}

/// Returned to the caller once the job is durably queued
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub job_id: String,
    pub partition_key: String,
    /// Queue entry id of the durable write
    pub message_id: String,
}

/// Rendered content, consumed immediately by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub body_text: String,
    pub body_html: Option<String>,
}
