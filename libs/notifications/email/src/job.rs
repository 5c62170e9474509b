//! Job encoder/decoder
//!
//! The wire format shared by the ingress producer and the delivery workers.
//! Every payload is a JSON object carrying a `version` and a `kind`
//! discriminator next to the job fields:
//!
//! ```json
//! {"version":1,"kind":"activation_email","id":"0192...","recipient":"a@x.com",
//!  "user_id":"1","token":"tok","template_name":"user_welcome.tmpl"}
//! ```
//!
//! Unknown versions, unknown kinds and corrupt bytes decode to
//! [`NotificationError::MalformedJob`].

use crate::error::{NotificationError, NotificationResult};
use crate::models::{JobKind, NotificationRequest};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use stream_worker::{StreamError, StreamJob};
use uuid::Uuid;

/// Current wire schema version
pub const WIRE_VERSION: u64 = 1;

/// Activation e-mail for a newly registered user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationEmailJob {
    pub id: Uuid,
    pub recipient: String,
    pub user_id: String,
    pub token: String,
    pub template_name: String,
}

impl ActivationEmailJob {
    /// Build the job for an accepted request; the template is fixed by kind.
    pub fn from_request(request: &NotificationRequest) -> Self {
        Self {
            id: Uuid::now_v7(),
            recipient: request.recipient.clone(),
            user_id: request.user_id.clone(),
            token: request.token.clone(),
            template_name: JobKind::ActivationEmail.template_name().to_string(),
        }
    }

    /// Renderer parameters for the welcome template
    pub fn render_params(&self) -> Value {
        json!({
            "activationToken": self.token,
            "userID": self.user_id,
        })
    }
}

/// A decoded job, one variant per [`JobKind`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeliveryJob {
    ActivationEmail(ActivationEmailJob),
}

#[derive(Serialize)]
struct Envelope<'a> {
    version: u64,
    #[serde(flatten)]
    job: &'a DeliveryJob,
}

impl DeliveryJob {
    pub fn kind(&self) -> JobKind {
        match self {
            DeliveryJob::ActivationEmail(_) => JobKind::ActivationEmail,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            DeliveryJob::ActivationEmail(job) => job.id,
        }
    }

    pub fn recipient(&self) -> &str {
        match self {
            DeliveryJob::ActivationEmail(job) => &job.recipient,
        }
    }

    pub fn template_name(&self) -> &str {
        match self {
            DeliveryJob::ActivationEmail(job) => &job.template_name,
        }
    }

    pub fn partition_key(&self) -> String {
        match self {
            DeliveryJob::ActivationEmail(job) => self.kind().partition_key(&job.user_id),
        }
    }

    pub fn render_params(&self) -> Value {
        match self {
            DeliveryJob::ActivationEmail(job) => job.render_params(),
        }
    }

    pub fn encode(&self) -> NotificationResult<Vec<u8>> {
        let bytes = serde_json::to_vec(&Envelope {
            version: WIRE_VERSION,
            job: self,
        })?;
        Ok(bytes)
    }

    pub fn decode(payload: &[u8]) -> NotificationResult<Self> {
        let value: Value = serde_json::from_slice(payload)
            .map_err(|e| NotificationError::MalformedJob(e.to_string()))?;

        match value.get("version").and_then(Value::as_u64) {
            Some(WIRE_VERSION) => {}
            Some(other) => {
                return Err(NotificationError::MalformedJob(format!(
                    "unsupported wire version {}",
                    other
                )))
            }
            None => return Err(NotificationError::MalformedJob("missing wire version".into())),
        }

        serde_json::from_value(value).map_err(|e| NotificationError::MalformedJob(e.to_string()))
    }
}

impl From<ActivationEmailJob> for DeliveryJob {
    fn from(job: ActivationEmailJob) -> Self {
        DeliveryJob::ActivationEmail(job)
    }
}

impl StreamJob for DeliveryJob {
    fn decode(payload: &[u8]) -> Result<Self, StreamError> {
        DeliveryJob::decode(payload).map_err(StreamError::from)
    }

    fn job_id(&self) -> String {
        self.id().to_string()
    }

    fn kind(&self) -> &'static str {
        match self {
            DeliveryJob::ActivationEmail(_) => "activation_email",
        }
    }

    fn target(&self) -> String {
        self.recipient().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activation() -> DeliveryJob {
        ActivationEmailJob::from_request(&NotificationRequest::new("a@x.com", "1", "tok")).into()
    }

    #[test]
    fn test_round_trip() {
        let job = activation();
        let bytes = job.encode().unwrap();
        assert_eq!(DeliveryJob::decode(&bytes).unwrap(), job);
    }

    #[test]
    fn test_round_trip_preserves_unusual_text() {
        let job: DeliveryJob = ActivationEmailJob::from_request(&NotificationRequest::new(
            "ünïcode+tag@example.com",
            "user \"42\"\n",
            "tok/with\\slashes",
        ))
        .into();

        let decoded = DeliveryJob::decode(&job.encode().unwrap()).unwrap();
        assert_eq!(decoded, job);
    }

    #[test]
    fn test_wire_shape() {
        let job = activation();
        let value: Value = serde_json::from_slice(&job.encode().unwrap()).unwrap();

        assert_eq!(value["version"], 1);
        assert_eq!(value["kind"], "activation_email");
        assert_eq!(value["template_name"], "user_welcome.tmpl");
        assert_eq!(value["user_id"], "1");
    }

    #[test]
    fn test_corrupt_bytes_are_malformed() {
        let err = DeliveryJob::decode(&[0x00, 0x9f, 0x92]).unwrap_err();
        assert!(matches!(err, NotificationError::MalformedJob(_)));
    }

    #[test]
    fn test_unknown_version_is_malformed() {
        let payload = br#"{"version":2,"kind":"activation_email","id":"0192e0a4-7f4b-7cc0-9d58-2f3b2a1c4e5f","recipient":"a@x.com","user_id":"1","token":"tok","template_name":"user_welcome.tmpl"}"#;
        let err = DeliveryJob::decode(payload).unwrap_err();
        assert!(err.to_string().contains("unsupported wire version 2"));
    }

    #[test]
    fn test_unknown_kind_is_malformed() {
        let payload = br#"{"version":1,"kind":"sms","id":"0192e0a4-7f4b-7cc0-9d58-2f3b2a1c4e5f"}"#;
        assert!(matches!(
            DeliveryJob::decode(payload),
            Err(NotificationError::MalformedJob(_))
        ));
    }

    #[test]
    fn test_stream_job_decode_maps_to_malformed() {
        let err = <DeliveryJob as StreamJob>::decode(b"{}").unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_render_params() {
        let job = activation();
        assert_eq!(
            job.render_params(),
            json!({"activationToken": "tok", "userID": "1"})
        );
        assert_eq!(job.partition_key(), "1activationemail");
    }
}
