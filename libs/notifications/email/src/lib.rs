//! Activation e-mail pipeline on top of `stream-worker`.
//!
//! ## Components
//!
//! - **Ingress**: `NotificationService` validates a `NotificationRequest`,
//!   encodes it and publishes it under the user's partition key
//! - **Wire format**: `DeliveryJob` is the versioned JSON job shared by
//!   producer and consumer
//! - **Delivery**: `EmailProcessor` renders the job's template through a
//!   `TemplateRenderer` and hands it to an `EmailProvider`
//! - **Providers**: SMTP via lettre and an in-memory mock
//!
//! ## Usage
//!
//! ```ignore
//! use email::{EmailProcessor, EmailStream, SmtpProvider, TemplateEngine};
//! use stream_worker::{RedisStreamConsumer, StreamWorker, WorkerConfig};
//!
//! let processor = EmailProcessor::new(SmtpProvider::new(smtp)?, TemplateEngine::new()?);
//! let config = WorkerConfig::from_stream_def::<EmailStream>();
//! let consumer = RedisStreamConsumer::new(redis, &config);
//! let worker = StreamWorker::new(Arc::new(consumer), processor, config);
//! worker.run(shutdown_rx).await?;
//! ```

pub mod error;
pub mod job;
pub mod models;
pub mod processor;
pub mod provider;
pub mod service;
pub mod streams;
pub mod templates;

pub use error::{NotificationError, NotificationResult};
pub use job::{ActivationEmailJob, DeliveryJob, WIRE_VERSION};
pub use models::{Ack, JobKind, NotificationRequest, RenderedEmail};
pub use processor::EmailProcessor;
pub use provider::{EmailProvider, MockSmtpProvider, SendResult, SentEmail, SmtpConfig, SmtpProvider};
pub use service::NotificationService;
pub use streams::{EmailStream, QueueConfig};
pub use templates::{EmailTemplate, TemplateEngine, TemplateRenderer};
