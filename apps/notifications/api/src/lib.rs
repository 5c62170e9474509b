//! Notifications ingress service
//!
//! Accepts `SendActivationEmail` calls and queues them for the email worker.
//!
//! ```text
//! Client
//!   ↓ (gRPC, notifications.v1.EMailService, zstd)
//! EMailServiceImpl (service.rs)
//!   ↓
//! NotificationService (validate → encode → publish)
//!   ↓
//! Redis Streams: general-email:{partition}
//! ```
//!
//! The call returns once Redis has accepted the job. Delivery happens later
//! in the email worker and is not reported back to the caller.

pub mod config;
pub mod server;
pub mod service;

pub use config::{ApiConfig, RateLimiterConfig};
pub use server::{run, serve};
pub use service::EMailServiceImpl;
