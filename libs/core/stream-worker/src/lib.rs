//! Stream Worker Framework
//!
//! A partitioned durable queue on Redis Streams plus a generic, fault-isolated
//! delivery worker pool.
//!
//! ## Features
//!
//! - **Partitioned topics**: equal keys land on the same stream (Kafka-compatible murmur2)
//! - **Consumer groups**: pending entries are redelivered after a crash (at-least-once)
//! - **Bounded pool**: `StreamWorker<J, P>` runs at most N deliveries at once
//! - **Fault isolation**: a panicking or failing job never stops the pool
//! - **Graceful drain**: shutdown waits for in-flight deliveries, then closes the reader
//! - **In-memory backend**: the same contract for tests, with failure injection
//!
//! ## Example
//!
//! ```ignore
//! use stream_worker::{RedisStreamConsumer, StreamDef, StreamWorker, WorkerConfig};
//!
//! struct EmailStream;
//! impl StreamDef for EmailStream {
//!     const STREAM_NAME: &'static str = "general-email";
//!     const CONSUMER_GROUP: &'static str = "email_workers";
//! }
//!
//! let config = WorkerConfig::from_stream_def::<EmailStream>();
//! let consumer = RedisStreamConsumer::new(redis, &config);
//! consumer.init_consumer_groups().await?;
//!
//! let worker = StreamWorker::new(Arc::new(consumer), processor, config);
//! let report = worker.run(shutdown_rx).await?;
//! ```

mod backoff;
mod config;
mod connection;
mod consumer;
mod error;
mod event;
mod memory;
pub mod metrics;
pub mod partition;
mod producer;
mod queue;
mod registry;
mod supervisor;
mod worker;

// Re-export main types
pub use backoff::Backoff;
pub use config::WorkerConfig;
pub use connection::{connect, connect_with_retry};
pub use consumer::RedisStreamConsumer;
pub use error::StreamError;
pub use event::StreamMessage;
pub use memory::InMemoryQueue;
pub use metrics::{JobOutcome, StreamMetrics};
pub use partition::{partition_for, partition_stream};
pub use producer::RedisStreamProducer;
pub use queue::{PublishAck, QueueConsumer, QueueProducer};
pub use registry::{MessageField, StreamDef};
pub use supervisor::TaskSupervisor;
pub use worker::{PoolState, StreamJob, StreamProcessor, StreamWorker, WorkerReport, WorkerStats};
