//! In-memory queue backend
//!
//! Implements both sides of the queue contract in process. Messages are
//! partitioned exactly like the Redis backend and read back in global FIFO
//! order, which keeps every partition in publish order. Failure injection
//! helpers make connection loss reproducible in tests.

use crate::error::StreamError;
use crate::event::StreamMessage;
use crate::partition::{partition_for, partition_stream};
use crate::queue::{PublishAck, QueueConsumer, QueueProducer};
use crate::registry::StreamDef;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

#[derive(Default)]
struct Log {
    unread: VecDeque<StreamMessage>,
    published: Vec<StreamMessage>,
    acked: Vec<String>,
    sequence: u64,
}

struct Inner {
    topic: String,
    partitions: u32,
    log: Mutex<Log>,
    notify: Notify,
    fail_publish: AtomicBool,
    fail_reads: AtomicU32,
    disconnected: AtomicBool,
    producer_closed: AtomicBool,
    consumer_closed: AtomicBool,
}

/// Shared in-memory queue; clones refer to the same log.
#[derive(Clone)]
pub struct InMemoryQueue {
    inner: Arc<Inner>,
}

impl InMemoryQueue {
    pub fn new(topic: impl Into<String>, partitions: u32) -> Self {
        Self {
            inner: Arc::new(Inner {
                topic: topic.into(),
                partitions: partitions.max(1),
                log: Mutex::new(Log::default()),
                notify: Notify::new(),
                fail_publish: AtomicBool::new(false),
                fail_reads: AtomicU32::new(0),
                disconnected: AtomicBool::new(false),
                producer_closed: AtomicBool::new(false),
                consumer_closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn from_stream_def<S: StreamDef>() -> Self {
        Self::new(S::STREAM_NAME, S::PARTITIONS)
    }

    fn log(&self) -> MutexGuard<'_, Log> {
        // A panic while holding the lock cannot leave the log half-written
        self.inner
            .log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make every publish fail with a connection error until reset.
    pub fn fail_publish(&self, fail: bool) {
        self.inner.fail_publish.store(fail, Ordering::Release);
    }

    /// Make the next `count` reads fail with a connection error.
    pub fn fail_next_reads(&self, count: u32) {
        self.inner.fail_reads.store(count, Ordering::Release);
        self.inner.notify.notify_one();
    }

    /// Simulate losing the broker: reads and publishes fail until `reconnect`.
    pub fn disconnect(&self) {
        self.inner.disconnected.store(true, Ordering::Release);
        self.inner.notify.notify_one();
    }

    pub fn reconnect(&self) {
        self.inner.disconnected.store(false, Ordering::Release);
        self.inner.notify.notify_one();
    }

    /// Append a raw entry, bypassing publish checks
    pub fn push_raw(&self, partition_key: &str, payload: Vec<u8>) -> PublishAck {
        let partition = partition_for(partition_key, self.inner.partitions);
        let stream = partition_stream(&self.inner.topic, partition);

        let mut log = self.log();
        log.sequence += 1;
        let stream_id = format!("{}-{}", Utc::now().timestamp_millis(), log.sequence);
        let message = StreamMessage::new(&stream, &stream_id, partition_key, payload);
        log.unread.push_back(message.clone());
        log.published.push(message);
        drop(log);

        self.inner.notify.notify_one();

        PublishAck {
            stream,
            partition,
            stream_id,
        }
    }

    /// Every message ever published, in publish order
    pub fn messages(&self) -> Vec<StreamMessage> {
        self.log().published.clone()
    }

    /// Messages published to one partition key, in publish order
    pub fn messages_for_key(&self, partition_key: &str) -> Vec<StreamMessage> {
        self.log()
            .published
            .iter()
            .filter(|m| m.partition_key == partition_key)
            .cloned()
            .collect()
    }

    /// Number of messages not yet read
    pub fn len(&self) -> usize {
        self.log().unread.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stream IDs acknowledged so far, in ack order
    pub fn acked(&self) -> Vec<String> {
        self.log().acked.clone()
    }

    pub fn is_consumer_closed(&self) -> bool {
        self.inner.consumer_closed.load(Ordering::Acquire)
    }

    pub fn is_producer_closed(&self) -> bool {
        self.inner.producer_closed.load(Ordering::Acquire)
    }

    fn take_read_failure(&self) -> bool {
        self.inner
            .fail_reads
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl QueueProducer for InMemoryQueue {
    async fn publish(
        &self,
        partition_key: &str,
        payload: &[u8],
    ) -> Result<PublishAck, StreamError> {
        if self.inner.producer_closed.load(Ordering::Acquire) {
            return Err(StreamError::Closed);
        }
        if self.inner.fail_publish.load(Ordering::Acquire)
            || self.inner.disconnected.load(Ordering::Acquire)
        {
            return Err(StreamError::connection("in-memory broker unavailable"));
        }

        Ok(self.push_raw(partition_key, payload.to_vec()))
    }

    async fn close(&self) -> Result<(), StreamError> {
        self.inner.producer_closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[async_trait]
impl QueueConsumer for InMemoryQueue {
    async fn next_message(&self) -> Result<StreamMessage, StreamError> {
        loop {
            let notified = self.inner.notify.notified();

            if self.inner.consumer_closed.load(Ordering::Acquire) {
                return Err(StreamError::Closed);
            }
            if self.inner.disconnected.load(Ordering::Acquire) || self.take_read_failure() {
                return Err(StreamError::connection("in-memory broker unavailable"));
            }
            let next = self.log().unread.pop_front();
            if let Some(message) = next {
                return Ok(message);
            }

            notified.await;
        }
    }

    async fn ack(&self, message: &StreamMessage) -> Result<(), StreamError> {
        self.log().acked.push(message.stream_id.clone());
        Ok(())
    }

    async fn close(&self) -> Result<(), StreamError> {
        self.inner.consumer_closed.store(true, Ordering::Release);
        self.inner.notify.notify_one();
        Ok(())
    }
}
