//! Redis Streams consumer
//!
//! Reads every partition stream of a topic through one consumer group. Entries
//! left pending by a previous run of the same consumer are handed out first,
//! then new entries. Entries another consumer left pending for longer than
//! `claim_idle_ms` are claimed on startup and periodically afterwards. Each
//! read batch is buffered and returned one message at a time, preserving
//! stream order within every partition.

use crate::config::WorkerConfig;
use crate::error::StreamError;
use crate::event::StreamMessage;
use crate::partition::partition_stream;
use crate::queue::QueueConsumer;
use crate::registry::MessageField;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::streams::{StreamClaimReply, StreamId, StreamReadReply};
use redis::{RedisResult, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Read position while recovering pending entries, one cursor per partition
type PendingCursors = Vec<String>;

struct ReadState {
    buffer: VecDeque<StreamMessage>,
    /// `Some` until the pending list has been walked once
    pending: Option<PendingCursors>,
    /// `None` until the first claim pass
    last_claim: Option<Instant>,
}

/// Consumer-group reader over all partitions of a topic
pub struct RedisStreamConsumer {
    redis: Arc<ConnectionManager>,
    streams: Vec<String>,
    consumer_group: String,
    consumer_id: String,
    batch_size: usize,
    poll_interval: Duration,
    claim_idle: Duration,
    state: Mutex<ReadState>,
    closed: AtomicBool,
}

impl RedisStreamConsumer {
    pub fn new(redis: ConnectionManager, config: &WorkerConfig) -> Self {
        let streams = (0..config.partitions.max(1))
            .map(|p| partition_stream(&config.stream_name, p))
            .collect::<Vec<_>>();
        let cursors = vec!["0".to_string(); streams.len()];

        Self {
            redis: Arc::new(redis),
            streams,
            consumer_group: config.consumer_group.clone(),
            consumer_id: config.consumer_id.clone(),
            batch_size: config.batch_size.max(1),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            claim_idle: Duration::from_millis(config.claim_idle_ms),
            state: Mutex::new(ReadState {
                buffer: VecDeque::new(),
                pending: Some(cursors),
                last_claim: None,
            }),
            closed: AtomicBool::new(false),
        }
    }

    pub fn streams(&self) -> &[String] {
        &self.streams
    }

    pub fn consumer_group(&self) -> &str {
        &self.consumer_group
    }

    pub fn consumer_id(&self) -> &str {
        &self.consumer_id
    }

    /// Create the consumer group on every partition stream.
    ///
    /// Existing groups are left untouched.
    pub async fn init_consumer_groups(&self) -> Result<(), StreamError> {
        let mut conn = (*self.redis).clone();

        for stream in &self.streams {
            let result: RedisResult<()> = redis::cmd("XGROUP")
                .arg("CREATE")
                .arg(stream)
                .arg(&self.consumer_group)
                .arg("0")
                .arg("MKSTREAM")
                .query_async(&mut conn)
                .await;

            match result {
                Ok(()) => {
                    info!(stream = %stream, group = %self.consumer_group, "Created consumer group");
                }
                Err(e) if e.to_string().contains("BUSYGROUP") => {
                    debug!(stream = %stream, group = %self.consumer_group, "Consumer group already exists");
                }
                Err(e) => return Err(StreamError::Redis(e)),
            }
        }

        Ok(())
    }

    /// One XREADGROUP over all partitions starting at `ids`
    async fn read(&self, ids: &[String]) -> Result<Vec<StreamMessage>, StreamError> {
        let mut conn = (*self.redis).clone();

        let reply: Option<StreamReadReply> = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.consumer_group)
            .arg(&self.consumer_id)
            .arg("COUNT")
            .arg(self.batch_size)
            .arg("STREAMS")
            .arg(&self.streams)
            .arg(ids)
            .query_async(&mut conn)
            .await?;

        let Some(reply) = reply else {
            return Ok(Vec::new());
        };

        let mut messages = Vec::new();
        for stream_key in reply.keys {
            for entry in stream_key.ids {
                messages.push(to_message(&stream_key.key, entry));
            }
        }
        Ok(messages)
    }

    /// Claim entries other consumers left pending for at least `claim_idle`.
    ///
    /// Covers consumers that crashed or stopped with entries still buffered;
    /// consumer ids are not stable across restarts, so nobody else reads
    /// those pending lists.
    pub async fn claim_abandoned(&self) -> Result<Vec<StreamMessage>, StreamError> {
        let mut conn = (*self.redis).clone();
        let min_idle = self.claim_idle.as_millis() as u64;
        let mut claimed = Vec::new();

        for stream in &self.streams {
            // (id, consumer, idle ms, times delivered)
            let pending: Vec<(String, String, u64, u64)> = redis::cmd("XPENDING")
                .arg(stream)
                .arg(&self.consumer_group)
                .arg("IDLE")
                .arg(min_idle)
                .arg("-")
                .arg("+")
                .arg(self.batch_size)
                .query_async(&mut conn)
                .await?;

            let deliveries = pending
                .into_iter()
                .filter(|(_, consumer, _, _)| *consumer != self.consumer_id)
                .map(|(id, _, _, delivered)| (id, delivered))
                .collect::<HashMap<_, _>>();

            if deliveries.is_empty() {
                continue;
            }

            // XCLAIM re-checks the idle time, so entries another consumer
            // claimed in the meantime are skipped
            let mut cmd = redis::cmd("XCLAIM");
            cmd.arg(stream)
                .arg(&self.consumer_group)
                .arg(&self.consumer_id)
                .arg(min_idle);
            for id in deliveries.keys() {
                cmd.arg(id);
            }

            let reply: StreamClaimReply = cmd.query_async(&mut conn).await?;
            let mut entries = reply.ids;
            entries.sort_by_key(|entry| stream_id_order(&entry.id));

            for entry in entries {
                let delivered = deliveries.get(&entry.id).copied().unwrap_or(1);
                claimed.push(to_message(stream, entry).with_delivery_count(delivered as u32 + 1));
            }
        }

        if !claimed.is_empty() {
            warn!(
                consumer_id = %self.consumer_id,
                count = claimed.len(),
                "Claimed abandoned entries"
            );
        }
        Ok(claimed)
    }

    /// Refill the buffer; returns without data when nothing is available yet.
    async fn fill(&self, state: &mut ReadState) -> Result<(), StreamError> {
        if let Some(cursors) = state.pending.as_mut() {
            let recovered = self.read(cursors).await?;
            if recovered.is_empty() {
                info!(consumer_id = %self.consumer_id, "Pending entries recovered");
                state.pending = None;
            } else {
                warn!(count = recovered.len(), "Redelivering pending entries");
                for message in recovered {
                    if let Some(i) = self.streams.iter().position(|s| *s == message.stream) {
                        cursors[i] = message.stream_id.clone();
                    }
                    state.buffer.push_back(message.with_delivery_count(2));
                }
                return Ok(());
            }
        }

        let claim_due = state
            .last_claim
            .is_none_or(|at| at.elapsed() >= self.claim_idle);
        if claim_due {
            state.last_claim = Some(Instant::now());
            let claimed = self.claim_abandoned().await?;
            if !claimed.is_empty() {
                // Keep claiming until the abandoned backlog is gone
                state.last_claim = None;
                state.buffer.extend(claimed);
                return Ok(());
            }
        }

        let ids = vec![">".to_string(); self.streams.len()];
        state.buffer.extend(self.read(&ids).await?);
        Ok(())
    }
}

/// `"<ms>-<seq>"` as a sortable pair; unparsable ids sort first
fn stream_id_order(id: &str) -> (u64, u64) {
    let (ms, seq) = id.split_once('-').unwrap_or((id, "0"));
    (ms.parse().unwrap_or(0), seq.parse().unwrap_or(0))
}

fn to_message(stream: &str, entry: StreamId) -> StreamMessage {
    let field = |name: MessageField| match entry.map.get(name.as_ref()) {
        Some(Value::BulkString(bytes)) => Some(bytes.clone()),
        Some(Value::SimpleString(s)) => Some(s.clone().into_bytes()),
        _ => None,
    };

    // Missing fields yield an empty payload that fails to decode and is skipped
    let partition_key = field(MessageField::Key)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default();
    let payload = field(MessageField::Payload).unwrap_or_default();

    StreamMessage::new(stream, entry.id.clone(), partition_key, payload)
}

#[async_trait]
impl QueueConsumer for RedisStreamConsumer {
    async fn next_message(&self) -> Result<StreamMessage, StreamError> {
        let mut state = self.state.lock().await;

        loop {
            if self.closed.load(Ordering::Acquire) {
                return Err(StreamError::Closed);
            }

            if let Some(message) = state.buffer.pop_front() {
                return Ok(message);
            }

            match self.fill(&mut state).await {
                Ok(()) => {}
                Err(e) if e.is_nogroup_error() => {
                    warn!("Consumer group missing, recreating");
                    self.init_consumer_groups().await?;
                    continue;
                }
                Err(e) => return Err(e),
            }

            if state.buffer.is_empty() && state.pending.is_none() {
                tokio::time::sleep(self.poll_interval).await;
            }
        }
    }

    async fn ack(&self, message: &StreamMessage) -> Result<(), StreamError> {
        let mut conn = (*self.redis).clone();

        let _: i64 = redis::cmd("XACK")
            .arg(&message.stream)
            .arg(&self.consumer_group)
            .arg(&message.stream_id)
            .query_async(&mut conn)
            .await?;

        debug!(stream = %message.stream, stream_id = %message.stream_id, "Acknowledged message");
        Ok(())
    }

    async fn close(&self) -> Result<(), StreamError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!(consumer_id = %self.consumer_id, "Consumer closed");
        }
        Ok(())
    }
}
