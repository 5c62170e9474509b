//! Core worker traits and the generic StreamWorker implementation.
//!
//! This module provides:
//! - `StreamJob` trait for job payloads
//! - `StreamProcessor` trait for job processors
//! - `StreamWorker`, the delivery pool: one sequential read loop feeding
//!   concurrently running, fault-isolated delivery tasks

use crate::config::WorkerConfig;
use crate::error::StreamError;
use crate::event::StreamMessage;
use crate::metrics::{JobOutcome, StreamMetrics};
use crate::queue::QueueConsumer;
use crate::supervisor::{Finished, TaskSupervisor};
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use strum::Display;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, watch};
use tracing::{Instrument, debug, error, info, info_span, warn};

/// Trait for stream job payloads.
///
/// Jobs arrive as opaque bytes; `decode` turns them back into the domain type.
/// A payload that cannot be decoded must return [`StreamError::MalformedJob`].
///
/// # Example
///
/// ```rust,ignore
/// use stream_worker::{StreamError, StreamJob};
///
/// impl StreamJob for ActivationEmailJob {
///     fn decode(payload: &[u8]) -> Result<Self, StreamError> {
///         serde_json::from_slice(payload).map_err(|e| StreamError::malformed(e.to_string()))
///     }
///
///     fn job_id(&self) -> String {
///         self.id.to_string()
///     }
///
///     fn kind(&self) -> &'static str {
///         "activation_email"
///     }
///
///     fn target(&self) -> String {
///         self.recipient.clone()
///     }
/// }
/// ```
pub trait StreamJob: Sized + Send + Sync + 'static {
    fn decode(payload: &[u8]) -> Result<Self, StreamError>;

    /// Returns the job ID for logging and tracking.
    fn job_id(&self) -> String;

    /// Job kind, used as a log field.
    fn kind(&self) -> &'static str;

    /// Who the job is for (recipient, user, ...), used as a log field.
    fn target(&self) -> String;
}

/// Trait for job processors.
///
/// Domain handlers implement this trait to attempt one delivery. The pool calls
/// `process` exactly once per dequeued message; errors and panics are logged
/// and counted, never retried.
#[async_trait]
pub trait StreamProcessor<J: StreamJob>: Send + Sync {
    async fn process(&self, job: &J) -> Result<(), StreamError>;

    /// Get the processor name for logging.
    fn name(&self) -> &'static str;
}

/// Lifecycle of the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum PoolState {
    Running,
    /// Intake stopped, waiting for in-flight deliveries
    Draining,
    Stopped,
}

/// Counters shared by the read loop and all delivery tasks
#[derive(Debug, Default)]
pub struct WorkerStats {
    dispatched: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
    malformed: AtomicU64,
    /// Delivery tasks spawned and not yet finished
    active: AtomicUsize,
}

impl WorkerStats {
    fn record(&self, outcome: JobOutcome) {
        let counter = match outcome {
            JobOutcome::Succeeded => &self.succeeded,
            JobOutcome::Failed => &self.failed,
            JobOutcome::Panicked => &self.panicked,
            JobOutcome::Malformed => &self.malformed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn task_started(&self) -> usize {
        self.active.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn task_ended(&self) -> usize {
        self.active.fetch_sub(1, Ordering::AcqRel).saturating_sub(1)
    }

    pub fn snapshot(&self) -> WorkerReport {
        WorkerReport {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`WorkerStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    /// Jobs decoded and handed to a delivery task
    pub dispatched: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub panicked: u64,
    /// Payloads skipped because they could not be decoded
    pub malformed: u64,
}

impl WorkerReport {
    /// Delivery tasks that have finished, whatever the outcome
    pub fn completed(&self) -> u64 {
        self.succeeded + self.failed + self.panicked
    }
}

/// What the supervisor remembers about each running task
#[derive(Debug, Clone)]
struct JobContext {
    job_id: String,
    kind: &'static str,
    target: String,
    stream_id: String,
}

/// Delivery worker pool.
///
/// A single read loop dequeues one message at a time, decodes it and spawns a
/// delivery task. At most `max_concurrent_jobs` tasks run at once: the loop
/// takes a permit before reading, so a saturated pool stops reading.
///
/// # Type Parameters
///
/// * `J` - The job type (must implement `StreamJob`)
/// * `P` - The processor type (must implement `StreamProcessor<J>`)
pub struct StreamWorker<J, P>
where
    J: StreamJob,
    P: StreamProcessor<J>,
{
    consumer: Arc<dyn QueueConsumer>,
    processor: Arc<P>,
    config: WorkerConfig,
    semaphore: Arc<Semaphore>,
    stats: Arc<WorkerStats>,
    metrics: StreamMetrics,
    state: watch::Sender<PoolState>,
    _phantom: PhantomData<fn() -> J>,
}

impl<J, P> StreamWorker<J, P>
where
    J: StreamJob,
    P: StreamProcessor<J> + 'static,
{
    /// Create a new stream worker.
    pub fn new(consumer: Arc<dyn QueueConsumer>, processor: P, config: WorkerConfig) -> Self {
        Self::with_arc_processor(consumer, Arc::new(processor), config)
    }

    /// Create a new stream worker with an Arc processor.
    pub fn with_arc_processor(
        consumer: Arc<dyn QueueConsumer>,
        processor: Arc<P>,
        config: WorkerConfig,
    ) -> Self {
        let (state, _) = watch::channel(PoolState::Running);

        Self {
            consumer,
            processor,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1))),
            stats: Arc::new(WorkerStats::default()),
            metrics: StreamMetrics::new(config.stream_name.clone()),
            state,
            config,
            _phantom: PhantomData,
        }
    }

    /// Subscribe to pool state changes.
    pub fn state(&self) -> watch::Receiver<PoolState> {
        self.state.subscribe()
    }

    pub fn stats(&self) -> WorkerReport {
        self.stats.snapshot()
    }

    /// Deliveries currently running
    pub fn in_flight(&self) -> usize {
        self.stats.active.load(Ordering::Acquire)
    }

    /// Run the pool until shutdown or until reads keep failing.
    ///
    /// Every failed read backs off; more than `max_reconnect_attempts`
    /// consecutive failures stop the pool. Either way intake stops, in-flight
    /// deliveries are awaited and the consumer is closed before returning. A
    /// lost queue is reported as [`StreamError::Connection`], any other
    /// persistent read failure as the last error seen.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<WorkerReport, StreamError> {
        self.config.validate()?;
        self.state.send_replace(PoolState::Running);

        info!(
            consumer_id = %self.config.consumer_id,
            stream = %self.config.stream_name,
            group = %self.config.consumer_group,
            processor = %self.processor.name(),
            max_concurrent_jobs = %self.config.max_concurrent_jobs,
            "Starting stream worker"
        );

        let mut supervisor: TaskSupervisor<JobContext, JobOutcome> = TaskSupervisor::new();
        let backoff = self.config.backoff();
        let mut consecutive_errors: u32 = 0;

        let exit = loop {
            self.reap(supervisor.reap());

            if *shutdown.borrow() {
                info!("Received shutdown signal, stopping intake");
                break Ok(());
            }

            let permit = tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => {
                    info!("Received shutdown signal, stopping intake");
                    break Ok(());
                }
                permit = self.semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break Err(StreamError::Shutdown),
                },
            };

            let next = tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => {
                    info!("Received shutdown signal, stopping intake");
                    break Ok(());
                }
                next = self.consumer.next_message() => next,
            };

            match next {
                Ok(message) => {
                    if consecutive_errors > 0 {
                        info!(consecutive_errors, "Queue connection recovered");
                        consecutive_errors = 0;
                    }
                    self.dispatch(&mut supervisor, message, permit).await;
                }
                Err(e) => {
                    drop(permit);
                    consecutive_errors += 1;

                    if consecutive_errors > self.config.max_reconnect_attempts {
                        error!(
                            error = %e,
                            consecutive_errors,
                            "Queue read keeps failing, giving up"
                        );
                        break Err(if e.is_connection_error() {
                            StreamError::connection(format!(
                                "queue unreachable after {} attempts: {}",
                                consecutive_errors, e
                            ))
                        } else {
                            e
                        });
                    }

                    let delay = backoff.delay(consecutive_errors);
                    if e.is_connection_error() {
                        self.metrics.reconnect_attempt();
                        warn!(
                            error = %e,
                            consecutive_errors,
                            backoff_ms = delay.as_millis() as u64,
                            "Queue connection error, backing off"
                        );
                    } else {
                        error!(
                            error = %e,
                            consecutive_errors,
                            backoff_ms = delay.as_millis() as u64,
                            "Error reading from queue, backing off"
                        );
                    }

                    tokio::select! {
                        _ = wait_for_shutdown(&mut shutdown) => {
                            info!("Received shutdown signal during backoff");
                            break Ok(());
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        };

        self.state.send_replace(PoolState::Draining);
        info!(in_flight = self.in_flight(), "Draining in-flight deliveries");
        let finished = supervisor.drain().await;
        self.reap(finished);
        self.metrics.in_flight(0);

        if let Err(e) = self.consumer.close().await {
            warn!(error = %e, "Failed to close consumer");
        }

        self.state.send_replace(PoolState::Stopped);
        let report = self.stats.snapshot();
        info!(
            dispatched = report.dispatched,
            succeeded = report.succeeded,
            failed = report.failed,
            panicked = report.panicked,
            malformed = report.malformed,
            "Stream worker stopped"
        );

        exit.map(|()| report)
    }

    /// Decode a message and start its delivery task.
    async fn dispatch(
        &self,
        supervisor: &mut TaskSupervisor<JobContext, JobOutcome>,
        message: StreamMessage,
        permit: OwnedSemaphorePermit,
    ) {
        let job = match J::decode(&message.payload) {
            Ok(job) => job,
            Err(e) => {
                warn!(
                    stream = %message.stream,
                    message_id = %message.stream_id,
                    error = %e,
                    "Skipping malformed job"
                );
                self.stats.record(JobOutcome::Malformed);
                self.metrics.job_finished(JobOutcome::Malformed);
                if let Err(e) = self.consumer.ack(&message).await {
                    warn!(message_id = %message.stream_id, error = %e, "Failed to ACK malformed job");
                }
                return;
            }
        };

        let context = JobContext {
            job_id: job.job_id(),
            kind: job.kind(),
            target: job.target(),
            stream_id: message.stream_id.clone(),
        };

        if message.is_redelivery() {
            debug!(job_id = %context.job_id, message_id = %message.stream_id, "Redelivered job");
        }

        let span = info_span!(
            "delivery",
            job_id = %context.job_id,
            kind = context.kind,
            target = %context.target,
            stream = %message.stream,
            message_id = %message.stream_id,
        );

        let task = deliver(
            job,
            message,
            Arc::clone(&self.processor),
            Arc::clone(&self.consumer),
            Arc::clone(&self.stats),
            self.metrics.clone(),
            permit,
        )
        .instrument(span);

        self.stats.dispatched.fetch_add(1, Ordering::Relaxed);
        self.metrics.in_flight(self.stats.task_started());
        supervisor.spawn(context, task);
    }

    /// Second fault barrier: tasks that ended without reporting an outcome
    fn reap(&self, finished: Vec<Finished<JobContext, JobOutcome>>) {
        for (context, result) in finished {
            match result {
                Ok(outcome) => {
                    debug!(job_id = %context.job_id, outcome = %outcome, "Delivery task reaped");
                }
                Err(e) => {
                    let outcome = if e.is_panic() {
                        JobOutcome::Panicked
                    } else {
                        JobOutcome::Failed
                    };
                    error!(
                        job_id = %context.job_id,
                        kind = context.kind,
                        target = %context.target,
                        message_id = %context.stream_id,
                        error = %e,
                        "Delivery task aborted; message stays pending"
                    );
                    self.stats.record(outcome);
                    self.metrics.job_finished(outcome);
                    self.metrics.in_flight(self.stats.task_ended());
                }
            }
        }
    }
}

/// One delivery attempt followed by the acknowledgment.
async fn deliver<J, P>(
    job: J,
    message: StreamMessage,
    processor: Arc<P>,
    consumer: Arc<dyn QueueConsumer>,
    stats: Arc<WorkerStats>,
    metrics: StreamMetrics,
    permit: OwnedSemaphorePermit,
) -> JobOutcome
where
    J: StreamJob,
    P: StreamProcessor<J> + 'static,
{
    let attempt = AssertUnwindSafe(processor.process(&job)).catch_unwind().await;

    let outcome = match attempt {
        Ok(Ok(())) => {
            info!("Delivered");
            JobOutcome::Succeeded
        }
        Ok(Err(e)) => {
            error!(error = %e, "Delivery failed");
            JobOutcome::Failed
        }
        Err(panic) => {
            error!(panic = %panic_message(panic.as_ref()), "Delivery panicked");
            JobOutcome::Panicked
        }
    };

    stats.record(outcome);
    metrics.job_finished(outcome);

    if let Err(e) = consumer.ack(&message).await {
        warn!(error = %e, "Failed to ACK message");
    }

    metrics.in_flight(stats.task_ended());
    drop(permit);
    outcome
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Resolves once shutdown is requested. A dropped sender never resolves.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned boom"));
        assert_eq!(panic_message(payload.as_ref()), "owned boom");

        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }

    #[test]
    fn test_stats_snapshot() {
        let stats = WorkerStats::default();
        stats.record(JobOutcome::Succeeded);
        stats.record(JobOutcome::Succeeded);
        stats.record(JobOutcome::Panicked);
        stats.record(JobOutcome::Malformed);

        assert_eq!(stats.task_started(), 1);
        assert_eq!(stats.task_started(), 2);
        assert_eq!(stats.task_ended(), 1);

        let report = stats.snapshot();
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.panicked, 1);
        assert_eq!(report.malformed, 1);
        assert_eq!(report.completed(), 3);
    }

    #[test]
    fn test_pool_state_display() {
        assert_eq!(PoolState::Draining.to_string(), "draining");
    }

    #[tokio::test]
    async fn test_wait_for_shutdown_already_set() {
        let (tx, mut rx) = watch::channel(true);
        wait_for_shutdown(&mut rx).await;
        drop(tx);
    }
}
