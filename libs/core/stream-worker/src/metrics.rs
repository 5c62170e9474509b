//! Worker metrics
//!
//! Recorded through the `metrics` facade. Without an installed recorder every
//! call is a no-op, so the process decides whether and how to export them.

use metrics::{counter, gauge};
use strum::{AsRefStr, Display};

/// How one dequeued message ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum JobOutcome {
    Succeeded,
    Failed,
    Panicked,
    Malformed,
}

/// Metric handles labelled with one stream
#[derive(Clone)]
pub struct StreamMetrics {
    stream_name: String,
}

impl StreamMetrics {
    pub fn new(stream_name: impl Into<String>) -> Self {
        Self {
            stream_name: stream_name.into(),
        }
    }

    pub fn job_finished(&self, outcome: JobOutcome) {
        counter!(
            "stream_worker_jobs_total",
            "stream" => self.stream_name.clone(),
            "outcome" => outcome.as_ref().to_string()
        )
        .increment(1);
    }

    pub fn in_flight(&self, count: usize) {
        gauge!(
            "stream_worker_jobs_in_flight",
            "stream" => self.stream_name.clone()
        )
        .set(count as f64);
    }

    pub fn reconnect_attempt(&self) {
        counter!(
            "stream_worker_reconnects_total",
            "stream" => self.stream_name.clone()
        )
        .increment(1);
    }
}
