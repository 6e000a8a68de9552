use guardrail_core::{Failure, ResilienceEvent};
use std::time::{Duration, Instant};

/// Outcome of one invocation of the retried operation.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRecord {
    /// 1-indexed attempt number.
    pub attempt_number: usize,
    /// Delay waited before this attempt (zero for the first).
    pub delay: Duration,
    /// Whether the attempt produced a result that ends the loop as a success.
    pub success: bool,
    /// Classified failure, if the attempt failed.
    pub error: Option<Failure>,
    /// How long the operation took.
    pub latency: Duration,
}

/// Events emitted by the retry executor.
#[derive(Debug, Clone)]
pub enum RetryEvent {
    /// An attempt completed.
    Attempt {
        name: String,
        timestamp: Instant,
        record: AttemptRecord,
    },
    /// A retry is about to be made after `delay`.
    Retry {
        name: String,
        timestamp: Instant,
        attempt: usize,
        delay: Duration,
        failure: Failure,
    },
    /// The operation succeeded, possibly after retries.
    Success {
        name: String,
        timestamp: Instant,
        attempts: usize,
    },
    /// The last attempt failed with a retryable failure.
    Exhausted {
        name: String,
        timestamp: Instant,
        attempts: usize,
        failure: Failure,
    },
    /// A failure was not retryable and was returned immediately.
    IgnoredError {
        name: String,
        timestamp: Instant,
        attempt: usize,
        failure: Failure,
    },
}

impl ResilienceEvent for RetryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RetryEvent::Attempt { .. } => "attempt",
            RetryEvent::Retry { .. } => "retry",
            RetryEvent::Success { .. } => "success",
            RetryEvent::Exhausted { .. } => "exhausted",
            RetryEvent::IgnoredError { .. } => "ignored_error",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RetryEvent::Attempt { timestamp, .. }
            | RetryEvent::Retry { timestamp, .. }
            | RetryEvent::Success { timestamp, .. }
            | RetryEvent::Exhausted { timestamp, .. }
            | RetryEvent::IgnoredError { timestamp, .. } => *timestamp,
        }
    }

    fn dependency(&self) -> &str {
        match self {
            RetryEvent::Attempt { name, .. }
            | RetryEvent::Retry { name, .. }
            | RetryEvent::Success { name, .. }
            | RetryEvent::Exhausted { name, .. }
            | RetryEvent::IgnoredError { name, .. } => name,
        }
    }
}
