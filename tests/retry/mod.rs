//! Retry tests.
//!
//! Test organization:
//! - retry_backoff.rs: delay schedule, caps and jitter
//! - retry_behavior.rs: which failures are retried and how often
//! - retry_client.rs: service-bound clients and their logs

mod retry_backoff;

use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Collects the delays passed to `on_retry`.
#[derive(Clone, Default)]
pub(crate) struct DelayLog(Arc<Mutex<Vec<Duration>>>);

impl DelayLog {
    pub(crate) fn push(&self, delay: Duration) {
        self.0.lock().unwrap().push(delay);
    }

    pub(crate) fn delays(&self) -> Vec<Duration> {
        self.0.lock().unwrap().clone()
    }
}
