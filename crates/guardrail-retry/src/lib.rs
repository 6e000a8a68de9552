//! Retry with exponential backoff for calls to external dependencies.
//!
//! [`perform_with_retry`] re-invokes an operation while it fails with a transient
//! network condition (timeouts, resets, refused connections, DNS failures),
//! waiting an exponentially growing, optionally jittered delay between attempts.
//! Anything else is returned to the caller untouched on the first failure.
//!
//! ```rust
//! use guardrail_retry::{perform_with_retry, RetryOptions};
//! use std::io::{Error, ErrorKind};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let options = RetryOptions::builder()
//!     .retries(2)
//!     .initial_delay(Duration::from_millis(100))
//!     .build();
//!
//! let result = perform_with_retry(
//!     || async { Err::<(), _>(Error::new(ErrorKind::InvalidInput, "bad payload")) },
//!     &options,
//! )
//! .await;
//!
//! // Not a network failure: returned after one attempt.
//! assert!(result.is_err());
//! # }
//! ```
//!
//! Responses that carry a status code can opt into status-based retries with
//! [`perform_with_retry_on_status`]; [`bound_retry_client`] binds defaults and a
//! base target for one service; [`RetryLayer`] retries a Tower service.
//!
//! ## Feature Flags
//! - `metrics`: counts attempts and outcomes through the `metrics` crate
//! - `serde`: `Serialize`/`Deserialize` for [`RetryOverrides`]

use guardrail_core::{is_retryable_status, Classify, Failure};
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter};
use std::future::Future;
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::time::{Duration, Instant};

pub use backoff::ExponentialBackoff;
pub use client::{bound_retry_client, RetryClient};
pub use config::{RetryOptions, RetryOptionsBuilder, RetryOverrides};
pub use events::{AttemptRecord, RetryEvent};
pub use layer::{Retry, RetryLayer};

mod backoff;
mod client;
mod config;
mod events;
mod layer;

/// Responses that expose an HTTP-style status code.
pub trait ResponseStatus {
    /// The response's status code.
    fn status(&self) -> u16;
}

impl ResponseStatus for u16 {
    fn status(&self) -> u16 {
        *self
    }
}

/// Runs `operation`, retrying transient failures per `options`.
///
/// The operation is invoked at most `retries + 1` times. An error whose
/// classified [`Failure`] is transient, or carries a status listed in the
/// retryable status codes, is retried while attempts remain. Any other error is
/// returned immediately, and the last error is returned once attempts run out.
pub async fn perform_with_retry<F, Fut, T, E>(operation: F, options: &RetryOptions) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify,
{
    run(operation, options, |_: &T| None).await
}

/// Like [`perform_with_retry`], but also retries `Ok` responses whose status is
/// retryable. On the last attempt such a response is returned as `Ok`.
pub async fn perform_with_retry_on_status<F, Fut, T, E>(
    operation: F,
    options: &RetryOptions,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    T: ResponseStatus,
    E: Classify,
{
    run(operation, options, |response: &T| Some(response.status())).await
}

pub(crate) async fn run<F, Fut, T, E, S>(
    mut operation: F,
    options: &RetryOptions,
    status_of: S,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify,
    S: Fn(&T) -> Option<u16>,
{
    let name = options.label();
    let backoff = options.backoff();
    let max_attempts = options.retries.saturating_add(1);
    let codes = options.retryable_status_codes.as_slice();
    let mut delay = Duration::ZERO;
    let mut attempt = 1;

    loop {
        let started = tokio::time::Instant::now();
        let result = operation().await;
        let latency = started.elapsed();

        #[cfg(feature = "metrics")]
        counter!("guardrail_retry_attempts_total", "name" => name.to_string()).increment(1);

        // `None` means the result ends the loop as a success.
        let failure = match &result {
            Ok(response) => status_of(response)
                .filter(|code| is_retryable_status(*code, codes))
                .map(Failure::HttpStatus),
            Err(err) => Some(err.classify()),
        };

        if !options.listeners.is_empty() {
            options.listeners.emit(&RetryEvent::Attempt {
                name: name.to_string(),
                timestamp: Instant::now(),
                record: AttemptRecord {
                    attempt_number: attempt,
                    delay,
                    success: failure.is_none(),
                    error: failure.clone(),
                    latency,
                },
            });
        }

        let Some(failure) = failure else {
            options.listeners.emit(&RetryEvent::Success {
                name: name.to_string(),
                timestamp: Instant::now(),
                attempts: attempt,
            });
            record_outcome(options, "success");
            return result;
        };

        let retryable = result.is_ok() || failure.is_retryable(codes);
        if !retryable {
            tracing::debug!(name = %name, attempt, error = %failure, "failure is not retryable");
            options.listeners.emit(&RetryEvent::IgnoredError {
                name: name.to_string(),
                timestamp: Instant::now(),
                attempt,
                failure,
            });
            record_outcome(options, "ignored");
            return result;
        }

        if attempt >= max_attempts {
            tracing::debug!(
                name = %name,
                attempts = attempt,
                error = %failure,
                "retries exhausted"
            );
            options.listeners.emit(&RetryEvent::Exhausted {
                name: name.to_string(),
                timestamp: Instant::now(),
                attempts: attempt,
                failure,
            });
            record_outcome(options, "exhausted");
            return result;
        }

        delay = backoff.delay_for(attempt);
        tracing::debug!(
            name = %name,
            attempt,
            retries = options.retries,
            delay_ms = delay.as_millis() as u64,
            error = %failure,
            "retrying after failure"
        );
        drop(result);
        tokio::time::sleep(delay).await;

        // Hooks run once the wait is over, right before the next attempt.
        options.listeners.emit(&RetryEvent::Retry {
            name: name.to_string(),
            timestamp: Instant::now(),
            attempt,
            delay,
            failure,
        });
        attempt += 1;
    }
}

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

pub(crate) fn describe_metrics() {
    #[cfg(feature = "metrics")]
    {
        METRICS_INIT.call_once(|| {
            describe_counter!(
                "guardrail_retry_attempts_total",
                "Total number of attempts made by the retry executor"
            );
            describe_counter!(
                "guardrail_retry_outcomes_total",
                "Final outcomes of retried operations (success, exhausted, ignored)"
            );
        });
    }
}

#[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
fn record_outcome(options: &RetryOptions, outcome: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(
        "guardrail_retry_outcomes_total",
        "name" => options.label().to_string(),
        "outcome" => outcome
    )
    .increment(1);
}
