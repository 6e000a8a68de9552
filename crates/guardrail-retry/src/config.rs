use crate::backoff::ExponentialBackoff;
use crate::events::{AttemptRecord, RetryEvent};
use guardrail_core::{
    EventListener, EventListeners, Failure, FnListener, DEFAULT_RETRYABLE_STATUS_CODES,
};
use std::fmt;
use std::time::Duration;

/// Options for [`perform_with_retry`](crate::perform_with_retry).
///
/// Cloning is cheap; listeners are shared between clones.
#[derive(Clone)]
pub struct RetryOptions {
    pub(crate) name: Option<String>,
    pub(crate) retries: usize,
    pub(crate) initial_delay: Duration,
    pub(crate) max_delay: Duration,
    pub(crate) backoff_factor: f64,
    pub(crate) jitter: bool,
    pub(crate) retryable_status_codes: Vec<u16>,
    pub(crate) listeners: EventListeners<RetryEvent>,
}

impl RetryOptions {
    /// Returns a builder starting from the defaults.
    pub fn builder() -> RetryOptionsBuilder {
        crate::describe_metrics();
        RetryOptionsBuilder::new()
    }

    /// Name used in logs, events and metric labels, if one was set.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The name, or `<unnamed>` for display.
    pub(crate) fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }

    /// Retries after the first attempt.
    pub fn retries(&self) -> usize {
        self.retries
    }

    /// Delay before the first retry.
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Upper bound for any single delay.
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Growth factor between consecutive delays (at least 1).
    pub fn backoff_factor(&self) -> f64 {
        self.backoff_factor
    }

    /// Whether delays are jittered.
    pub fn jitter(&self) -> bool {
        self.jitter
    }

    /// Status codes that trigger a retry.
    pub fn retryable_status_codes(&self) -> &[u16] {
        &self.retryable_status_codes
    }

    /// The backoff schedule these options describe.
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(
            self.initial_delay,
            self.max_delay,
            self.backoff_factor,
            self.jitter,
        )
    }

    /// Returns a copy with `overrides` applied. Listeners are kept.
    pub fn merged(&self, overrides: &RetryOverrides) -> RetryOptions {
        let mut merged = self.clone();
        if let Some(retries) = overrides.retries {
            merged.retries = retries;
        }
        if let Some(initial_delay) = overrides.initial_delay {
            merged.initial_delay = initial_delay;
        }
        if let Some(max_delay) = overrides.max_delay {
            merged.max_delay = max_delay;
        }
        if let Some(factor) = overrides.backoff_factor {
            merged.backoff_factor = normalize_factor(factor);
        }
        if let Some(jitter) = overrides.jitter {
            merged.jitter = jitter;
        }
        if let Some(codes) = &overrides.retryable_status_codes {
            merged.retryable_status_codes = codes.clone();
        }
        merged
    }
}

impl Default for RetryOptions {
    fn default() -> Self {
        RetryOptionsBuilder::new().build()
    }
}

impl fmt::Debug for RetryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("name", &self.name)
            .field("retries", &self.retries)
            .field("initial_delay", &self.initial_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_factor", &self.backoff_factor)
            .field("jitter", &self.jitter)
            .field("retryable_status_codes", &self.retryable_status_codes)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Builder for [`RetryOptions`].
pub struct RetryOptionsBuilder {
    options: RetryOptions,
}

impl RetryOptionsBuilder {
    /// Creates a builder with defaults.
    ///
    /// Defaults:
    /// - retries: 3 (four attempts in total)
    /// - initial delay: 500 ms
    /// - max delay: 10 s
    /// - backoff factor: 2
    /// - jitter: on
    /// - retryable status codes: 408, 429, 500, 502, 503, 504
    pub fn new() -> Self {
        Self {
            options: RetryOptions {
                name: None,
                retries: 3,
                initial_delay: Duration::from_millis(500),
                max_delay: Duration::from_millis(10_000),
                backoff_factor: 2.0,
                jitter: true,
                retryable_status_codes: DEFAULT_RETRYABLE_STATUS_CODES.to_vec(),
                listeners: EventListeners::new(),
            },
        }
    }

    /// Sets the name used in logs and events.
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.options.name = Some(name.into());
        self
    }

    /// Sets the number of retries after the first attempt. Zero means exactly
    /// one attempt.
    pub fn retries(mut self, retries: usize) -> Self {
        self.options.retries = retries;
        self
    }

    /// Sets the delay before the first retry.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.options.initial_delay = delay;
        self
    }

    /// Sets the upper bound for any single delay.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.options.max_delay = delay;
        self
    }

    /// Sets the growth factor. Values below 1 are treated as 1.
    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.options.backoff_factor = normalize_factor(factor);
        self
    }

    /// Enables or disables jitter.
    pub fn jitter(mut self, jitter: bool) -> Self {
        self.options.jitter = jitter;
        self
    }

    /// Replaces the set of status codes that trigger a retry.
    pub fn retryable_status_codes<I>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = u16>,
    {
        self.options.retryable_status_codes = codes.into_iter().collect();
        self
    }

    /// Registers a callback invoked before each backoff sleep.
    ///
    /// # Callback Signature
    /// `Fn(usize, &Failure, Duration)`: the attempt that just failed (1-indexed),
    /// its classified failure, and the delay before the next attempt.
    ///
    /// # Example
    /// ```rust
    /// use guardrail_retry::RetryOptions;
    ///
    /// let options = RetryOptions::builder()
    ///     .on_retry(|attempt, failure, delay| {
    ///         eprintln!("attempt {attempt} failed ({failure}), waiting {delay:?}");
    ///     })
    ///     .build();
    /// ```
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, &Failure, Duration) + Send + Sync + 'static,
    {
        self.options
            .listeners
            .add(FnListener::new(move |event: &RetryEvent| {
                if let RetryEvent::Retry {
                    attempt,
                    delay,
                    failure,
                    ..
                } = event
                {
                    f(*attempt, failure, *delay);
                }
            }));
        self
    }

    /// Registers a callback invoked with the record of every attempt.
    pub fn on_attempt<F>(mut self, f: F) -> Self
    where
        F: Fn(&AttemptRecord) + Send + Sync + 'static,
    {
        self.options
            .listeners
            .add(FnListener::new(move |event: &RetryEvent| {
                if let RetryEvent::Attempt { record, .. } = event {
                    f(record);
                }
            }));
        self
    }

    /// Registers a callback invoked on success with the number of attempts made.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.options
            .listeners
            .add(FnListener::new(move |event: &RetryEvent| {
                if let RetryEvent::Success { attempts, .. } = event {
                    f(*attempts);
                }
            }));
        self
    }

    /// Registers a callback invoked when the final attempt still fails with a
    /// retryable failure.
    pub fn on_exhausted<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, &Failure) + Send + Sync + 'static,
    {
        self.options
            .listeners
            .add(FnListener::new(move |event: &RetryEvent| {
                if let RetryEvent::Exhausted {
                    attempts, failure, ..
                } = event
                {
                    f(*attempts, failure);
                }
            }));
        self
    }

    /// Registers a callback invoked when a failure is returned without retrying
    /// because it is not retryable.
    pub fn on_ignored<F>(mut self, f: F) -> Self
    where
        F: Fn(&Failure) + Send + Sync + 'static,
    {
        self.options
            .listeners
            .add(FnListener::new(move |event: &RetryEvent| {
                if let RetryEvent::IgnoredError { failure, .. } = event {
                    f(failure);
                }
            }));
        self
    }

    /// Registers a listener for every retry event.
    pub fn listener<L>(mut self, listener: L) -> Self
    where
        L: EventListener<RetryEvent> + 'static,
    {
        self.options.listeners.add(listener);
        self
    }

    /// Builds the options.
    pub fn build(self) -> RetryOptions {
        self.options
    }
}

impl Default for RetryOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-call adjustments merged over a base [`RetryOptions`]. Unset fields keep
/// the base value.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RetryOverrides {
    /// See [`RetryOptionsBuilder::retries`].
    pub retries: Option<usize>,
    /// See [`RetryOptionsBuilder::initial_delay`].
    pub initial_delay: Option<Duration>,
    /// See [`RetryOptionsBuilder::max_delay`].
    pub max_delay: Option<Duration>,
    /// See [`RetryOptionsBuilder::backoff_factor`].
    pub backoff_factor: Option<f64>,
    /// See [`RetryOptionsBuilder::jitter`].
    pub jitter: Option<bool>,
    /// See [`RetryOptionsBuilder::retryable_status_codes`].
    pub retryable_status_codes: Option<Vec<u16>>,
}

impl RetryOverrides {
    /// Creates empty overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the retry count.
    pub fn retries(mut self, retries: usize) -> Self {
        self.retries = Some(retries);
        self
    }

    /// Overrides the initial delay.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = Some(delay);
        self
    }

    /// Overrides the delay cap.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Overrides the growth factor.
    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = Some(factor);
        self
    }

    /// Overrides jitter.
    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = Some(jitter);
        self
    }

    /// Overrides the retryable status codes.
    pub fn retryable_status_codes<I>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = u16>,
    {
        self.retryable_status_codes = Some(codes.into_iter().collect());
        self
    }
}

fn normalize_factor(factor: f64) -> f64 {
    if factor >= 1.0 {
        factor
    } else {
        1.0
    }
}
