use crate::circuit::{Admission, Circuit, LastError, Transition};
use crate::config::{BreakerConfig, PartialBreakerConfig};
use crate::error::GuardError;
use crate::events::BreakerEvent;
use arc_swap::ArcSwap;
use guardrail_core::{CircuitState, EventListeners, Rejection};
#[cfg(feature = "metrics")]
use metrics::{counter, gauge, histogram};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};
use tokio::time::Instant;

/// Point-in-time view of a breaker for diagnostics and dashboards.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BreakerSnapshot {
    /// Dependency name as first registered.
    pub name: String,
    /// Current state.
    pub state: CircuitState,
    /// Consecutive failures while closed.
    pub failure_count: usize,
    /// Successful probes in the current half-open window.
    pub success_count: usize,
    /// Probe calls currently in flight.
    pub half_open_active: usize,
    /// When the breaker will admit a probe, while open.
    pub next_attempt_at: Option<SystemTime>,
    /// Last recorded failure.
    pub last_error: Option<LastError>,
    /// Effective configuration.
    pub config: BreakerConfig,
    /// Time since the last state transition.
    pub time_since_state_change: Duration,
}

impl BreakerSnapshot {
    /// HTTP status for a health endpoint: 503 while open, 200 otherwise.
    pub fn http_status(&self) -> u16 {
        match self.state {
            CircuitState::Closed | CircuitState::HalfOpen => 200,
            CircuitState::Open => 503,
        }
    }

    /// `healthy` when closed, `degraded` when half-open, `unhealthy` when open.
    pub fn health_status(&self) -> &'static str {
        match self.state {
            CircuitState::Closed => "healthy",
            CircuitState::HalfOpen => "degraded",
            CircuitState::Open => "unhealthy",
        }
    }
}

struct BreakerRecord {
    circuit: Circuit,
    overrides: PartialBreakerConfig,
}

/// A named circuit breaker guarding one dependency.
///
/// Breakers are created and owned by a [`DependencyRegistry`](crate::DependencyRegistry);
/// callers receive `Arc<Breaker>` handles. The record lives behind a mutex that is
/// never held across an `.await`: the permission check and the probe permit are
/// taken in one critical section before the operation is first polled.
pub struct Breaker {
    name: String,
    record: Mutex<BreakerRecord>,
    defaults: Arc<ArcSwap<BreakerConfig>>,
    listeners: EventListeners<BreakerEvent>,
}

impl Breaker {
    pub(crate) fn new(
        name: impl Into<String>,
        overrides: PartialBreakerConfig,
        defaults: Arc<ArcSwap<BreakerConfig>>,
        listeners: EventListeners<BreakerEvent>,
    ) -> Self {
        let name = name.into();

        #[cfg(feature = "metrics")]
        gauge!("guardrail_breaker_state", "dependency" => name.clone()).set(0.0);

        Self {
            name,
            record: Mutex::new(BreakerRecord {
                circuit: Circuit::new(),
                overrides,
            }),
            defaults,
            listeners,
        }
    }

    /// Dependency name as first registered.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Effective configuration: this breaker's overrides over the current defaults.
    pub fn config(&self) -> BreakerConfig {
        let record = self.lock();
        self.resolve(&record)
    }

    /// Overrides explicitly applied to this breaker.
    pub fn overrides(&self) -> PartialBreakerConfig {
        self.lock().overrides
    }

    /// Merges `overrides` into this breaker's own overrides. Counters and state
    /// are left untouched.
    pub fn apply_overrides(&self, overrides: &PartialBreakerConfig) {
        if overrides.is_empty() {
            return;
        }
        let mut record = self.lock();
        record.overrides.merge(overrides);
    }

    /// Current state.
    pub fn state(&self) -> CircuitState {
        self.lock().circuit.state()
    }

    /// Returns a read-only view of the breaker.
    pub fn snapshot(&self) -> BreakerSnapshot {
        let record = self.lock();
        let config = self.resolve(&record);
        let circuit = &record.circuit;
        let now = Instant::now();
        BreakerSnapshot {
            name: self.name.clone(),
            state: circuit.state(),
            failure_count: circuit.failure_count(),
            success_count: circuit.success_count(),
            half_open_active: circuit.half_open_active(),
            next_attempt_at: circuit
                .next_attempt_at()
                .map(|at| wall_clock(at, now)),
            last_error: circuit.last_error().cloned(),
            config,
            time_since_state_change: now.saturating_duration_since(circuit.last_state_change()),
        }
    }

    /// Runs `operation` if the breaker admits it.
    ///
    /// A refused call fails with [`GuardError::Rejected`] and `operation` is never
    /// invoked. Otherwise the outcome updates the breaker and is returned as is,
    /// with errors wrapped in [`GuardError::Inner`]. Any `Err` counts as a failure.
    ///
    /// The half-open permit is released on every exit path, including a panic in
    /// `operation` or the returned future being dropped.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, GuardError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let mut permit = self.acquire().map_err(GuardError::Rejected)?;

        #[cfg(feature = "metrics")]
        let start = std::time::Instant::now();

        let result = operation().await;

        #[cfg(feature = "metrics")]
        histogram!("guardrail_breaker_call_duration_seconds", "dependency" => self.name.clone())
            .record(start.elapsed().as_secs_f64());

        // Render the error while the permit is still armed.
        let failure = result.as_ref().err().map(ToString::to_string);
        let probe = permit.settle();
        match failure {
            None => self.on_success(probe),
            Some(message) => self.on_failure(probe, &message),
        }

        result.map_err(GuardError::Inner)
    }

    /// Like [`execute`](Self::execute), but a rejected or failed call is answered
    /// by `fallback` instead of an error.
    ///
    /// ```rust
    /// use guardrail_circuitbreaker::DependencyRegistry;
    ///
    /// # async fn example() {
    /// let registry = DependencyRegistry::new();
    /// let breaker = registry.resolve("ai-advisor");
    ///
    /// let advice = breaker
    ///     .execute_with_fallback(
    ///         || async { Err::<String, _>("connection refused") },
    ///         |_| "advisor unavailable, try again later".to_string(),
    ///     )
    ///     .await;
    /// assert_eq!(advice, "advisor unavailable, try again later");
    /// # }
    /// ```
    pub async fn execute_with_fallback<F, Fut, T, E, G>(&self, operation: F, fallback: G) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
        G: FnOnce(&GuardError<E>) -> T,
    {
        match self.execute(operation).await {
            Ok(value) => value,
            Err(err) => {
                tracing::debug!(
                    dependency = %self.name,
                    rejected = err.is_rejected(),
                    error = %err,
                    "serving fallback"
                );
                fallback(&err)
            }
        }
    }

    /// Trips the breaker regardless of its counters.
    pub fn force_open(&self) {
        let transition = {
            let mut record = self.lock();
            let config = self.resolve(&record);
            record.circuit.force_open(Instant::now(), &config)
        };
        self.announce(transition);
    }

    /// Closes the breaker and clears all counters.
    pub fn force_closed(&self) {
        self.close_with("forced closed");
    }

    /// Resets the breaker to closed with cleared counters.
    pub fn reset(&self) {
        self.close_with("reset");
    }

    fn close_with(&self, reason: &str) {
        let transition = self.lock().circuit.close(reason);
        if let Some(t) = transition {
            self.announce(t);
        }
    }

    fn acquire(&self) -> Result<Permit<'_>, Rejection> {
        tracing::trace!(dependency = %self.name, "checking circuit permission");

        let now = Instant::now();
        let (admission, transition, state) = {
            let mut record = self.lock();
            let config = self.resolve(&record);
            let (admission, transition) = record.circuit.try_acquire(now, &config);
            (admission, transition, record.circuit.state())
        };

        if let Some(t) = transition {
            self.announce(t);
        }

        match admission {
            Admission::Granted { probe } => {
                self.listeners.emit(&BreakerEvent::CallPermitted {
                    dependency: self.name.clone(),
                    timestamp: std::time::Instant::now(),
                    state,
                });
                Ok(Permit {
                    breaker: self,
                    window: probe,
                })
            }
            Admission::Denied {
                code,
                retry_at,
                half_open_active,
            } => {
                tracing::debug!(
                    dependency = %self.name,
                    code = code.as_str(),
                    half_open_active,
                    "circuit rejected call"
                );
                self.listeners.emit(&BreakerEvent::CallRejected {
                    dependency: self.name.clone(),
                    timestamp: std::time::Instant::now(),
                    code,
                });

                #[cfg(feature = "metrics")]
                counter!(
                    "guardrail_breaker_calls_total",
                    "dependency" => self.name.clone(),
                    "outcome" => "rejected"
                )
                .increment(1);

                Err(Rejection {
                    code,
                    service: self.name.clone(),
                    state,
                    retry_at: wall_clock(retry_at, now),
                    retry_after: retry_at.saturating_duration_since(now),
                    half_open_active,
                })
            }
        }
    }

    fn on_success(&self, probe: Option<u64>) {
        let (state, transition) = {
            let mut record = self.lock();
            let config = self.resolve(&record);
            let state = record.circuit.state();
            (state, record.circuit.record_success(probe, &config))
        };

        self.listeners.emit(&BreakerEvent::SuccessRecorded {
            dependency: self.name.clone(),
            timestamp: std::time::Instant::now(),
            state,
        });

        #[cfg(feature = "metrics")]
        counter!(
            "guardrail_breaker_calls_total",
            "dependency" => self.name.clone(),
            "outcome" => "success"
        )
        .increment(1);

        if let Some(t) = transition {
            self.announce(t);
        }
    }

    fn on_failure(&self, probe: Option<u64>, message: &str) {
        let (state, transition) = {
            let mut record = self.lock();
            let config = self.resolve(&record);
            let state = record.circuit.state();
            (
                state,
                record
                    .circuit
                    .record_failure(probe, message, Instant::now(), &config),
            )
        };

        self.listeners.emit(&BreakerEvent::FailureRecorded {
            dependency: self.name.clone(),
            timestamp: std::time::Instant::now(),
            state,
        });

        #[cfg(feature = "metrics")]
        counter!(
            "guardrail_breaker_calls_total",
            "dependency" => self.name.clone(),
            "outcome" => "failure"
        )
        .increment(1);

        if let Some(t) = transition {
            self.announce(t);
        }
    }

    fn release(&self, window: u64) {
        self.lock().circuit.release(window);
    }

    fn announce(&self, transition: Transition) {
        let Transition {
            from,
            to,
            reason,
            next_attempt_at,
        } = transition;
        match to {
            CircuitState::Open => {
                let open_for_ms = next_attempt_at.map_or(0, |at| {
                    at.saturating_duration_since(Instant::now()).as_millis() as u64
                });
                tracing::warn!(
                    dependency = %self.name,
                    from = %from,
                    open_for_ms,
                    reason = %reason,
                    "circuit opened"
                );
            }
            CircuitState::Closed => {
                tracing::info!(
                    dependency = %self.name,
                    from = %from,
                    reason = %reason,
                    "circuit closed"
                );
            }
            CircuitState::HalfOpen => {
                tracing::debug!(
                    dependency = %self.name,
                    reason = %reason,
                    "circuit half-open, probing"
                );
            }
        }

        #[cfg(feature = "metrics")]
        {
            counter!(
                "guardrail_breaker_transitions_total",
                "dependency" => self.name.clone(),
                "from" => from.as_str(),
                "to" => to.as_str()
            )
            .increment(1);
            gauge!("guardrail_breaker_state", "dependency" => self.name.clone())
                .set(match to {
                    CircuitState::Closed => 0.0,
                    CircuitState::Open => 1.0,
                    CircuitState::HalfOpen => 2.0,
                });
        }

        self.listeners.emit(&BreakerEvent::StateTransition {
            dependency: self.name.clone(),
            timestamp: std::time::Instant::now(),
            from_state: from,
            to_state: to,
            reason,
        });
    }

    fn resolve(&self, record: &BreakerRecord) -> BreakerConfig {
        record.overrides.resolve_over(&self.defaults.load())
    }

    fn lock(&self) -> MutexGuard<'_, BreakerRecord> {
        // Every mutation of the record is a single non-panicking step, so a
        // poisoned lock still guards a consistent record.
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Breaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Breaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

/// A granted call. Probe permits give their slot back on drop unless the
/// outcome was recorded first.
struct Permit<'a> {
    breaker: &'a Breaker,
    window: Option<u64>,
}

impl Permit<'_> {
    /// Hands the probe window over to the outcome recording, disarming the drop.
    fn settle(&mut self) -> Option<u64> {
        self.window.take()
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if let Some(window) = self.window.take() {
            self.breaker.release(window);
        }
    }
}

fn wall_clock(at: Instant, now: Instant) -> SystemTime {
    let wall_now = SystemTime::now();
    if at >= now {
        wall_now + (at - now)
    } else {
        wall_now - (now - at)
    }
}
