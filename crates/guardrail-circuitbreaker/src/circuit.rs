use crate::config::BreakerConfig;
use guardrail_core::{CircuitState, RejectionCode};
use std::time::SystemTime;
use tokio::time::Instant;

/// Last recorded failure, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LastError {
    /// Failure message as rendered by the operation's error.
    pub message: String,
    /// When the failure was recorded.
    pub at: SystemTime,
}

/// A state change produced by the circuit, announced by the breaker once the
/// record lock has been released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Transition {
    pub(crate) from: CircuitState,
    pub(crate) to: CircuitState,
    pub(crate) reason: String,
    /// Deadline fixed by a trip; `None` for every other transition.
    pub(crate) next_attempt_at: Option<Instant>,
}

/// Outcome of a permission check.
#[derive(Debug)]
pub(crate) enum Admission {
    /// The call may run. `probe` carries the half-open window the permit
    /// belongs to.
    Granted { probe: Option<u64> },
    /// The call must not run.
    Denied {
        code: RejectionCode,
        retry_at: Instant,
        half_open_active: usize,
    },
}

/// The breaker record. Pure state: no locking, logging or events.
///
/// Every mutation is a single step over plain integers, so a panic can never
/// leave the record half-updated.
#[derive(Debug)]
pub(crate) struct Circuit {
    state: CircuitState,
    failure_count: usize,
    success_count: usize,
    half_open_active: usize,
    /// Incremented on every entry into half-open; permits from an earlier
    /// window are ignored on release.
    half_open_window: u64,
    next_attempt_at: Option<Instant>,
    last_error: Option<LastError>,
    last_state_change: Instant,
}

impl Circuit {
    pub(crate) fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            half_open_active: 0,
            half_open_window: 0,
            next_attempt_at: None,
            last_error: None,
            last_state_change: Instant::now(),
        }
    }

    pub(crate) fn state(&self) -> CircuitState {
        self.state
    }

    pub(crate) fn failure_count(&self) -> usize {
        self.failure_count
    }

    pub(crate) fn success_count(&self) -> usize {
        self.success_count
    }

    pub(crate) fn half_open_active(&self) -> usize {
        self.half_open_active
    }

    pub(crate) fn next_attempt_at(&self) -> Option<Instant> {
        self.next_attempt_at
    }

    pub(crate) fn last_error(&self) -> Option<&LastError> {
        self.last_error.as_ref()
    }

    pub(crate) fn last_state_change(&self) -> Instant {
        self.last_state_change
    }

    /// Checks whether a call may run and, if it may run as a half-open probe,
    /// takes the permit in the same step.
    pub(crate) fn try_acquire(
        &mut self,
        now: Instant,
        config: &BreakerConfig,
    ) -> (Admission, Option<Transition>) {
        let transition = self.half_open_if_ready(now);

        let admission = match self.state {
            CircuitState::Closed => Admission::Granted { probe: None },
            CircuitState::Open => Admission::Denied {
                code: RejectionCode::CircuitOpen,
                retry_at: self.next_attempt_at.unwrap_or(now),
                half_open_active: self.half_open_active,
            },
            CircuitState::HalfOpen => {
                if self.half_open_active >= config.half_open_max_concurrent {
                    Admission::Denied {
                        code: RejectionCode::CircuitHalfOpen,
                        retry_at: now + config.open_duration(),
                        half_open_active: self.half_open_active,
                    }
                } else {
                    self.half_open_active += 1;
                    Admission::Granted {
                        probe: Some(self.half_open_window),
                    }
                }
            }
        };

        (admission, transition)
    }

    /// Returns a probe permit. Permits from a window that has since ended are
    /// inert.
    pub(crate) fn release(&mut self, window: u64) {
        if self.state == CircuitState::HalfOpen && window == self.half_open_window {
            self.half_open_active = self.half_open_active.saturating_sub(1);
        }
    }

    /// Records a success. A probe permit passed in is returned in the same step,
    /// so no other caller can observe the slot as still taken.
    pub(crate) fn record_success(
        &mut self,
        probe: Option<u64>,
        config: &BreakerConfig,
    ) -> Option<Transition> {
        if let Some(window) = probe {
            self.release(window);
        }
        match self.state {
            CircuitState::HalfOpen => {
                self.success_count += 1;
                if self.success_count >= config.success_threshold {
                    return self.close("stabilized");
                }
                None
            }
            // A single success clears the failure streak.
            _ => {
                self.failure_count = 0;
                None
            }
        }
    }

    /// Records a failure, returning a probe permit first like
    /// [`record_success`](Self::record_success).
    pub(crate) fn record_failure(
        &mut self,
        probe: Option<u64>,
        message: &str,
        now: Instant,
        config: &BreakerConfig,
    ) -> Option<Transition> {
        if let Some(window) = probe {
            self.release(window);
        }
        match self.state {
            CircuitState::HalfOpen => Some(self.trip(message, now, config)),
            CircuitState::Closed => {
                self.failure_count += 1;
                if self.failure_count >= config.failure_threshold {
                    Some(self.trip(message, now, config))
                } else {
                    None
                }
            }
            // Outcome of a call admitted before the trip; the penalty already runs.
            CircuitState::Open => None,
        }
    }

    pub(crate) fn force_open(&mut self, now: Instant, config: &BreakerConfig) -> Transition {
        self.trip("forced open", now, config)
    }

    pub(crate) fn close(&mut self, reason: &str) -> Option<Transition> {
        let from = self.state;
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.success_count = 0;
        self.half_open_active = 0;
        self.next_attempt_at = None;
        if from == CircuitState::Closed {
            return None;
        }
        self.last_state_change = Instant::now();
        Some(Transition {
            from,
            to: CircuitState::Closed,
            reason: reason.to_string(),
            next_attempt_at: None,
        })
    }

    fn trip(&mut self, message: &str, now: Instant, config: &BreakerConfig) -> Transition {
        let from = self.state;
        self.state = CircuitState::Open;
        self.failure_count = 0;
        self.success_count = 0;
        self.half_open_active = 0;
        let next_attempt_at = now + config.open_duration();
        self.next_attempt_at = Some(next_attempt_at);
        self.last_error = Some(LastError {
            message: message.to_string(),
            at: SystemTime::now(),
        });
        self.last_state_change = now;
        Transition {
            from,
            to: CircuitState::Open,
            reason: message.to_string(),
            next_attempt_at: Some(next_attempt_at),
        }
    }

    fn half_open_if_ready(&mut self, now: Instant) -> Option<Transition> {
        if self.state != CircuitState::Open {
            return None;
        }
        match self.next_attempt_at {
            Some(at) if now < at => None,
            _ => {
                self.state = CircuitState::HalfOpen;
                self.failure_count = 0;
                self.success_count = 0;
                self.half_open_active = 0;
                self.half_open_window = self.half_open_window.wrapping_add(1);
                self.last_state_change = now;
                Some(Transition {
                    from: CircuitState::Open,
                    to: CircuitState::HalfOpen,
                    reason: "open period elapsed".to_string(),
                    next_attempt_at: None,
                })
            }
        }
    }
}
