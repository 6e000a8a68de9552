use guardrail_core::{CircuitState, RejectionCode, ResilienceEvent};
use std::time::Instant;

/// Events emitted by circuit breakers.
#[derive(Debug, Clone)]
pub enum BreakerEvent {
    /// The breaker changed state.
    StateTransition {
        dependency: String,
        timestamp: Instant,
        from_state: CircuitState,
        to_state: CircuitState,
        reason: String,
    },
    /// A call was admitted.
    CallPermitted {
        dependency: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A call was refused without running.
    CallRejected {
        dependency: String,
        timestamp: Instant,
        code: RejectionCode,
    },
    /// An admitted call succeeded.
    SuccessRecorded {
        dependency: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// An admitted call failed.
    FailureRecorded {
        dependency: String,
        timestamp: Instant,
        state: CircuitState,
    },
}

impl ResilienceEvent for BreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BreakerEvent::StateTransition { .. } => "state_transition",
            BreakerEvent::CallPermitted { .. } => "call_permitted",
            BreakerEvent::CallRejected { .. } => "call_rejected",
            BreakerEvent::SuccessRecorded { .. } => "success_recorded",
            BreakerEvent::FailureRecorded { .. } => "failure_recorded",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            BreakerEvent::StateTransition { timestamp, .. }
            | BreakerEvent::CallPermitted { timestamp, .. }
            | BreakerEvent::CallRejected { timestamp, .. }
            | BreakerEvent::SuccessRecorded { timestamp, .. }
            | BreakerEvent::FailureRecorded { timestamp, .. } => *timestamp,
        }
    }

    fn dependency(&self) -> &str {
        match self {
            BreakerEvent::StateTransition { dependency, .. }
            | BreakerEvent::CallPermitted { dependency, .. }
            | BreakerEvent::CallRejected { dependency, .. }
            | BreakerEvent::SuccessRecorded { dependency, .. }
            | BreakerEvent::FailureRecorded { dependency, .. } => dependency,
        }
    }
}
