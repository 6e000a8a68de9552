//! Core infrastructure for guardrail.
//!
//! This crate provides the pieces shared by the circuit breaker and the retry
//! executor, neither of which depends on the other:
//! - Failure classification (transient vs. permanent, retryable status codes)
//! - Event system for observability
//! - The availability rejection payload and the unified error taxonomy

pub mod classify;
pub mod error;
pub mod events;
mod state;

pub use classify::{
    is_retryable_status, Classify, Failure, DEFAULT_RETRYABLE_STATUS_CODES,
};
pub use error::{Rejection, RejectionCode, ResilienceError};
pub use events::{EventListener, EventListeners, FnListener, ResilienceEvent};
pub use state::CircuitState;
