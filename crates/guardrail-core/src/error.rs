//! Availability rejections and the unified error taxonomy.
//!
//! When a breaker refuses a call it produces a [`Rejection`]: a machine-readable
//! payload the HTTP error handler turns into a 503 response with a `retry_at`
//! hint. Failures of the operation itself are never rewritten; at most they are
//! sorted into [`ResilienceError::Transient`] or [`ResilienceError::Permanent`]
//! by the classifier.
//!
//! # Pattern Matching
//!
//! ```rust
//! use guardrail_core::{Failure, ResilienceError};
//!
//! fn describe(error: &ResilienceError<Failure>) -> String {
//!     match error {
//!         ResilienceError::Unavailable(rejection) => {
//!             format!("{} is open until {:?}", rejection.service, rejection.retry_at)
//!         }
//!         ResilienceError::Overloaded(rejection) => {
//!             let active = rejection.half_open_active;
//!             format!("{} is probing with {active} calls", rejection.service)
//!         }
//!         ResilienceError::Transient(err) => format!("transient: {err}"),
//!         ResilienceError::Permanent(err) => format!("permanent: {err}"),
//!     }
//! }
//!
//! let err = ResilienceError::classify(Failure::HttpStatus(404));
//! assert_eq!(describe(&err), "permanent: http status 404");
//! ```

use crate::classify::{Classify, DEFAULT_RETRYABLE_STATUS_CODES};
use crate::state::CircuitState;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Why a breaker refused to run an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RejectionCode {
    /// The breaker is open and the open period has not elapsed.
    #[cfg_attr(feature = "serde", serde(rename = "circuit_open"))]
    CircuitOpen,
    /// The breaker is half-open and every probe permit is taken.
    #[cfg_attr(feature = "serde", serde(rename = "circuit_half_open"))]
    CircuitHalfOpen,
}

impl RejectionCode {
    /// Returns the machine-readable code (`circuit_open` / `circuit_half_open`).
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionCode::CircuitOpen => "circuit_open",
            RejectionCode::CircuitHalfOpen => "circuit_half_open",
        }
    }
}

impl fmt::Display for RejectionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of a call the breaker refused without running it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[error("service temporarily unavailable, retry later ({code} for '{service}')")]
pub struct Rejection {
    /// Reason for the refusal.
    pub code: RejectionCode,
    /// Dependency name as first registered.
    pub service: String,
    /// Breaker state at the moment of refusal.
    pub state: CircuitState,
    /// Wall-clock time after which a new attempt may be admitted.
    pub retry_at: SystemTime,
    /// Time remaining until `retry_at` when the rejection was produced.
    pub retry_after: Duration,
    /// Probe calls in flight when the rejection was produced.
    pub half_open_active: usize,
}

impl Rejection {
    /// HTTP status the outer layer should answer with.
    pub fn status_code(&self) -> u16 {
        503
    }

    /// `retry_at` as milliseconds since the Unix epoch.
    pub fn retry_at_unix_ms(&self) -> u64 {
        self.retry_at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Unified error taxonomy for guarded and retried calls.
#[derive(Debug, Clone, Error)]
pub enum ResilienceError<E> {
    /// The breaker is open; the operation was never attempted.
    #[error(transparent)]
    Unavailable(Rejection),

    /// The breaker is half-open and at its probe cap; the operation was never attempted.
    #[error(transparent)]
    Overloaded(Rejection),

    /// A network-level failure or retryable status.
    #[error("transient failure: {0}")]
    Transient(E),

    /// A failure that retrying will not fix.
    #[error("permanent failure: {0}")]
    Permanent(E),
}

impl<E> ResilienceError<E> {
    /// Maps a rejection onto `Unavailable` or `Overloaded` by its code.
    pub fn from_rejection(rejection: Rejection) -> Self {
        match rejection.code {
            RejectionCode::CircuitOpen => ResilienceError::Unavailable(rejection),
            RejectionCode::CircuitHalfOpen => ResilienceError::Overloaded(rejection),
        }
    }

    /// Sorts an operation error using the default retryable status codes.
    pub fn classify(error: E) -> Self
    where
        E: Classify,
    {
        Self::classify_with(error, &DEFAULT_RETRYABLE_STATUS_CODES)
    }

    /// Sorts an operation error using the given retryable status codes.
    pub fn classify_with(error: E, retryable_status_codes: &[u16]) -> Self
    where
        E: Classify,
    {
        if error.classify().is_retryable(retryable_status_codes) {
            ResilienceError::Transient(error)
        } else {
            ResilienceError::Permanent(error)
        }
    }

    /// Returns `true` if the breaker was open.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ResilienceError::Unavailable(_))
    }

    /// Returns `true` if the breaker was at its half-open probe cap.
    pub fn is_overloaded(&self) -> bool {
        matches!(self, ResilienceError::Overloaded(_))
    }

    /// Returns `true` if this is a transient failure.
    pub fn is_transient(&self) -> bool {
        matches!(self, ResilienceError::Transient(_))
    }

    /// Returns `true` if this is a permanent failure.
    pub fn is_permanent(&self) -> bool {
        matches!(self, ResilienceError::Permanent(_))
    }

    /// Returns the rejection payload for `Unavailable` / `Overloaded`.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            ResilienceError::Unavailable(r) | ResilienceError::Overloaded(r) => Some(r),
            _ => None,
        }
    }

    /// HTTP status for rejections; `None` leaves the choice to the caller.
    pub fn status_code(&self) -> Option<u16> {
        self.rejection().map(Rejection::status_code)
    }

    /// Extracts the operation error, if the operation ran.
    pub fn into_inner(self) -> Option<E> {
        match self {
            ResilienceError::Transient(e) | ResilienceError::Permanent(e) => Some(e),
            _ => None,
        }
    }

    /// Maps the operation error using a function.
    pub fn map_inner<F, T>(self, f: F) -> ResilienceError<T>
    where
        F: FnOnce(E) -> T,
    {
        match self {
            ResilienceError::Unavailable(r) => ResilienceError::Unavailable(r),
            ResilienceError::Overloaded(r) => ResilienceError::Overloaded(r),
            ResilienceError::Transient(e) => ResilienceError::Transient(f(e)),
            ResilienceError::Permanent(e) => ResilienceError::Permanent(f(e)),
        }
    }
}
