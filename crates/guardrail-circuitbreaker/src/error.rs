use guardrail_core::{Classify, Failure, Rejection, ResilienceError};
use thiserror::Error;

/// Errors returned by a guarded call.
#[derive(Debug, Error)]
pub enum GuardError<E> {
    /// The breaker refused the call; the operation never ran.
    #[error(transparent)]
    Rejected(Rejection),

    /// The operation ran and failed. The error is passed through untouched.
    #[error("{0}")]
    Inner(E),
}

impl<E> GuardError<E> {
    /// Returns true if the breaker refused the call.
    pub fn is_rejected(&self) -> bool {
        matches!(self, GuardError::Rejected(_))
    }

    /// Returns the rejection payload if the breaker refused the call.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            GuardError::Rejected(r) => Some(r),
            GuardError::Inner(_) => None,
        }
    }

    /// Returns the operation error if present.
    pub fn into_inner(self) -> Option<E> {
        match self {
            GuardError::Inner(e) => Some(e),
            GuardError::Rejected(_) => None,
        }
    }
}

impl<E> From<E> for GuardError<E> {
    fn from(err: E) -> Self {
        GuardError::Inner(err)
    }
}

impl<E: Classify> From<GuardError<E>> for ResilienceError<E> {
    fn from(err: GuardError<E>) -> Self {
        match err {
            GuardError::Rejected(r) => ResilienceError::from_rejection(r),
            GuardError::Inner(e) => ResilienceError::classify(e),
        }
    }
}

/// A rejection classifies as a permanent failure, so a retry wrapped around a
/// guard gives up instead of hammering an open circuit.
impl<E: Classify> Classify for GuardError<E> {
    fn classify(&self) -> Failure {
        match self {
            GuardError::Rejected(r) => Failure::Other(r.to_string()),
            GuardError::Inner(e) => e.classify(),
        }
    }
}
