//! Failure classification.
//!
//! Errors are turned into a closed [`Failure`] type at the call boundary, so the
//! retry executor branches on a fixed set of variants instead of inspecting
//! arbitrary error values.
//!
//! # Example
//!
//! ```rust
//! use guardrail_core::{Classify, Failure};
//! use std::io::{Error, ErrorKind};
//!
//! let err = Error::new(ErrorKind::ConnectionRefused, "connect failed");
//! assert_eq!(err.classify(), Failure::ConnectionRefused);
//! assert!(err.classify().is_transient());
//!
//! assert!(!Failure::HttpStatus(404).is_transient());
//! ```

use std::io;
use thiserror::Error;

/// Status codes retried by default: request timeout, too many requests, and the
/// gateway-ish 5xx family.
pub const DEFAULT_RETRYABLE_STATUS_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// The classified shape of a failed call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum Failure {
    /// The remote side did not answer in time.
    #[error("network timeout")]
    NetworkTimeout,
    /// The connection was reset, aborted or dropped mid-flight.
    #[error("connection reset")]
    ConnectionReset,
    /// The remote side refused the connection.
    #[error("connection refused")]
    ConnectionRefused,
    /// The host name could not be resolved.
    #[error("dns resolution failed")]
    DnsFailure,
    /// The call completed with an HTTP-style status code.
    #[error("http status {0}")]
    HttpStatus(u16),
    /// Anything else, carrying the original message.
    #[error("{0}")]
    Other(String),
}

impl Failure {
    /// Classifies a free-form error message.
    ///
    /// Only meant for foreign errors that reach the boundary as text (e.g. a
    /// boxed error from another crate); typed errors should implement
    /// [`Classify`] directly.
    pub fn from_message(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

        if has(&["etimedout", "timed out", "timeout"]) {
            Failure::NetworkTimeout
        } else if has(&["econnrefused", "connection refused"]) {
            Failure::ConnectionRefused
        } else if has(&[
            "enotfound",
            "eai_again",
            "failed to lookup address",
            "dns error",
            "name resolution",
        ]) {
            Failure::DnsFailure
        } else if has(&[
            "econnreset",
            "connection reset",
            "connection closed",
            "broken pipe",
            "network error",
            "fetch failed",
        ]) {
            Failure::ConnectionReset
        } else {
            Failure::Other(message.to_string())
        }
    }

    /// Returns true for network-level conditions worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Failure::NetworkTimeout
                | Failure::ConnectionReset
                | Failure::ConnectionRefused
                | Failure::DnsFailure
        )
    }

    /// Returns the status code carried by this failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Failure::HttpStatus(code) => Some(*code),
            _ => None,
        }
    }

    /// Returns true if the failure is transient or carries a status listed in
    /// `retryable_status_codes`.
    pub fn is_retryable(&self, retryable_status_codes: &[u16]) -> bool {
        self.is_transient()
            || self
                .status()
                .is_some_and(|code| is_retryable_status(code, retryable_status_codes))
    }
}

/// Returns true if `status` is one of `retryable_status_codes`.
pub fn is_retryable_status(status: u16, retryable_status_codes: &[u16]) -> bool {
    retryable_status_codes.contains(&status)
}

/// Types that can describe themselves as a [`Failure`].
pub trait Classify {
    /// Classifies this error.
    fn classify(&self) -> Failure;
}

impl Classify for Failure {
    fn classify(&self) -> Failure {
        self.clone()
    }
}

impl Classify for io::Error {
    fn classify(&self) -> Failure {
        match self.kind() {
            io::ErrorKind::TimedOut => Failure::NetworkTimeout,
            io::ErrorKind::ConnectionRefused => Failure::ConnectionRefused,
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => Failure::ConnectionReset,
            _ => Failure::from_message(&self.to_string()),
        }
    }
}

impl Classify for Box<dyn std::error::Error + Send + Sync> {
    fn classify(&self) -> Failure {
        if let Some(failure) = self.downcast_ref::<Failure>() {
            return failure.clone();
        }
        if let Some(io_err) = self.downcast_ref::<io::Error>() {
            return io_err.classify();
        }
        Failure::from_message(&self.to_string())
    }
}

impl<T: Classify + ?Sized> Classify for &T {
    fn classify(&self) -> Failure {
        (**self).classify()
    }
}
