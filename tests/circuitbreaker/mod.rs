//! Circuit breaker tests.
//!
//! Test organization:
//! - thresholds.rs: trip precision and rejection while open
//! - half_open.rs: probe cap, probe outcomes, window handling
//! - reset.rs: manual control (force open / closed, reset)
//! - fallback.rs: degraded answers for rejected or failed calls
//! - concurrency.rs: multi-threaded access to one breaker

mod concurrency;
mod fallback;
mod reset;
mod thresholds;

use guardrail_circuitbreaker::{BreakerConfig, DependencyRegistry};

/// Registry whose defaults are `config`.
pub(crate) fn registry(config: BreakerConfig) -> DependencyRegistry {
    DependencyRegistry::builder().defaults(config).build()
}

pub(crate) fn config(
    failure_threshold: usize,
    success_threshold: usize,
    open_ms: u64,
) -> BreakerConfig {
    BreakerConfig {
        failure_threshold,
        success_threshold,
        open_duration_ms: open_ms,
        half_open_max_concurrent: 1,
    }
}
