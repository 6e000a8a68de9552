//! Per-dependency circuit breakers.
//!
//! A breaker sits in front of one external dependency (an AI service, the bot
//! transport, a webhook sink) and stops calling it while it is failing, so a slow
//! or broken dependency costs callers a fast rejection instead of a hung request.
//!
//! ## States
//! - **Closed**: calls run. Consecutive failures are counted; any success clears
//!   the count. Reaching `failure_threshold` trips the breaker.
//! - **Open**: calls are rejected with [`RejectionCode::CircuitOpen`] until the
//!   open period elapses.
//! - **Half-Open**: up to `half_open_max_concurrent` probes may run at once;
//!   extra calls are rejected with [`RejectionCode::CircuitHalfOpen`]. One failure
//!   reopens the breaker, `success_threshold` successes close it.
//!
//! ## Usage
//!
//! Breakers live in a [`DependencyRegistry`], keyed by dependency name:
//!
//! ```rust
//! use guardrail_circuitbreaker::{DependencyRegistry, GuardError};
//!
//! # async fn fetch_plan() -> Result<String, std::io::Error> { Ok("plan".into()) }
//! # async fn example() {
//! let registry = DependencyRegistry::from_env();
//!
//! match registry.guard("ai-advisor", || fetch_plan()).await {
//!     Ok(plan) => println!("{plan}"),
//!     Err(GuardError::Rejected(rejection)) => {
//!         // 503 with a retry hint
//!         println!("{} (retry in {:?})", rejection, rejection.retry_after);
//!     }
//!     Err(GuardError::Inner(err)) => println!("advisor failed: {err}"),
//! }
//! # }
//! ```
//!
//! [`DependencyRegistry::guard_or_else`] answers a rejected or failed call with a
//! fallback value instead of an error.
//!
//! Process-wide defaults can be changed at runtime without resetting any breaker:
//!
//! ```rust
//! use guardrail_circuitbreaker::{DependencyRegistry, PartialBreakerConfig};
//! use std::time::Duration;
//!
//! let registry = DependencyRegistry::new();
//! registry.configure_defaults(
//!     PartialBreakerConfig::new().open_duration(Duration::from_secs(10)),
//! );
//! assert_eq!(registry.defaults().open_duration_ms, 10_000);
//! ```
//!
//! ## Feature Flags
//! - `metrics`: records call outcomes, transitions and state through the `metrics` crate
//! - `serde`: `Serialize` for snapshots, `Serialize`/`Deserialize` for configurations

#[cfg(feature = "metrics")]
use metrics::{describe_counter, describe_gauge, describe_histogram};
#[cfg(feature = "metrics")]
use std::sync::Once;

pub use breaker::{Breaker, BreakerSnapshot};
pub use circuit::LastError;
pub use config::{
    BreakerConfig, PartialBreakerConfig, ENV_FAILURE_THRESHOLD, ENV_HALF_OPEN_MAX_CONCURRENT,
    ENV_OPEN_DURATION_MS, ENV_SUCCESS_THRESHOLD,
};
pub use error::GuardError;
pub use events::BreakerEvent;
pub use guardrail_core::{CircuitState, Rejection, RejectionCode};
pub use layer::{GuardLayer, Guarded};
pub use registry::{DependencyRegistry, DependencyRegistryBuilder};

mod breaker;
mod circuit;
mod config;
mod error;
mod events;
mod layer;
mod registry;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

pub(crate) fn describe_metrics() {
    #[cfg(feature = "metrics")]
    {
        METRICS_INIT.call_once(|| {
            describe_counter!(
                "guardrail_breaker_calls_total",
                "Total number of calls through a circuit breaker, by outcome"
            );
            describe_counter!(
                "guardrail_breaker_transitions_total",
                "Total number of circuit breaker state transitions"
            );
            describe_gauge!(
                "guardrail_breaker_state",
                "Current breaker state (0 = closed, 1 = open, 2 = half-open)"
            );
            describe_histogram!(
                "guardrail_breaker_call_duration_seconds",
                "Duration of calls admitted by a circuit breaker"
            );
        });
    }
}
