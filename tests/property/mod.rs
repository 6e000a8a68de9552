//! Property-based tests for guardrail.
//!
//! Run with: cargo test --test property_tests


use tokio::runtime::{Builder, Runtime};

/// Single-threaded runtime with a paused clock, so backoff sleeps and open
/// periods cost no wall time.
pub(crate) fn paused_runtime() -> Runtime {
    Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
}
