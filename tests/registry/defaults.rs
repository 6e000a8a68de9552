use guardrail_circuitbreaker::{
    BreakerConfig, CircuitState, DependencyRegistry, ENV_FAILURE_THRESHOLD,
    ENV_HALF_OPEN_MAX_CONCURRENT, ENV_OPEN_DURATION_MS, ENV_SUCCESS_THRESHOLD,
    PartialBreakerConfig,
};
use serial_test::serial;
use std::time::Duration;

fn clear_env() {
    for key in [
        ENV_FAILURE_THRESHOLD,
        ENV_SUCCESS_THRESHOLD,
        ENV_OPEN_DURATION_MS,
        ENV_HALF_OPEN_MAX_CONCURRENT,
    ] {
        // SAFETY: env tests are serialized and no other thread reads these keys.
        unsafe { std::env::remove_var(key) };
    }
}

#[test]
#[serial]
fn environment_overlays_built_in_defaults() {
    clear_env();
    // SAFETY: see `clear_env`.
    unsafe {
        std::env::set_var(ENV_FAILURE_THRESHOLD, "7");
        std::env::set_var(ENV_OPEN_DURATION_MS, "0");
        std::env::set_var(ENV_HALF_OPEN_MAX_CONCURRENT, "two");
    }

    let registry = DependencyRegistry::from_env();
    clear_env();

    assert_eq!(
        registry.defaults(),
        BreakerConfig {
            failure_threshold: 7,
            ..BreakerConfig::BUILT_IN
        }
    );
}

#[test]
#[serial]
fn empty_environment_gives_built_in_defaults() {
    clear_env();
    assert_eq!(DependencyRegistry::from_env().defaults(), BreakerConfig::default());
}

#[tokio::test(start_paused = true)]
async fn reconfiguring_keeps_open_breakers_open() {
    let registry = DependencyRegistry::builder()
        .defaults(BreakerConfig {
            failure_threshold: 1,
            open_duration_ms: 10_000,
            ..BreakerConfig::BUILT_IN
        })
        .build();
    let _ = registry
        .guard("ai-advisor", || async { Err::<(), _>("boom") })
        .await;

    registry.configure_defaults(PartialBreakerConfig::new().failure_threshold(50));

    let after = registry.snapshot("ai-advisor").unwrap();
    assert_eq!(after.state, CircuitState::Open);
    assert_eq!(after.config.failure_threshold, 50);

    let err = registry
        .guard("ai-advisor", || async { Ok::<_, &str>(()) })
        .await
        .unwrap_err();
    assert_eq!(err.rejection().unwrap().retry_after, Duration::from_secs(10));
}

/// The open period is read when the breaker trips; a shorter default applies
/// from the next trip on.
#[tokio::test(start_paused = true)]
async fn new_open_duration_applies_from_next_trip() {
    let registry = DependencyRegistry::builder()
        .defaults(BreakerConfig {
            failure_threshold: 1,
            success_threshold: 1,
            open_duration_ms: 10_000,
            ..BreakerConfig::BUILT_IN
        })
        .build();
    let fail = || async { Err::<(), _>("boom") };

    let _ = registry.guard("ai-advisor", fail).await;
    registry.configure_defaults(
        PartialBreakerConfig::new().open_duration(Duration::from_millis(100)),
    );

    tokio::time::advance(Duration::from_millis(200)).await;
    assert!(registry.guard("ai-advisor", fail).await.unwrap_err().is_rejected());

    tokio::time::advance(Duration::from_millis(10_000)).await;
    let _ = registry.guard("ai-advisor", fail).await;
    tokio::time::advance(Duration::from_millis(100)).await;
    registry
        .guard("ai-advisor", || async { Ok::<_, &str>(()) })
        .await
        .unwrap();
    assert_eq!(registry.resolve("ai-advisor").state(), CircuitState::Closed);
}

#[test]
fn defaults_are_shared_by_clones() {
    let registry = DependencyRegistry::new();
    let handle = registry.clone();
    handle.configure_defaults(PartialBreakerConfig::new().half_open_max_concurrent(4));
    assert_eq!(registry.defaults().half_open_max_concurrent, 4);
}
