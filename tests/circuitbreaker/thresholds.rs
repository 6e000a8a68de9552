use super::{config, registry};
use guardrail_circuitbreaker::{CircuitState, DependencyRegistry, GuardError, RejectionCode};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

async fn failing_call(
    registry: &DependencyRegistry,
    calls: &AtomicUsize,
) -> Result<(), GuardError<&'static str>> {
    registry
        .guard("ai-advisor", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("advisor returned 500") }
        })
        .await
}

/// Three failures trip, the fourth call is refused and never runs.
#[tokio::test(start_paused = true)]
async fn third_failure_trips_and_fourth_is_rejected() {
    let registry = registry(config(3, 1, 1_000));
    let calls = AtomicUsize::new(0);

    for _ in 0..3 {
        let err = failing_call(&registry, &calls).await.unwrap_err();
        assert!(!err.is_rejected());
    }

    tokio::time::advance(Duration::from_millis(1)).await;
    let err = failing_call(&registry, &calls).await.unwrap_err();

    let rejection = err.rejection().expect("call should be rejected");
    assert_eq!(rejection.code, RejectionCode::CircuitOpen);
    assert_eq!(rejection.retry_after, Duration::from_millis(999));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn exactly_n_failures_cause_one_transition() {
    for threshold in [1, 2, 5, 8] {
        let opened = Arc::new(AtomicUsize::new(0));
        let o = Arc::clone(&opened);
        let registry = DependencyRegistry::builder()
            .defaults(config(threshold, 2, 60_000))
            .on_state_transition(move |_, _, to| {
                if to == CircuitState::Open {
                    o.fetch_add(1, Ordering::SeqCst);
                }
            })
            .build();
        let calls = AtomicUsize::new(0);

        for i in 1..threshold {
            let _ = failing_call(&registry, &calls).await;
            assert_eq!(
                registry.snapshot("ai-advisor").unwrap().state,
                CircuitState::Closed,
                "tripped after {i} of {threshold} failures"
            );
        }
        let _ = failing_call(&registry, &calls).await;

        // Further calls are rejected and do not trip again.
        for _ in 0..3 {
            let _ = failing_call(&registry, &calls).await;
        }

        assert_eq!(opened.load(Ordering::SeqCst), 1);
        assert_eq!(calls.load(Ordering::SeqCst), threshold);
    }
}

#[tokio::test]
async fn a_success_clears_the_failure_streak() {
    let registry = registry(config(3, 1, 60_000));
    let calls = AtomicUsize::new(0);

    for _ in 0..5 {
        let _ = failing_call(&registry, &calls).await;
        let _ = failing_call(&registry, &calls).await;
        registry
            .guard("ai-advisor", || async { Ok::<_, &str>(()) })
            .await
            .unwrap();
    }

    let snapshot = registry.snapshot("ai-advisor").unwrap();
    assert_eq!(snapshot.state, CircuitState::Closed);
    assert_eq!(snapshot.failure_count, 0);
}

#[tokio::test(start_paused = true)]
async fn open_rejects_until_the_deadline() {
    let registry = registry(config(1, 1, 500));
    let calls = AtomicUsize::new(0);
    let _ = failing_call(&registry, &calls).await;

    for _ in 0..4 {
        tokio::time::advance(Duration::from_millis(100)).await;
        let err = failing_call(&registry, &calls).await.unwrap_err();
        assert!(err.is_rejected());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    tokio::time::advance(Duration::from_millis(100)).await;
    let err = failing_call(&registry, &calls).await.unwrap_err();
    assert!(!err.is_rejected());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn rejection_renders_as_service_unavailable() {
    let registry = registry(config(1, 1, 60_000));
    let calls = AtomicUsize::new(0);
    let _ = failing_call(&registry, &calls).await;

    let err = failing_call(&registry, &calls).await.unwrap_err();
    let rejection = err.rejection().unwrap();

    assert_eq!(rejection.status_code(), 503);
    assert_eq!(rejection.service, "ai-advisor");
    assert!(err.to_string().contains("service temporarily unavailable"));
    assert!(rejection.retry_at_unix_ms() > 0);
}
