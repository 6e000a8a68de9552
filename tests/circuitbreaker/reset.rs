use super::{config, registry};
use guardrail_circuitbreaker::{CircuitState, RejectionCode};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

#[tokio::test]
async fn force_open_rejects_immediately() {
    let registry = registry(config(5, 1, 60_000));
    let breaker = registry.resolve("webhook-alerts");
    breaker.force_open();

    let err = registry
        .guard("webhook-alerts", || async { Ok::<_, &str>(()) })
        .await
        .unwrap_err();
    assert_eq!(err.rejection().unwrap().code, RejectionCode::CircuitOpen);

    let snapshot = breaker.snapshot();
    assert_eq!(
        snapshot.last_error.map(|e| e.message),
        Some("forced open".to_string())
    );
}

#[tokio::test]
async fn force_closed_and_reset_clear_counters() {
    let registry = registry(config(3, 1, 60_000));
    let breaker = registry.resolve("ai-advisor");

    for _ in 0..2 {
        let _ = breaker.execute(|| async { Err::<(), _>("timeout") }).await;
    }
    assert_eq!(breaker.snapshot().failure_count, 2);
    breaker.reset();
    assert_eq!(breaker.snapshot().failure_count, 0);

    breaker.force_open();
    breaker.force_closed();
    let snapshot = breaker.snapshot();
    assert_eq!(snapshot.state, CircuitState::Closed);
    assert!(snapshot.next_attempt_at.is_none());
    assert!(breaker.execute(|| async { Ok::<_, &str>(1) }).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn reset_during_half_open_discards_probes() {
    let closes = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&closes);
    let registry = guardrail_circuitbreaker::DependencyRegistry::builder()
        .defaults(config(1, 1, 100))
        .on_state_transition(move |_, _, to| {
            if to == CircuitState::Closed {
                c.fetch_add(1, Ordering::SeqCst);
            }
        })
        .build();
    let breaker = registry.resolve("ai-advisor");
    breaker.force_open();
    tokio::time::advance(Duration::from_millis(100)).await;

    let probe = breaker.execute(|| async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok::<_, &str>(())
    });
    let reset = async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(breaker.snapshot().half_open_active, 1);
        breaker.reset();
    };
    let (probe, ()) = tokio::join!(probe, reset);

    assert!(probe.is_ok());
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.snapshot().half_open_active, 0);
    // Only the reset closed the breaker; the late success did not announce a second close.
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}
