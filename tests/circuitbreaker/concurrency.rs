use super::config;
use guardrail_circuitbreaker::{BreakerConfig, CircuitState, DependencyRegistry};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

/// Probes running at once never exceed the cap, on a multi-threaded runtime.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn probe_cap_holds_across_threads() {
    let registry = DependencyRegistry::builder()
        .defaults(BreakerConfig {
            half_open_max_concurrent: 3,
            ..config(1, 1_000, 20)
        })
        .build();
    let breaker = registry.resolve("ai-advisor");
    breaker.force_open();
    tokio::time::sleep(Duration::from_millis(30)).await;

    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::new();

    for _ in 0..64 {
        let registry = registry.clone();
        let running = Arc::clone(&running);
        let peak = Arc::clone(&peak);
        handles.push(tokio::spawn(async move {
            registry
                .guard("ai-advisor", || async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, &str>(())
                })
                .await
        }));
    }

    let mut granted = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            granted += 1;
        }
    }

    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert!(granted >= 1);
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
    assert_eq!(breaker.snapshot().half_open_active, 0);
}

/// Concurrent failures from many tasks trip the breaker exactly once.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_failures_trip_once() {
    let opened = Arc::new(AtomicUsize::new(0));
    let o = Arc::clone(&opened);
    let registry = DependencyRegistry::builder()
        .defaults(config(10, 1, 60_000))
        .on_state_transition(move |_, _, to| {
            if to == CircuitState::Open {
                o.fetch_add(1, Ordering::SeqCst);
            }
        })
        .build();

    let handles: Vec<_> = (0..100)
        .map(|_| {
            let registry = registry.clone();
            tokio::spawn(async move {
                registry
                    .guard("telegram-api", || async { Err::<(), _>("502 bad gateway") })
                    .await
            })
        })
        .collect();
    for handle in handles {
        let _ = handle.await.unwrap();
    }

    assert_eq!(opened.load(Ordering::SeqCst), 1);
    assert_eq!(registry.resolve("telegram-api").state(), CircuitState::Open);
}
