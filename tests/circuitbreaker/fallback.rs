use super::{config, registry};
use guardrail_circuitbreaker::{CircuitState, GuardError, RejectionCode};
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, PartialEq)]
enum Advice {
    Live(String),
    Degraded { rejected: bool },
}

async fn advise(
    registry: &guardrail_circuitbreaker::DependencyRegistry,
    calls: &AtomicUsize,
    healthy: bool,
) -> Advice {
    registry
        .guard_or_else(
            "ai-advisor",
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if healthy {
                        Ok(Advice::Live("rebalance".to_string()))
                    } else {
                        Err("upstream timeout")
                    }
                }
            },
            |err: &GuardError<&str>| Advice::Degraded {
                rejected: err.is_rejected(),
            },
        )
        .await
}

#[tokio::test]
async fn failures_fall_back_then_rejections_fall_back() {
    let registry = registry(config(2, 1, 60_000));
    let calls = AtomicUsize::new(0);

    assert_eq!(
        advise(&registry, &calls, false).await,
        Advice::Degraded { rejected: false }
    );
    assert_eq!(
        advise(&registry, &calls, false).await,
        Advice::Degraded { rejected: false }
    );
    assert_eq!(registry.resolve("ai-advisor").state(), CircuitState::Open);

    assert_eq!(
        advise(&registry, &calls, true).await,
        Advice::Degraded { rejected: true }
    );
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn fallback_sees_the_rejection_code() {
    let registry = registry(config(1, 1, 60_000));
    registry.resolve("ai-advisor").force_open();

    let code = registry
        .guard_or_else(
            "ai-advisor",
            || async { Ok::<_, &str>(None) },
            |err| err.rejection().map(|r| r.code),
        )
        .await;

    assert_eq!(code, Some(RejectionCode::CircuitOpen));
}

#[tokio::test]
async fn healthy_calls_skip_the_fallback() {
    let registry = registry(config(2, 1, 60_000));
    let calls = AtomicUsize::new(0);

    assert_eq!(
        advise(&registry, &calls, true).await,
        Advice::Live("rebalance".to_string())
    );
    assert_eq!(
        registry.snapshot("ai-advisor").map(|s| s.failure_count),
        Some(0)
    );
}
