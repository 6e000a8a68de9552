//! Circuit breaker metrics regression tests

use super::helpers::*;
use guardrail_circuitbreaker::{BreakerConfig, DependencyRegistry};
use serial_test::serial;

#[tokio::test]
#[serial]
async fn breaker_metrics_exist() {
    init_recorder();

    let registry = DependencyRegistry::builder()
        .defaults(BreakerConfig {
            failure_threshold: 2,
            ..BreakerConfig::BUILT_IN
        })
        .build();

    let _ = registry
        .guard("metrics-advisor", || async { Ok::<_, &str>(()) })
        .await;
    for _ in 0..3 {
        let _ = registry
            .guard("metrics-advisor", || async { Err::<(), _>("boom") })
            .await;
    }

    assert_counter_exists("guardrail_breaker_calls_total");
    assert_metric_has_label("guardrail_breaker_calls_total", "dependency", "metrics-advisor");
    assert_metric_has_label("guardrail_breaker_calls_total", "outcome", "success");
    assert_metric_has_label("guardrail_breaker_calls_total", "outcome", "failure");
    assert_metric_has_label("guardrail_breaker_calls_total", "outcome", "rejected");

    assert_counter_exists("guardrail_breaker_transitions_total");
    assert_metric_has_label("guardrail_breaker_transitions_total", "from", "closed");
    assert_metric_has_label("guardrail_breaker_transitions_total", "to", "open");

    assert_gauge_exists("guardrail_breaker_state");
    assert_metric_has_label("guardrail_breaker_state", "dependency", "metrics-advisor");

    assert_histogram_exists("guardrail_breaker_call_duration_seconds");
}

#[tokio::test]
#[serial]
async fn state_gauge_exists_before_any_transition() {
    init_recorder();

    let registry = DependencyRegistry::new();
    let _ = registry
        .guard("metrics-quiet", || async { Ok::<_, &str>(()) })
        .await;

    assert_gauge_exists("guardrail_breaker_state");
    assert_metric_has_label("guardrail_breaker_state", "dependency", "metrics-quiet");
}
