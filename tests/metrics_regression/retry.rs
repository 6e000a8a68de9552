//! Retry metrics regression tests

use super::helpers::*;
use guardrail_core::Failure;
use guardrail_retry::{RetryOptions, perform_with_retry};
use serial_test::serial;
use std::time::Duration;

#[tokio::test(start_paused = true)]
#[serial]
async fn retry_metrics_exist() {
    init_recorder();

    let options = RetryOptions::builder()
        .name("metrics-retry")
        .retries(1)
        .initial_delay(Duration::from_millis(10))
        .build();

    let _ = perform_with_retry(|| async { Err::<(), _>(Failure::NetworkTimeout) }, &options).await;
    let _ = perform_with_retry(|| async { Ok::<_, Failure>(()) }, &options).await;
    let _ = perform_with_retry(|| async { Err::<(), _>(Failure::HttpStatus(400)) }, &options).await;

    assert_counter_exists("guardrail_retry_attempts_total");
    assert_metric_has_label("guardrail_retry_attempts_total", "name", "metrics-retry");

    assert_counter_exists("guardrail_retry_outcomes_total");
    assert_metric_has_label("guardrail_retry_outcomes_total", "outcome", "exhausted");
    assert_metric_has_label("guardrail_retry_outcomes_total", "outcome", "success");
    assert_metric_has_label("guardrail_retry_outcomes_total", "outcome", "ignored");
}
