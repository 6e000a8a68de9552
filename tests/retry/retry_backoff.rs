use super::DelayLog;
use guardrail_core::Failure;
use guardrail_retry::{ExponentialBackoff, RetryOptions, perform_with_retry};
use std::time::Duration;

/// Two retries with factor two and no jitter wait 100 ms then 200 ms.
#[tokio::test(start_paused = true)]
async fn always_failing_transient_operation() {
    let log = DelayLog::default();
    let l = log.clone();
    let options = RetryOptions::builder()
        .retries(2)
        .initial_delay(Duration::from_millis(100))
        .backoff_factor(2.0)
        .jitter(false)
        .on_retry(move |_, _, delay| l.push(delay))
        .build();

    let mut attempts = 0;
    let result = perform_with_retry(
        || {
            attempts += 1;
            async { Err::<(), _>(Failure::NetworkTimeout) }
        },
        &options,
    )
    .await;

    assert_eq!(result, Err(Failure::NetworkTimeout));
    assert_eq!(attempts, 3);
    assert_eq!(
        log.delays(),
        vec![Duration::from_millis(100), Duration::from_millis(200)]
    );
}

#[tokio::test(start_paused = true)]
async fn delays_never_exceed_the_cap() {
    let log = DelayLog::default();
    let l = log.clone();
    let options = RetryOptions::builder()
        .retries(8)
        .initial_delay(Duration::from_millis(300))
        .max_delay(Duration::from_millis(2_000))
        .backoff_factor(3.0)
        .on_retry(move |_, _, delay| l.push(delay))
        .build();

    let _ = perform_with_retry(|| async { Err::<(), _>(Failure::ConnectionReset) }, &options).await;

    let delays = log.delays();
    assert_eq!(delays.len(), 8);
    assert!(delays.iter().all(|d| *d <= Duration::from_millis(2_000)));
}

#[test]
fn jittered_delay_stays_within_half_and_one_and_a_half() {
    let backoff = ExponentialBackoff::new(
        Duration::from_millis(500),
        Duration::from_secs(10),
        2.0,
        true,
    );
    for attempt in 1..=4 {
        let base = backoff.unjittered(attempt);
        for _ in 0..100 {
            let d = backoff.delay_for(attempt);
            assert!(d >= base.mul_f64(0.5) && d <= base.mul_f64(1.5), "{d:?} vs {base:?}");
        }
    }
}

#[test]
fn factor_below_one_never_shrinks_delays() {
    let options = RetryOptions::builder()
        .initial_delay(Duration::from_millis(400))
        .backoff_factor(0.5)
        .jitter(false)
        .build();
    let backoff = options.backoff();
    let delays: Vec<_> = (1..=5).map(|a| backoff.delay_for(a)).collect();
    assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(delays[4], Duration::from_millis(400));
}
