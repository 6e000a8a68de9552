use crate::config::{RetryOptions, RetryOverrides};
use crate::events::RetryEvent;
use crate::{run, ResponseStatus};
use guardrail_core::{Classify, FnListener};
use std::future::Future;

/// Retry executor bound to one service: a name for the logs, a base target that
/// request paths are appended to, and default options.
#[derive(Debug, Clone)]
pub struct RetryClient {
    service_name: String,
    base_target: String,
    defaults: RetryOptions,
}

/// Creates a [`RetryClient`] for `service_name`.
///
/// Every retry made through the client is logged at `warn` with the service
/// name, the attempt, the failure and the delay.
///
/// ```rust
/// use guardrail_retry::{bound_retry_client, RetryOptions};
/// use std::time::Duration;
///
/// # async fn post(url: String) -> Result<u16, std::io::Error> { Ok(200) }
/// # async fn example() {
/// let advisor = bound_retry_client(
///     "AI Advisor",
///     "http://advisor:8000",
///     RetryOptions::builder().retries(3).initial_delay(Duration::from_millis(500)).build(),
/// );
///
/// let status = advisor.call_on_status("/api/advice", |url| post(url)).await;
/// # }
/// ```
pub fn bound_retry_client(
    service_name: impl Into<String>,
    base_target: impl Into<String>,
    defaults: RetryOptions,
) -> RetryClient {
    let service_name = service_name.into();
    let mut defaults = defaults;
    if defaults.name.is_none() {
        defaults.name = Some(service_name.clone());
    }
    RetryClient {
        service_name,
        base_target: base_target.into(),
        defaults,
    }
}

impl RetryClient {
    /// The service name used in logs.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// The base every path is appended to.
    pub fn base_target(&self) -> &str {
        &self.base_target
    }

    /// The client's default options.
    pub fn defaults(&self) -> &RetryOptions {
        &self.defaults
    }

    /// Resolves `path` against the base target by plain concatenation.
    pub fn target(&self, path: &str) -> String {
        format!("{}{}", self.base_target, path)
    }

    /// Calls `operation` with the resolved target, retrying transient failures
    /// with the client's defaults.
    pub async fn call<F, Fut, T, E>(&self, path: &str, operation: F) -> Result<T, E>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify,
    {
        self.call_with(path, &RetryOverrides::default(), operation)
            .await
    }

    /// Like [`call`](Self::call) with per-call overrides merged over the
    /// defaults.
    pub async fn call_with<F, Fut, T, E>(
        &self,
        path: &str,
        overrides: &RetryOverrides,
        mut operation: F,
    ) -> Result<T, E>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify,
    {
        let target = self.target(path);
        let options = self.options_for(overrides);
        run(|| operation(target.clone()), &options, |_: &T| None).await
    }

    /// Like [`call`](Self::call), also retrying `Ok` responses with a retryable
    /// status.
    pub async fn call_on_status<F, Fut, T, E>(&self, path: &str, operation: F) -> Result<T, E>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: ResponseStatus,
        E: Classify,
    {
        self.call_on_status_with(path, &RetryOverrides::default(), operation)
            .await
    }

    /// Like [`call_on_status`](Self::call_on_status) with per-call overrides
    /// merged over the defaults.
    pub async fn call_on_status_with<F, Fut, T, E>(
        &self,
        path: &str,
        overrides: &RetryOverrides,
        mut operation: F,
    ) -> Result<T, E>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: ResponseStatus,
        E: Classify,
    {
        let target = self.target(path);
        let options = self.options_for(overrides);
        run(
            || operation(target.clone()),
            &options,
            |response: &T| Some(response.status()),
        )
        .await
    }

    fn options_for(&self, overrides: &RetryOverrides) -> RetryOptions {
        let mut options = self.defaults.merged(overrides);
        let service = self.service_name.clone();
        let retries = options.retries;
        options
            .listeners
            .add(FnListener::new(move |event: &RetryEvent| {
                if let RetryEvent::Retry {
                    attempt,
                    delay,
                    failure,
                    ..
                } = event
                {
                    tracing::warn!(
                        service = %service,
                        attempt = *attempt,
                        retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %failure,
                        "[{service}] retry {attempt}/{retries}: {failure}"
                    );
                }
            }));
        options
    }
}
