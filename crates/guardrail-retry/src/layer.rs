use crate::config::RetryOptions;
use futures::future::BoxFuture;
use guardrail_core::Classify;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service, ServiceExt};

/// A Tower [`Layer`] that retries failed requests with exponential backoff.
///
/// Requests must be `Clone` since every attempt sends its own copy, and the
/// service must be `Clone` so each attempt can wait for readiness on its own
/// handle.
///
/// ```rust
/// use guardrail_retry::{RetryLayer, RetryOptions};
/// use tower::{ServiceBuilder, service_fn};
///
/// let service = ServiceBuilder::new()
///     .layer(RetryLayer::new(RetryOptions::builder().retries(2).build()))
///     .service(service_fn(|msg: String| async move { Ok::<_, std::io::Error>(msg) }));
/// ```
#[derive(Debug, Clone)]
pub struct RetryLayer {
    options: Arc<RetryOptions>,
}

impl RetryLayer {
    /// Creates a layer with the given options.
    pub fn new(options: RetryOptions) -> Self {
        Self {
            options: Arc::new(options),
        }
    }
}

impl<S> Layer<S> for RetryLayer {
    type Service = Retry<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Retry {
            inner,
            options: Arc::clone(&self.options),
        }
    }
}

/// A service wrapped with retries. Built by [`RetryLayer`].
#[derive(Debug, Clone)]
pub struct Retry<S> {
    inner: S,
    options: Arc<RetryOptions>,
}

impl<S, Req> Service<Req> for Retry<S>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Response: Send + 'static,
    S::Error: Classify + Send + 'static,
    S::Future: Send + 'static,
    Req: Clone + Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<S::Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let options = Arc::clone(&self.options);
        let inner = self.inner.clone();

        Box::pin(async move {
            crate::run(
                move || {
                    let svc = inner.clone();
                    let req = req.clone();
                    async move { svc.oneshot(req).await }
                },
                &options,
                |_: &S::Response| None,
            )
            .await
        })
    }
}
