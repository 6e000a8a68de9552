use crate::breaker::Breaker;
use crate::error::GuardError;
use crate::registry::DependencyRegistry;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// A Tower Layer that routes every request through a dependency's breaker.
///
/// ```rust
/// use guardrail_circuitbreaker::{DependencyRegistry, GuardLayer};
/// use tower::{ServiceBuilder, service_fn};
///
/// let registry = DependencyRegistry::new();
/// let service = ServiceBuilder::new()
///     .layer(GuardLayer::new(&registry, "telegram-api"))
///     .service(service_fn(|msg: String| async move { Ok::<_, std::io::Error>(msg) }));
/// ```
#[derive(Clone)]
pub struct GuardLayer {
    breaker: Arc<Breaker>,
}

impl GuardLayer {
    /// Guards services with the registry's breaker for `dependency`.
    pub fn new(registry: &DependencyRegistry, dependency: &str) -> Self {
        Self {
            breaker: registry.resolve(dependency),
        }
    }

    /// Guards services with an existing breaker.
    pub fn from_breaker(breaker: Arc<Breaker>) -> Self {
        Self { breaker }
    }
}

impl<S> Layer<S> for GuardLayer {
    type Service = Guarded<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Guarded {
            inner,
            breaker: Arc::clone(&self.breaker),
        }
    }
}

impl fmt::Debug for GuardLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardLayer")
            .field("dependency", &self.breaker.name())
            .finish()
    }
}

/// A service guarded by a circuit breaker. Built by [`GuardLayer`].
#[derive(Clone)]
pub struct Guarded<S> {
    inner: S,
    breaker: Arc<Breaker>,
}

impl<S> Guarded<S> {
    /// The breaker guarding this service.
    pub fn breaker(&self) -> &Arc<Breaker> {
        &self.breaker
    }
}

impl<S, Req> Service<Req> for Guarded<S>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Response: Send + 'static,
    S::Error: fmt::Display + Send + 'static,
    S::Future: Send + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = GuardError<S::Error>;
    type Future = BoxFuture<'static, Result<S::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(GuardError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let breaker = Arc::clone(&self.breaker);
        // Take the readied service and leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move { breaker.execute(move || inner.call(req)).await })
    }
}
