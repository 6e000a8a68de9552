use crate::breaker::{Breaker, BreakerSnapshot};
use crate::config::{BreakerConfig, PartialBreakerConfig};
use crate::error::GuardError;
use crate::events::BreakerEvent;
use arc_swap::ArcSwap;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use guardrail_core::{EventListener, EventListeners, FnListener};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Keyed store of circuit breakers, one per dependency.
///
/// The registry is a cheap handle: clones share the same breakers and defaults.
/// Create one at the composition root and hand clones to whoever calls out to a
/// dependency.
///
/// Names are case-insensitive. The breaker keeps the spelling it was first
/// referenced with.
///
/// # Example
///
/// ```rust
/// use guardrail_circuitbreaker::{DependencyRegistry, PartialBreakerConfig};
///
/// # async fn example() {
/// let registry = DependencyRegistry::new();
///
/// let advice = registry
///     .guard("ai-advisor", || async { Ok::<_, std::io::Error>("rest today") })
///     .await;
/// assert!(advice.is_ok());
///
/// // Tighter policy for a flaky sink, without touching other dependencies.
/// let _ = registry
///     .guard_with(
///         "webhook-alerts",
///         PartialBreakerConfig::new().failure_threshold(2),
///         || async { Ok::<_, std::io::Error>(()) },
///     )
///     .await;
/// # }
/// ```
#[derive(Clone)]
pub struct DependencyRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    breakers: DashMap<String, Arc<Breaker>>,
    defaults: Arc<ArcSwap<BreakerConfig>>,
    listeners: EventListeners<BreakerEvent>,
}

impl DependencyRegistry {
    /// Creates a registry with the built-in defaults.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a registry whose defaults are the built-in ones overlaid with the
    /// `CIRCUIT_BREAKER_*` environment variables.
    pub fn from_env() -> Self {
        Self::builder()
            .defaults(PartialBreakerConfig::from_env().resolve_over(&BreakerConfig::BUILT_IN))
            .build()
    }

    /// Returns a builder for a registry.
    pub fn builder() -> DependencyRegistryBuilder {
        crate::describe_metrics();
        DependencyRegistryBuilder::default()
    }

    /// Returns the breaker for `name`, creating it on first reference.
    pub fn resolve(&self, name: &str) -> Arc<Breaker> {
        self.resolve_with(name, PartialBreakerConfig::default())
    }

    /// Returns the breaker for `name`, creating it on first reference, and
    /// merges `overrides` into its own overrides.
    ///
    /// Counters and state of an existing breaker are never touched.
    pub fn resolve_with(&self, name: &str, overrides: PartialBreakerConfig) -> Arc<Breaker> {
        let key = name.to_lowercase();
        let breaker = match self.inner.breakers.entry(key) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(entry) => {
                tracing::debug!(dependency = %name, "registering circuit breaker");
                let breaker = Arc::new(Breaker::new(
                    name,
                    overrides,
                    Arc::clone(&self.inner.defaults),
                    self.inner.listeners.clone(),
                ));
                entry.insert(Arc::clone(&breaker));
                return breaker;
            }
        };
        breaker.apply_overrides(&overrides);
        breaker
    }

    /// Runs `operation` through the breaker for `name`.
    pub async fn guard<F, Fut, T, E>(&self, name: &str, operation: F) -> Result<T, GuardError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        self.resolve(name).execute(operation).await
    }

    /// Runs `operation` through the breaker for `name` after merging `overrides`
    /// into that breaker's configuration.
    pub async fn guard_with<F, Fut, T, E>(
        &self,
        name: &str,
        overrides: PartialBreakerConfig,
        operation: F,
    ) -> Result<T, GuardError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        self.resolve_with(name, overrides).execute(operation).await
    }

    /// Runs `operation` through the breaker for `name`, answering with
    /// `fallback` when the breaker refuses the call or the operation fails.
    pub async fn guard_or_else<F, Fut, T, E, G>(&self, name: &str, operation: F, fallback: G) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
        G: FnOnce(&GuardError<E>) -> T,
    {
        self.resolve(name)
            .execute_with_fallback(operation, fallback)
            .await
    }

    /// Updates the process-wide defaults every breaker reads through.
    ///
    /// Unset and zero fields keep their current value. Live counters and states
    /// are left alone; per-breaker overrides still win.
    pub fn configure_defaults(&self, overrides: PartialBreakerConfig) -> BreakerConfig {
        let previous = self
            .inner
            .defaults
            .rcu(|current| overrides.resolve_over(current));
        let updated = overrides.resolve_over(&previous);
        tracing::info!(
            failure_threshold = updated.failure_threshold,
            success_threshold = updated.success_threshold,
            open_duration_ms = updated.open_duration_ms,
            half_open_max_concurrent = updated.half_open_max_concurrent,
            "circuit breaker defaults updated"
        );
        updated
    }

    /// Current process-wide defaults.
    pub fn defaults(&self) -> BreakerConfig {
        **self.inner.defaults.load()
    }

    /// Read-only view of the breaker for `name`, if it exists.
    pub fn snapshot(&self, name: &str) -> Option<BreakerSnapshot> {
        self.inner
            .breakers
            .get(&name.to_lowercase())
            .map(|entry| entry.value().snapshot())
    }

    /// Read-only views of every breaker, ordered by name.
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let breakers: Vec<Arc<Breaker>> = self
            .inner
            .breakers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        let mut snapshots: Vec<_> = breakers.iter().map(|b| b.snapshot()).collect();
        snapshots.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        snapshots
    }

    /// Number of registered breakers.
    pub fn len(&self) -> usize {
        self.inner.breakers.len()
    }

    /// Returns true if no breaker has been created yet.
    pub fn is_empty(&self) -> bool {
        self.inner.breakers.is_empty()
    }
}

impl Default for DependencyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DependencyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyRegistry")
            .field("breakers", &self.inner.breakers.len())
            .field("defaults", &self.defaults())
            .finish()
    }
}

/// Builder for a [`DependencyRegistry`].
#[derive(Default)]
pub struct DependencyRegistryBuilder {
    defaults: Option<BreakerConfig>,
    listeners: EventListeners<BreakerEvent>,
}

impl DependencyRegistryBuilder {
    /// Sets the initial process-wide defaults. Zero fields fall back to the
    /// built-in values.
    pub fn defaults(mut self, defaults: BreakerConfig) -> Self {
        self.defaults = Some(defaults.normalized());
        self
    }

    /// Registers a callback for every state transition of every breaker.
    ///
    /// The callback receives the dependency name, the previous state and the new
    /// state.
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, guardrail_core::CircuitState, guardrail_core::CircuitState)
            + Send
            + Sync
            + 'static,
    {
        self.listeners.add(FnListener::new(move |event: &BreakerEvent| {
            if let BreakerEvent::StateTransition {
                dependency,
                from_state,
                to_state,
                ..
            } = event
            {
                f(dependency, *from_state, *to_state);
            }
        }));
        self
    }

    /// Registers a callback for every rejected call.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, guardrail_core::RejectionCode) + Send + Sync + 'static,
    {
        self.listeners.add(FnListener::new(move |event: &BreakerEvent| {
            if let BreakerEvent::CallRejected {
                dependency, code, ..
            } = event
            {
                f(dependency, *code);
            }
        }));
        self
    }

    /// Registers a listener for every breaker event.
    pub fn listener<L>(mut self, listener: L) -> Self
    where
        L: EventListener<BreakerEvent> + 'static,
    {
        self.listeners.add(listener);
        self
    }

    /// Builds the registry.
    pub fn build(self) -> DependencyRegistry {
        let defaults = self.defaults.unwrap_or(BreakerConfig::BUILT_IN);
        DependencyRegistry {
            inner: Arc::new(RegistryInner {
                breakers: DashMap::new(),
                defaults: Arc::new(ArcSwap::from_pointee(defaults)),
                listeners: self.listeners,
            }),
        }
    }
}
