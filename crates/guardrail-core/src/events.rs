//! Event hooks shared by the breaker and the retry executor.
//!
//! Transitions, rejections and retries are published as events, so dashboards,
//! alerting or test probes can observe a dependency from the outside.

use std::fmt;
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

/// An event published by a breaker or a retry executor.
pub trait ResilienceEvent: Send + Sync + fmt::Debug {
    /// Short kind tag, such as `"state_transition"` or `"retry"`.
    fn event_type(&self) -> &'static str;

    /// Instant the event was produced.
    fn timestamp(&self) -> Instant;

    /// Dependency or executor name the event belongs to.
    fn dependency(&self) -> &str;
}

/// Receives events of type `E`.
pub trait EventListener<E: ResilienceEvent>: Send + Sync {
    /// Handles one event. Runs synchronously on the emitting task.
    fn on_event(&self, event: &E);
}

/// A listener behind an `Arc`.
pub type SharedEventListener<E> = Arc<dyn EventListener<E>>;

/// An ordered set of listeners.
///
/// Clones share the same listener objects, which is how a registry hands its
/// hooks to every breaker it creates.
pub struct EventListeners<E: ResilienceEvent> {
    entries: Vec<SharedEventListener<E>>,
}

impl<E: ResilienceEvent> EventListeners<E> {
    /// An empty set.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Registers `listener` after the existing ones.
    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.entries.push(Arc::new(listener));
    }

    /// Delivers `event` to each listener in registration order.
    ///
    /// A listener that panics is logged at `error` and skipped. The panic does
    /// not reach the caller and later listeners still run.
    pub fn emit(&self, event: &E) {
        for entry in &self.entries {
            if catch_unwind(AssertUnwindSafe(|| entry.on_event(event))).is_err() {
                tracing::error!(
                    dependency = event.dependency(),
                    event = event.event_type(),
                    "event listener panicked"
                );
            }
        }
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<E: ResilienceEvent> Clone for EventListeners<E> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<E: ResilienceEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ResilienceEvent> fmt::Debug for EventListeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EventListeners")
            .field(&self.entries.len())
            .finish()
    }
}

/// Adapts a closure into an [`EventListener`].
pub struct FnListener<E, F> {
    handler: F,
    marker: PhantomData<fn(&E)>,
}

impl<E, F> FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    /// Wraps `handler`.
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            marker: PhantomData,
        }
    }
}

impl<E, F> EventListener<E> for FnListener<E, F>
where
    E: ResilienceEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.handler)(event)
    }
}
