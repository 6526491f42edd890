//! Shared event plumbing used by every guard crate.
//!
//! Each guard (circuit breaker, rate limiter, retry) defines its own
//! concrete event enum and implements [`ResilienceEvent`] for it. Dispatch
//! to subscribers goes through [`EventListeners`], a simple
//! single-producer multi-consumer broadcast: emission never blocks the
//! producer and a panicking subscriber never takes down the others.
//!
//! [`CircularEventConsumer`] is the bounded ring-buffer sink named
//! explicitly in the external interface: a fixed-capacity subscriber that
//! silently drops the oldest event on overflow instead of applying
//! back-pressure.

use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// A lifecycle event emitted by a guard instance.
///
/// Every concrete event type (circuit breaker, rate limiter, retry)
/// implements this so subscribers can work generically where useful,
/// while most consumers will match on the guard-specific enum directly.
pub trait ResilienceEvent: fmt::Debug + Send + Sync + 'static {
    /// A short, stable, machine-friendly event kind, e.g. `"state_transition"`.
    fn event_type(&self) -> &'static str;

    /// Wall-clock creation time of the event.
    fn timestamp(&self) -> Instant;

    /// The name of the guard instance that emitted this event.
    fn pattern_name(&self) -> &str;
}

/// A subscriber to a guard's event stream.
pub trait EventListener<E: ResilienceEvent>: Send + Sync {
    fn on_event(&self, event: &E);
}

/// A boxed, shareable listener.
pub type BoxedEventListener<E> = Arc<dyn EventListener<E>>;

/// Wraps a closure as an [`EventListener`].
pub struct FnListener<E, F> {
    f: F,
    _marker: std::marker::PhantomData<fn(&E)>,
}

impl<E, F> FnListener<E, F>
where
    E: ResilienceEvent,
    F: Fn(&E) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<E, F> EventListener<E> for FnListener<E, F>
where
    E: ResilienceEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}

/// An append-only collection of subscribers for a single guard instance.
///
/// Cloning is cheap: listeners are stored behind `Arc`, so a config can be
/// shared across every `Service` clone produced from one `Layer` without
/// duplicating the subscriber list.
pub struct EventListeners<E: ResilienceEvent> {
    listeners: Vec<BoxedEventListener<E>>,
}

impl<E: ResilienceEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ResilienceEvent> EventListeners<E> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn add(&mut self, listener: BoxedEventListener<E>) {
        self.listeners.push(listener);
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Fan out `event` to every subscriber.
    ///
    /// A subscriber that panics is isolated with `catch_unwind` so one bad
    /// listener cannot poison the guard's hot path; the panic is reported
    /// via `tracing`/`metrics` when those features are enabled and
    /// otherwise dropped on the floor, matching the "emission is
    /// best-effort" contract.
    pub fn emit(&self, event: &E) {
        for listener in &self.listeners {
            let result = panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(event)));
            if result.is_err() {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    event_type = event.event_type(),
                    pattern = event.pattern_name(),
                    "event listener panicked"
                );
                #[cfg(feature = "metrics")]
                metrics::counter!("breakwater_listener_panics_total").increment(1);
            }
        }
    }
}

/// A bounded ring-buffer event sink.
///
/// Subscribing via [`CircularEventConsumer::subscribe`] returns a consumer
/// whose [`buffered_events`](CircularEventConsumer::buffered_events) method
/// returns an immutable snapshot copy in insertion order. Once the
/// consumer holds `capacity` events, the oldest is dropped to make room
/// for the newest. The consumer never blocks the emitting guard and never
/// grows unbounded.
pub struct CircularEventConsumer<E: ResilienceEvent> {
    capacity: usize,
    buffer: Mutex<VecDeque<Arc<E>>>,
}

impl<E: ResilienceEvent> CircularEventConsumer<E> {
    pub fn new(capacity: usize) -> Arc<Self> {
        assert!(capacity > 0, "CircularEventConsumer capacity must be > 0");
        Arc::new(Self {
            capacity,
            buffer: Mutex::new(VecDeque::with_capacity(capacity)),
        })
    }

    /// An immutable, insertion-ordered snapshot of the currently buffered events.
    pub fn buffered_events(&self) -> Vec<Arc<E>> {
        self.buffer
            .lock()
            .expect("event consumer mutex poisoned")
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().expect("event consumer mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E: ResilienceEvent> EventListener<E> for CircularEventConsumer<E> {
    fn on_event(&self, event: &E) {
        let mut buf = self.buffer.lock().expect("event consumer mutex poisoned");
        if buf.len() >= self.capacity {
            buf.pop_front();
        }
        buf.push_back(Arc::new(clone_event(event)));
    }
}

// `ResilienceEvent` implementors are the small, `Clone`-able enums each
// guard crate defines; cloning at the subscriber boundary keeps the
// consumer's stored events independent of the event reference's lifetime.
// We ask each concrete event type to provide `Clone` and rely on a tiny
// helper so `CircularEventConsumer<E>` doesn't need `E: Clone` as a bound
// on the struct itself (only on this impl).
fn clone_event<E: ResilienceEvent + Clone>(event: &E) -> E {
    event.clone()
}
