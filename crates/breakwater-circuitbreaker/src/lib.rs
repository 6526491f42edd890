//!
//! A Tower middleware implementing circuit breaker behavior to improve the
//! resilience of asynchronous services.
//!
//! ## Features
//! - Circuit breaker states: Closed, Open, Half-Open
//! - Configurable failure rate threshold and sliding window size
//! - Customizable `failure_predicate` to define what counts as a failure
//! - Metrics support via the `metrics` feature flag
//! - Tracing support via the `tracing` feature flag
//!
//! ## Example
//! ```rust
//! use breakwater_circuitbreaker::CircuitBreakerConfig;
//! use tower::service_fn;
//! use tower::Service;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let circuit_breaker_layer = CircuitBreakerConfig::<()>::builder()
//!         .failure_rate_threshold(0.3)
//!         .sliding_window_size(50)
//!         .wait_duration_in_open(Duration::from_secs(10))
//!         .build();
//!
//!     let my_service = service_fn(|req| async move { Ok::<_, ()>(req) });
//!     let mut service = circuit_breaker_layer.layer(my_service);
//!
//!     let response = Service::call(&mut service, "hello").await.unwrap();
//!     assert_eq!(response, "hello");
//! }
//! ```
//!
//! ## Feature Flags
//! - `metrics`: enables metrics collection using the `metrics` crate.
//! - `tracing`: enables logging and tracing using the `tracing` crate.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use futures::future::BoxFuture;
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_gauge, gauge};
#[cfg(feature = "metrics")]
use std::sync::Once;
use tokio::sync::Mutex;
use tower::Service;

pub use circuit::{CircuitBreakerMetrics, CircuitState};
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder, FailurePredicate};
pub use error::CircuitBreakerError;
pub use events::CircuitBreakerEvent;
pub use layer::CircuitBreakerLayer;
pub use registry::CircuitBreakerRegistry;

mod circuit;
mod config;
mod error;
mod events;
mod layer;
mod registry;

use circuit::Circuit;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

#[cfg(feature = "metrics")]
fn init_metrics() {
    METRICS_INIT.call_once(|| {
        describe_counter!(
            "circuitbreaker_calls_total",
            "Total number of calls observed by the circuit breaker"
        );
        describe_counter!(
            "circuitbreaker_transitions_total",
            "Total number of circuit breaker state transitions"
        );
        describe_gauge!(
            "circuitbreaker_state",
            "Current state of the circuit breaker (0=closed, 1=open, 2=half-open)"
        );
    });
}

/// A Tower [`Service`] that applies circuit breaker logic to an inner
/// service.
///
/// Wraps the inner service and consults a shared [`Circuit`] before every
/// call, recording the outcome of calls that are let through.
pub struct CircuitBreaker<S, Req, Res, Err> {
    inner: S,
    circuit: Arc<Mutex<Circuit>>,
    state_atomic: Arc<AtomicU8>,
    config: Arc<CircuitBreakerConfig<Err>>,
    _phantom: std::marker::PhantomData<fn(Req) -> Res>,
}

impl<S: Clone, Req, Res, Err> Clone for CircuitBreaker<S, Req, Res, Err> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            circuit: Arc::clone(&self.circuit),
            state_atomic: Arc::clone(&self.state_atomic),
            config: Arc::clone(&self.config),
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<S, Req, Res, Err> CircuitBreaker<S, Req, Res, Err> {
    pub(crate) fn new(inner: S, config: Arc<CircuitBreakerConfig<Err>>) -> Self {
        #[cfg(feature = "metrics")]
        init_metrics();

        let state_atomic = Arc::new(AtomicU8::new(CircuitState::Closed as u8));
        let circuit = Circuit::new(
            config.name.clone(),
            config.failure_rate_threshold,
            config.wait_duration_in_open,
            config.sliding_window_size,
            config.permitted_calls_in_half_open,
            Arc::clone(&state_atomic),
        );

        Self {
            inner,
            circuit: Arc::new(Mutex::new(circuit)),
            state_atomic,
            config,
            _phantom: std::marker::PhantomData,
        }
    }

    /// Returns the circuit breaker's configured name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Reads the current state without taking the async lock. May be
    /// stale by the time the caller observes it if another task is
    /// mid-transition; safe for metrics and logging, not for decisions
    /// that must be linearized with `call`.
    pub fn state_sync(&self) -> CircuitState {
        CircuitState::from_u8(self.state_atomic.load(Ordering::SeqCst))
    }

    /// Returns the current state, serialized with any in-flight call.
    pub async fn state(&self) -> CircuitState {
        self.circuit.lock().await.state()
    }

    /// Returns a point-in-time snapshot of the active sliding window.
    pub async fn metrics(&self) -> CircuitBreakerMetrics {
        self.circuit.lock().await.metrics()
    }

    /// Forces the circuit into the open state.
    pub async fn force_open(&self) {
        let event = self.circuit.lock().await.force_open();
        self.emit(event);
    }

    /// Forces the circuit into the half-open state.
    pub async fn force_half_open(&self) {
        let event = self.circuit.lock().await.force_half_open();
        self.emit(event);
    }

    /// Forces the circuit into the closed state.
    pub async fn force_closed(&self) {
        let event = self.circuit.lock().await.force_closed();
        self.emit(event);
    }

    /// Resets the circuit to the closed state and clears its windows.
    pub async fn reset(&self) {
        let event = self.circuit.lock().await.reset();
        self.emit(event);
    }

    fn emit(&self, event: CircuitBreakerEvent) {
        self.config.event_listeners.emit(&event);
        #[cfg(feature = "metrics")]
        if let CircuitBreakerEvent::StateTransition { to, .. } = &event {
            counter!("circuitbreaker_transitions_total").increment(1);
            gauge!("circuitbreaker_state", "breaker" => self.config.name.clone())
                .set(*to as u8 as f64);
        }
    }
}

impl<S, Req, Res, Err> Service<Req> for CircuitBreaker<S, Req, Res, Err>
where
    S: Service<Req, Response = Res, Error = Err> + Clone + Send + 'static,
    S::Future: Send + 'static,
    Req: Send + 'static,
    Res: Send + 'static,
    Err: Send + Sync + 'static,
{
    type Response = Res;
    type Error = CircuitBreakerError<Err>;
    type Future = BoxFuture<'static, Result<Res, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner
            .poll_ready(cx)
            .map_err(CircuitBreakerError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let circuit = Arc::clone(&self.circuit);
        let config = Arc::clone(&self.config);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let pattern_name = config.name.clone();

            let (permitted, transition_event) = {
                let mut circuit = circuit.lock().await;
                circuit.is_call_permitted()
            };
            if let Some(event) = transition_event {
                config.event_listeners.emit(&event);
            }

            if !permitted {
                #[cfg(feature = "tracing")]
                tracing::trace!(breaker = %pattern_name, "circuit breaker rejected call");
                #[cfg(feature = "metrics")]
                counter!("circuitbreaker_calls_total", "outcome" => "rejected").increment(1);

                config.event_listeners.emit(&CircuitBreakerEvent::NotPermitted {
                    pattern_name,
                    timestamp: Instant::now(),
                });
                return Err(CircuitBreakerError::CallNotPermitted);
            }

            let started_at = Instant::now();
            let result = inner.call(req).await;
            let elapsed = started_at.elapsed();

            match result {
                Ok(res) => {
                    let event = {
                        let mut circuit = circuit.lock().await;
                        circuit.record_success()
                    };
                    config.event_listeners.emit(&CircuitBreakerEvent::Success {
                        pattern_name: pattern_name.clone(),
                        timestamp: Instant::now(),
                        elapsed,
                    });
                    if let Some(event) = event {
                        config.event_listeners.emit(&event);
                    }
                    #[cfg(feature = "metrics")]
                    counter!("circuitbreaker_calls_total", "outcome" => "success").increment(1);
                    Ok(res)
                }
                Err(err) => {
                    if !(config.failure_predicate)(&err) {
                        #[cfg(feature = "tracing")]
                        tracing::trace!(breaker = %pattern_name, "circuit breaker ignored error");
                        config
                            .event_listeners
                            .emit(&CircuitBreakerEvent::IgnoredError {
                                pattern_name,
                                timestamp: Instant::now(),
                            });
                        return Err(CircuitBreakerError::Inner(err));
                    }

                    let event = {
                        let mut circuit = circuit.lock().await;
                        circuit.record_failure()
                    };
                    config.event_listeners.emit(&CircuitBreakerEvent::Error {
                        pattern_name: pattern_name.clone(),
                        timestamp: Instant::now(),
                        elapsed,
                    });
                    if let Some(event) = event {
                        config.event_listeners.emit(&event);
                    }
                    #[cfg(feature = "metrics")]
                    counter!("circuitbreaker_calls_total", "outcome" => "failure").increment(1);
                    Err(CircuitBreakerError::Inner(err))
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tower::{service_fn, ServiceExt};

    #[tokio::test]
    async fn permits_calls_while_closed_and_tracks_success() {
        let layer = CircuitBreakerConfig::<&'static str>::builder()
            .name("svc")
            .failure_rate_threshold(0.5)
            .sliding_window_size(4)
            .build();
        let svc = service_fn(|req: i32| async move { Ok::<_, &'static str>(req * 2) });
        let mut breaker = layer.layer(svc);

        let res = breaker.ready().await.unwrap().call(21).await.unwrap();
        assert_eq!(res, 42);
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn opens_after_threshold_and_rejects_without_calling_inner() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let layer = CircuitBreakerConfig::<&'static str>::builder()
            .name("svc")
            .failure_rate_threshold(0.5)
            .sliding_window_size(4)
            .wait_duration_in_open(Duration::from_secs(30))
            .build();
        let svc = service_fn(move |_req: i32| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            async move { Err::<i32, _>("boom") }
        });
        let mut breaker = layer.layer(svc);

        for _ in 0..4 {
            let _ = breaker.ready().await.unwrap().call(1).await;
        }
        assert_eq!(breaker.state().await, CircuitState::Open);
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        let err = breaker.ready().await.unwrap().call(1).await.unwrap_err();
        assert!(err.is_call_not_permitted());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn ignored_errors_do_not_open_the_circuit() {
        let layer = CircuitBreakerConfig::<&'static str>::builder()
            .name("svc")
            .failure_rate_threshold(0.5)
            .sliding_window_size(4)
            .failure_predicate(|_err: &&'static str| false)
            .build();
        let svc = service_fn(|_req: i32| async move { Err::<i32, _>("boom") });
        let mut breaker = layer.layer(svc);

        for _ in 0..4 {
            let err = breaker.ready().await.unwrap().call(1).await.unwrap_err();
            assert!(!err.is_call_not_permitted());
        }
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn manual_overrides_serialize_through_the_same_lock() {
        let layer = CircuitBreakerConfig::<()>::builder().name("svc").build();
        let svc = service_fn(|req: i32| async move { Ok::<_, ()>(req) });
        let breaker = layer.layer(svc);

        breaker.force_open().await;
        assert_eq!(breaker.state().await, CircuitState::Open);
        breaker.force_half_open().await;
        assert_eq!(breaker.state().await, CircuitState::HalfOpen);
        breaker.force_closed().await;
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn state_sync_matches_async_state() {
        let layer = CircuitBreakerConfig::<()>::builder().name("svc").build();
        let svc = service_fn(|req: i32| async move { Ok::<_, ()>(req) });
        let breaker = layer.layer(svc);

        breaker.force_open().await;
        assert_eq!(breaker.state_sync(), CircuitState::Open);
    }
}
