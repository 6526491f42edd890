//!
//! A Tower middleware implementing bounded-attempt retry behavior for
//! asynchronous services.
//!
//! ## Features
//! - Fixed or per-request maximum attempt counts
//! - A single fixed inter-attempt wait, configurable per instance
//! - Optional cross-call [`budget::RetryBudget`] to cap total retries
//! - Metrics support via the `metrics` feature flag
//! - Tracing support via the `tracing` feature flag
//!
//! ## Example
//! ```rust
//! use breakwater_retry::RetryConfig;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use tower::service_fn;
//! use tower::Service;
//!
//! #[tokio::main]
//! async fn main() {
//!     let attempts = Arc::new(AtomicUsize::new(0));
//!     let layer = RetryConfig::<i32, i32, &'static str>::builder()
//!         .max_attempts(3)
//!         .build();
//!
//!     let counted = Arc::clone(&attempts);
//!     let flaky = service_fn(move |req: i32| {
//!         let counted = Arc::clone(&counted);
//!         async move {
//!             if counted.fetch_add(1, Ordering::SeqCst) == 0 {
//!                 Err("transient")
//!             } else {
//!                 Ok(req)
//!             }
//!         }
//!     });
//!     let mut service = layer.layer(flaky);
//!
//!     let response = Service::call(&mut service, 7).await.unwrap();
//!     assert_eq!(response, 7);
//! }
//! ```
//!
//! ## Feature Flags
//! - `metrics`: enables metrics collection using the `metrics` crate.
//! - `tracing`: enables logging and tracing using the `tracing` crate.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use futures::future::BoxFuture;
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter};
#[cfg(feature = "metrics")]
use std::sync::Once;
use tower::Service;

pub use budget::{RetryBudget, TokenBucketBudget};
pub use config::{MaxAttemptsSource, RetryConfig, RetryConfigBuilder};
pub use error::RetryError;
pub use events::RetryEvent;
pub use layer::RetryLayer;
pub use registry::RetryRegistry;

pub mod budget;
mod config;
mod error;
mod events;
mod layer;
mod registry;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

#[cfg(feature = "metrics")]
fn init_metrics() {
    METRICS_INIT.call_once(|| {
        describe_counter!(
            "retry_calls_total",
            "Total number of calls observed by the retry guard"
        );
        describe_counter!(
            "retry_attempts_total",
            "Total number of retry attempts made"
        );
    });
}

/// A point-in-time snapshot of a [`Retry`]'s aggregate call counters.
///
/// These counters are shared across every clone of a `Retry` instance
/// and every concurrent call; per-call attempt counts are never shared.
#[derive(Debug, Default)]
pub struct RetryMetrics {
    pub number_of_successful_calls_without_retry: u64,
    pub number_of_successful_calls_with_retry: u64,
    pub number_of_failed_calls_without_retry: u64,
    pub number_of_failed_calls_with_retry: u64,
}

#[derive(Default)]
struct RetryCounters {
    successful_without_retry: AtomicU64,
    successful_with_retry: AtomicU64,
    failed_without_retry: AtomicU64,
    failed_with_retry: AtomicU64,
}

/// A Tower [`Service`] that retries a failed call against the inner
/// service up to a configured number of attempts, waiting a fixed
/// duration between attempts.
pub struct Retry<S, Req, Res, E> {
    inner: S,
    config: Arc<RetryConfig<Req, Res, E>>,
    counters: Arc<RetryCounters>,
}

impl<S: Clone, Req, Res, E> Clone for Retry<S, Req, Res, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            config: Arc::clone(&self.config),
            counters: Arc::clone(&self.counters),
        }
    }
}

impl<S, Req, Res, E> Retry<S, Req, Res, E> {
    pub(crate) fn new(inner: S, config: Arc<RetryConfig<Req, Res, E>>) -> Self {
        #[cfg(feature = "metrics")]
        init_metrics();

        Self {
            inner,
            config,
            counters: Arc::new(RetryCounters::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Returns a snapshot of this instance's aggregate call counters.
    pub fn metrics(&self) -> RetryMetrics {
        RetryMetrics {
            number_of_successful_calls_without_retry: self
                .counters
                .successful_without_retry
                .load(Ordering::Relaxed),
            number_of_successful_calls_with_retry: self
                .counters
                .successful_with_retry
                .load(Ordering::Relaxed),
            number_of_failed_calls_without_retry: self
                .counters
                .failed_without_retry
                .load(Ordering::Relaxed),
            number_of_failed_calls_with_retry: self
                .counters
                .failed_with_retry
                .load(Ordering::Relaxed),
        }
    }
}

impl<S, Req, Res, E> Service<Req> for Retry<S, Req, Res, E>
where
    S: Service<Req, Response = Res, Error = E> + Clone + Send + 'static,
    S::Future: Send + 'static,
    Req: Clone + Send + 'static,
    Res: Send + 'static,
    E: Clone + Send + Sync + 'static,
{
    type Response = Res;
    type Error = RetryError<E>;
    type Future = BoxFuture<'static, Result<Res, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(RetryError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let config = Arc::clone(&self.config);
        let counters = Arc::clone(&self.counters);
        let mut inner = self.inner.clone();
        let max_attempts = config.max_attempts.get_max_attempts(&req).max(1);

        Box::pin(async move {
            let mut attempt = 0usize;

            loop {
                let pattern_name = config.name.clone();

                match inner.call(req.clone()).await {
                    Ok(result) => {
                        let retry_this_result = config
                            .retry_on_result
                            .as_ref()
                            .is_some_and(|predicate| predicate(&result));

                        if !retry_this_result || attempt + 1 >= max_attempts {
                            // Either the value is acceptable, or attempts are
                            // exhausted and the last value is returned as-is
                            // (a retry-on-result predicate has no error to
                            // surface on exhaustion).
                            if attempt > 0 {
                                counters
                                    .successful_with_retry
                                    .fetch_add(1, Ordering::Relaxed);
                                config.event_listeners.emit(&RetryEvent::Success {
                                    pattern_name,
                                    timestamp: Instant::now(),
                                    attempts: attempt + 1,
                                });
                                #[cfg(feature = "tracing")]
                                tracing::debug!(retry = %config.name, attempts = attempt + 1, "retry succeeded");
                            } else {
                                counters
                                    .successful_without_retry
                                    .fetch_add(1, Ordering::Relaxed);
                            }
                            #[cfg(feature = "metrics")]
                            counter!("retry_calls_total", "outcome" => "success").increment(1);
                            if let Some(budget) = &config.budget {
                                budget.deposit();
                            }
                            return Ok(result);
                        }

                        let delay = config.wait_duration;
                        config.event_listeners.emit(&RetryEvent::Retry {
                            pattern_name,
                            timestamp: Instant::now(),
                            attempt: attempt + 1,
                            delay,
                        });
                        #[cfg(feature = "metrics")]
                        counter!("retry_attempts_total").increment(1);
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    Err(error) => {
                        if !(config.retry_on_error)(&error) {
                            config.event_listeners.emit(&RetryEvent::IgnoredError {
                                pattern_name,
                                timestamp: Instant::now(),
                            });
                            counters
                                .failed_without_retry
                                .fetch_add(1, Ordering::Relaxed);
                            #[cfg(feature = "metrics")]
                            counter!("retry_calls_total", "outcome" => "ignored_error")
                                .increment(1);
                            return Err(RetryError::Inner(error));
                        }

                        if attempt + 1 >= max_attempts {
                            config.event_listeners.emit(&RetryEvent::Error {
                                pattern_name,
                                timestamp: Instant::now(),
                                attempts: attempt + 1,
                            });
                            if attempt > 0 {
                                counters.failed_with_retry.fetch_add(1, Ordering::Relaxed);
                            } else {
                                counters
                                    .failed_without_retry
                                    .fetch_add(1, Ordering::Relaxed);
                            }
                            #[cfg(feature = "metrics")]
                            counter!("retry_calls_total", "outcome" => "exhausted").increment(1);
                            return Err(RetryError::MaxRetriesExceeded {
                                attempts: attempt + 1,
                                source: error,
                            });
                        }

                        if let Some(budget) = &config.budget {
                            if !budget.try_withdraw() {
                                config.event_listeners.emit(&RetryEvent::BudgetExhausted {
                                    pattern_name,
                                    timestamp: Instant::now(),
                                    attempt: attempt + 1,
                                });
                                counters
                                    .failed_without_retry
                                    .fetch_add(1, Ordering::Relaxed);
                                return Err(RetryError::Inner(error));
                            }
                        }

                        let delay = config.wait_duration;
                        config.event_listeners.emit(&RetryEvent::Retry {
                            pattern_name,
                            timestamp: Instant::now(),
                            attempt: attempt + 1,
                            delay,
                        });
                        #[cfg(feature = "tracing")]
                        tracing::trace!(retry = %config.name, attempt = attempt + 1, ?delay, "retrying call");
                        #[cfg(feature = "metrics")]
                        counter!("retry_attempts_total").increment(1);

                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
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

    fn counting_service(
        fail_times: usize,
    ) -> (Arc<AtomicUsize>, impl Service<i32, Response = i32, Error = &'static str> + Clone) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let svc = service_fn(move |req: i32| {
            let counted = Arc::clone(&counted);
            async move {
                let n = counted.fetch_add(1, Ordering::SeqCst);
                if n < fail_times {
                    Err("transient")
                } else {
                    Ok(req)
                }
            }
        });
        (calls, svc)
    }

    #[tokio::test]
    async fn successful_first_try_emits_no_success_event() {
        let events = Arc::new(std::sync::Mutex::new(Vec::new()));
        let recorded = Arc::clone(&events);
        let layer = RetryConfig::<i32, i32, &'static str>::builder()
            .max_attempts(3)
            .wait_duration(Duration::from_millis(1))
            .on_event(move |e| recorded.lock().unwrap().push(e.event_type()))
            .build();
        let (_, svc) = counting_service(0);
        let mut retried = layer.layer(svc);

        let res = retried.ready().await.unwrap().call(1).await.unwrap();
        assert_eq!(res, 1);
        assert!(events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn retry2_succeeds_after_one_retry_with_success_event() {
        let events = Arc::new(std::sync::Mutex::new(Vec::new()));
        let recorded = Arc::clone(&events);
        let layer = RetryConfig::<i32, i32, &'static str>::builder()
            .max_attempts(3)
            .wait_duration(Duration::from_millis(1))
            .on_event(move |e| recorded.lock().unwrap().push(e.event_type()))
            .build();
        let (calls, svc) = counting_service(1);
        let mut retried = layer.layer(svc);

        let res = retried.ready().await.unwrap().call(1).await.unwrap();
        assert_eq!(res, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(events.lock().unwrap().as_slice(), ["Retry", "Success"]);
    }

    #[tokio::test]
    async fn retry1_exhausts_after_max_attempts() {
        let events = Arc::new(std::sync::Mutex::new(Vec::new()));
        let recorded = Arc::clone(&events);
        let layer = RetryConfig::<i32, i32, &'static str>::builder()
            .max_attempts(3)
            .wait_duration(Duration::from_millis(1))
            .on_event(move |e| recorded.lock().unwrap().push(e.event_type()))
            .build();
        let (calls, svc) = counting_service(usize::MAX);
        let mut retried = layer.layer(svc);

        let err = retried.ready().await.unwrap().call(1).await.unwrap_err();
        assert!(err.is_max_retries_exceeded());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            events.lock().unwrap().as_slice(),
            ["Retry", "Retry", "Error"]
        );
    }

    #[tokio::test]
    async fn retry_predicate_filters_unretryable_errors() {
        let layer = RetryConfig::<i32, i32, &'static str>::builder()
            .max_attempts(5)
            .wait_duration(Duration::from_millis(1))
            .retry_on_error(|e: &&'static str| *e != "fatal")
            .build();
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let svc = service_fn(move |_: i32| {
            let counted = Arc::clone(&counted);
            async move {
                counted.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>("fatal")
            }
        });
        let mut retried = layer.layer(svc);

        let err = retried.ready().await.unwrap().call(1).await.unwrap_err();
        assert!(!err.is_max_retries_exceeded());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn budget_exhaustion_stops_retrying_early() {
        let budget: Arc<dyn RetryBudget> = Arc::new(TokenBucketBudget::new(0));
        let layer = RetryConfig::<i32, i32, &'static str>::builder()
            .max_attempts(5)
            .wait_duration(Duration::from_millis(1))
            .budget(budget)
            .build();
        let (calls, svc) = counting_service(usize::MAX);
        let mut retried = layer.layer(svc);

        let err = retried.ready().await.unwrap().call(1).await.unwrap_err();
        assert!(!err.is_max_retries_exceeded());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn per_request_max_attempts_overrides_default() {
        #[derive(Clone)]
        struct Req {
            value: i32,
            max: usize,
        }

        let layer = RetryConfig::<Req, i32, &'static str>::builder()
            .max_attempts_fn(|r: &Req| r.max)
            .wait_duration(Duration::from_millis(1))
            .build();
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let svc = service_fn(move |req: Req| {
            let counted = Arc::clone(&counted);
            async move {
                counted.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>("transient").map(|_: i32| req.value)
            }
        });
        let mut retried = layer.layer(svc);

        let err = retried
            .ready()
            .await
            .unwrap()
            .call(Req { value: 1, max: 2 })
            .await
            .unwrap_err();
        assert!(err.is_max_retries_exceeded());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn metrics_track_retry_outcomes() {
        let layer = RetryConfig::<i32, i32, &'static str>::builder()
            .max_attempts(3)
            .wait_duration(Duration::from_millis(1))
            .build();
        let (_, svc) = counting_service(1);
        let mut retried = layer.layer(svc);
        let _ = retried.ready().await.unwrap().call(1).await.unwrap();

        let metrics = retried.metrics();
        assert_eq!(metrics.number_of_successful_calls_with_retry, 1);
        assert_eq!(metrics.number_of_successful_calls_without_retry, 0);
    }
}
