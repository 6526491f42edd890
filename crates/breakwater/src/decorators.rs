//! Thin wrappers for call sites that have a plain async function to
//! protect rather than a [`tower::Service`] to layer.
//!
//! Each helper builds a one-off `tower::service_fn` around the caller's
//! closure and applies the matching guard's `Layer` to it, then returns
//! a `Clone`-able closure that drives that layered service with
//! [`tower::util::ServiceExt::oneshot`] on every call. No guard
//! behavior is reimplemented here: these are thin plumbing over the
//! same `Service` machinery a Tower stack would use.

use std::future::Future;

use tower::util::ServiceExt;

#[cfg(feature = "circuitbreaker")]
use breakwater_circuitbreaker::{CircuitBreakerError, CircuitBreakerLayer};
#[cfg(feature = "ratelimiter")]
use breakwater_ratelimiter::{RateLimiterError, RateLimiterLayer};
#[cfg(feature = "retry")]
use breakwater_retry::{RetryError, RetryLayer};

/// Wraps `f` with `layer`'s circuit breaker behavior.
///
/// `layer.layer(..)` is called once, up front; every call the returned
/// closure makes clones that single `CircuitBreaker`, so all calls
/// share one `Circuit` and its open/closed/half-open decisions.
#[cfg(feature = "circuitbreaker")]
pub fn decorate_circuit_breaker<F, Fut, Req, Res, Err>(
    layer: &CircuitBreakerLayer<Err>,
    f: F,
) -> impl Fn(Req) -> std::pin::Pin<Box<dyn Future<Output = Result<Res, CircuitBreakerError<Err>>> + Send>>
       + Clone
where
    F: Fn(Req) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<Res, Err>> + Send + 'static,
    Req: Send + 'static,
    Res: Send + 'static,
    Err: Send + Sync + 'static,
{
    let breaker = layer.layer(tower::service_fn(move |req: Req| f(req)));
    move |req: Req| {
        let breaker = breaker.clone();
        Box::pin(async move { breaker.oneshot(req).await })
    }
}

/// Wraps `f` with `layer`'s rate-limiting behavior.
#[cfg(feature = "ratelimiter")]
pub fn decorate_rate_limiter<F, Fut, Req, Res, Err>(
    layer: &RateLimiterLayer,
    f: F,
) -> impl Fn(Req) -> std::pin::Pin<Box<dyn Future<Output = Result<Res, RateLimiterError<Err>>> + Send>>
       + Clone
where
    F: Fn(Req) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<Res, Err>> + Send + 'static,
    Req: Send + 'static,
    Res: Send + 'static,
    Err: Send + Sync + 'static,
{
    let limiter = layer.layer(tower::service_fn(move |req: Req| f(req)));
    move |req: Req| {
        let limiter = limiter.clone();
        Box::pin(async move { limiter.oneshot(req).await })
    }
}

/// Wraps `f` with `layer`'s bounded-attempt retry behavior. `Req` must
/// be `Clone` since a retried attempt needs its own owned copy, the
/// same constraint [`breakwater_retry::Retry`] imposes as a `Service`.
#[cfg(feature = "retry")]
pub fn decorate_retry<F, Fut, Req, Res, Err>(
    layer: &RetryLayer<Req, Res, Err>,
    f: F,
) -> impl Fn(Req) -> std::pin::Pin<Box<dyn Future<Output = Result<Res, RetryError<Err>>> + Send>> + Clone
where
    F: Fn(Req) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<Res, Err>> + Send + 'static,
    Req: Clone + Send + 'static,
    Res: Send + 'static,
    Err: Clone + Send + Sync + 'static,
{
    let retrier = layer.layer(tower::service_fn(move |req: Req| f(req)));
    move |req: Req| {
        let retrier = retrier.clone();
        Box::pin(async move { retrier.oneshot(req).await })
    }
}
