//!
//! A Tower middleware implementing rate limiting behavior to bound the
//! number of calls admitted to an inner service per refresh period.
//!
//! ## Features
//! - Lock-free cycle/permission accounting via a single packed `AtomicU64`
//! - Configurable `limit_for_period`, `refresh_period`, `timeout_duration`
//! - Metrics support via the `metrics` feature flag
//! - Tracing support via the `tracing` feature flag
//!
//! ## Example
//! ```rust
//! use breakwater_ratelimiter::RateLimiterConfig;
//! use tower::service_fn;
//! use tower::Service;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let layer = RateLimiterConfig::builder()
//!         .limit_for_period(3)
//!         .refresh_period(Duration::from_secs(1))
//!         .timeout_duration(Duration::ZERO)
//!         .build();
//!
//!     let my_service = service_fn(|req| async move { Ok::<_, ()>(req) });
//!     let mut service = layer.layer(my_service);
//!
//!     let response = Service::call(&mut service, "hello").await.unwrap();
//!     assert_eq!(response, "hello");
//! }
//! ```
//!
//! ## Feature Flags
//! - `metrics`: enables metrics collection using the `metrics` crate.
//! - `tracing`: enables logging and tracing using the `tracing` crate.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter};
#[cfg(feature = "metrics")]
use std::sync::Once;
use tower::Service;

pub use config::{RateLimiterConfig, RateLimiterConfigBuilder};
pub use error::RateLimiterError;
pub use events::RateLimiterEvent;
pub use layer::RateLimiterLayer;
pub use registry::RateLimiterRegistry;

mod config;
mod error;
mod events;
mod layer;
mod limiter;
mod registry;

use limiter::LimiterState;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

#[cfg(feature = "metrics")]
fn init_metrics() {
    METRICS_INIT.call_once(|| {
        describe_counter!(
            "ratelimiter_calls_total",
            "Total number of calls observed by the rate limiter"
        );
    });
}

/// A Tower [`Service`] that admits at most `limit_for_period` calls to
/// the inner service per `refresh_period`.
pub struct RateLimiter<S> {
    inner: S,
    state: Arc<LimiterState>,
    timeout_duration: Arc<std::sync::atomic::AtomicU64>,
    waiting: Arc<AtomicUsize>,
    config: Arc<RateLimiterConfig>,
}

impl<S: Clone> Clone for RateLimiter<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            state: Arc::clone(&self.state),
            timeout_duration: Arc::clone(&self.timeout_duration),
            waiting: Arc::clone(&self.waiting),
            config: Arc::clone(&self.config),
        }
    }
}

/// A point-in-time snapshot of a [`RateLimiter`]'s accounting state.
#[derive(Debug, Clone, Copy)]
pub struct RateLimiterMetrics {
    pub available_permissions: i64,
    pub number_of_waiting_callers: usize,
}

impl<S> RateLimiter<S> {
    pub(crate) fn new(inner: S, config: Arc<RateLimiterConfig>) -> Self {
        #[cfg(feature = "metrics")]
        init_metrics();

        let state = Arc::new(LimiterState::new(
            config.limit_for_period,
            config.refresh_period,
        ));
        let timeout_duration = Arc::new(std::sync::atomic::AtomicU64::new(
            config.timeout_duration.as_nanos() as u64,
        ));
        Self {
            inner,
            state,
            timeout_duration,
            waiting: Arc::new(AtomicUsize::new(0)),
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Returns the number of permits available in the active cycle.
    /// May be negative if callers are currently waiting on a
    /// reservation for a future cycle.
    pub fn available_permissions(&self) -> i64 {
        self.state.available_permissions()
    }

    /// Returns a point-in-time snapshot of available permissions and
    /// the number of callers currently suspended waiting on a permit.
    pub fn metrics(&self) -> RateLimiterMetrics {
        RateLimiterMetrics {
            available_permissions: self.state.available_permissions(),
            number_of_waiting_callers: self.waiting.load(Ordering::Relaxed),
        }
    }

    /// Applies a new per-period limit from the next cycle boundary
    /// onward; does not retroactively affect the active cycle's
    /// already-reserved permissions.
    pub fn change_limit_for_period(&self, limit: usize) {
        self.state.set_limit_for_period(limit);
    }

    /// Applies a new acquire timeout to calls made from this point on.
    pub fn change_timeout_duration(&self, timeout: Duration) {
        self.timeout_duration
            .store(timeout.as_nanos() as u64, Ordering::Relaxed);
    }
}

impl<S, Req> Service<Req> for RateLimiter<S>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + Sync + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = RateLimiterError<S::Error>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(RateLimiterError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let state = Arc::clone(&self.state);
        let config = Arc::clone(&self.config);
        let waiting = Arc::clone(&self.waiting);
        let timeout_duration = Duration::from_nanos(self.timeout_duration.load(Ordering::Relaxed));
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let pattern_name = config.name.clone();
            let outcome = state.try_acquire(timeout_duration);

            let Some(outcome) = outcome else {
                #[cfg(feature = "tracing")]
                tracing::trace!(limiter = %pattern_name, "rate limiter rejected call");
                #[cfg(feature = "metrics")]
                counter!("ratelimiter_calls_total", "outcome" => "rejected").increment(1);

                config.event_listeners.emit(&RateLimiterEvent::FailedAcquire {
                    pattern_name,
                    timestamp: Instant::now(),
                    timeout_duration,
                });
                return Err(RateLimiterError::RequestNotPermitted);
            };

            let wait_duration = Duration::from_nanos(outcome.nanos_to_wait);
            if !wait_duration.is_zero() {
                // The guard decrements on drop, including if this future is
                // cancelled mid-sleep; the reserved permission itself is
                // reclaimed lazily by the next cycle boundary, per the
                // accounting scheme in `limiter`. Cancellation here drops the
                // future before a `FailedAcquire` can be emitted; no
                // `SuccessfulAcquire` fires either, so the event stream just
                // shows a gap rather than a wrong outcome.
                struct WaitingGuard<'a>(&'a AtomicUsize);
                impl Drop for WaitingGuard<'_> {
                    fn drop(&mut self) {
                        self.0.fetch_sub(1, Ordering::Relaxed);
                    }
                }
                waiting.fetch_add(1, Ordering::Relaxed);
                let _guard = WaitingGuard(&waiting);
                tokio::time::sleep(wait_duration).await;
            }

            #[cfg(feature = "tracing")]
            tracing::trace!(limiter = %pattern_name, ?wait_duration, "rate limiter permitted call");
            #[cfg(feature = "metrics")]
            counter!("ratelimiter_calls_total", "outcome" => "permitted").increment(1);

            config
                .event_listeners
                .emit(&RateLimiterEvent::SuccessfulAcquire {
                    pattern_name,
                    timestamp: Instant::now(),
                    wait_duration,
                });

            inner.call(req).await.map_err(RateLimiterError::Inner)
        })
    }
}
