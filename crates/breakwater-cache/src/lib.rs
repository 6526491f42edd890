//!
//! A thin response-memoization decorator for Tower services.
//!
//! The rest of this workspace treats fault tolerance as the hard
//! problem worth real concurrency machinery; caching is the opposite,
//! an external collaborator with a simple contract (look a key up,
//! fall through to the inner service on a miss, remember the result).
//! This crate proves that decorator shape over a pluggable
//! [`CacheStore`] with one unbounded, `HashMap`-backed implementation.
//! It does not implement an eviction policy or TTL; callers who need
//! either should back [`CacheStore`] with an external provider.
//!
//! ## Example
//! ```rust
//! use breakwater_cache::CacheLayer;
//! use tower::service_fn;
//! use tower::Service;
//!
//! #[tokio::main]
//! async fn main() {
//!     let layer = CacheLayer::builder()
//!         .key_extractor(|req: &String| req.clone())
//!         .build();
//!
//!     let my_service = service_fn(|req: String| async move { Ok::<_, ()>(req) });
//!     let mut service = layer.layer(my_service);
//!
//!     let response = Service::call(&mut service, "hello".to_string()).await.unwrap();
//!     assert_eq!(response, "hello");
//! }
//! ```
//!
//! ## Feature Flags
//! - `metrics`: enables metrics collection using the `metrics` crate.
//! - `tracing`: enables logging and tracing using the `tracing` crate.

use std::hash::Hash;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use futures::future::BoxFuture;
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter};
#[cfg(feature = "metrics")]
use std::sync::Once;
use tower::Service;

pub use config::{CacheConfig, CacheConfigBuilder, KeyExtractor};
pub use error::CacheError;
pub use events::CacheEvent;
pub use layer::CacheLayer;
pub use store::{CacheStore, InMemoryCacheStore};

mod config;
mod error;
mod events;
mod layer;
mod store;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

#[cfg(feature = "metrics")]
fn init_metrics() {
    METRICS_INIT.call_once(|| {
        describe_counter!(
            "cache_calls_total",
            "Total number of calls observed by the cache decorator"
        );
    });
}

/// A Tower [`Service`] that memoizes the inner service's successful
/// responses behind a [`CacheStore`], keyed by a caller-supplied
/// [`KeyExtractor`].
pub struct Cache<S, Req, K, V> {
    inner: S,
    config: Arc<CacheConfig<Req, K, V>>,
}

impl<S: Clone, Req, K, V> Clone for Cache<S, Req, K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S, Req, K, V> Cache<S, Req, K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
{
    pub(crate) fn new(inner: S, config: Arc<CacheConfig<Req, K, V>>) -> Self {
        #[cfg(feature = "metrics")]
        init_metrics();
        Self { inner, config }
    }

    pub fn name(&self) -> &str {
        self.config.name()
    }

    /// Number of entries currently held by the backing store.
    pub fn len(&self) -> usize {
        self.config.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S, Req, K, V> Service<Req> for Cache<S, Req, K, V>
where
    S: Service<Req, Response = V> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + Sync + 'static,
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    Req: Send + 'static,
{
    type Response = V;
    type Error = CacheError<S::Error>;
    type Future = BoxFuture<'static, Result<V, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(CacheError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let config = Arc::clone(&self.config);
        let key = (config.key_extractor)(&req);
        let pattern_name = config.name.clone();

        if let Some(cached) = config.store.get(&key) {
            config.event_listeners.emit(&CacheEvent::Hit {
                pattern_name,
                timestamp: Instant::now(),
            });
            #[cfg(feature = "tracing")]
            tracing::trace!(cache = %config.name, "cache hit");
            #[cfg(feature = "metrics")]
            counter!("cache_calls_total", "outcome" => "hit").increment(1);
            return Box::pin(async move { Ok(cached) });
        }

        config.event_listeners.emit(&CacheEvent::Miss {
            pattern_name,
            timestamp: Instant::now(),
        });
        #[cfg(feature = "tracing")]
        tracing::trace!(cache = %config.name, "cache miss");
        #[cfg(feature = "metrics")]
        counter!("cache_calls_total", "outcome" => "miss").increment(1);

        let mut inner = self.inner.clone();
        Box::pin(async move {
            let response = inner.call(req).await.map_err(CacheError::Inner)?;
            config.store.insert(key, response.clone());
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower::{service_fn, ServiceExt};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn miss_then_hit_calls_inner_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let layer = CacheConfig::<String, String, String>::builder()
            .key_extractor(|req: &String| req.clone())
            .build();
        let svc = service_fn(move |req: String| {
            let counted = Arc::clone(&counted);
            async move {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ()>(format!("resp:{req}"))
            }
        });
        let mut cached = layer.layer(svc);

        let a = cached.ready().await.unwrap().call("k".to_string()).await.unwrap();
        let b = cached.ready().await.unwrap().call("k".to_string()).await.unwrap();
        assert_eq!(a, "resp:k");
        assert_eq!(b, "resp:k");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cached.len(), 1);
    }

    #[tokio::test]
    async fn distinct_keys_both_call_inner() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let layer = CacheConfig::<String, String, String>::builder()
            .key_extractor(|req: &String| req.clone())
            .build();
        let svc = service_fn(move |req: String| {
            let counted = Arc::clone(&counted);
            async move {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ()>(req)
            }
        });
        let mut cached = layer.layer(svc);

        let _ = cached.ready().await.unwrap().call("a".to_string()).await.unwrap();
        let _ = cached.ready().await.unwrap().call("b".to_string()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn events_fire_on_hit_and_miss() {
        let events = Arc::new(std::sync::Mutex::new(Vec::new()));
        let recorded = Arc::clone(&events);
        let layer = CacheConfig::<String, String, String>::builder()
            .key_extractor(|req: &String| req.clone())
            .on_event(move |e| recorded.lock().unwrap().push(e.event_type()))
            .build();
        let svc = service_fn(|req: String| async move { Ok::<_, ()>(req) });
        let mut cached = layer.layer(svc);

        let _ = cached.ready().await.unwrap().call("k".to_string()).await.unwrap();
        let _ = cached.ready().await.unwrap().call("k".to_string()).await.unwrap();
        assert_eq!(events.lock().unwrap().as_slice(), ["miss", "hit"]);
    }
}
