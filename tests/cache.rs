//! Black-box tests against the public `breakwater-cache` API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use breakwater_cache::CacheLayer;
use tower::{Service, ServiceExt};

#[tokio::test]
async fn repeated_key_only_invokes_inner_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);
    let layer = CacheLayer::builder()
        .key_extractor(|req: &String| req.clone())
        .build();
    let mut svc = layer.layer(tower::service_fn(move |req: String| {
        let counted = Arc::clone(&counted);
        async move {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ()>(format!("resp:{req}"))
        }
    }));

    for _ in 0..5 {
        let response = svc.ready().await.unwrap().call("k".to_string()).await.unwrap();
        assert_eq!(response, "resp:k");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn composes_behind_a_circuit_breaker_layer() {
    use breakwater_circuitbreaker::CircuitBreakerConfig;
    use tower::ServiceBuilder;

    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);

    let cache_layer = CacheLayer::builder()
        .key_extractor(|req: &u32| *req)
        .build();
    let breaker_layer = CircuitBreakerConfig::<()>::builder()
        .failure_rate_threshold(0.5)
        .sliding_window_size(5)
        .build();

    let mut stack = ServiceBuilder::new()
        .layer(cache_layer)
        .layer(breaker_layer)
        .service(tower::service_fn(move |req: u32| {
            let counted = Arc::clone(&counted);
            async move {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ()>(req * 10)
            }
        }));

    let a = stack.ready().await.unwrap().call(4).await.unwrap();
    let b = stack.ready().await.unwrap().call(4).await.unwrap();
    assert_eq!(a, 40);
    assert_eq!(b, 40);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
