//! Property: across one refresh period, no more than `limit_for_period`
//! calls are ever admitted (spec.md §8's per-period admission bound),
//! no matter how many callers race for a permit.

use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tower::{Service, ServiceExt};

use breakwater_ratelimiter::RateLimiterConfig;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    #[test]
    fn never_admits_more_than_the_configured_limit_within_one_period(
        limit in 1usize..=10,
        attempts in 1usize..=30,
    ) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let layer = RateLimiterConfig::builder()
                .limit_for_period(limit)
                .refresh_period(Duration::from_secs(60))
                .timeout_duration(Duration::ZERO)
                .build();
            let svc = layer.layer(tower::service_fn(|_: ()| async { Ok::<_, ()>(()) }));

            let admitted = Arc::new(AtomicUsize::new(0));
            let mut handles = Vec::new();
            for _ in 0..attempts {
                let mut svc = svc.clone();
                let admitted = Arc::clone(&admitted);
                handles.push(tokio::spawn(async move {
                    if svc.ready().await.unwrap().call(()).await.is_ok() {
                        admitted.fetch_add(1, Ordering::SeqCst);
                    }
                }));
            }
            for h in handles {
                h.await.unwrap();
            }

            prop_assert!(admitted.load(Ordering::SeqCst) <= limit);
            Ok(())
        })?;
    }
}
