//! Property: the inner service is invoked at most `max_attempts` times,
//! and a call that eventually succeeds within that budget returns the
//! successful value (spec.md §8's bounded-attempt invariant).

use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tower::{Service, ServiceExt};

use breakwater_retry::RetryConfig;

#[derive(Debug, Clone)]
struct ProbeError;
impl std::fmt::Display for ProbeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "probe error")
    }
}
impl std::error::Error for ProbeError {}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(40))]

    #[test]
    fn inner_is_called_at_most_max_attempts_times(
        max_attempts in 1usize..=8,
        always_fails in any::<bool>(),
    ) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let calls = Arc::new(AtomicUsize::new(0));
            let counted = Arc::clone(&calls);
            let layer = RetryConfig::<(), (), ProbeError>::builder()
                .max_attempts(max_attempts)
                .wait_duration(Duration::from_millis(1))
                .build();
            let mut svc = layer.layer(tower::service_fn(move |_: ()| {
                let counted = Arc::clone(&counted);
                async move {
                    counted.fetch_add(1, Ordering::SeqCst);
                    if always_fails {
                        Err(ProbeError)
                    } else {
                        Ok(())
                    }
                }
            }));

            let result = svc.ready().await.unwrap().call(()).await;
            let made = calls.load(Ordering::SeqCst);

            prop_assert!(made <= max_attempts);
            if always_fails {
                prop_assert!(result.is_err());
                prop_assert_eq!(made, max_attempts);
            } else {
                prop_assert!(result.is_ok());
                prop_assert_eq!(made, 1);
            }
            Ok(())
        })?;
    }

    #[test]
    fn succeeds_as_soon_as_budget_allows_and_stops_calling(
        max_attempts in 2usize..=8,
        succeed_on_attempt in 1usize..=8,
    ) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let succeed_on_attempt = succeed_on_attempt.min(max_attempts);
            let calls = Arc::new(AtomicUsize::new(0));
            let counted = Arc::clone(&calls);
            let layer = RetryConfig::<(), usize, ProbeError>::builder()
                .max_attempts(max_attempts)
                .wait_duration(Duration::from_millis(1))
                .build();
            let mut svc = layer.layer(tower::service_fn(move |_: ()| {
                let counted = Arc::clone(&counted);
                async move {
                    let attempt = counted.fetch_add(1, Ordering::SeqCst) + 1;
                    if attempt >= succeed_on_attempt {
                        Ok(attempt)
                    } else {
                        Err(ProbeError)
                    }
                }
            }));

            let result = svc.ready().await.unwrap().call(()).await;
            prop_assert!(result.is_ok());
            prop_assert_eq!(result.unwrap(), succeed_on_attempt);
            prop_assert_eq!(calls.load(Ordering::SeqCst), succeed_on_attempt);
            Ok(())
        })?;
    }
}
