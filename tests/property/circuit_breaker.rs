//! Property: the circuit opens exactly when the failure rate over the
//! first full sliding window reaches the configured threshold,
//! regardless of the order failures and successes arrive in (spec.md
//! §8, invariant "order-independence within one window").

use proptest::prelude::*;
use tokio::runtime::Runtime;
use tower::{Service, ServiceExt};

use breakwater_circuitbreaker::{CircuitBreakerConfig, CircuitState};

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
    fn opens_iff_failure_rate_crosses_threshold(
        window_size in 2usize..=20,
        threshold in 0.1f64..=0.9,
        seed in 0u64..=u64::MAX,
    ) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            // Deterministic pseudo-random outcome sequence derived from
            // `seed`, exactly `window_size` long.
            let mut state = seed;
            let mut failures = 0usize;
            let outcomes: Vec<bool> = (0..window_size)
                .map(|_| {
                    state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
                    let is_failure = (state >> 63) == 1;
                    if is_failure {
                        failures += 1;
                    }
                    is_failure
                })
                .collect();

            let layer = CircuitBreakerConfig::<ProbeError>::builder()
                .failure_rate_threshold(threshold)
                .sliding_window_size(window_size)
                .build();
            let mut svc = layer.layer(tower::service_fn(|fail: bool| async move {
                if fail { Err(ProbeError) } else { Ok(()) }
            }));

            for &outcome in &outcomes {
                let _ = svc.ready().await.unwrap().call(outcome).await;
            }

            let rate = failures as f64 / window_size as f64;
            let state = svc.state().await;
            if rate >= threshold {
                prop_assert_eq!(state, CircuitState::Open);
            } else {
                prop_assert_eq!(state, CircuitState::Closed);
            }
            Ok(())
        })?;
    }

    #[test]
    fn an_open_circuit_rejects_every_call_without_reaching_the_inner_service(
        window_size in 2usize..=10,
        extra_calls in 1usize..=10,
    ) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let layer = CircuitBreakerConfig::<ProbeError>::builder()
                .failure_rate_threshold(0.1)
                .sliding_window_size(window_size)
                .build();
            let mut svc = layer.layer(tower::service_fn(|_: ()| async { Err::<(), _>(ProbeError) }));

            for _ in 0..window_size {
                let _ = svc.ready().await.unwrap().call(()).await;
            }
            prop_assert_eq!(svc.state().await, CircuitState::Open);

            for _ in 0..extra_calls {
                let err = svc.ready().await.unwrap().call(()).await.unwrap_err();
                prop_assert!(err.is_call_not_permitted());
            }
            Ok(())
        })?;
    }
}
