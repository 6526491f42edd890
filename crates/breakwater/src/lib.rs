//! Composable fault-tolerance primitives for Tower services, and a thin
//! decorator layer for plain async call sites that don't speak
//! [`tower::Service`].
//!
//! `breakwater` re-exports each guard crate under its own module, gated
//! by a feature of the same name, plus the [`CircuitBreaker`]/
//! [`RateLimiter`]/[`Retry`] registries. Enable only the guards a
//! caller needs:
//!
//! ```toml
//! [dependencies]
//! breakwater = { version = "0.1", features = ["circuitbreaker", "retry"] }
//! ```
//!
//! ## Tower call sites
//!
//! Build a `*Layer` from the guard crate's config builder and apply it
//! with [`tower::ServiceBuilder`], the same as any other Tower
//! middleware.
//!
//! ## Non-Tower call sites
//!
//! [`decorate_circuit_breaker`], [`decorate_rate_limiter`], and
//! [`decorate_retry`] wrap a plain `async fn(Req) -> Result<Res, Err>`
//! closure with the matching guard's decision operations, for callers
//! that have a function to protect rather than a `Service` to layer.
//! Internally each helper is a thin `tower::service_fn` plus the
//! guard's own `Layer`, so the guard's state machine is exercised
//! exactly as it would be from inside a Tower stack. These helpers add
//! no behavior of their own.
//!
//! ## Feature Flags
//! - `circuitbreaker`, `ratelimiter`, `retry`, `cache`: enable the
//!   matching guard crate (```circuitbreaker```, ```ratelimiter```, and
//!   ```retry``` are on by default).
//! - `full`: enables every guard, including `cache`.
//! - `metrics` / `tracing`: forwarded to every enabled guard crate.

pub use breakwater_core::{
    BoxedEventListener, CircularEventConsumer, ConfigurationError, EventListener, EventListeners,
    FnListener, ResilienceError, RingBitBuffer,
};

#[cfg(feature = "circuitbreaker")]
pub mod circuitbreaker {
    //! Re-export of [`breakwater_circuitbreaker`].
    pub use breakwater_circuitbreaker::*;
}

#[cfg(feature = "ratelimiter")]
pub mod ratelimiter {
    //! Re-export of [`breakwater_ratelimiter`].
    pub use breakwater_ratelimiter::*;
}

#[cfg(feature = "retry")]
pub mod retry {
    //! Re-export of [`breakwater_retry`].
    pub use breakwater_retry::*;
}

#[cfg(feature = "cache")]
pub mod cache {
    //! Re-export of [`breakwater_cache`].
    pub use breakwater_cache::*;
}

#[cfg(any(
    feature = "circuitbreaker",
    feature = "ratelimiter",
    feature = "retry"
))]
mod decorators;

#[cfg(feature = "circuitbreaker")]
pub use decorators::decorate_circuit_breaker;
#[cfg(feature = "ratelimiter")]
pub use decorators::decorate_rate_limiter;
#[cfg(feature = "retry")]
pub use decorators::decorate_retry;
