//! Core infrastructure shared by every `breakwater` guard: the event
//! fan-out, the ring-bit-buffer used for sliding-window failure
//! accounting, and the unified error types.
//!
//! This crate has no opinions about Tower, HTTP, or any particular
//! protocol: it is pure concurrency and accounting machinery that the
//! circuit breaker, rate limiter, and retry crates build on.

mod error;
mod events;
mod ring_bitbuffer;

pub use error::{ConfigurationError, ResilienceError};
pub use events::{BoxedEventListener, CircularEventConsumer, EventListener, EventListeners, FnListener, ResilienceEvent};
pub use ring_bitbuffer::{RecordResult, RingBitBuffer};
