use breakwater_core::ResilienceEvent;
use std::time::{Duration, Instant};

use crate::circuit::CircuitState;

/// A lifecycle event emitted by a [`CircuitBreaker`](crate::CircuitBreaker).
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// A call succeeded and was recorded.
    Success {
        pattern_name: String,
        timestamp: Instant,
        elapsed: Duration,
    },
    /// A call failed and was recorded.
    Error {
        pattern_name: String,
        timestamp: Instant,
        elapsed: Duration,
    },
    /// A failed call was ignored because the failure predicate returned
    /// false; it was not recorded in the sliding window.
    IgnoredError {
        pattern_name: String,
        timestamp: Instant,
    },
    /// The state machine transitioned.
    StateTransition {
        pattern_name: String,
        timestamp: Instant,
        from: CircuitState,
        to: CircuitState,
    },
    /// A call was rejected because the circuit is open.
    NotPermitted {
        pattern_name: String,
        timestamp: Instant,
    },
}

impl ResilienceEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CircuitBreakerEvent::Success { .. } => "success",
            CircuitBreakerEvent::Error { .. } => "error",
            CircuitBreakerEvent::IgnoredError { .. } => "ignored_error",
            CircuitBreakerEvent::StateTransition { .. } => "state_transition",
            CircuitBreakerEvent::NotPermitted { .. } => "not_permitted",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CircuitBreakerEvent::Success { timestamp, .. }
            | CircuitBreakerEvent::Error { timestamp, .. }
            | CircuitBreakerEvent::IgnoredError { timestamp, .. }
            | CircuitBreakerEvent::StateTransition { timestamp, .. }
            | CircuitBreakerEvent::NotPermitted { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            CircuitBreakerEvent::Success { pattern_name, .. }
            | CircuitBreakerEvent::Error { pattern_name, .. }
            | CircuitBreakerEvent::IgnoredError { pattern_name, .. }
            | CircuitBreakerEvent::StateTransition { pattern_name, .. }
            | CircuitBreakerEvent::NotPermitted { pattern_name, .. } => pattern_name,
        }
    }
}
