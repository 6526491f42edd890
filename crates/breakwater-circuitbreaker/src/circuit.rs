//! The circuit breaker's finite state machine and ring-bit-buffer backed
//! failure accounting.
//!
//! All mutation goes through `Circuit`, guarded by a single
//! `tokio::sync::Mutex` so auto-transitions (triggered by recorded
//! outcomes) and manual transitions (`force_open` etc.) serialize through
//! the same lock and the observable state sequence stays linear. A mirror
//! `AtomicU8` lets `state_sync()` read the current state without taking
//! the async lock, for callers that just want a cheap non-blocking peek.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use breakwater_core::RingBitBuffer;

use crate::events::CircuitBreakerEvent;

/// The circuit breaker's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl CircuitState {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            other => panic!("invalid CircuitState encoding: {other}"),
        }
    }
}

/// A point-in-time derived view over the active sliding window.
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerMetrics {
    pub failure_rate: f64,
    pub number_of_buffered_calls: usize,
    pub number_of_failed_calls: usize,
    pub max_number_of_buffered_calls: usize,
}

pub struct Circuit {
    name: String,
    failure_rate_threshold: f64,
    wait_duration_in_open: Duration,
    state: CircuitState,
    state_atomic: Arc<AtomicU8>,
    opened_at: Option<Instant>,
    closed_window: RingBitBuffer,
    half_open_window: RingBitBuffer,
    permitted_calls_in_half_open: usize,
}

impl Circuit {
    pub fn new(
        name: String,
        failure_rate_threshold: f64,
        wait_duration_in_open: Duration,
        sliding_window_size: usize,
        permitted_calls_in_half_open: usize,
        state_atomic: Arc<AtomicU8>,
    ) -> Self {
        state_atomic.store(CircuitState::Closed as u8, Ordering::SeqCst);
        Self {
            name,
            failure_rate_threshold,
            wait_duration_in_open,
            state: CircuitState::Closed,
            state_atomic,
            opened_at: None,
            closed_window: RingBitBuffer::new(sliding_window_size),
            half_open_window: RingBitBuffer::new(permitted_calls_in_half_open),
            permitted_calls_in_half_open,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    fn active_window(&self) -> &RingBitBuffer {
        match self.state {
            CircuitState::Closed | CircuitState::Open => &self.closed_window,
            CircuitState::HalfOpen => &self.half_open_window,
        }
    }

    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let window = self.active_window();
        CircuitBreakerMetrics {
            failure_rate: window.failure_rate(),
            number_of_buffered_calls: window.buffered_calls(),
            number_of_failed_calls: window.failed_calls(),
            max_number_of_buffered_calls: window.capacity(),
        }
    }

    /// Returns `true` if a call should proceed. Has the side effect of
    /// transitioning `Open -> HalfOpen` once the open timer has elapsed.
    ///
    /// Resolves the half-open admission question by admitting unlimited
    /// concurrent probes: every caller sees `true` while the half-open
    /// window is accumulating outcomes, and whichever outcomes arrive
    /// first decide the next transition once the window fills.
    pub fn is_call_permitted(&mut self) -> (bool, Option<CircuitBreakerEvent>) {
        match self.state {
            CircuitState::Closed => (true, None),
            CircuitState::HalfOpen => (true, None),
            CircuitState::Open => {
                let opened_at = self.opened_at.expect("Open state always has opened_at");
                if opened_at.elapsed() >= self.wait_duration_in_open {
                    let event = self.transition_to(CircuitState::HalfOpen);
                    (true, Some(event))
                } else {
                    (false, None)
                }
            }
        }
    }

    /// Records a successful outcome in the active window; may trigger
    /// `HalfOpen -> Closed`.
    pub fn record_success(&mut self) -> Option<CircuitBreakerEvent> {
        self.record(false)
    }

    /// Records a failed outcome in the active window; may trigger
    /// `Closed -> Open` or `HalfOpen -> Open`.
    pub fn record_failure(&mut self) -> Option<CircuitBreakerEvent> {
        self.record(true)
    }

    fn record(&mut self, failure: bool) -> Option<CircuitBreakerEvent> {
        match self.state {
            CircuitState::Closed => {
                let result = self.closed_window.record(failure);
                if result.buffered_calls == self.closed_window.capacity() {
                    let rate = (result.failed_calls as f64) / (result.buffered_calls as f64);
                    if rate >= self.failure_rate_threshold {
                        return Some(self.transition_to(CircuitState::Open));
                    }
                }
                None
            }
            CircuitState::Open => {
                // Outcomes recorded while open are accepted per the design
                // but do not influence the open timer; callers are
                // expected not to call this since `is_call_permitted`
                // already returned false.
                self.closed_window.record(failure);
                None
            }
            CircuitState::HalfOpen => {
                let result = self.half_open_window.record(failure);
                if result.buffered_calls == self.permitted_calls_in_half_open {
                    let rate = (result.failed_calls as f64) / (result.buffered_calls as f64);
                    if rate >= self.failure_rate_threshold {
                        Some(self.transition_to(CircuitState::Open))
                    } else {
                        Some(self.transition_to(CircuitState::Closed))
                    }
                } else {
                    None
                }
            }
        }
    }

    fn transition_to(&mut self, to: CircuitState) -> CircuitBreakerEvent {
        let from = self.state;
        self.state = to;
        self.state_atomic.store(to as u8, Ordering::SeqCst);

        match to {
            CircuitState::Open => {
                self.opened_at = Some(Instant::now());
            }
            CircuitState::HalfOpen => {
                self.half_open_window.reset();
            }
            CircuitState::Closed => {
                self.closed_window.reset();
                self.opened_at = None;
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(name = %self.name, ?from, ?to, "circuit breaker state transition");

        CircuitBreakerEvent::StateTransition {
            pattern_name: self.name.clone(),
            timestamp: Instant::now(),
            from,
            to,
        }
    }

    pub fn force_open(&mut self) -> CircuitBreakerEvent {
        self.transition_to(CircuitState::Open)
    }

    pub fn force_half_open(&mut self) -> CircuitBreakerEvent {
        self.transition_to(CircuitState::HalfOpen)
    }

    pub fn force_closed(&mut self) -> CircuitBreakerEvent {
        self.transition_to(CircuitState::Closed)
    }

    pub fn reset(&mut self) -> CircuitBreakerEvent {
        self.closed_window.reset();
        self.half_open_window.reset();
        self.opened_at = None;
        self.transition_to(CircuitState::Closed)
    }
}
