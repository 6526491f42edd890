use std::sync::Arc;
use std::time::Duration;

use breakwater_core::{BoxedEventListener, ConfigurationError, EventListeners, FnListener};

use crate::events::CircuitBreakerEvent;
use crate::layer::CircuitBreakerLayer;

/// Decides, for a given error, whether it should be recorded as a failure
/// in the sliding window. Consulted only on the error path, defaulting to
/// "every error counts as a failure".
pub type FailurePredicate<Err> = Arc<dyn Fn(&Err) -> bool + Send + Sync>;

/// Immutable configuration for a [`crate::CircuitBreaker`].
pub struct CircuitBreakerConfig<Err> {
    pub(crate) name: String,
    pub(crate) failure_rate_threshold: f64,
    pub(crate) wait_duration_in_open: Duration,
    pub(crate) sliding_window_size: usize,
    pub(crate) permitted_calls_in_half_open: usize,
    pub(crate) failure_predicate: FailurePredicate<Err>,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
}

impl<Err> CircuitBreakerConfig<Err>
where
    Err: Send + Sync + 'static,
{
    pub fn builder() -> CircuitBreakerConfigBuilder<Err> {
        CircuitBreakerConfigBuilder::new()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Builder for [`CircuitBreakerConfig`]. Defaults: 0.5 failure rate
/// threshold, 100-call closed window, 60s open wait, 10-call half-open
/// window.
///
/// `failure_rate_threshold` is a fraction in `(0.0, 1.0]`, not a percent:
/// pass `0.5` for "50% of calls", not `50.0`.
pub struct CircuitBreakerConfigBuilder<Err> {
    name: String,
    failure_rate_threshold: f64,
    wait_duration_in_open: Duration,
    sliding_window_size: usize,
    permitted_calls_in_half_open: usize,
    failure_predicate: FailurePredicate<Err>,
    event_listeners: EventListeners<CircuitBreakerEvent>,
}

impl<Err> Default for CircuitBreakerConfigBuilder<Err>
where
    Err: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<Err> CircuitBreakerConfigBuilder<Err>
where
    Err: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            name: "<unnamed>".to_string(),
            failure_rate_threshold: 0.5,
            wait_duration_in_open: Duration::from_secs(60),
            sliding_window_size: 100,
            permitted_calls_in_half_open: 10,
            failure_predicate: Arc::new(|_err: &Err| true),
            event_listeners: EventListeners::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Fraction of calls in the window that must fail to trip the
    /// circuit, e.g. `0.5` for 50%. Must be in `(0.0, 1.0]`; `try_build`
    /// rejects anything else, including a percent value like `50.0`.
    pub fn failure_rate_threshold(mut self, threshold: f64) -> Self {
        self.failure_rate_threshold = threshold;
        self
    }

    pub fn wait_duration_in_open(mut self, duration: Duration) -> Self {
        self.wait_duration_in_open = duration;
        self
    }

    pub fn sliding_window_size(mut self, size: usize) -> Self {
        self.sliding_window_size = size;
        self
    }

    pub fn permitted_calls_in_half_open(mut self, count: usize) -> Self {
        self.permitted_calls_in_half_open = count;
        self
    }

    /// Overrides the default "every error is a failure" classification.
    pub fn failure_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Err) -> bool + Send + Sync + 'static,
    {
        self.failure_predicate = Arc::new(predicate);
        self
    }

    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(&CircuitBreakerEvent) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(Arc::new(FnListener::new(f)) as BoxedEventListener<CircuitBreakerEvent>);
        self
    }

    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&CircuitBreakerEvent) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(Arc::new(FnListener::new(f)) as BoxedEventListener<CircuitBreakerEvent>);
        self
    }

    /// Registers an arbitrary listener, e.g. a [`breakwater_core::CircularEventConsumer`]
    /// the caller wants to keep a handle to for later inspection.
    pub fn add_listener(mut self, listener: BoxedEventListener<CircuitBreakerEvent>) -> Self {
        self.event_listeners.add(listener);
        self
    }

    /// Validates the configuration and returns the assembled layer, or a
    /// [`ConfigurationError`] describing the first invalid field found.
    pub fn try_build(self) -> Result<CircuitBreakerLayer<Err>, ConfigurationError> {
        if !(self.failure_rate_threshold > 0.0 && self.failure_rate_threshold <= 1.0) {
            return Err(ConfigurationError::ThresholdOutOfRange {
                field: "failure_rate_threshold",
                value: self.failure_rate_threshold,
            });
        }
        if self.wait_duration_in_open.is_zero() {
            return Err(ConfigurationError::NonPositiveDuration {
                field: "wait_duration_in_open",
                value: self.wait_duration_in_open,
            });
        }
        if self.sliding_window_size == 0 {
            return Err(ConfigurationError::NonPositiveCapacity {
                field: "sliding_window_size",
                value: 0,
            });
        }
        if self.permitted_calls_in_half_open == 0 {
            return Err(ConfigurationError::NonPositiveCapacity {
                field: "permitted_calls_in_half_open",
                value: 0,
            });
        }

        Ok(CircuitBreakerLayer::new(Arc::new(CircuitBreakerConfig {
            name: self.name,
            failure_rate_threshold: self.failure_rate_threshold,
            wait_duration_in_open: self.wait_duration_in_open,
            sliding_window_size: self.sliding_window_size,
            permitted_calls_in_half_open: self.permitted_calls_in_half_open,
            failure_predicate: self.failure_predicate,
            event_listeners: self.event_listeners,
        })))
    }

    /// Convenience form of [`Self::try_build`] for call sites that would
    /// rather panic on a programmer error (an invalid literal constant)
    /// than propagate a `Result`.
    pub fn build(self) -> CircuitBreakerLayer<Err> {
        self.try_build().expect("invalid circuit breaker configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_threshold_out_of_range() {
        let result = CircuitBreakerConfig::<()>::builder()
            .failure_rate_threshold(0.0)
            .try_build();
        assert!(matches!(
            result,
            Err(ConfigurationError::ThresholdOutOfRange { .. })
        ));
    }

    #[test]
    fn rejects_zero_sliding_window() {
        let result = CircuitBreakerConfig::<()>::builder()
            .sliding_window_size(0)
            .try_build();
        assert!(matches!(
            result,
            Err(ConfigurationError::NonPositiveCapacity { .. })
        ));
    }

    #[test]
    fn builds_with_defaults() {
        let layer = CircuitBreakerConfig::<()>::builder().name("svc").build();
        let _ = layer;
    }
}
