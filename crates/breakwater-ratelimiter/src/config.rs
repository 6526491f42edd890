use std::sync::Arc;
use std::time::Duration;

use breakwater_core::{BoxedEventListener, ConfigurationError, EventListeners, FnListener};

use crate::events::RateLimiterEvent;
use crate::layer::RateLimiterLayer;

/// Immutable configuration for a [`crate::RateLimiter`].
pub struct RateLimiterConfig {
    pub(crate) name: String,
    pub(crate) limit_for_period: usize,
    pub(crate) refresh_period: Duration,
    pub(crate) timeout_duration: Duration,
    pub(crate) event_listeners: EventListeners<RateLimiterEvent>,
}

impl RateLimiterConfig {
    pub fn builder() -> RateLimiterConfigBuilder {
        RateLimiterConfigBuilder::new()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Builder for [`RateLimiterConfig`]. Defaults: `limit_for_period = 50`,
/// `refresh_period = 500ns`, `timeout_duration = 5s`.
pub struct RateLimiterConfigBuilder {
    name: String,
    limit_for_period: usize,
    refresh_period: Duration,
    timeout_duration: Duration,
    event_listeners: EventListeners<RateLimiterEvent>,
}

impl Default for RateLimiterConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiterConfigBuilder {
    pub fn new() -> Self {
        Self {
            name: "<unnamed>".to_string(),
            limit_for_period: 50,
            refresh_period: Duration::from_nanos(500),
            timeout_duration: Duration::from_secs(5),
            event_listeners: EventListeners::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the maximum number of permits available per refresh period.
    pub fn limit_for_period(mut self, limit: usize) -> Self {
        self.limit_for_period = limit;
        self
    }

    /// Sets the duration of one refresh cycle.
    pub fn refresh_period(mut self, duration: Duration) -> Self {
        self.refresh_period = duration;
        self
    }

    /// Sets how long a caller will wait for a permit before being rejected.
    pub fn timeout_duration(mut self, duration: Duration) -> Self {
        self.timeout_duration = duration;
        self
    }

    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&RateLimiterEvent) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(Arc::new(FnListener::new(f)) as BoxedEventListener<RateLimiterEvent>);
        self
    }

    /// Registers an arbitrary listener, e.g. a
    /// [`breakwater_core::CircularEventConsumer`] the caller wants to keep
    /// a handle to for later inspection.
    pub fn add_listener(mut self, listener: BoxedEventListener<RateLimiterEvent>) -> Self {
        self.event_listeners.add(listener);
        self
    }

    /// Validates the configuration and returns the assembled layer, or a
    /// [`ConfigurationError`] describing the first invalid field found.
    pub fn try_build(self) -> Result<RateLimiterLayer, ConfigurationError> {
        if self.limit_for_period == 0 {
            return Err(ConfigurationError::NonPositiveCapacity {
                field: "limit_for_period",
                value: 0,
            });
        }
        if self.refresh_period.is_zero() {
            return Err(ConfigurationError::NonPositiveDuration {
                field: "refresh_period",
                value: self.refresh_period,
            });
        }

        Ok(RateLimiterLayer::new(Arc::new(RateLimiterConfig {
            name: self.name,
            limit_for_period: self.limit_for_period,
            refresh_period: self.refresh_period,
            timeout_duration: self.timeout_duration,
            event_listeners: self.event_listeners,
        })))
    }

    /// Convenience form of [`Self::try_build`] for call sites that would
    /// rather panic on a programmer error than propagate a `Result`.
    pub fn build(self) -> RateLimiterLayer {
        self.try_build().expect("invalid rate limiter configuration")
    }
}
