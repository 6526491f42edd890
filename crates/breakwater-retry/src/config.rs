use std::sync::Arc;
use std::time::Duration;

use breakwater_core::{BoxedEventListener, ConfigurationError, EventListeners, FnListener};

use crate::budget::RetryBudget;
use crate::events::RetryEvent;
use crate::layer::RetryLayer;

/// Source for determining the maximum number of attempts for a call.
///
/// Mirrors spec.md's fixed `maxAttempts` while also allowing a
/// per-request override, a strict superset that costs nothing when
/// unused.
#[derive(Clone)]
pub enum MaxAttemptsSource<Req> {
    /// Fixed max attempts for every call.
    Fixed(usize),
    /// Max attempts computed from the request.
    Dynamic(Arc<dyn Fn(&Req) -> usize + Send + Sync>),
}

impl<Req> MaxAttemptsSource<Req> {
    pub fn get_max_attempts(&self, req: &Req) -> usize {
        match self {
            MaxAttemptsSource::Fixed(n) => *n,
            MaxAttemptsSource::Dynamic(f) => f(req),
        }
    }
}

impl<Req> Default for MaxAttemptsSource<Req> {
    fn default() -> Self {
        MaxAttemptsSource::Fixed(3)
    }
}

type RetryOnError<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;
type RetryOnResult<Res> = Arc<dyn Fn(&Res) -> bool + Send + Sync>;

fn always_true<T>(_: &T) -> bool {
    true
}

/// Immutable configuration for a [`crate::Retry`].
pub struct RetryConfig<Req, Res, E> {
    pub(crate) name: String,
    pub(crate) max_attempts: MaxAttemptsSource<Req>,
    pub(crate) wait_duration: Duration,
    pub(crate) retry_on_error: RetryOnError<E>,
    pub(crate) retry_on_result: Option<RetryOnResult<Res>>,
    pub(crate) budget: Option<Arc<dyn RetryBudget>>,
    pub(crate) event_listeners: EventListeners<RetryEvent>,
}

impl<Req, Res, E> RetryConfig<Req, Res, E> {
    pub fn builder() -> RetryConfigBuilder<Req, Res, E> {
        RetryConfigBuilder::new()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Builder for [`RetryConfig`]. Defaults: `max_attempts = 3`,
/// `wait_duration = 500ms`, `retry_on_error` always true,
/// `retry_on_result = None`, `budget = None` (unlimited).
pub struct RetryConfigBuilder<Req, Res, E> {
    name: String,
    max_attempts: MaxAttemptsSource<Req>,
    wait_duration: Duration,
    retry_on_error: RetryOnError<E>,
    retry_on_result: Option<RetryOnResult<Res>>,
    budget: Option<Arc<dyn RetryBudget>>,
    event_listeners: EventListeners<RetryEvent>,
}

impl<Req, Res, E> Default for RetryConfigBuilder<Req, Res, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Req, Res, E> RetryConfigBuilder<Req, Res, E> {
    pub fn new() -> Self {
        Self {
            name: "<unnamed>".to_string(),
            max_attempts: MaxAttemptsSource::default(),
            wait_duration: Duration::from_millis(500),
            retry_on_error: Arc::new(always_true),
            retry_on_result: None,
            budget: None,
            event_listeners: EventListeners::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets a fixed maximum number of attempts for every call,
    /// including the initial one.
    pub fn max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = MaxAttemptsSource::Fixed(max_attempts);
        self
    }

    /// Sets a per-request maximum-attempts extractor.
    pub fn max_attempts_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&Req) -> usize + Send + Sync + 'static,
    {
        self.max_attempts = MaxAttemptsSource::Dynamic(Arc::new(f));
        self
    }

    /// Sets the fixed inter-attempt wait.
    pub fn wait_duration(mut self, duration: Duration) -> Self {
        self.wait_duration = duration;
        self
    }

    /// Sets a predicate deciding whether an error should be retried.
    pub fn retry_on_error<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.retry_on_error = Arc::new(predicate);
        self
    }

    /// Sets a predicate deciding whether a successful value should
    /// still be retried (e.g. a soft-failure payload carried in a 200).
    pub fn retry_on_result<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Res) -> bool + Send + Sync + 'static,
    {
        self.retry_on_result = Some(Arc::new(predicate));
        self
    }

    /// Caps the total number of retries spent across all calls sharing
    /// this configuration.
    pub fn budget(mut self, budget: Arc<dyn RetryBudget>) -> Self {
        self.budget = Some(budget);
        self
    }

    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&RetryEvent) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(Arc::new(FnListener::new(f)) as BoxedEventListener<RetryEvent>);
        self
    }

    pub fn add_listener(mut self, listener: BoxedEventListener<RetryEvent>) -> Self {
        self.event_listeners.add(listener);
        self
    }

    /// Validates the configuration and returns the assembled layer, or
    /// a [`ConfigurationError`] describing the first invalid field
    /// found.
    pub fn try_build(self) -> Result<RetryLayer<Req, Res, E>, ConfigurationError> {
        if let MaxAttemptsSource::Fixed(0) = self.max_attempts {
            return Err(ConfigurationError::NonPositiveCapacity {
                field: "max_attempts",
                value: 0,
            });
        }

        Ok(RetryLayer::new(Arc::new(RetryConfig {
            name: self.name,
            max_attempts: self.max_attempts,
            wait_duration: self.wait_duration,
            retry_on_error: self.retry_on_error,
            retry_on_result: self.retry_on_result,
            budget: self.budget,
            event_listeners: self.event_listeners,
        })))
    }

    /// Convenience form of [`Self::try_build`] for call sites that
    /// would rather panic on a programmer error than propagate a
    /// `Result`.
    pub fn build(self) -> RetryLayer<Req, Res, E> {
        self.try_build().expect("invalid retry configuration")
    }
}
