use std::time::Instant;

use breakwater_core::ResilienceEvent;

/// A lifecycle event emitted by a [`crate::RateLimiter`].
#[derive(Debug, Clone)]
pub enum RateLimiterEvent {
    /// A permit was acquired, possibly after waiting.
    SuccessfulAcquire {
        pattern_name: String,
        timestamp: Instant,
        wait_duration: std::time::Duration,
    },
    /// A permit could not be acquired within the configured timeout.
    FailedAcquire {
        pattern_name: String,
        timestamp: Instant,
        timeout_duration: std::time::Duration,
    },
}

impl ResilienceEvent for RateLimiterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RateLimiterEvent::SuccessfulAcquire { .. } => "successful_acquire",
            RateLimiterEvent::FailedAcquire { .. } => "failed_acquire",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RateLimiterEvent::SuccessfulAcquire { timestamp, .. }
            | RateLimiterEvent::FailedAcquire { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            RateLimiterEvent::SuccessfulAcquire { pattern_name, .. }
            | RateLimiterEvent::FailedAcquire { pattern_name, .. } => pattern_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_matches_variant() {
        let e = RateLimiterEvent::FailedAcquire {
            pattern_name: "svc".into(),
            timestamp: Instant::now(),
            timeout_duration: std::time::Duration::from_millis(5),
        };
        assert_eq!(e.event_type(), "failed_acquire");
        assert_eq!(e.pattern_name(), "svc");
    }
}
