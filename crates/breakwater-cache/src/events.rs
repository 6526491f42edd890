use std::time::Instant;

use breakwater_core::ResilienceEvent;

/// Events emitted by [`crate::Cache`].
#[derive(Debug, Clone)]
pub enum CacheEvent {
    /// A requested key was already present in the store.
    Hit { pattern_name: String, timestamp: Instant },
    /// A requested key was absent; the inner service was called.
    Miss { pattern_name: String, timestamp: Instant },
}

impl ResilienceEvent for CacheEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CacheEvent::Hit { .. } => "hit",
            CacheEvent::Miss { .. } => "miss",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CacheEvent::Hit { timestamp, .. } | CacheEvent::Miss { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            CacheEvent::Hit { pattern_name, .. } | CacheEvent::Miss { pattern_name, .. } => pattern_name,
        }
    }
}
