//! An optional cross-call cap on the total number of retries a
//! [`crate::Retry`] instance will spend, independent of any single
//! call's `maxAttempts`.
//!
//! This does not change the per-call attempt bound; it only lets many
//! concurrent callers share a ceiling so that a downstream outage
//! cannot turn into a retry storm.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A budget that controls how many retries are allowed across calls.
///
/// Budgets are shared across every clone of a [`crate::Retry`] service.
pub trait RetryBudget: Send + Sync {
    /// Attempts to withdraw one retry token.
    ///
    /// Returns `true` if the retry may proceed, `false` if the budget
    /// is exhausted.
    fn try_withdraw(&self) -> bool;

    /// Deposits one token back, typically after a call succeeds.
    fn deposit(&self);

    /// Current balance, for observability.
    fn balance(&self) -> usize;
}

/// A token-bucket retry budget: a fixed capacity of tokens consumed by
/// retries and replenished by successful calls.
pub struct TokenBucketBudget {
    tokens: AtomicU64,
    max_tokens: u64,
}

impl TokenBucketBudget {
    pub fn new(max_tokens: usize) -> Self {
        Self {
            tokens: AtomicU64::new(max_tokens as u64),
            max_tokens: max_tokens as u64,
        }
    }

    pub fn with_initial(max_tokens: usize, initial_tokens: usize) -> Arc<Self> {
        Arc::new(Self {
            tokens: AtomicU64::new(initial_tokens.min(max_tokens) as u64),
            max_tokens: max_tokens as u64,
        })
    }
}

impl RetryBudget for TokenBucketBudget {
    fn try_withdraw(&self) -> bool {
        loop {
            let current = self.tokens.load(Ordering::Relaxed);
            if current == 0 {
                return false;
            }
            if self
                .tokens
                .compare_exchange_weak(current, current - 1, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
        }
    }

    fn deposit(&self) {
        loop {
            let current = self.tokens.load(Ordering::Relaxed);
            let next = (current + 1).min(self.max_tokens);
            if current == next
                || self
                    .tokens
                    .compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed)
                    .is_ok()
            {
                return;
            }
        }
    }

    fn balance(&self) -> usize {
        self.tokens.load(Ordering::Relaxed) as usize
    }
}
