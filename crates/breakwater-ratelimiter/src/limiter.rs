//! Lock-free cycle/permission accounting.
//!
//! The world is divided into fixed-length cycles of `refresh_period`.
//! A single `AtomicU64` holds the active cycle number and the active
//! permission count as one packed snapshot; every acquire attempt reads
//! it, computes a candidate next snapshot, and installs it with a CAS
//! loop. Negative permission counts represent reservations already
//! made by callers who are waiting for a future cycle boundary to free
//! up capacity, so no lock and no background refresher thread are
//! needed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

const PERMISSION_BIAS: i64 = 1 << 31;

fn pack(cycle: u32, permissions: i32) -> u64 {
    let biased = (permissions as i64 + PERMISSION_BIAS) as u64;
    ((cycle as u64) << 32) | (biased & 0xFFFF_FFFF)
}

fn unpack(word: u64) -> (u32, i32) {
    let cycle = (word >> 32) as u32;
    let biased = (word & 0xFFFF_FFFF) as i64;
    let permissions = (biased - PERMISSION_BIAS) as i32;
    (cycle, permissions)
}

/// Outcome of one acquire attempt against the packed cycle state.
pub(crate) struct AcquireOutcome {
    /// How long the caller must suspend before the permit is valid.
    /// Zero means the permit was granted immediately.
    pub nanos_to_wait: u64,
}

/// Lock-free limiter state: one `AtomicU64` holding `(active_cycle,
/// active_permissions)`, refreshed lazily on read.
pub(crate) struct LimiterState {
    packed: AtomicU64,
    epoch: Instant,
    refresh_period: Duration,
    limit_for_period: AtomicU64,
}

impl LimiterState {
    pub(crate) fn new(limit_for_period: usize, refresh_period: Duration) -> Self {
        let now_cycle = 0u32;
        Self {
            packed: AtomicU64::new(pack(now_cycle, limit_for_period as i32)),
            epoch: Instant::now(),
            refresh_period,
            limit_for_period: AtomicU64::new(limit_for_period as u64),
        }
    }

    fn current_cycle(&self, now: Instant) -> u32 {
        let elapsed = now.saturating_duration_since(self.epoch).as_nanos();
        let period = self.refresh_period.as_nanos().max(1);
        (elapsed / period) as u32
    }

    fn nanos_until_cycle_end(&self, cycle: u32, now: Instant) -> u64 {
        let period = self.refresh_period.as_nanos().max(1) as u64;
        let cycle_start_nanos = cycle as u64 * period;
        let elapsed_nanos = now.saturating_duration_since(self.epoch).as_nanos() as u64;
        cycle_start_nanos.saturating_add(period).saturating_sub(elapsed_nanos)
    }

    /// Returns `None` if the computed wait would exceed `timeout`; the
    /// caller should reject without attempting the CAS.
    pub(crate) fn try_acquire(&self, timeout: Duration) -> Option<AcquireOutcome> {
        let limit_for_period = self.limit_for_period.load(Ordering::Relaxed) as i32;
        let refresh_period_nanos = self.refresh_period.as_nanos().max(1) as u64;

        loop {
            let now = Instant::now();
            let current_cycle = self.current_cycle(now);
            let s0 = self.packed.load(Ordering::Acquire);
            let (active_cycle, active_permissions) = unpack(s0);

            let (next_permissions, nanos_to_wait) = if current_cycle > active_cycle {
                (limit_for_period - 1, 0u64)
            } else {
                let permissions = active_permissions - 1;
                if permissions >= 0 {
                    (permissions, 0u64)
                } else {
                    let cycles_needed = (-permissions) as u64;
                    let wait = cycles_needed
                        .saturating_mul(refresh_period_nanos)
                        / limit_for_period.max(1) as u64
                        + self.nanos_until_cycle_end(current_cycle, now);
                    (permissions, wait)
                }
            };

            if nanos_to_wait > timeout.as_nanos() as u64 {
                return None;
            }

            let s1 = pack(current_cycle, next_permissions);
            if self
                .packed
                .compare_exchange(s0, s1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Some(AcquireOutcome { nanos_to_wait });
            }
            // CAS lost the race against a concurrent acquirer; retry from
            // a freshly read snapshot and the current instant.
        }
    }

    pub(crate) fn available_permissions(&self) -> i64 {
        let now = Instant::now();
        let current_cycle = self.current_cycle(now);
        let (active_cycle, active_permissions) = unpack(self.packed.load(Ordering::Acquire));
        if current_cycle > active_cycle {
            self.limit_for_period.load(Ordering::Relaxed) as i64
        } else {
            active_permissions as i64
        }
    }

    pub(crate) fn set_limit_for_period(&self, limit: usize) {
        self.limit_for_period.store(limit as u64, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_roundtrip() {
        for cycle in [0u32, 1, 1000, u32::MAX] {
            for permissions in [-1000i32, -1, 0, 1, 50, i32::MAX / 2] {
                let (c, p) = unpack(pack(cycle, permissions));
                assert_eq!(c, cycle);
                assert_eq!(p, permissions);
            }
        }
    }

    #[test]
    fn rl1_three_immediate_then_fourth_rejected() {
        let state = LimiterState::new(3, Duration::from_secs(1));
        for _ in 0..3 {
            let outcome = state.try_acquire(Duration::ZERO).expect("permit available");
            assert_eq!(outcome.nanos_to_wait, 0);
        }
        assert!(state.try_acquire(Duration::ZERO).is_none());
    }

    #[test]
    fn refresh_grants_new_cycle_worth_of_permissions() {
        let state = LimiterState::new(2, Duration::from_millis(20));
        for _ in 0..2 {
            state.try_acquire(Duration::ZERO).expect("permit available");
        }
        assert!(state.try_acquire(Duration::ZERO).is_none());

        std::thread::sleep(Duration::from_millis(30));
        let outcome = state
            .try_acquire(Duration::ZERO)
            .expect("new cycle refreshes permits");
        assert_eq!(outcome.nanos_to_wait, 0);
    }

    #[test]
    fn exhausted_period_computes_nonzero_wait_within_timeout() {
        let state = LimiterState::new(1, Duration::from_millis(50));
        state.try_acquire(Duration::ZERO).expect("first permit free");
        let outcome = state
            .try_acquire(Duration::from_secs(1))
            .expect("second caller waits for next cycle");
        assert!(outcome.nanos_to_wait > 0);
        assert!(outcome.nanos_to_wait <= Duration::from_millis(50).as_nanos() as u64);
    }
}
