//! A fixed-capacity circular bit store used by the circuit breaker to track
//! call outcomes (1 = failure, 0 = success) with O(1) record and
//! popcount-based failure accounting.
//!
//! Correctness under concurrent `record` calls is provided by a mutex
//! guarding a head index, a fill counter, and a bit-packed `Vec<u64>` word
//! array, the simplest correct implementation of a sliding window.
//! 1024 outcomes fit in 16 words.

use std::sync::Mutex;

const WORD_BITS: usize = u64::BITS as usize;

struct State {
    words: Vec<u64>,
    head: usize,
    filled: usize,
    failed: usize,
}

/// A fixed-size FIFO of 1-bit call outcomes.
pub struct RingBitBuffer {
    capacity: usize,
    state: Mutex<State>,
}

/// The counters returned by a single `record` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordResult {
    pub buffered_calls: usize,
    pub failed_calls: usize,
}

impl RingBitBuffer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RingBitBuffer capacity must be > 0");
        let words = (capacity + WORD_BITS - 1) / WORD_BITS;
        Self {
            capacity,
            state: Mutex::new(State {
                words: vec![0u64; words],
                head: 0,
                filled: 0,
                failed: 0,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Writes `failure` at the current head, advances the head modulo
    /// capacity, and returns the post-write counters. The whole
    /// record-and-read cycle is atomic with respect to concurrent callers.
    pub fn record(&self, failure: bool) -> RecordResult {
        let mut s = self.state.lock().expect("ring bit buffer mutex poisoned");
        let idx = s.head;
        let word = idx / WORD_BITS;
        let bit = idx % WORD_BITS;
        let mask = 1u64 << bit;

        let was_full = s.filled == self.capacity;
        let overwritten_failure = was_full && (s.words[word] & mask) != 0;
        if overwritten_failure {
            s.failed -= 1;
        }

        if failure {
            s.words[word] |= mask;
            s.failed += 1;
        } else {
            s.words[word] &= !mask;
        }

        s.head = (idx + 1) % self.capacity;
        if s.filled < self.capacity {
            s.filled += 1;
        }

        RecordResult {
            buffered_calls: s.filled,
            failed_calls: s.failed,
        }
    }

    /// `failed * 100 / buffered` when the buffer is full, `-1.0` otherwise
    /// ("not yet decidable").
    pub fn failure_rate(&self) -> f64 {
        let s = self.state.lock().expect("ring bit buffer mutex poisoned");
        if s.filled < self.capacity {
            return -1.0;
        }
        (s.failed as f64) * 100.0 / (s.filled as f64)
    }

    pub fn buffered_calls(&self) -> usize {
        self.state.lock().expect("ring bit buffer mutex poisoned").filled
    }

    pub fn failed_calls(&self) -> usize {
        self.state.lock().expect("ring bit buffer mutex poisoned").failed
    }

    pub fn is_full(&self) -> bool {
        self.buffered_calls() == self.capacity
    }

    pub fn reset(&self) {
        let mut s = self.state.lock().expect("ring bit buffer mutex poisoned");
        for w in s.words.iter_mut() {
            *w = 0;
        }
        s.head = 0;
        s.filled = 0;
        s.failed = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undecided_until_full() {
        let buf = RingBitBuffer::new(5);
        assert_eq!(buf.failure_rate(), -1.0);
        buf.record(true);
        buf.record(true);
        buf.record(true);
        buf.record(false);
        assert_eq!(buf.failure_rate(), -1.0);
    }

    #[test]
    fn failure_rate_cb1_fffs_s() {
        // F,F,F,S,S -> 60% once full
        let buf = RingBitBuffer::new(5);
        buf.record(true);
        buf.record(true);
        buf.record(true);
        buf.record(false);
        let r = buf.record(false);
        assert_eq!(r.buffered_calls, 5);
        assert_eq!(r.failed_calls, 3);
        assert_eq!(buf.failure_rate(), 60.0);
    }

    #[test]
    fn failure_rate_cb1_reordered() {
        // F,F,S,S,F -> same 60%
        let buf = RingBitBuffer::new(5);
        buf.record(true);
        buf.record(true);
        buf.record(false);
        buf.record(false);
        buf.record(true);
        assert_eq!(buf.failure_rate(), 60.0);
    }

    #[test]
    fn overwrite_oldest_keeps_failed_count_correct() {
        let buf = RingBitBuffer::new(3);
        buf.record(true); // F
        buf.record(true); // F
        buf.record(true); // F -> full, 100%
        assert_eq!(buf.failure_rate(), 100.0);
        // overwrite the oldest failure with a success
        let r = buf.record(false);
        assert_eq!(r.buffered_calls, 3);
        assert_eq!(r.failed_calls, 2);
        assert_eq!(buf.failure_rate(), 200.0 / 3.0);
    }

    #[test]
    fn reset_clears_state() {
        let buf = RingBitBuffer::new(4);
        buf.record(true);
        buf.record(true);
        buf.record(true);
        buf.record(true);
        assert_eq!(buf.failure_rate(), 100.0);
        buf.reset();
        assert_eq!(buf.failure_rate(), -1.0);
        assert_eq!(buf.buffered_calls(), 0);
        assert_eq!(buf.failed_calls(), 0);
    }

    #[test]
    fn large_capacity_spans_multiple_words() {
        let buf = RingBitBuffer::new(130);
        for _ in 0..130 {
            buf.record(false);
        }
        assert_eq!(buf.failure_rate(), 0.0);
        for _ in 0..13 {
            buf.record(true);
        }
        assert_eq!(buf.failure_rate(), 10.0);
    }
}
