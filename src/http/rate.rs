//! Transfer rate limiting
//!
//! A token bucket refilled at a fixed bytes-per-second rate. The session
//! charges every read and write against it and sleeps off any deficit, so
//! limited transfers are paced rather than truncated.

use std::thread;
use std::time::{Duration, Instant};

/// Token bucket for one transfer direction
#[derive(Debug)]
pub struct Throttle {
    tokens: f64,
    capacity: f64,
    refill_rate: f64,
    last_refill: Instant,
}

impl Throttle {
    /// Create a throttle allowing `bytes_per_second`, with one second of burst
    pub fn new(bytes_per_second: u64) -> Self {
        let rate = bytes_per_second.max(1) as f64;
        Throttle {
            tokens: rate,
            capacity: rate,
            refill_rate: rate,
            last_refill: Instant::now(),
        }
    }

    /// Largest single read or write that should be attempted
    pub fn max_chunk(&self) -> usize {
        self.capacity as usize
    }

    /// Charge `bytes` against the bucket and return how long to wait
    pub fn charge(&mut self, bytes: usize) -> Duration {
        self.refill();
        self.tokens -= bytes as f64;
        if self.tokens >= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(-self.tokens / self.refill_rate)
    }

    /// Charge `bytes` and sleep until the bucket is back in balance
    pub fn consume(&mut self, bytes: usize) {
        let delay = self.charge(bytes);
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }
}
