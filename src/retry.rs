//! Retry controller
//!
//! Re-runs an operation after transient failures. A failure is retried
//! based on its [`Category`] and the policy switches; a completed response
//! is retried when its status is transient. Waits use exponential backoff
//! (2 s doubling up to 10 minutes) unless a fixed delay is configured, and
//! never extend past the retry deadline. A status turned into an error by
//! `--fail` is final.

use crate::config::RetryPolicy;
use crate::error::{Category, Error, Result};
use crate::http::Status;
use std::thread;
use std::time::{Duration, Instant};
use tracing::warn;

/// Backoff seed; every wait doubles it first, so the first wait is 2 s
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Longest backoff wait
pub const MAX_BACKOFF: Duration = Duration::from_secs(600);

/// How the controller waits between attempts
pub trait Sleep {
    fn sleep(&mut self, duration: Duration);
}

/// Blocks the calling thread
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleep;

impl Sleep for ThreadSleep {
    fn sleep(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Wait sequence between attempts
#[derive(Debug, Clone)]
pub struct Backoff {
    current: Duration,
    fixed: bool,
}

impl Backoff {
    pub fn new(policy: &RetryPolicy) -> Self {
        match policy.delay {
            Some(delay) => Backoff {
                current: delay,
                fixed: true,
            },
            None => Backoff {
                current: INITIAL_BACKOFF,
                fixed: false,
            },
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        if !self.fixed {
            self.current = (self.current * 2).min(MAX_BACKOFF);
        }
        self.current
    }
}

/// Statuses worth another attempt
pub fn is_transient(code: u16) -> bool {
    matches!(code, 408 | 429 | 500 | 502 | 503 | 504)
}

/// Whether `outcome` should be retried under `policy`
pub fn should_retry(policy: &RetryPolicy, outcome: &Result<Status>) -> bool {
    let error = match outcome {
        Ok(status) => return is_transient(status.code()),
        Err(error) => error,
    };

    match error.category() {
        Category::Application | Category::Encoder | Category::OutputSafety => false,
        Category::Cancelled => true,
        _ if policy.all_errors => true,
        Category::Connection => policy.connrefused && error.is_connection_refused(),
        Category::Protocol => false,
    }
}

fn describe(outcome: &Result<Status>) -> String {
    match outcome {
        Ok(status) => format!("HTTP error {}", status.code()),
        Err(Error::HttpStatus(code)) => format!("HTTP error {}", code),
        Err(Error::Http(crate::http::Error::Timeout)) | Err(Error::Net(crate::net::Error::Timeout(_))) => {
            "Timeout".to_string()
        }
        Err(e) => format!("Problem: {}", e),
    }
}

/// Run `op` until it succeeds, fails for good or retries run out
pub fn retry<F>(policy: &RetryPolicy, sleeper: &mut dyn Sleep, mut op: F) -> Result<Status>
where
    F: FnMut() -> Result<Status>,
{
    let deadline = policy.max_time.map(|t| Instant::now() + t);
    let mut retries_left = policy.retries;
    let mut backoff = Backoff::new(policy);

    loop {
        let outcome = op();
        if retries_left == 0 || !should_retry(policy, &outcome) {
            return outcome;
        }

        let mut delay = backoff.next_delay();
        if let Some(deadline) = deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return outcome;
            }
            delay = delay.min(remaining);
        }

        warn!(
            "{}. Will retry in {} seconds. {} retries left.",
            describe(&outcome),
            delay.as_secs(),
            retries_left
        );
        sleeper.sleep(delay);
        retries_left -= 1;
    }
}
