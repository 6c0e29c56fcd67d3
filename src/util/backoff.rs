//! Bounded Fibonacci backoff for cursor-create under transient backend
//! resource pressure.
//!
//! Retrying indefinitely risks hanging a host operation forever under
//! sustained pressure, so attempts are bounded and exhaustion surfaces
//! [`crate::error::Error::Timeout`], visible to the host's own retry
//! policy rather than silently hanging.

use std::{thread, time::Duration};

use crate::error::Result;

/// Maximum number of attempts before giving up with `Error::Timeout`.
pub const MAX_ATTEMPTS: usize = 16;

/// Ceiling, in milliseconds, on any individual backoff sleep.
pub const MAX_SLEEP_MS: u64 = 8;

/// Fibonacci backoff sequence, capped at [`MAX_SLEEP_MS`].
pub struct Backoff {
    prev: u64,
    curr: u64,
    attempt: usize,
}

impl Backoff {
    pub fn new() -> Backoff {
        Backoff { prev: 0, curr: 1, attempt: 0 }
    }

    /// Sleep for the next backoff interval. Returns `Ok(())` if the caller
    /// may retry, `Err(Error::Timeout)` once [`MAX_ATTEMPTS`] is exceeded.
    pub fn snooze(&mut self) -> Result<()> {
        self.attempt += 1;
        if self.attempt > MAX_ATTEMPTS {
            return err_at!(
                Timeout,
                msg: "exhausted {} cursor-create retries", MAX_ATTEMPTS
            );
        }
        let wait = self.curr.min(MAX_SLEEP_MS);
        thread::sleep(Duration::from_millis(wait));
        let next = self.prev.saturating_add(self.curr).min(MAX_SLEEP_MS);
        self.prev = self.curr;
        self.curr = next;
        Ok(())
    }
}

impl Default for Backoff {
    fn default() -> Backoff {
        Backoff::new()
    }
}

/// Retry `op` with Fibonacci backoff until it succeeds or the retry budget
/// is exhausted. `op` should return `Ok(None)` to request a retry and
/// `Ok(Some(value))`/`Err` to terminate.
pub fn retry<F, T>(mut op: F) -> Result<T>
where
    F: FnMut() -> Result<Option<T>>,
{
    let mut backoff = Backoff::new();
    loop {
        match op()? {
            Some(val) => return Ok(val),
            None => backoff.snooze()?,
        }
    }
}

#[cfg(test)]
#[path = "backoff_test.rs"]
mod backoff_test;
