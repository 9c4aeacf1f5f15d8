//! Per-cycle interruption checks and retried remote calls.

use crate::config::RetryConfig;
use crate::error::{SyncError, SyncResult};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

/// Cancellation flag, deadline and retry policy for one cycle.
pub(crate) struct CycleGuard<'a> {
    cancelled: &'a AtomicBool,
    deadline: Option<Instant>,
    retry: &'a RetryConfig,
    retries: AtomicU64,
}

impl<'a> CycleGuard<'a> {
    pub(crate) fn new(cancelled: &'a AtomicBool, timeout: Option<Duration>, retry: &'a RetryConfig) -> Self {
        Self {
            cancelled,
            deadline: timeout.map(|t| Instant::now() + t),
            retry,
            retries: AtomicU64::new(0),
        }
    }

    /// Fails with `Cancelled` or `Timeout` once either condition holds.
    pub(crate) fn check(&self) -> SyncResult<()> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(SyncError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(SyncError::Timeout),
            _ => Ok(()),
        }
    }

    /// Runs `op`, retrying retryable failures with backoff.
    pub(crate) fn call<T>(&self, what: &str, mut op: impl FnMut() -> SyncResult<T>) -> SyncResult<T> {
        let mut attempt = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt + 1 < self.retry.max_attempts => {
                    attempt += 1;
                    self.retries.fetch_add(1, Ordering::Relaxed);
                    let delay = self.retry.delay_for_attempt(attempt);
                    debug!(call = what, attempt, error = %e, delay_ms = delay.as_millis() as u64, "retrying remote call");
                    self.sleep(delay);
                    self.check()?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Retries performed so far.
    pub(crate) fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    fn sleep(&self, delay: Duration) {
        let delay = match self.deadline {
            Some(deadline) => delay.min(deadline.saturating_duration_since(Instant::now())),
            None => delay,
        };
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn fast_retry(attempts: u32) -> RetryConfig {
        RetryConfig::new(attempts)
            .with_initial_delay(Duration::ZERO)
            .with_jitter(false)
    }

    #[test]
    fn retries_until_success() {
        let flag = AtomicBool::new(false);
        let retry = fast_retry(3);
        let guard = CycleGuard::new(&flag, None, &retry);
        let calls = Cell::new(0);

        let value = guard
            .call("test", || {
                calls.set(calls.get() + 1);
                if calls.get() < 3 {
                    Err(SyncError::remote_retryable("busy"))
                } else {
                    Ok(7)
                }
            })
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(guard.retries(), 2);
    }

    #[test]
    fn fatal_errors_are_not_retried() {
        let flag = AtomicBool::new(false);
        let retry = fast_retry(5);
        let guard = CycleGuard::new(&flag, None, &retry);
        let calls = Cell::new(0);

        let result: SyncResult<()> = guard.call("test", || {
            calls.set(calls.get() + 1);
            Err(SyncError::remote_fatal("bad request"))
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn attempts_are_bounded() {
        let flag = AtomicBool::new(false);
        let retry = fast_retry(2);
        let guard = CycleGuard::new(&flag, None, &retry);
        let calls = Cell::new(0);

        let result: SyncResult<()> = guard.call("test", || {
            calls.set(calls.get() + 1);
            Err(SyncError::remote_retryable("busy"))
        });
        assert!(result.unwrap_err().is_retryable());
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn cancel_and_deadline() {
        let flag = AtomicBool::new(false);
        let retry = fast_retry(1);
        let guard = CycleGuard::new(&flag, None, &retry);
        assert!(guard.check().is_ok());
        flag.store(true, Ordering::SeqCst);
        assert!(matches!(guard.check(), Err(SyncError::Cancelled)));

        let flag = AtomicBool::new(false);
        let expired = CycleGuard::new(&flag, Some(Duration::ZERO), &retry);
        assert!(matches!(expired.check(), Err(SyncError::Timeout)));
    }
}
