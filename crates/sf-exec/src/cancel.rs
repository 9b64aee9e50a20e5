//! Cancellation token and interruptible waits.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Shared cancellation flag. Cancelling wakes every waiter immediately.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelState>,
}

#[derive(Debug, Default)]
struct CancelState {
    cancelled: Mutex<bool>,
    signal: Condvar,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let mut cancelled = self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        *cancelled = true;
        self.inner.signal.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Block for up to `timeout`. Returns `true` if cancelled meanwhile.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let (guard, _) = self
            .inner
            .signal
            .wait_timeout_while(guard, timeout, |cancelled| !*cancelled)
            .unwrap_or_else(|e| e.into_inner());
        *guard
    }
}

/// Timer abstraction driving the poll loop.
pub trait Sleeper: Send + Sync {
    /// Wait for `duration`. Returns `false` if the wait was cut short by `cancel`.
    fn sleep(&self, duration: Duration, cancel: &CancelToken) -> bool;
}

/// Real wait on the current thread, interruptible by the token.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration, cancel: &CancelToken) -> bool {
        !cancel.wait_timeout(duration)
    }
}

/// Returns immediately. Used by the in-process demo executor and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoWaitSleeper;

impl Sleeper for NoWaitSleeper {
    fn sleep(&self, _duration: Duration, cancel: &CancelToken) -> bool {
        !cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn cancel_wakes_a_long_wait() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let started = Instant::now();

        let handle = thread::spawn(move || ThreadSleeper.sleep(Duration::from_secs(30), &waiter));
        thread::sleep(Duration::from_millis(20));
        token.cancel();

        let completed = handle.join().unwrap();
        assert!(!completed);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn uncancelled_wait_runs_to_completion() {
        let token = CancelToken::new();
        assert!(ThreadSleeper.sleep(Duration::from_millis(5), &token));
        assert!(NoWaitSleeper.sleep(Duration::from_secs(60), &token));
    }
}
