//! Cooperative cancellation for the walker, the greeting dwell and teardown

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Shared cancellation token.
///
/// Clones observe the same flag. Every sleep in the controller goes through
/// [`Shutdown::sleep`], so triggering wakes all of them at once instead of
/// waiting for the current interval to run out.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Shutdown {
    /// Create an untriggered token
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown and wake every sleeper
    pub fn trigger(&self) {
        let (flag, cvar) = &*self.inner;
        *flag.lock().unwrap_or_else(|e| e.into_inner()) = true;
        cvar.notify_all();
    }

    /// Whether shutdown was requested
    pub fn is_triggered(&self) -> bool {
        let (flag, _) = &*self.inner;
        *flag.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Sleep for `duration` unless shutdown comes first.
    ///
    /// Returns `true` if the full duration elapsed, `false` if woken by
    /// shutdown.
    pub fn sleep(&self, duration: Duration) -> bool {
        let (flag, cvar) = &*self.inner;
        let deadline = Instant::now() + duration;
        let mut triggered = flag.lock().unwrap_or_else(|e| e.into_inner());
        while !*triggered {
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            triggered = match cvar.wait_timeout(triggered, deadline - now) {
                Ok((guard, _)) => guard,
                Err(e) => e.into_inner().0,
            };
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_sleep_runs_to_completion() {
        let shutdown = Shutdown::new();
        let start = Instant::now();
        assert!(shutdown.sleep(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_trigger_wakes_sleeper_promptly() {
        let shutdown = Shutdown::new();
        let sleeper = shutdown.clone();
        let handle = thread::spawn(move || {
            let start = Instant::now();
            let completed = sleeper.sleep(Duration::from_secs(10));
            (completed, start.elapsed())
        });
        thread::sleep(Duration::from_millis(20));
        shutdown.trigger();

        let (completed, elapsed) = handle.join().unwrap();
        assert!(!completed);
        assert!(elapsed < Duration::from_secs(2));
    }

    #[test]
    fn test_sleep_after_trigger_returns_immediately() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        assert!(shutdown.is_triggered());
        assert!(!shutdown.sleep(Duration::from_secs(10)));
    }
}
