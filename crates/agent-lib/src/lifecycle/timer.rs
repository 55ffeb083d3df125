//! Shutdown signal and the interruptible sleep built on it

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Outcome of a [`CancellableTimer::wait`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The full duration passed without a shutdown request
    Elapsed,
    /// Shutdown was requested before or during the wait
    Cancelled,
}

#[derive(Debug, Default)]
struct SignalInner {
    stopping: Mutex<bool>,
    cond: Condvar,
}

/// Level-triggered `running -> stopping` flag.
///
/// Clones share the same flag. The transition is one-way.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    inner: Arc<SignalInner>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move to `stopping` and wake every waiter. Returns `false` if already stopping.
    pub fn trigger(&self) -> bool {
        let mut stopping = self.inner.stopping.lock();
        if *stopping {
            return false;
        }
        *stopping = true;
        self.inner.cond.notify_all();
        true
    }

    pub fn is_stopping(&self) -> bool {
        *self.inner.stopping.lock()
    }

    /// Timer that sleeps against this signal
    pub fn timer(&self) -> CancellableTimer {
        CancellableTimer {
            signal: self.clone(),
        }
    }
}

/// Bounded sleep that returns early once shutdown is signalled.
///
/// This is the single suspension primitive used between ticks; it parks on
/// a condition variable and never spins.
#[derive(Debug, Clone)]
pub struct CancellableTimer {
    signal: ShutdownSignal,
}

impl CancellableTimer {
    pub fn wait(&self, duration: Duration) -> WaitOutcome {
        let inner = &self.signal.inner;
        let mut stopping = inner.stopping.lock();
        if *stopping {
            return WaitOutcome::Cancelled;
        }

        // Spurious wakeups are absorbed by re-waiting until the deadline.
        let deadline = Instant::now().checked_add(duration);
        match deadline {
            Some(deadline) => {
                inner
                    .cond
                    .wait_while_until(&mut stopping, |s| !*s, deadline);
            }
            None => {
                inner.cond.wait_while(&mut stopping, |s| !*s);
            }
        }

        if *stopping {
            WaitOutcome::Cancelled
        } else {
            WaitOutcome::Elapsed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_wait_elapses_without_signal() {
        let signal = ShutdownSignal::new();
        let start = Instant::now();

        let outcome = signal.timer().wait(Duration::from_millis(30));

        assert_eq!(outcome, WaitOutcome::Elapsed);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_wait_returns_immediately_when_already_stopping() {
        let signal = ShutdownSignal::new();
        signal.trigger();
        let start = Instant::now();

        let outcome = signal.timer().wait(Duration::from_secs(60));

        assert_eq!(outcome, WaitOutcome::Cancelled);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_trigger_interrupts_long_wait() {
        let signal = ShutdownSignal::new();
        let timer = signal.timer();
        let waiter = thread::spawn(move || {
            let start = Instant::now();
            (timer.wait(Duration::from_secs(60)), start.elapsed())
        });

        thread::sleep(Duration::from_millis(20));
        assert!(signal.trigger());

        let (outcome, elapsed) = waiter.join().unwrap();
        assert_eq!(outcome, WaitOutcome::Cancelled);
        assert!(elapsed < Duration::from_secs(5));
    }

    #[test]
    fn test_trigger_is_one_way() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_stopping());
        assert!(signal.trigger());
        assert!(!signal.trigger());
        assert!(signal.clone().is_stopping());
    }

    #[test]
    fn test_zero_duration_elapses() {
        let signal = ShutdownSignal::new();
        assert_eq!(signal.timer().wait(Duration::ZERO), WaitOutcome::Elapsed);
    }
}
