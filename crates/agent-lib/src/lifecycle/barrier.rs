//! One-shot readiness gate

use parking_lot::{Condvar, Mutex};

/// Result of waiting on a [`ReadinessBarrier`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierOutcome {
    /// The host announced readiness
    Released,
    /// The barrier was abandoned because shutdown began first
    Abandoned,
}

#[derive(Debug, Default)]
struct BarrierState {
    released: bool,
    abandoned: bool,
}

/// Gate that stays closed until the host runtime is ready.
///
/// `release` flips the gate once; later calls are no-ops. `abandon` wakes
/// waiters without releasing so a shutdown that precedes readiness never
/// leaves the worker parked forever.
#[derive(Debug, Default)]
pub struct ReadinessBarrier {
    state: Mutex<BarrierState>,
    cond: Condvar,
}

impl ReadinessBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the gate. Returns `false` if it was already open.
    pub fn release(&self) -> bool {
        let mut state = self.state.lock();
        if state.released {
            return false;
        }
        state.released = true;
        self.cond.notify_all();
        true
    }

    pub fn is_released(&self) -> bool {
        self.state.lock().released
    }

    /// Wake all waiters with [`BarrierOutcome::Abandoned`] unless already released
    pub fn abandon(&self) {
        let mut state = self.state.lock();
        state.abandoned = true;
        self.cond.notify_all();
    }

    /// Block until the gate is released or abandoned.
    ///
    /// Release wins if both happened before the waiter woke up.
    pub fn wait(&self) -> BarrierOutcome {
        let mut state = self.state.lock();
        self.cond.wait_while(&mut state, |s| !s.released && !s.abandoned);
        if state.released {
            BarrierOutcome::Released
        } else {
            BarrierOutcome::Abandoned
        }
    }
}
