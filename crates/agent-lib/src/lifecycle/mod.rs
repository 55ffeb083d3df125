//! Lifecycle-synchronized periodic sampling
//!
//! This module provides the synchronization core of the agent:
//! - A one-shot readiness barrier released by the host runtime
//! - A shutdown signal with a cancellable bounded wait
//! - The coordinator that owns the single worker thread and joins it on teardown

mod barrier;
mod coordinator;
mod timer;

pub use barrier::{BarrierOutcome, ReadinessBarrier};
pub use coordinator::{LifecycleCoordinator, LifecycleState, SamplingBody, WORKER_THREAD_NAME};
pub use timer::{CancellableTimer, ShutdownSignal, WaitOutcome};
