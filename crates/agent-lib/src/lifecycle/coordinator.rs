//! Lifecycle coordinator
//!
//! Sequences host readiness, the sampling loop and shutdown across three
//! threads: the control thread that starts and stops the agent, the host's
//! callback thread, and the single worker thread.
//!
//! ```text
//! Created -> AwaitingReady -> Sampling -> Stopping -> Joined
//!                  \_____________________/
//!                   shutdown before ready
//! ```

use super::barrier::{BarrierOutcome, ReadinessBarrier};
use super::timer::{CancellableTimer, ShutdownSignal, WaitOutcome};
use crate::error::{AgentError, Result};
use crate::host::{HostRuntime, ThreadContext};
use crate::observability::{AgentMetrics, StructuredLogger, TickStage};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Name given to the sampling thread
pub const WORKER_THREAD_NAME: &str = "memlog-worker";

/// Work performed on every tick, owned by the worker thread
pub trait SamplingBody: Send + 'static {
    type Sample: Send;

    /// Take one sample
    fn collect(&mut self) -> Result<Self::Sample>;

    /// Persist a sample; ownership moves to the sink
    fn write(&mut self, sample: Self::Sample) -> Result<()>;

    /// Delay before the next tick
    fn next_delay(&mut self) -> Duration;

    /// Release resources once the loop has ended
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    AwaitingReady,
    Sampling,
    Stopping,
    Joined,
}

#[derive(Debug)]
struct StateCell(Mutex<LifecycleState>);

impl StateCell {
    fn get(&self) -> LifecycleState {
        *self.0.lock()
    }

    fn set(&self, next: LifecycleState) {
        *self.0.lock() = next;
    }

    /// Move `from -> to`; fails if another thread already moved the state on
    fn advance(&self, from: LifecycleState, to: LifecycleState) -> bool {
        let mut state = self.0.lock();
        if *state != from {
            return false;
        }
        *state = to;
        true
    }
}

/// Owns the readiness barrier, the shutdown signal and the worker thread
pub struct LifecycleCoordinator {
    barrier: Arc<ReadinessBarrier>,
    signal: ShutdownSignal,
    state: Arc<StateCell>,
    worker: Option<JoinHandle<()>>,
    worker_id: ThreadId,
    /// Set by the worker as the last step of its run
    finished: Arc<AtomicBool>,
    logger: StructuredLogger,
}

impl LifecycleCoordinator {
    /// Register for readiness and start the worker parked on the barrier.
    ///
    /// Returns without waiting for the host. Registration failure is
    /// returned before any thread exists.
    pub fn start<B: SamplingBody>(
        host: Arc<dyn HostRuntime>,
        body: B,
        logger: StructuredLogger,
        metrics: AgentMetrics,
    ) -> Result<Self> {
        let barrier = Arc::new(ReadinessBarrier::new());
        let signal = ShutdownSignal::new();
        let state = Arc::new(StateCell(Mutex::new(LifecycleState::Created)));
        let finished = Arc::new(AtomicBool::new(false));

        let ready_barrier = Arc::clone(&barrier);
        let ready_logger = logger.clone();
        host.on_ready(Box::new(move || {
            if ready_barrier.release() {
                ready_logger.log_initialized();
            } else {
                ready_logger.log_duplicate_ready();
            }
        }))?;

        let worker = Worker {
            host,
            body,
            barrier: Arc::clone(&barrier),
            signal: signal.clone(),
            timer: signal.timer(),
            state: Arc::clone(&state),
            logger: logger.clone(),
            metrics,
            finished: Arc::clone(&finished),
            ticks: 0,
        };

        state.set(LifecycleState::AwaitingReady);
        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || worker.run())
            .map_err(AgentError::Spawn)?;
        let worker_id = handle.thread().id();

        debug!(?worker_id, "Sampling worker started");

        Ok(Self {
            barrier,
            signal,
            state,
            worker: Some(handle),
            worker_id,
            finished,
            logger,
        })
    }

    pub fn state(&self) -> LifecycleState {
        self.state.get()
    }

    pub fn worker_thread_id(&self) -> ThreadId {
        self.worker_id
    }

    /// True once the host has announced readiness
    pub fn is_ready(&self) -> bool {
        self.barrier.is_released()
    }

    /// True once the worker has run to completion, including detach and close
    pub fn is_worker_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Signal shutdown and join the worker.
    ///
    /// An in-flight collect or write completes; only the next wait is cut
    /// short. Blocks until the worker has exited, so nothing is written
    /// after this returns. Calling it again is a no-op.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.worker.is_none() {
            return Ok(());
        }

        let before_ready = !self.barrier.is_released();
        self.state.set(LifecycleState::Stopping);
        if self.signal.trigger() {
            self.logger.log_shutdown_requested(before_ready);
        }
        self.barrier.abandon();

        if thread::current().id() == self.worker_id {
            return Err(AgentError::SelfJoin);
        }

        let joined = match self.worker.take() {
            Some(handle) => handle.join(),
            None => Ok(()),
        };
        self.state.set(LifecycleState::Joined);

        joined.map_err(|_| AgentError::WorkerPanicked)
    }
}

impl Drop for LifecycleCoordinator {
    fn drop(&mut self) {
        match self.shutdown() {
            Ok(()) => {}
            Err(AgentError::SelfJoin) => {
                error!("Coordinator dropped on its own worker thread; worker left detached");
            }
            Err(e) => warn!(error = %e, "Worker did not shut down cleanly"),
        }
    }
}

/// State moved onto the worker thread
struct Worker<B: SamplingBody> {
    host: Arc<dyn HostRuntime>,
    body: B,
    barrier: Arc<ReadinessBarrier>,
    signal: ShutdownSignal,
    timer: CancellableTimer,
    state: Arc<StateCell>,
    logger: StructuredLogger,
    metrics: AgentMetrics,
    finished: Arc<AtomicBool>,
    ticks: u64,
}

impl<B: SamplingBody> Worker<B> {
    fn run(mut self) {
        // Thread-local host attachment; never leaves this thread
        let mut context: Option<Box<dyn ThreadContext>> = None;

        if self.barrier.wait() == BarrierOutcome::Abandoned {
            debug!("Shutdown requested before host readiness");
            self.finish(context);
            return;
        }

        // Readiness and shutdown may both have happened; shutdown wins.
        if self.signal.is_stopping()
            || !self
                .state
                .advance(LifecycleState::AwaitingReady, LifecycleState::Sampling)
        {
            self.finish(context);
            return;
        }

        loop {
            self.tick(&mut context);
            let delay = self.body.next_delay();
            if self.timer.wait(delay) == WaitOutcome::Cancelled {
                break;
            }
        }

        self.finish(context);
    }

    fn tick(&mut self, context: &mut Option<Box<dyn ThreadContext>>) {
        self.ticks += 1;
        self.metrics.inc_ticks();

        if context.is_none() {
            match self.host.attach_current_thread() {
                Ok(attached) => *context = Some(attached),
                Err(e) => {
                    self.fail(TickStage::Attach, &e);
                    return;
                }
            }
        }

        let started = Instant::now();
        let sample = match self.body.collect() {
            Ok(sample) => sample,
            Err(e) => {
                self.fail(TickStage::Collect, &e);
                return;
            }
        };
        let collection_time = started.elapsed();
        self.metrics.observe_collection_latency(collection_time);

        match self.body.write(sample) {
            Ok(()) => {
                self.metrics.inc_samples_written();
                self.logger.log_sample_written(self.ticks, collection_time);
            }
            Err(e) => self.fail(TickStage::Write, &e),
        }
    }

    fn fail(&self, stage: TickStage, error: &AgentError) {
        self.metrics.inc_tick_error(stage);
        self.logger.log_tick_failed(self.ticks, stage, error);
    }

    fn finish(&mut self, context: Option<Box<dyn ThreadContext>>) {
        if let Some(context) = context {
            if let Err(e) = context.detach() {
                self.fail(TickStage::Detach, &e);
            }
        }
        if let Err(e) = self.body.close() {
            self.fail(TickStage::Close, &e);
        }
        self.logger.log_worker_exit(self.ticks);
        self.finished.store(true, Ordering::Release);
    }
}
