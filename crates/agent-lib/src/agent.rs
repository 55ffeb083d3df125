//! The memlog agent
//!
//! Wires configuration, collectors, the sample log and the lifecycle
//! coordinator together. Attaching returns immediately; sampling begins
//! once the host reports readiness and stops when the agent is detached.

use crate::collector::{ProcStatusCollector, RuntimeMemoryCollector, SnapshotCollector};
use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::host::HostRuntime;
use crate::lifecycle::{LifecycleCoordinator, LifecycleState, SamplingBody};
use crate::models::SampleRecord;
use crate::observability::{AgentMetrics, StructuredLogger};
use crate::schedule::Scheduler;
use crate::sink::{JsonArraySink, LogSink};
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::Duration;

/// Per-tick work: one OS snapshot, one runtime snapshot, one record
pub struct MemlogBody {
    os: Box<dyn SnapshotCollector>,
    runtime: Box<dyn SnapshotCollector>,
    sink: Box<dyn LogSink>,
    scheduler: Scheduler,
}

impl MemlogBody {
    pub fn new(
        os: Box<dyn SnapshotCollector>,
        runtime: Box<dyn SnapshotCollector>,
        sink: Box<dyn LogSink>,
        scheduler: Scheduler,
    ) -> Self {
        Self {
            os,
            runtime,
            sink,
            scheduler,
        }
    }
}

impl SamplingBody for MemlogBody {
    type Sample = SampleRecord;

    fn collect(&mut self) -> Result<SampleRecord> {
        let os = self.os.collect()?;
        let runtime = self.runtime.collect()?;
        Ok(SampleRecord::new(os, runtime))
    }

    fn write(&mut self, sample: SampleRecord) -> Result<()> {
        self.sink.write(&sample)
    }

    fn next_delay(&mut self) -> Duration {
        self.scheduler.next_delay()
    }

    fn close(&mut self) -> Result<()> {
        self.sink.close()
    }
}

/// Builder for attaching an agent with custom collectors or sink
pub struct AgentBuilder {
    config: AgentConfig,
    host: Option<Arc<dyn HostRuntime>>,
    os_collector: Option<Box<dyn SnapshotCollector>>,
    runtime_collector: Option<Box<dyn SnapshotCollector>>,
    sink: Option<Box<dyn LogSink>>,
}

impl AgentBuilder {
    pub fn new(config: AgentConfig) -> Self {
        Self {
            config,
            host: None,
            os_collector: None,
            runtime_collector: None,
            sink: None,
        }
    }

    /// Set the host runtime
    pub fn host(mut self, host: Arc<dyn HostRuntime>) -> Self {
        self.host = Some(host);
        self
    }

    /// Replace the `/proc/self/status` collector
    pub fn os_collector(mut self, collector: impl SnapshotCollector + 'static) -> Self {
        self.os_collector = Some(Box::new(collector));
        self
    }

    /// Replace the host memory pool collector
    pub fn runtime_collector(mut self, collector: impl SnapshotCollector + 'static) -> Self {
        self.runtime_collector = Some(Box::new(collector));
        self
    }

    /// Replace the JSON file sink; `output_path` is then not opened
    pub fn sink(mut self, sink: impl LogSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Validate, open the log and start the worker.
    ///
    /// Configuration errors are reported before any file is opened or
    /// thread started.
    pub fn attach(self) -> Result<Agent> {
        let scheduler = self.config.validate()?;
        let host = self
            .host
            .ok_or_else(|| AgentError::Config("host runtime is required".to_string()))?;

        let sink = match self.sink {
            Some(sink) => sink,
            None => Box::new(JsonArraySink::create(&self.config.output_path)?),
        };
        let os = self
            .os_collector
            .unwrap_or_else(|| Box::new(ProcStatusCollector::new()));
        let runtime = self
            .runtime_collector
            .unwrap_or_else(|| Box::new(RuntimeMemoryCollector::new(Arc::clone(&host))));

        let logger = StructuredLogger::new(self.config.emit_diagnostics);
        let metrics = AgentMetrics::new();
        logger.log_created(
            &self.config.output_path,
            &self.config.schedule,
            scheduler.divisor(),
        );

        let body = MemlogBody::new(os, runtime, sink, scheduler);
        let coordinator =
            LifecycleCoordinator::start(host, body, logger.clone(), metrics.clone())?;

        Ok(Agent {
            coordinator,
            logger,
            metrics,
            detached: false,
        })
    }
}

/// A running memlog agent
///
/// Dropping the agent detaches it.
pub struct Agent {
    coordinator: LifecycleCoordinator,
    logger: StructuredLogger,
    metrics: AgentMetrics,
    detached: bool,
}

impl Agent {
    /// Attach with the default collectors and a JSON file sink
    pub fn attach(config: AgentConfig, host: Arc<dyn HostRuntime>) -> Result<Self> {
        AgentBuilder::new(config).host(host).attach()
    }

    pub fn builder(config: AgentConfig) -> AgentBuilder {
        AgentBuilder::new(config)
    }

    /// Stop sampling, join the worker and close the log
    pub fn detach(mut self) -> Result<()> {
        self.teardown()
    }

    pub fn state(&self) -> LifecycleState {
        self.coordinator.state()
    }

    pub fn metrics(&self) -> &AgentMetrics {
        &self.metrics
    }

    pub fn worker_thread_id(&self) -> ThreadId {
        self.coordinator.worker_thread_id()
    }

    fn teardown(&mut self) -> Result<()> {
        if self.detached {
            return Ok(());
        }
        self.detached = true;
        match self.coordinator.shutdown() {
            // The worker is still running; teardown did not complete
            Err(AgentError::SelfJoin) => Err(AgentError::SelfJoin),
            result => {
                self.logger.log_shutdown_complete();
                result
            }
        }
    }
}

impl Drop for Agent {
    fn drop(&mut self) {
        if let Err(e) = self.teardown() {
            tracing::warn!(error = %e, "memlog agent did not detach cleanly");
        }
    }
}
