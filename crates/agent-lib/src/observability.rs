//! Observability infrastructure for the memlog agent
//!
//! Provides:
//! - Prometheus counters owned by each agent (ticks, samples, per-stage errors, latency)
//! - Structured lifecycle logging with tracing, gated by `emit_diagnostics`

use crate::error::AgentError;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Histogram buckets for collection latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Stage of a sampling tick, used to label failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStage {
    Attach,
    Collect,
    Write,
    Detach,
    Close,
}

impl TickStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            TickStage::Attach => "attach",
            TickStage::Collect => "collect",
            TickStage::Write => "write",
            TickStage::Detach => "detach",
            TickStage::Close => "close",
        }
    }
}

/// Sampling metrics for one agent
///
/// Clones share the same counters. Each agent owns its own registry, so
/// several agents in one test process never collide on metric names.
#[derive(Clone)]
pub struct AgentMetrics {
    registry: Registry,
    ticks: IntCounter,
    samples_written: IntCounter,
    tick_errors: IntCounterVec,
    collection_latency_seconds: Histogram,
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let ticks = IntCounter::new("memlog_ticks_total", "Sampling ticks started")
            .expect("Failed to create ticks_total");
        let samples_written = IntCounter::new(
            "memlog_samples_written_total",
            "Sample records appended to the log",
        )
        .expect("Failed to create samples_written_total");
        let tick_errors = IntCounterVec::new(
            Opts::new("memlog_tick_errors_total", "Tick failures by stage"),
            &["stage"],
        )
        .expect("Failed to create tick_errors_total");
        let collection_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "memlog_collection_latency_seconds",
                "Time spent collecting one snapshot pair",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
        )
        .expect("Failed to create collection_latency_seconds");

        registry
            .register(Box::new(ticks.clone()))
            .expect("Failed to register ticks_total");
        registry
            .register(Box::new(samples_written.clone()))
            .expect("Failed to register samples_written_total");
        registry
            .register(Box::new(tick_errors.clone()))
            .expect("Failed to register tick_errors_total");
        registry
            .register(Box::new(collection_latency_seconds.clone()))
            .expect("Failed to register collection_latency_seconds");

        Self {
            registry,
            ticks,
            samples_written,
            tick_errors,
            collection_latency_seconds,
        }
    }

    /// Registry holding this agent's metrics, for embedders that gather them
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn inc_ticks(&self) {
        self.ticks.inc();
    }

    pub fn inc_samples_written(&self) {
        self.samples_written.inc();
    }

    pub fn inc_tick_error(&self, stage: TickStage) {
        self.tick_errors.with_label_values(&[stage.as_str()]).inc();
    }

    pub fn observe_collection_latency(&self, elapsed: Duration) {
        self.collection_latency_seconds.observe(elapsed.as_secs_f64());
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.get()
    }

    pub fn samples_written(&self) -> u64 {
        self.samples_written.get()
    }

    pub fn tick_errors(&self, stage: TickStage) -> u64 {
        self.tick_errors.with_label_values(&[stage.as_str()]).get()
    }
}

/// Structured logger for agent lifecycle events
///
/// Lifecycle chatter is only emitted when diagnostics are enabled. Tick
/// failures and shutdown completion are always logged.
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    emit_diagnostics: bool,
}

impl StructuredLogger {
    pub fn new(emit_diagnostics: bool) -> Self {
        Self { emit_diagnostics }
    }

    pub fn diagnostics_enabled(&self) -> bool {
        self.emit_diagnostics
    }

    /// Log agent construction
    pub fn log_created(&self, output_path: &str, schedule: &str, divisor: u32) {
        if self.emit_diagnostics {
            info!(
                event = "agent_created",
                output_path = %output_path,
                schedule = %schedule,
                sample_divisor = divisor,
                "memlog agent created"
            );
        }
    }

    /// Log the host runtime readiness transition
    pub fn log_initialized(&self) {
        if self.emit_diagnostics {
            info!(event = "agent_initialized", "Host runtime ready, sampling started");
        }
    }

    pub fn log_duplicate_ready(&self) {
        debug!(event = "duplicate_ready", "Ignoring repeated readiness notification");
    }

    pub fn log_sample_written(&self, tick: u64, collection_time: Duration) {
        if self.emit_diagnostics {
            debug!(
                event = "sample_written",
                tick = tick,
                collection_us = collection_time.as_micros() as u64,
                "Sample appended"
            );
        }
    }

    /// Log a failed tick stage; the loop carries on regardless
    pub fn log_tick_failed(&self, tick: u64, stage: TickStage, error: &AgentError) {
        warn!(
            event = "tick_failed",
            tick = tick,
            stage = stage.as_str(),
            error = %error,
            "Sampling tick failed, continuing on schedule"
        );
    }

    pub fn log_shutdown_requested(&self, before_ready: bool) {
        if self.emit_diagnostics {
            info!(
                event = "shutdown_requested",
                before_ready = before_ready,
                "Shutting down memlog agent"
            );
        }
    }

    /// Log worker exit from the worker thread
    pub fn log_worker_exit(&self, ticks: u64) {
        if self.emit_diagnostics {
            info!(event = "worker_exit", ticks = ticks, "Sampling worker finished");
        }
    }

    /// Log completed teardown; always emitted
    pub fn log_shutdown_complete(&self) {
        info!(event = "shutdown_complete", "memlog agent shutdown complete");
    }
}
