//! Error taxonomy for the memlog agent
//!
//! Startup errors (`Config`, `Registration`, sink `Io` at open time, `Spawn`)
//! escape to whoever embeds the agent. Steady-state errors raised inside a
//! sampling tick are logged by the worker and never terminate the loop.

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    /// Malformed or missing configuration field
    #[error("configuration error: {0}")]
    Config(String),

    /// Host runtime rejected callback registration or capability setup
    #[error("host runtime registration failed: {0}")]
    Registration(String),

    /// Metric collection failed for one tick
    #[error("probe failed: {0}")]
    Probe(String),

    /// Sink open or write failed
    #[error("sink I/O error on {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Attaching to or detaching from the host runtime failed
    #[error("thread context error: {0}")]
    ThreadContext(String),

    /// The worker thread could not be started
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// Teardown was requested from the worker thread itself
    #[error("shutdown called from the worker thread; it cannot join itself")]
    SelfJoin,

    /// The worker thread panicked before it could be joined cleanly
    #[error("worker thread panicked")]
    WorkerPanicked,
}

impl AgentError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        AgentError::Io {
            context: context.into(),
            source,
        }
    }

    /// Returns true for errors a sampling tick recovers from locally
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AgentError::Probe(_) | AgentError::Io { .. } | AgentError::ThreadContext(_)
        )
    }

    /// Process status reported by an embedding binary for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            AgentError::Config(_) => 2,
            AgentError::Registration(_) => 3,
            AgentError::Io { .. } => 4,
            AgentError::Spawn(_) => 5,
            _ => 1,
        }
    }
}

impl From<config::ConfigError> for AgentError {
    fn from(err: config::ConfigError) -> Self {
        AgentError::Config(err.to_string())
    }
}
