//! Background memory sampling agent
//!
//! This crate provides the core functionality for:
//! - Waiting for host runtime readiness before sampling
//! - Sampling process and runtime memory counters on a fixed or cron schedule
//! - Appending each sample to a JSON array log
//! - Prompt, leak-free shutdown of the sampling worker

pub mod agent;
pub mod collector;
pub mod config;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod models;
pub mod observability;
pub mod schedule;
pub mod sink;

pub use agent::{Agent, AgentBuilder, MemlogBody};
pub use config::AgentConfig;
pub use error::{AgentError, Result};
pub use host::{HostRuntime, LocalHost};
pub use lifecycle::LifecycleState;
pub use models::*;
pub use observability::{AgentMetrics, StructuredLogger};
