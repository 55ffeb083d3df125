//! memlog agent - background memory sampler
//!
//! Runs the sampling agent against an in-process host until interrupted.
//! The first argument names the JSON config file (default `config.json`).

use anyhow::{Context, Result};
use memlog_lib::{
    config::{AgentConfig, DEFAULT_CONFIG_PATH},
    Agent, AgentError, HostRuntime, LocalHost,
};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "memlog agent failed");
            ExitCode::from(exit_code(&e))
        }
    }
}

async fn run() -> Result<()> {
    info!(version = AGENT_VERSION, "Starting memlog-agent");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = AgentConfig::load(&config_path)
        .with_context(|| format!("loading {config_path}"))?;
    info!(
        output_path = %config.output_path,
        schedule = %config.schedule,
        "Agent configured"
    );

    let host = Arc::new(LocalHost::new());
    let agent = Agent::attach(config, Arc::clone(&host) as Arc<dyn HostRuntime>)?;

    // The in-process host is ready as soon as the agent is attached
    host.notify_ready();

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("SIGINT received, detaching");

    // Joining the worker blocks; keep it off the runtime threads
    tokio::task::spawn_blocking(move || agent.detach()).await??;

    Ok(())
}

/// Map a failure to the process exit code of the underlying agent error
fn exit_code(error: &anyhow::Error) -> u8 {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<AgentError>())
        .map_or(1, AgentError::exit_code)
}
