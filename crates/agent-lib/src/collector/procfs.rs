//! Process memory counters from `/proc/self/status`
//!
//! Reads the `Vm*` lines of the status table. Values are reported by the
//! kernel in kB and converted to bytes.

use super::SnapshotCollector;
use crate::error::{AgentError, Result};
use crate::models::Snapshot;
use std::path::PathBuf;

/// Status fields copied into the snapshot, in bytes
pub const STATUS_FIELDS: &[&str] = &[
    "VmPeak", "VmSize", "VmLck", "VmPin", "VmHWM", "VmRSS", "VmData", "VmStk", "VmExe", "VmLib",
    "VmPTE", "VmSwap",
];

/// Snapshot key that summarizes the process footprint (resident set size)
pub const OVERALL: &str = "overall";

/// Collector for the process status pseudo-file
pub struct ProcStatusCollector {
    status_path: PathBuf,
}

impl Default for ProcStatusCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcStatusCollector {
    pub fn new() -> Self {
        Self {
            status_path: PathBuf::from("/proc/self/status"),
        }
    }

    /// Create collector reading a different status file (for testing)
    pub fn with_status_path(status_path: impl Into<PathBuf>) -> Self {
        Self {
            status_path: status_path.into(),
        }
    }

    /// Parse status file contents into a snapshot
    ///
    /// Fields the kernel does not report are omitted; `VmRSS` is required.
    pub fn parse_status(content: &str) -> Result<Snapshot> {
        let mut counters = Vec::with_capacity(STATUS_FIELDS.len() + 1);

        for line in content.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim();
            if !STATUS_FIELDS.contains(&key) {
                continue;
            }
            counters.push((key.to_string(), parse_kb(key, value)?));
        }

        let rss = counters
            .iter()
            .find(|(key, _)| key == "VmRSS")
            .map(|(_, value)| *value)
            .ok_or_else(|| AgentError::Probe("status table has no VmRSS line".to_string()))?;
        counters.push((OVERALL.to_string(), rss));

        Ok(counters.into_iter().collect())
    }
}

/// Parse a value such as `   123456 kB` into bytes
fn parse_kb(key: &str, value: &str) -> Result<u64> {
    let mut parts = value.split_whitespace();
    let number = parts
        .next()
        .ok_or_else(|| AgentError::Probe(format!("{key} has no value")))?;
    let kb: u64 = number
        .parse()
        .map_err(|_| AgentError::Probe(format!("{key} value '{number}' is not an integer")))?;

    match parts.next() {
        Some(unit) if unit.eq_ignore_ascii_case("kB") => kb
            .checked_mul(1024)
            .ok_or_else(|| AgentError::Probe(format!("{key} overflows u64 bytes"))),
        Some(unit) => Err(AgentError::Probe(format!("{key} has unexpected unit '{unit}'"))),
        None => Err(AgentError::Probe(format!("{key} has no unit"))),
    }
}

impl SnapshotCollector for ProcStatusCollector {
    #[cfg(target_os = "linux")]
    fn collect(&mut self) -> Result<Snapshot> {
        let content = std::fs::read_to_string(&self.status_path).map_err(|e| {
            AgentError::Probe(format!("failed to read {}: {}", self.status_path.display(), e))
        })?;
        Self::parse_status(&content)
    }

    #[cfg(not(target_os = "linux"))]
    fn collect(&mut self) -> Result<Snapshot> {
        Err(AgentError::Probe(format!(
            "process status probe unsupported on {}",
            std::env::consts::OS
        )))
    }
}
