//! Core data models for the memlog agent

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One immutable sample of named memory counters, in bytes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(BTreeMap<String, u64>);

impl Snapshot {
    pub fn get(&self, name: &str) -> Option<u64> {
        self.0.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<K: Into<String>> FromIterator<(K, u64)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (K, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Record appended to the structured log once per tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleRecord {
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
    /// Process-level counters from the operating system
    pub os: Snapshot,
    /// Memory pool counters reported by the host runtime
    pub runtime: Snapshot,
}

impl SampleRecord {
    pub fn new(os: Snapshot, runtime: Snapshot) -> Self {
        Self {
            timestamp: current_time_millis(),
            os,
            runtime,
        }
    }
}

/// Wall-clock milliseconds since the Unix epoch
pub fn current_time_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
