//! Memory snapshot collection
//!
//! This module provides collectors for the two halves of a sample:
//! process-level counters from the operating system and memory pool
//! counters from the host runtime.

mod procfs;
mod runtime;

pub use procfs::{ProcStatusCollector, OVERALL, STATUS_FIELDS};
pub use runtime::RuntimeMemoryCollector;

use crate::error::Result;
use crate::models::Snapshot;

/// Trait for snapshot probes
pub trait SnapshotCollector: Send {
    /// Take one snapshot; failures are reported per tick
    fn collect(&mut self) -> Result<Snapshot>;
}

impl<F> SnapshotCollector for F
where
    F: FnMut() -> Result<Snapshot> + Send,
{
    fn collect(&mut self) -> Result<Snapshot> {
        self()
    }
}
