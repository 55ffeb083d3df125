//! Heap and non-heap pool counters from the host runtime

use super::SnapshotCollector;
use crate::error::Result;
use crate::host::{HostRuntime, MemoryPool, MemoryUsage};
use crate::models::Snapshot;
use std::sync::Arc;

/// Collector that queries the host runtime's memory-management interface.
///
/// Must run on a thread attached to the host.
pub struct RuntimeMemoryCollector {
    host: Arc<dyn HostRuntime>,
}

impl RuntimeMemoryCollector {
    pub fn new(host: Arc<dyn HostRuntime>) -> Self {
        Self { host }
    }

    /// Build the snapshot from both pools
    ///
    /// `overall` is heap plus non-heap committed; an undefined max is omitted.
    pub fn snapshot_from(heap: MemoryUsage, non_heap: MemoryUsage) -> Snapshot {
        let mut counters = vec![(
            "overall".to_string(),
            heap.committed.saturating_add(non_heap.committed),
        )];
        for (prefix, usage) in [("heap", heap), ("non_heap", non_heap)] {
            counters.push((format!("{prefix}_committed"), usage.committed));
            counters.push((format!("{prefix}_init"), usage.init));
            counters.push((format!("{prefix}_used"), usage.used));
            if let Some(max) = usage.max {
                counters.push((format!("{prefix}_max"), max));
            }
        }
        counters.into_iter().collect()
    }
}

impl SnapshotCollector for RuntimeMemoryCollector {
    fn collect(&mut self) -> Result<Snapshot> {
        let heap = self.host.memory_usage(MemoryPool::Heap)?;
        let non_heap = self.host.memory_usage(MemoryPool::NonHeap)?;
        Ok(Self::snapshot_from(heap, non_heap))
    }
}
