//! Host runtime boundary
//!
//! The agent runs embedded in a managed runtime that announces readiness
//! once, lets foreign threads attach to it, and answers memory-pool queries.
//! [`HostRuntime`] is the only view the core has of that runtime; the handle
//! is passed explicitly to everything that needs it.

use crate::error::{AgentError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// Readiness notification handed to the host.
///
/// Hosts are expected to invoke it at most once, but may do so from any
/// thread and possibly more than once.
pub type ReadyCallback = Box<dyn Fn() + Send + Sync>;

/// Memory pools reported by the host runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryPool {
    Heap,
    NonHeap,
}

/// Byte counts for one memory pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryUsage {
    pub init: u64,
    pub used: u64,
    pub committed: u64,
    /// `None` when the runtime leaves the maximum undefined
    pub max: Option<u64>,
}

/// Per-thread attachment to the host runtime.
///
/// Implementations are thread-local and must not be sent across threads.
pub trait ThreadContext {
    fn detach(self: Box<Self>) -> Result<()>;
}

/// Capabilities the agent needs from its host
pub trait HostRuntime: Send + Sync {
    /// Register the one-shot readiness callback
    fn on_ready(&self, callback: ReadyCallback) -> Result<()>;

    /// Attach the calling thread; idempotent if already attached
    fn attach_current_thread(&self) -> Result<Box<dyn ThreadContext>>;

    /// Query committed/used/max/init byte counts for a pool
    fn memory_usage(&self, pool: MemoryPool) -> Result<MemoryUsage>;
}

/// In-process host runtime.
///
/// Used by the embedding binary and by tests: readiness is announced by
/// calling [`LocalHost::notify_ready`], and failures can be injected.
#[derive(Default)]
pub struct LocalHost {
    callbacks: Mutex<Vec<ReadyCallback>>,
    pools: Mutex<HashMap<MemoryPool, MemoryUsage>>,
    attached: Arc<Mutex<HashMap<ThreadId, usize>>>,
    reject_registration: AtomicBool,
    fail_attach: AtomicBool,
    attach_calls: AtomicUsize,
    detach_calls: Arc<AtomicUsize>,
}

impl LocalHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a host that refuses callback registration
    pub fn rejecting_registration() -> Self {
        let host = Self::default();
        host.reject_registration.store(true, Ordering::SeqCst);
        host
    }

    /// Fire every registered readiness callback
    pub fn notify_ready(&self) {
        // Callbacks run outside the lock so they may call back into the host
        let callbacks = std::mem::take(&mut *self.callbacks.lock());
        for callback in &callbacks {
            callback();
        }
        self.callbacks.lock().extend(callbacks);
    }

    pub fn registered_callbacks(&self) -> usize {
        self.callbacks.lock().len()
    }

    pub fn set_memory_usage(&self, pool: MemoryPool, usage: MemoryUsage) {
        self.pools.lock().insert(pool, usage);
    }

    pub fn set_fail_attach(&self, fail: bool) {
        self.fail_attach.store(fail, Ordering::SeqCst);
    }

    pub fn attach_calls(&self) -> usize {
        self.attach_calls.load(Ordering::SeqCst)
    }

    pub fn detach_calls(&self) -> usize {
        self.detach_calls.load(Ordering::SeqCst)
    }

    /// Number of threads currently attached
    pub fn attached_threads(&self) -> usize {
        self.attached.lock().len()
    }
}

impl HostRuntime for LocalHost {
    fn on_ready(&self, callback: ReadyCallback) -> Result<()> {
        if self.reject_registration.load(Ordering::SeqCst) {
            return Err(AgentError::Registration(
                "host refused readiness callback".to_string(),
            ));
        }
        self.callbacks.lock().push(callback);
        Ok(())
    }

    fn attach_current_thread(&self) -> Result<Box<dyn ThreadContext>> {
        self.attach_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_attach.load(Ordering::SeqCst) {
            return Err(AgentError::ThreadContext(
                "host refused thread attach".to_string(),
            ));
        }

        let id = thread::current().id();
        *self.attached.lock().entry(id).or_insert(0) += 1;

        Ok(Box::new(LocalThreadContext {
            id,
            attached: Arc::clone(&self.attached),
            detach_calls: Arc::clone(&self.detach_calls),
            _not_send: std::marker::PhantomData,
        }))
    }

    fn memory_usage(&self, pool: MemoryPool) -> Result<MemoryUsage> {
        Ok(self.pools.lock().get(&pool).copied().unwrap_or_default())
    }
}

struct LocalThreadContext {
    id: ThreadId,
    attached: Arc<Mutex<HashMap<ThreadId, usize>>>,
    detach_calls: Arc<AtomicUsize>,
    _not_send: std::marker::PhantomData<*const ()>,
}

impl ThreadContext for LocalThreadContext {
    fn detach(self: Box<Self>) -> Result<()> {
        if thread::current().id() != self.id {
            return Err(AgentError::ThreadContext(
                "detach called from a different thread than attach".to_string(),
            ));
        }

        self.detach_calls.fetch_add(1, Ordering::SeqCst);
        let mut attached = self.attached.lock();
        if let Some(count) = attached.get_mut(&self.id) {
            *count -= 1;
            if *count == 0 {
                attached.remove(&self.id);
            }
        }
        Ok(())
    }
}
