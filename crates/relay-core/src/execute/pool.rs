//! Pool of reusable execution instances.
//!
//! The pool grows on demand and never blocks waiting for a free instance.
//! Its lock covers only pushes and pops of the available list; instances
//! are constructed and run outside it.

use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::capability::CapabilityRegistry;
use crate::config::EngineConfig;
use crate::error::{Error, Result};

use super::instance::ExecutionInstance;

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Instances checked in and ready for reuse.
    pub available: usize,
    /// Instances constructed over the pool's lifetime.
    pub created: usize,
    /// Whether [`InstancePool::close_all`] has been called.
    pub closed: bool,
}

#[derive(Default)]
struct PoolState {
    available: Vec<ExecutionInstance>,
    created: usize,
    closed: bool,
}

/// Owns every execution instance of an engine.
pub struct InstancePool {
    state: Mutex<PoolState>,
    config: EngineConfig,
    capabilities: Arc<CapabilityRegistry>,
}

impl InstancePool {
    /// Create an empty pool.
    pub fn new(config: EngineConfig, capabilities: Arc<CapabilityRegistry>) -> Self {
        Self::with_warm_instances(config, capabilities, 0)
    }

    /// Create a pool and pre-warm it with `count` instances.
    pub fn with_warm_instances(
        config: EngineConfig,
        capabilities: Arc<CapabilityRegistry>,
        count: usize,
    ) -> Self {
        let available: Vec<_> = (0..count)
            .map(|_| ExecutionInstance::new(&config, &capabilities))
            .collect();
        Self {
            state: Mutex::new(PoolState {
                created: available.len(),
                available,
                closed: false,
            }),
            config,
            capabilities,
        }
    }

    fn state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check out an instance, constructing one if none is available.
    ///
    /// Fails with [`Error::Closed`] after [`close_all`](Self::close_all).
    pub fn acquire(&self) -> Result<InstanceLease<'_>> {
        {
            let mut state = self.state();
            if state.closed {
                return Err(Error::Closed);
            }
            if let Some(instance) = state.available.pop() {
                return Ok(InstanceLease::new(self, instance));
            }
        }

        let instance = ExecutionInstance::new(&self.config, &self.capabilities);
        let created = {
            let mut state = self.state();
            if state.closed {
                return Err(Error::Closed);
            }
            state.created += 1;
            state.created
        };
        tracing::debug!(instance = instance.id(), created, "instance pool grew");
        Ok(InstanceLease::new(self, instance))
    }

    /// Check an instance back in. After close it is disposed instead.
    pub(crate) fn release(&self, instance: ExecutionInstance) {
        let mut state = self.state();
        if state.closed {
            drop(state);
            tracing::debug!(instance = instance.id(), "disposed instance released after close");
            return;
        }
        state.available.push(instance);
    }

    /// Dispose every available instance and refuse further checkouts.
    ///
    /// Outstanding instances are disposed when their lease ends. Returns
    /// `false` if the pool was already closed.
    pub fn close_all(&self) -> bool {
        let disposed = {
            let mut state = self.state();
            if state.closed {
                return false;
            }
            state.closed = true;
            std::mem::take(&mut state.available)
        };
        tracing::debug!(count = disposed.len(), "disposing pooled instances");
        drop(disposed);
        true
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.state();
        PoolStats {
            available: state.available.len(),
            created: state.created,
            closed: state.closed,
        }
    }
}

/// Exclusive use of one instance; checks it back in on drop.
pub struct InstanceLease<'a> {
    pool: &'a InstancePool,
    instance: ManuallyDrop<ExecutionInstance>,
    discarded: bool,
}

impl<'a> InstanceLease<'a> {
    fn new(pool: &'a InstancePool, instance: ExecutionInstance) -> Self {
        Self {
            pool,
            instance: ManuallyDrop::new(instance),
            discarded: false,
        }
    }

    /// Dispose the instance instead of returning it to the pool.
    pub fn discard(mut self) {
        self.discarded = true;
    }
}

impl Deref for InstanceLease<'_> {
    type Target = ExecutionInstance;

    fn deref(&self) -> &ExecutionInstance {
        &self.instance
    }
}

impl DerefMut for InstanceLease<'_> {
    fn deref_mut(&mut self) -> &mut ExecutionInstance {
        &mut self.instance
    }
}

impl Drop for InstanceLease<'_> {
    fn drop(&mut self) {
        // SAFETY: `instance` is taken exactly once, here, and the lease is
        // never used again.
        let instance = unsafe { ManuallyDrop::take(&mut self.instance) };
        if self.discarded {
            tracing::warn!(instance = instance.id(), "discarding execution instance");
            return;
        }
        self.pool.release(instance);
    }
}
