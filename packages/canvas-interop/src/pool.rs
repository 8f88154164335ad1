//! Pool of device contexts derived from one device.
//!
//! Contexts are expensive to create and must not be used from two threads at once, so
//! callers lease one for the duration of a piece of work. `take_lease` never waits: it
//! reuses an idle context or creates a new one, which means the number of live contexts
//! follows the number of concurrent callers. Only `max_idle` of them are kept once the
//! burst is over.
//!
//! ```text
//!            take_lease                 lease dropped (pool open)
//!   Idle  ──────────────▶  Leased  ─────────────────────────────▶  Idle
//!    │                       │
//!    │ close()               │ lease dropped (pool closed, or idle set full)
//!    ▼                       ▼
//!  Destroyed             Destroyed
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::{InteropError, Result};

type Factory<C> = Arc<dyn Fn() -> Result<C> + Send + Sync>;

struct PoolState<C> {
    factory: Option<Factory<C>>,
    idle: Vec<C>,
    leased: usize,
    created: usize,
    destroyed: usize,
}

struct PoolShared<C> {
    state: Mutex<PoolState<C>>,
    max_idle: usize,
}

impl<C> PoolShared<C> {
    fn give_back(&self, context: C) {
        let discarded = {
            let mut state = self.state.lock();
            state.leased -= 1;
            if state.factory.is_some() && state.idle.len() < self.max_idle {
                state.idle.push(context);
                None
            } else {
                state.destroyed += 1;
                Some(context)
            }
        };
        match discarded {
            Some(context) => {
                drop(context);
                trace!("device context destroyed on return");
            }
            None => trace!("device context returned to pool"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub idle: usize,
    pub leased: usize,
    pub created: usize,
    pub destroyed: usize,
}

pub struct DeviceContextPool<C> {
    shared: Arc<PoolShared<C>>,
}

impl<C: Send + 'static> DeviceContextPool<C> {
    /// `factory` mints a new context whenever no idle one is available. It is called
    /// without holding the pool lock.
    pub fn new(factory: impl Fn() -> Result<C> + Send + Sync + 'static) -> Self {
        let max_idle = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::with_max_idle(max_idle, factory)
    }

    pub fn with_max_idle(
        max_idle: usize,
        factory: impl Fn() -> Result<C> + Send + Sync + 'static,
    ) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                state: Mutex::new(PoolState {
                    factory: Some(Arc::new(factory)),
                    idle: Vec::new(),
                    leased: 0,
                    created: 0,
                    destroyed: 0,
                }),
                max_idle: max_idle.max(1),
            }),
        }
    }

    pub fn take_lease(&self) -> Result<DeviceContextLease<C>> {
        let factory = {
            let mut state = self.shared.state.lock();
            let Some(factory) = state.factory.clone() else {
                return Err(InteropError::ObjectClosed);
            };
            state.leased += 1;
            if let Some(context) = state.idle.pop() {
                trace!(leased = state.leased, "device context reused");
                return Ok(self.lease(context));
            }
            factory
        };

        match factory() {
            Ok(context) => {
                let created = {
                    let mut state = self.shared.state.lock();
                    state.created += 1;
                    state.created
                };
                debug!(created, "device context created");
                Ok(self.lease(context))
            }
            Err(err) => {
                self.shared.state.lock().leased -= 1;
                Err(err)
            }
        }
    }

    fn lease(&self, context: C) -> DeviceContextLease<C> {
        DeviceContextLease {
            context: Some(context),
            pool: Some(self.shared.clone()),
        }
    }
}

impl<C> DeviceContextPool<C> {
    /// Destroys every idle context now and every leased one when its lease ends.
    /// Later `take_lease` calls fail with [`InteropError::ObjectClosed`].
    pub fn close(&self) {
        let (factory, idle) = {
            let mut state = self.shared.state.lock();
            let factory = state.factory.take();
            let idle = std::mem::take(&mut state.idle);
            state.destroyed += idle.len();
            (factory, idle)
        };
        if factory.is_some() {
            debug!(idle = idle.len(), "device context pool closed");
        }
        drop(idle);
        drop(factory);
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().factory.is_none()
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.shared.state.lock();
        PoolStats {
            idle: state.idle.len(),
            leased: state.leased,
            created: state.created,
            destroyed: state.destroyed,
        }
    }
}

impl<C> fmt::Debug for DeviceContextPool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceContextPool")
            .field("stats", &self.stats())
            .field("max_idle", &self.shared.max_idle)
            .finish()
    }
}

/// Exclusive use of one pooled context. Move-only; the context goes back to the pool
/// (or is destroyed, if the pool has closed) when the lease is released or dropped.
pub struct DeviceContextLease<C> {
    context: Option<C>,
    pool: Option<Arc<PoolShared<C>>>,
}

impl<C> Default for DeviceContextLease<C> {
    /// An empty lease; releasing it does nothing.
    fn default() -> Self {
        Self {
            context: None,
            pool: None,
        }
    }
}

impl<C> DeviceContextLease<C> {
    pub fn get(&self) -> Result<&C> {
        self.context.as_ref().ok_or(InteropError::ObjectClosed)
    }

    pub fn get_mut(&mut self) -> Result<&mut C> {
        self.context.as_mut().ok_or(InteropError::ObjectClosed)
    }

    pub fn is_empty(&self) -> bool {
        self.context.is_none()
    }

    /// Moves the lease out, leaving an empty one behind.
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }

    pub fn release(&mut self) {
        if let (Some(context), Some(pool)) = (self.context.take(), self.pool.take()) {
            pool.give_back(context);
        }
    }
}

impl<C> Drop for DeviceContextLease<C> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};

    use super::*;

    struct TestContext {
        id: usize,
        destroyed: Arc<AtomicUsize>,
    }

    impl Drop for TestContext {
        fn drop(&mut self) {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Counters {
        created: Arc<AtomicUsize>,
        destroyed: Arc<AtomicUsize>,
    }

    fn pool(max_idle: usize) -> (DeviceContextPool<TestContext>, Counters) {
        let created = Arc::new(AtomicUsize::new(0));
        let destroyed = Arc::new(AtomicUsize::new(0));
        let counters = Counters {
            created: created.clone(),
            destroyed: destroyed.clone(),
        };
        let pool = DeviceContextPool::with_max_idle(max_idle, move || {
            let id = created.fetch_add(1, Ordering::SeqCst);
            Ok(TestContext {
                id,
                destroyed: destroyed.clone(),
            })
        });
        (pool, counters)
    }

    #[test]
    fn take_and_release_on_one_thread_reuses_a_single_context() {
        let (pool, counters) = pool(4);
        for _ in 0..10 {
            let lease = pool.take_lease().unwrap();
            assert_eq!(lease.get().unwrap().id, 0);
        }
        assert_eq!(counters.created.load(Ordering::SeqCst), 1);
        assert_eq!(
            pool.stats(),
            PoolStats {
                idle: 1,
                leased: 0,
                created: 1,
                destroyed: 0
            }
        );
    }

    #[test]
    fn concurrent_leases_get_distinct_contexts() {
        const THREADS: usize = 8;
        let (pool, counters) = pool(THREADS);
        let pool = Arc::new(pool);
        let barrier = Arc::new(Barrier::new(THREADS));
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let pool = pool.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    let lease = pool.take_lease().unwrap();
                    let id = lease.get().unwrap().id;
                    // Hold every lease until all threads have one.
                    barrier.wait();
                    id
                })
            })
            .collect();
        let ids: HashSet<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(ids.len(), THREADS);
        assert!(counters.created.load(Ordering::SeqCst) <= THREADS);
        assert_eq!(pool.stats().leased, 0);
    }

    #[test]
    fn close_fails_new_leases() {
        let (pool, _counters) = pool(2);
        pool.close();
        assert!(pool.is_closed());
        assert_eq!(pool.take_lease().err(), Some(InteropError::ObjectClosed));
    }

    #[test]
    fn close_destroys_idle_contexts_immediately() {
        let (pool, counters) = pool(4);
        let a = pool.take_lease().unwrap();
        let b = pool.take_lease().unwrap();
        drop(a);
        drop(b);
        assert_eq!(pool.stats().idle, 2);
        pool.close();
        assert_eq!(counters.destroyed.load(Ordering::SeqCst), 2);
        assert_eq!(pool.stats().idle, 0);
    }

    #[test]
    fn outstanding_lease_is_destroyed_when_returned_after_close() {
        let (pool, counters) = pool(4);
        let lease = pool.take_lease().unwrap();
        pool.close();
        assert_eq!(counters.destroyed.load(Ordering::SeqCst), 0);
        assert!(lease.get().is_ok());
        drop(lease);
        assert_eq!(counters.destroyed.load(Ordering::SeqCst), 1);
        assert_eq!(pool.stats().idle, 0);
    }

    #[test]
    fn returns_beyond_max_idle_are_destroyed() {
        let (pool, counters) = pool(1);
        let a = pool.take_lease().unwrap();
        let b = pool.take_lease().unwrap();
        drop(a);
        drop(b);
        assert_eq!(counters.destroyed.load(Ordering::SeqCst), 1);
        assert_eq!(pool.stats().idle, 1);
    }

    #[test]
    fn moved_from_lease_is_empty() {
        let (pool, counters) = pool(2);
        let mut lease = pool.take_lease().unwrap();
        let mut moved = lease.take();
        assert!(lease.is_empty());
        assert_eq!(lease.get().err(), Some(InteropError::ObjectClosed));
        lease.release();
        assert_eq!(pool.stats().leased, 1);
        moved.release();
        moved.release();
        assert_eq!(pool.stats().leased, 0);
        assert_eq!(counters.destroyed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn factory_failure_is_reported_and_not_counted() {
        let pool: DeviceContextPool<u32> =
            DeviceContextPool::with_max_idle(2, || Err(InteropError::OutOfMemory));
        assert_eq!(pool.take_lease().err(), Some(InteropError::OutOfMemory));
        assert_eq!(pool.stats(), PoolStats::default());
    }
}
