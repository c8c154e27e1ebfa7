//! Bounded pools of reusable engine handles.
//!
//! Engine contexts (digest states, keyed MAC states, cipher contexts) are
//! expensive to build and not safe to share between threads. A pool keeps a
//! capped set of idle handles so independent calls can reuse them; bursts
//! beyond the cap still get a fresh handle each, and the surplus is dropped on
//! return.

use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tracing::{debug, trace};

use cryptofacade_common::{Error, Result};

/// Idle slots kept on top of the available parallelism.
const CAPACITY_HEADROOM: usize = 2;

/// Default idle capacity: available execution units plus a small headroom.
pub fn default_capacity() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        + CAPACITY_HEADROOM
}

type HandleFactory<T> = Box<dyn Fn() -> Result<T> + Send + Sync>;

/// Capacity-bounded idle set of engine handles.
///
/// The pool has no knowledge of what a handle is. It never marks a handle as
/// poisoned: whoever borrows a handle reinitializes it before use (resetting
/// a digest, re-keying a MAC).
pub struct ResourcePool<T> {
    name: String,
    capacity: usize,
    idle: Mutex<Vec<T>>,
    factory: HandleFactory<T>,
}

impl<T: Send + 'static> ResourcePool<T> {
    /// Create a pool retaining at most `capacity` idle handles.
    pub fn new(
        name: impl Into<String>,
        capacity: usize,
        factory: impl Fn() -> Result<T> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            capacity,
            idle: Mutex::new(Vec::with_capacity(capacity)),
            factory: Box::new(factory),
        }
    }

    /// Create a pool sized with [`default_capacity`].
    pub fn with_default_capacity(
        name: impl Into<String>,
        factory: impl Fn() -> Result<T> + Send + Sync + 'static,
    ) -> Self {
        Self::new(name, default_capacity(), factory)
    }

    /// Backend algorithm name this pool serves.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Maximum number of idle handles retained.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of idle handles currently retained.
    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    /// Borrow a handle until the returned guard is dropped.
    ///
    /// # Errors
    /// - Propagates the factory error, unchanged, when no idle handle exists
    ///   and constructing a new one fails
    pub fn checkout(self: &Arc<Self>) -> Result<Pooled<T>> {
        let handle = self.acquire()?;
        Ok(Pooled {
            pool: Arc::clone(self),
            handle: Some(handle),
        })
    }

    /// Run `block` with a borrowed handle.
    ///
    /// The handle goes back to the idle set whatever `block` does, including
    /// returning an error or panicking.
    pub fn with<R>(self: &Arc<Self>, block: impl FnOnce(&mut T) -> Result<R>) -> Result<R> {
        let mut handle = self.checkout()?;
        block(&mut handle)
    }

    fn acquire(&self) -> Result<T> {
        let reused = self.idle.lock().pop();
        match reused {
            Some(handle) => {
                trace!(pool = %self.name, "Reusing idle handle");
                Ok(handle)
            }
            None => {
                trace!(pool = %self.name, "Constructing new handle");
                (self.factory)()
            }
        }
    }

    fn release(&self, handle: T) {
        let mut idle = self.idle.lock();
        if idle.len() < self.capacity {
            idle.push(handle);
        } else {
            drop(idle);
            trace!(pool = %self.name, "Idle set full, dropping handle");
            drop(handle);
        }
    }
}

impl<T> fmt::Debug for ResourcePool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourcePool")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("idle", &self.idle.lock().len())
            .finish()
    }
}

/// A handle borrowed from a [`ResourcePool`].
///
/// Returned to the pool exactly once, when dropped.
pub struct Pooled<T: Send + 'static> {
    pool: Arc<ResourcePool<T>>,
    handle: Option<T>,
}

impl<T: Send + 'static> Pooled<T> {
    /// Name of the pool this handle came from.
    pub fn pool_name(&self) -> &str {
        self.pool.name()
    }
}

impl<T: Send + 'static> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.handle
            .as_ref()
            .unwrap_or_else(|| unreachable!("pooled handle is only taken on drop"))
    }
}

impl<T: Send + 'static> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.handle
            .as_mut()
            .unwrap_or_else(|| unreachable!("pooled handle is only taken on drop"))
    }
}

impl<T: Send + 'static> Drop for Pooled<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.pool.release(handle);
        }
    }
}

impl<T: Send + 'static> fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pooled")
            .field("pool", &self.pool.name())
            .finish_non_exhaustive()
    }
}

/// Pools keyed by backend algorithm name.
///
/// Each name maps to exactly one pool and one handle type.
pub struct ResourcePools {
    capacity: usize,
    pools: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl ResourcePools {
    /// Create an empty map whose pools retain `capacity` idle handles each.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            pools: RwLock::new(HashMap::new()),
        }
    }

    /// Idle capacity given to every pool created by this map.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get the pool registered under `name`, creating it with `factory` on
    /// first use.
    ///
    /// # Errors
    /// - `InvalidInput` if `name` already holds a pool of another handle type
    pub fn get_or_create<T, F>(&self, name: &str, factory: F) -> Result<Arc<ResourcePool<T>>>
    where
        T: Send + 'static,
        F: Fn() -> Result<T> + Send + Sync + 'static,
    {
        let existing = self.pools.read().get(name).cloned();
        let entry = match existing {
            Some(entry) => entry,
            None => {
                let mut pools = self.pools.write();
                pools
                    .entry(name.to_string())
                    .or_insert_with(|| {
                        debug!(pool = %name, capacity = self.capacity, "Creating resource pool");
                        Arc::new(ResourcePool::new(name, self.capacity, factory))
                            as Arc<dyn Any + Send + Sync>
                    })
                    .clone()
            }
        };

        entry.downcast::<ResourcePool<T>>().map_err(|_| {
            Error::InvalidInput(format!("Pool '{}' holds a different handle type", name))
        })
    }

    /// Names of the pools created so far.
    pub fn names(&self) -> Vec<String> {
        self.pools.read().keys().cloned().collect()
    }
}

impl Default for ResourcePools {
    fn default() -> Self {
        Self::new(default_capacity())
    }
}

impl fmt::Debug for ResourcePools {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourcePools")
            .field("capacity", &self.capacity)
            .field("pools", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    fn counting_pool(capacity: usize) -> (Arc<ResourcePool<Arc<AtomicBool>>>, Arc<AtomicUsize>) {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&created);
        let pool = ResourcePool::new("test", capacity, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(AtomicBool::new(false)))
        });
        (Arc::new(pool), created)
    }

    #[test]
    fn test_sequential_use_reuses_handle() {
        let (pool, created) = counting_pool(4);

        pool.with(|_| Ok(())).unwrap();
        pool.with(|_| Ok(())).unwrap();
        pool.with(|_| Ok(())).unwrap();

        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn test_handle_returned_after_block_error() {
        let (pool, _) = counting_pool(4);

        let result: Result<()> = pool.with(|_| Err(Error::crypto()));
        assert!(result.unwrap_err().is_crypto());
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn test_handle_returned_after_panic() {
        let (pool, _) = counting_pool(4);

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: Result<()> = pool.with(|_| panic!("engine blew up"));
        }));

        assert!(outcome.is_err());
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn test_factory_error_propagates_unchanged() {
        let pool: Arc<ResourcePool<u8>> = Arc::new(ResourcePool::new("failing", 2, || {
            Err(Error::OperationNotSupported("no engine".to_string()))
        }));

        let err = pool.with(|_| Ok(())).unwrap_err();
        assert!(matches!(err, Error::OperationNotSupported(msg) if msg == "no engine"));
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn test_surplus_handles_dropped_beyond_capacity() {
        let (pool, created) = counting_pool(2);

        let guards: Vec<_> = (0..5).map(|_| pool.checkout().unwrap()).collect();
        assert_eq!(created.load(Ordering::SeqCst), 5);
        drop(guards);

        assert_eq!(pool.idle_count(), 2);
    }

    #[test]
    fn test_zero_capacity_retains_nothing() {
        let (pool, created) = counting_pool(0);

        pool.with(|_| Ok(())).unwrap();
        pool.with(|_| Ok(())).unwrap();

        assert_eq!(pool.idle_count(), 0);
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_concurrent_use_never_shares_a_handle() {
        let (pool, created) = counting_pool(default_capacity());
        let callers = default_capacity() - CAPACITY_HEADROOM + 10;
        let barrier = Arc::new(Barrier::new(callers));
        let violations = Arc::new(AtomicUsize::new(0));

        let workers: Vec<_> = (0..callers)
            .map(|_| {
                let pool = Arc::clone(&pool);
                let barrier = Arc::clone(&barrier);
                let violations = Arc::clone(&violations);
                thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..20 {
                        pool.with(|busy| {
                            if busy.swap(true, Ordering::SeqCst) {
                                violations.fetch_add(1, Ordering::SeqCst);
                            }
                            thread::sleep(Duration::from_micros(50));
                            busy.store(false, Ordering::SeqCst);
                            Ok(())
                        })
                        .unwrap();
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(violations.load(Ordering::SeqCst), 0);
        assert!(created.load(Ordering::SeqCst) <= callers);
        assert!(pool.idle_count() <= pool.capacity());
    }

    #[test]
    fn test_pool_map_returns_same_pool_per_name() {
        let pools = ResourcePools::new(3);

        let first = pools.get_or_create("SHA-256", || Ok(0u32)).unwrap();
        let second = pools.get_or_create("SHA-256", || Ok(1u32)).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.capacity(), 3);
        assert_eq!(pools.names(), vec!["SHA-256".to_string()]);
    }

    #[test]
    fn test_pool_map_rejects_type_mismatch() {
        let pools = ResourcePools::new(3);
        pools.get_or_create("SHA-256", || Ok(0u32)).unwrap();

        let result = pools.get_or_create("SHA-256", || Ok(String::new()));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
