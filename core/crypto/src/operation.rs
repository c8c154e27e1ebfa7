//! Operation handles.
//!
//! Every capability is implemented once, as a blocking core trait object
//! (`dyn HashOp`, `dyn CipherOp`, ...). [`Operation`] wraps that core together
//! with the provider's [`Executor`] and derives the asynchronous call shape
//! from the blocking one, so the two always agree.

use std::fmt;
use std::sync::Arc;

use cryptofacade_common::Result;
use cryptofacade_runtime::Executor;

/// A capability instance produced by an operation factory.
pub struct Operation<T: ?Sized> {
    core: Arc<T>,
    executor: Executor,
}

impl<T: ?Sized + Send + Sync + 'static> Operation<T> {
    pub fn new(core: Arc<T>, executor: Executor) -> Self {
        Self { core, executor }
    }

    /// Blocking implementation behind this handle.
    pub fn core(&self) -> &T {
        &self.core
    }

    /// Executor used by the asynchronous call shape.
    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Run `block` against the core through the executor.
    ///
    /// Inputs must be moved into `block`; the call may run on another thread.
    pub(crate) async fn offload<R, F>(&self, block: F) -> Result<R>
    where
        F: FnOnce(&T) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let core = Arc::clone(&self.core);
        self.executor.execute(move || block(&*core)).await?
    }
}

impl<T: ?Sized> Clone for Operation<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            executor: self.executor.clone(),
        }
    }
}

impl<T: ?Sized> fmt::Debug for Operation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}
