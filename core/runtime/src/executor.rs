//! Execution adaptors for the asynchronous call shape.
//!
//! Every asynchronous operation call funnels its blocking engine work through
//! an [`Executor`]. A provider decides once which [`ExecutionAdaptor`] backs
//! it: run inline on the polling task, hand off to Tokio's blocking pool, or
//! queue onto dedicated worker threads.
//!
//! # Cancellation
//! Dropping the future returned by [`Executor::execute`] does not interrupt
//! work that a worker already started. Engine calls are not assumed to be
//! interruption-safe; the work runs to completion and its result is dropped.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

use cryptofacade_common::{Error, Result};

/// Type-erased blocking work handed to an adaptor.
pub type BlockingTask = Box<dyn FnOnce() + Send + 'static>;

/// Strategy deciding where blocking work runs.
#[async_trait]
pub trait ExecutionAdaptor: Send + Sync {
    /// Short strategy name for diagnostics.
    fn name(&self) -> &'static str;

    /// Run `task`, resolving once it has completed.
    ///
    /// # Errors
    /// - `Execution` if the strategy cannot accept the task or the task
    ///   panicked
    async fn run(&self, task: BlockingTask) -> Result<()>;
}

/// Runs work directly on the task that polls the call.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineAdaptor;

#[async_trait]
impl ExecutionAdaptor for InlineAdaptor {
    fn name(&self) -> &'static str {
        "inline"
    }

    async fn run(&self, task: BlockingTask) -> Result<()> {
        task();
        Ok(())
    }
}

/// Runs work on the Tokio blocking thread pool.
#[derive(Debug, Clone)]
pub struct BlockingAdaptor {
    handle: Handle,
}

impl BlockingAdaptor {
    /// Use the given runtime's blocking pool.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Use the blocking pool of the runtime the caller is running in.
    ///
    /// # Errors
    /// - `Execution` when called outside a Tokio runtime
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| Error::Execution(format!("No Tokio runtime available: {}", e)))
    }
}

#[async_trait]
impl ExecutionAdaptor for BlockingAdaptor {
    fn name(&self) -> &'static str {
        "blocking"
    }

    async fn run(&self, task: BlockingTask) -> Result<()> {
        self.handle
            .spawn_blocking(task)
            .await
            .map_err(|e| Error::Execution(format!("Blocking task failed: {}", e)))
    }
}

type Job = (BlockingTask, oneshot::Sender<()>);

/// Runs work on a fixed set of dedicated worker threads.
///
/// Jobs are queued on an unbounded channel; each finished job is reported on
/// its own oneshot channel. Workers exit once the adaptor is dropped and the
/// queue is drained.
pub struct WorkerPoolAdaptor {
    queue: mpsc::UnboundedSender<Job>,
    threads: usize,
}

impl WorkerPoolAdaptor {
    /// Start `threads` workers (at least one).
    ///
    /// # Errors
    /// - `Execution` if a worker thread cannot be spawned
    pub fn new(threads: usize) -> Result<Self> {
        let threads = threads.max(1);
        let (queue, receiver) = mpsc::unbounded_channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));

        for index in 0..threads {
            let receiver = Arc::clone(&receiver);
            thread::Builder::new()
                .name(format!("cryptofacade-worker-{}", index))
                .spawn(move || worker_loop(receiver))
                .map_err(|e| Error::Execution(format!("Failed to spawn worker thread: {}", e)))?;
        }

        info!(threads, "Worker pool started");
        Ok(Self { queue, threads })
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.threads
    }
}

fn worker_loop(receiver: Arc<Mutex<mpsc::UnboundedReceiver<Job>>>) {
    loop {
        let job = receiver.lock().blocking_recv();
        let Some((task, done)) = job else {
            break;
        };

        match panic::catch_unwind(AssertUnwindSafe(task)) {
            Ok(()) => {
                // The caller may have stopped waiting.
                let _ = done.send(());
            }
            Err(_) => {
                warn!("Worker task panicked");
            }
        }
    }
    debug!("Worker thread exiting");
}

#[async_trait]
impl ExecutionAdaptor for WorkerPoolAdaptor {
    fn name(&self) -> &'static str {
        "workers"
    }

    async fn run(&self, task: BlockingTask) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.queue
            .send((task, done_tx))
            .map_err(|_| Error::Execution("Worker pool has shut down".to_string()))?;

        done_rx
            .await
            .map_err(|_| Error::Execution("Worker task panicked".to_string()))
    }
}

impl fmt::Debug for WorkerPoolAdaptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPoolAdaptor")
            .field("threads", &self.threads)
            .finish()
    }
}

/// Handle through which operations schedule their asynchronous calls.
#[derive(Clone)]
pub struct Executor {
    adaptor: Arc<dyn ExecutionAdaptor>,
}

impl Executor {
    /// Executor backed by the given strategy.
    pub fn new(adaptor: Arc<dyn ExecutionAdaptor>) -> Self {
        Self { adaptor }
    }

    /// Executor running everything inline.
    pub fn inline() -> Self {
        Self::new(Arc::new(InlineAdaptor))
    }

    /// Name of the backing strategy.
    pub fn name(&self) -> &'static str {
        self.adaptor.name()
    }

    /// Run blocking `block` through the adaptor and return its value.
    ///
    /// The result is identical whichever adaptor runs it; only scheduling
    /// differs.
    pub async fn execute<R, F>(&self, block: F) -> Result<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel();
        trace!(adaptor = self.adaptor.name(), "Dispatching blocking work");

        self.adaptor
            .run(Box::new(move || {
                let _ = result_tx.send(block());
            }))
            .await?;

        result_rx
            .await
            .map_err(|_| Error::Execution("Work finished without a result".to_string()))
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::inline()
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("adaptor", &self.adaptor.name())
            .finish()
    }
}
