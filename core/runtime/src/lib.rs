//! Execution runtime shared by every CryptoFacade provider.
//!
//! This module provides:
//! - Bounded pools of reusable, non-thread-safe engine handles
//! - Execution adaptors deciding where asynchronous calls actually run
//! - The OS-backed secure random source
//! - The per-provider execution state bundling all of the above

pub mod config;
pub mod executor;
pub mod pool;
pub mod random;
pub mod state;

pub use config::{ExecutionMode, RuntimeConfig};
pub use executor::{
    BlockingAdaptor, BlockingTask, ExecutionAdaptor, Executor, InlineAdaptor, WorkerPoolAdaptor,
};
pub use pool::{default_capacity, Pooled, ResourcePool, ResourcePools};
pub use random::SecureRandom;
pub use state::ProviderState;
