//! Per-provider execution state.

use std::fmt;

use cryptofacade_common::Result;

use crate::config::RuntimeConfig;
use crate::executor::Executor;
use crate::pool::{default_capacity, ResourcePools};
use crate::random::SecureRandom;

/// Everything one provider shares between the operations it produces: the
/// pools of engine handles, the secure random source and the executor for
/// asynchronous calls.
pub struct ProviderState {
    pools: ResourcePools,
    random: SecureRandom,
    executor: Executor,
}

impl ProviderState {
    /// Build the state described by `config`.
    ///
    /// # Errors
    /// - `Execution` if the configured executor cannot be started
    pub fn new(config: &RuntimeConfig) -> Result<Self> {
        Ok(Self {
            pools: ResourcePools::new(config.effective_pool_capacity()),
            random: SecureRandom::new(),
            executor: config.build_executor()?,
        })
    }

    /// Default pools and random source with a caller-supplied executor.
    pub fn with_executor(executor: Executor) -> Self {
        Self {
            pools: ResourcePools::new(default_capacity()),
            random: SecureRandom::new(),
            executor,
        }
    }

    pub fn pools(&self) -> &ResourcePools {
        &self.pools
    }

    pub fn random(&self) -> SecureRandom {
        self.random
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }
}

impl Default for ProviderState {
    fn default() -> Self {
        Self::with_executor(Executor::inline())
    }
}

impl fmt::Debug for ProviderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderState")
            .field("pools", &self.pools)
            .field("executor", &self.executor)
            .finish()
    }
}
