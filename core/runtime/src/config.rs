//! Runtime configuration for a provider's execution state.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use cryptofacade_common::Result;

use crate::executor::{BlockingAdaptor, Executor, WorkerPoolAdaptor};
use crate::pool::default_capacity;

/// Where asynchronous operation calls run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExecutionMode {
    /// On the task polling the call.
    #[default]
    Inline,
    /// On the Tokio blocking pool of the current runtime.
    Blocking,
    /// On dedicated worker threads.
    Workers { threads: usize },
}

/// Configuration of one provider's execution state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Idle handles retained per pool. `None` uses the available parallelism
    /// plus a small headroom.
    pub pool_capacity: Option<usize>,
    /// Execution strategy for asynchronous calls.
    pub execution: ExecutionMode,
}

impl RuntimeConfig {
    /// Parse from the JSON value handed to a provider factory.
    ///
    /// `null` yields the defaults.
    ///
    /// # Errors
    /// - `Serialization` if the value does not describe a configuration
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Set the idle capacity of every pool.
    pub fn with_pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = Some(capacity);
        self
    }

    /// Set the execution strategy.
    pub fn with_execution(mut self, execution: ExecutionMode) -> Self {
        self.execution = execution;
        self
    }

    /// Pool capacity after applying the default.
    pub fn effective_pool_capacity(&self) -> usize {
        self.pool_capacity.unwrap_or_else(default_capacity)
    }

    /// Build the executor described by this configuration.
    ///
    /// # Errors
    /// - `Execution` if `Blocking` is requested outside a Tokio runtime or
    ///   worker threads cannot be started
    pub fn build_executor(&self) -> Result<Executor> {
        let executor = match self.execution {
            ExecutionMode::Inline => Executor::inline(),
            ExecutionMode::Blocking => Executor::new(Arc::new(BlockingAdaptor::current()?)),
            ExecutionMode::Workers { threads } => {
                Executor::new(Arc::new(WorkerPoolAdaptor::new(threads)?))
            }
        };
        Ok(executor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cryptofacade_common::Error;
    use serde_json::json;

    #[test]
    fn test_null_config_uses_defaults() {
        let config = RuntimeConfig::from_value(serde_json::Value::Null).unwrap();
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.effective_pool_capacity(), default_capacity());
    }

    #[test]
    fn test_parse_worker_config() {
        let config = RuntimeConfig::from_value(json!({
            "pool_capacity": 4,
            "execution": { "mode": "workers", "threads": 2 }
        }))
        .unwrap();

        assert_eq!(config.effective_pool_capacity(), 4);
        assert_eq!(config.execution, ExecutionMode::Workers { threads: 2 });
        assert_eq!(config.build_executor().unwrap().name(), "workers");
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config = RuntimeConfig::from_value(json!({ "pool_capacity": 1 })).unwrap();
        assert_eq!(config.execution, ExecutionMode::Inline);
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let result = RuntimeConfig::from_value(json!({ "execution": { "mode": "gpu" } }));
        assert!(matches!(result, Err(Error::Serialization(_))));
    }

    #[test]
    fn test_builder_methods() {
        let config = RuntimeConfig::default()
            .with_pool_capacity(9)
            .with_execution(ExecutionMode::Blocking);
        assert_eq!(config.pool_capacity, Some(9));
        assert!(config.build_executor().is_err());
    }
}
