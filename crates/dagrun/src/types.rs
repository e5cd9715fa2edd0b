//! Common types and configuration for the executor

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Upper bound on the number of tasks running at the same time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Limit {
    /// There is no limit.
    #[default]
    None,

    /// There is an upper limit.
    Max(NonZeroUsize),

    /// Use the available parallelism of the machine.
    Default,
}

impl Limit {
    /// Resolve to a concrete bound, `None` meaning unbounded
    pub fn resolve(self) -> Option<usize> {
        match self {
            Limit::None => None,
            Limit::Max(max) => Some(max.get()),
            Limit::Default => Some(
                std::thread::available_parallelism()
                    .map(NonZeroUsize::get)
                    .unwrap_or(1),
            ),
        }
    }
}

impl From<usize> for Limit {
    fn from(value: usize) -> Self {
        NonZeroUsize::new(value).map(Limit::Max).unwrap_or(Limit::None)
    }
}

/// Configuration for the executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Maximum number of tasks that can execute concurrently
    pub max_concurrent_tasks: Limit,

    /// Timeout for individual tasks (None for no timeout)
    pub task_timeout: Option<Duration>,

    /// Whether the root task's result is also stored in the context
    pub store_root_result: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: Limit::None,
            task_timeout: None,
            store_root_result: true,
        }
    }
}

impl ExecutorConfig {
    /// Create a new executor configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of concurrent tasks
    pub fn with_max_concurrent_tasks(mut self, limit: impl Into<Limit>) -> Self {
        self.max_concurrent_tasks = limit.into();
        self
    }

    /// Set the per-task timeout
    pub fn with_task_timeout(mut self, timeout: Duration) -> ConfigResult<Self> {
        if timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout { duration: timeout });
        }
        self.task_timeout = Some(timeout);
        Ok(self)
    }

    /// Choose whether the root result is stored under the root's key
    pub fn with_store_root_result(mut self, store: bool) -> Self {
        self.store_root_result = store;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(timeout) = self.task_timeout {
            if timeout.is_zero() {
                return Err(ConfigError::InvalidTimeout { duration: timeout });
            }
        }
        Ok(())
    }
}
