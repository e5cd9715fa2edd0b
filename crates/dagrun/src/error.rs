//! Error types for the dagrun task execution engine

use std::time::Duration;

use thiserror::Error;

use crate::task::TaskKey;

/// Boxed error produced by a task's own computation
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for dagrun operations
#[derive(Error, Debug)]
pub enum DagError {
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Context error: {0}")]
    Context(#[from] ContextError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cancelled")]
    Cancelled,
}

/// Errors raised while building a dependency graph
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Cycle detected: {}", format_cycle(.members))]
    Cycle { members: Vec<TaskKey> },

    #[error("Key {key} is declared by two distinct task instances")]
    DuplicateKey { key: TaskKey },

    #[error("Dependency declared as {declared} produced a task with key {actual}")]
    KeyMismatch { declared: TaskKey, actual: TaskKey },
}

/// Errors raised by the shared execution context
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("No result stored for key {0}")]
    NotFound(TaskKey),

    #[error("A result for key {0} was already stored")]
    DuplicateWrite(TaskKey),
}

/// Errors raised while running a graph
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Task {key} failed: {source}")]
    TaskFailed { key: TaskKey, source: BoxError },

    #[error("Task {key} hit a context error: {source}")]
    Context { key: TaskKey, source: ContextError },

    #[error("Task {key} timed out after {duration:?}")]
    TaskTimedOut { key: TaskKey, duration: Duration },

    #[error("Task {key} panicked")]
    TaskPanicked { key: TaskKey },

    #[error("Execution stalled with {} tasks never launched", .pending.len())]
    Stalled { pending: Vec<TaskKey> },
}

/// Errors related to configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid task timeout: {duration:?} (must be > 0)")]
    InvalidTimeout { duration: Duration },
}

/// Result type alias for dagrun operations
pub type DagResult<T> = Result<T, DagError>;

/// Result type alias for graph operations
pub type GraphResult<T> = Result<T, GraphError>;

/// Result type alias for context operations
pub type ContextResult<T> = Result<T, ContextError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

fn format_cycle(members: &[TaskKey]) -> String {
    members
        .iter()
        .map(TaskKey::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl DagError {
    /// The key of the task a run-time failure is attributed to, if any
    pub fn task_key(&self) -> Option<&TaskKey> {
        match self {
            DagError::Execution(err) => err.task_key(),
            DagError::Context(ContextError::NotFound(key))
            | DagError::Context(ContextError::DuplicateWrite(key)) => Some(key),
            DagError::Graph(GraphError::DuplicateKey { key }) => Some(key),
            _ => None,
        }
    }

    /// Check if this error indicates cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DagError::Cancelled)
    }

    /// Check if this error indicates a dependency cycle
    pub fn is_cycle(&self) -> bool {
        matches!(self, DagError::Graph(GraphError::Cycle { .. }))
    }

    /// Check if this error indicates a timed out task
    pub fn is_timeout(&self) -> bool {
        matches!(self, DagError::Execution(ExecutionError::TaskTimedOut { .. }))
    }
}

impl ExecutionError {
    /// Wrap a task's computation error, unwrapping context errors it propagated
    pub fn from_task(key: TaskKey, source: BoxError) -> Self {
        match source.downcast::<ContextError>() {
            Ok(context) => ExecutionError::Context {
                key,
                source: *context,
            },
            Err(source) => ExecutionError::TaskFailed { key, source },
        }
    }

    /// The key of the failing task, if the error is tied to one
    pub fn task_key(&self) -> Option<&TaskKey> {
        match self {
            ExecutionError::TaskFailed { key, .. }
            | ExecutionError::Context { key, .. }
            | ExecutionError::TaskTimedOut { key, .. }
            | ExecutionError::TaskPanicked { key } => Some(key),
            ExecutionError::Stalled { .. } => None,
        }
    }
}

impl GraphError {
    /// Create a cycle error from the keys on the offending path
    pub fn cycle(members: Vec<TaskKey>) -> Self {
        GraphError::Cycle { members }
    }
}
