//! dagrun - Async Dependency-Driven Task Executor
//!
//! A task declares the tasks it depends on; the engine resolves the whole
//! dependency graph from a root task, runs every distinct task exactly once
//! in dependency order, and threads results through a shared write-once
//! context.
//!
//! # Overview
//!
//! - [`TaskSpec`] describes a unit of work: a unique key, its dependencies
//!   and an async `compute` step reading the results of those dependencies
//! - [`DependencyGraph::build`] resolves and validates the graph reachable
//!   from a root task, sharing one instance per key and rejecting cycles
//! - [`ExecutionContext`] stores each task's result under its key, at most once
//! - [`Executor::run`] launches tasks as soon as their dependencies
//!   completed, runs independent tasks concurrently and returns the root result
//!
//! # Example
//!
//! ```rust
//! use dagrun::{DependencyGraph, ExecutionContext, Executor, FnTask};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let a = FnTask::new("a", |_ctx: ExecutionContext<i64>| async { Ok(23) });
//!     let b = FnTask::new("b", |_ctx: ExecutionContext<i64>| async { Ok(3) });
//!     let sum = FnTask::new("sum", |ctx: ExecutionContext<i64>| async move {
//!         Ok(ctx.get("a")? + ctx.get("b")?)
//!     })
//!     .depends_on(a)
//!     .depends_on(b);
//!
//!     let graph = DependencyGraph::build(sum)?;
//!     let context = ExecutionContext::new();
//!     let result = Executor::new().run(&graph, &context).await?;
//!
//!     assert_eq!(result, 26);
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod context;
pub mod error;
pub mod executor;
pub mod graph;
pub mod reporter;
pub mod task;
pub mod types;

pub use cancel::CancelSignal;
pub use context::ExecutionContext;
pub use error::{
    BoxError, ConfigError, ContextError, DagError, DagResult, ExecutionError, GraphError,
};
pub use executor::Executor;
pub use graph::{DependencyGraph, NodeIndex, TaskNode};
pub use reporter::{
    ExecutionReporter, MultiReporter, NoOpReporter, SimpleConsoleReporter, TaskExecutionEvent,
};
pub use task::{Dependency, FnTask, TaskKey, TaskRef, TaskSpec, TaskState};
pub use types::{ExecutorConfig, Limit};

use std::future::Future;
use std::pin::Pin;

/// A boxed future that is Send and can be used across thread boundaries
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

// Re-export async_trait for convenience
pub use async_trait::async_trait;
