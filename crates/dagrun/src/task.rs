//! Core task abstractions and traits

use std::borrow::Borrow;
use std::fmt::{self, Debug, Display};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::ExecutionContext;
use crate::error::BoxError;
use crate::BoxFuture;

/// Identifier of a task and of its output slot in the execution context
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskKey(String);

impl TaskKey {
    /// Create a key from any string-like value
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Borrow the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskKey {
    fn from(key: &str) -> Self {
        Self(key.to_owned())
    }
}

impl From<String> for TaskKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&TaskKey> for TaskKey {
    fn from(key: &TaskKey) -> Self {
        key.clone()
    }
}

impl AsRef<str> for TaskKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for TaskKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Shared handle to a task instance
pub type TaskRef<V> = Arc<dyn TaskSpec<Output = V>>;

type TaskFactory<V> = Arc<dyn Fn() -> TaskRef<V> + Send + Sync>;

/// A declared prerequisite of a task
///
/// An `Instance` is identified by pointer identity: two different instances
/// carrying the same key make the graph ambiguous. A `Constructor` is
/// identified by its declared key and is only instantiated if no task with
/// that key has been resolved yet.
pub enum Dependency<V> {
    Instance(TaskRef<V>),
    Constructor { key: TaskKey, make: TaskFactory<V> },
}

impl<V> Dependency<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Depend on an already constructed task instance
    pub fn instance<T>(task: Arc<T>) -> Self
    where
        T: TaskSpec<Output = V>,
    {
        Dependency::Instance(task)
    }

    /// Depend on the task with `key`, building it with `make` on first use
    pub fn constructor<F>(key: impl Into<TaskKey>, make: F) -> Self
    where
        F: Fn() -> TaskRef<V> + Send + Sync + 'static,
    {
        Dependency::Constructor {
            key: key.into(),
            make: Arc::new(make),
        }
    }

    /// Depend on a task type through its `Default` constructor
    pub fn of<T>(key: impl Into<TaskKey>) -> Self
    where
        T: TaskSpec<Output = V> + Default,
    {
        Self::constructor(key, || Arc::new(T::default()) as TaskRef<V>)
    }

    /// The key this dependency refers to
    pub fn key(&self) -> TaskKey {
        match self {
            Dependency::Instance(task) => task.key(),
            Dependency::Constructor { key, .. } => key.clone(),
        }
    }
}

impl<V> Clone for Dependency<V> {
    fn clone(&self) -> Self {
        match self {
            Dependency::Instance(task) => Dependency::Instance(task.clone()),
            Dependency::Constructor { key, make } => Dependency::Constructor {
                key: key.clone(),
                make: make.clone(),
            },
        }
    }
}

impl<V> Debug for Dependency<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dependency::Instance(task) => f.debug_tuple("Instance").field(&task.key()).finish(),
            Dependency::Constructor { key, .. } => {
                f.debug_struct("Constructor").field("key", key).finish()
            }
        }
    }
}

impl<V, T> From<Arc<T>> for Dependency<V>
where
    T: TaskSpec<Output = V>,
{
    fn from(task: Arc<T>) -> Self {
        Dependency::Instance(task)
    }
}

/// Core trait that all tasks must implement
///
/// A task is immutable configuration: a unique key, the tasks whose results
/// it needs, and the computation producing its own result. `compute` should
/// only read context entries of its declared dependencies; the engine does
/// not police this.
#[async_trait::async_trait]
pub trait TaskSpec: Send + Sync + 'static {
    /// The type of result stored in the context
    type Output: Clone + Send + Sync + 'static;

    /// The unique key of this task
    fn key(&self) -> TaskKey;

    /// Tasks that must complete before this one starts, in declaration order
    fn dependencies(&self) -> Vec<Dependency<Self::Output>> {
        Vec::new()
    }

    /// Run the task against the results produced so far
    async fn compute(
        &self,
        context: &ExecutionContext<Self::Output>,
    ) -> Result<Self::Output, BoxError>;

    /// Get a human-readable name for this task (used for logging and reporting)
    fn name(&self) -> String {
        self.key().to_string()
    }
}

type ComputeFn<V> =
    Arc<dyn Fn(ExecutionContext<V>) -> BoxFuture<Result<V, BoxError>> + Send + Sync>;

/// A task backed by a closure
///
/// ```rust
/// use dagrun::{FnTask, ExecutionContext};
///
/// let a = FnTask::new("a", |_ctx: ExecutionContext<i64>| async { Ok(1) });
/// let b = FnTask::new("b", |ctx: ExecutionContext<i64>| async move {
///     Ok(ctx.get("a")? + 1)
/// })
/// .depends_on(a.clone());
/// # let _ = b;
/// ```
pub struct FnTask<V> {
    key: TaskKey,
    dependencies: Vec<Dependency<V>>,
    compute: ComputeFn<V>,
}

impl<V> FnTask<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a task without dependencies computing its result with `compute`
    pub fn new<F, Fut>(key: impl Into<TaskKey>, compute: F) -> Arc<Self>
    where
        F: Fn(ExecutionContext<V>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<V, BoxError>> + Send + 'static,
    {
        Arc::new(Self {
            key: key.into(),
            dependencies: Vec::new(),
            compute: Arc::new(move |context| -> BoxFuture<Result<V, BoxError>> {
                Box::pin(compute(context))
            }),
        })
    }

    /// Return a copy of this task with `dependency` appended to its prerequisites
    pub fn depends_on(self: Arc<Self>, dependency: impl Into<Dependency<V>>) -> Arc<Self> {
        let mut dependencies = self.dependencies.clone();
        dependencies.push(dependency.into());
        Arc::new(Self {
            key: self.key.clone(),
            dependencies,
            compute: self.compute.clone(),
        })
    }
}

impl<V> Debug for FnTask<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTask")
            .field("key", &self.key)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl<V> TaskSpec for FnTask<V>
where
    V: Clone + Send + Sync + 'static,
{
    type Output = V;

    fn key(&self) -> TaskKey {
        self.key.clone()
    }

    fn dependencies(&self) -> Vec<Dependency<V>> {
        self.dependencies.clone()
    }

    async fn compute(&self, context: &ExecutionContext<V>) -> Result<V, BoxError> {
        (self.compute)(context.clone()).await
    }
}

/// Lifecycle state of a task within one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    /// Some dependencies have not completed yet
    Pending,
    /// All dependencies completed, not launched yet
    Eligible,
    /// Task is currently executing
    Running,
    /// Task stored its result
    Completed,
    /// Task failed
    Failed,
}

impl TaskState {
    /// Check if the task is in a terminal state
    pub fn is_finished(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }

    /// Check whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        matches!(
            (self, next),
            (TaskState::Pending, TaskState::Eligible)
                | (TaskState::Eligible, TaskState::Running)
                | (TaskState::Running, TaskState::Completed)
                | (TaskState::Running, TaskState::Failed)
        )
    }
}
