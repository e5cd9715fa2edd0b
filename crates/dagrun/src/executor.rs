//! Executor running a dependency graph against an execution context

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::task::JoinError;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::cancel::CancelSignal;
use crate::context::ExecutionContext;
use crate::error::{ContextError, DagError, DagResult, ExecutionError};
use crate::graph::{DependencyGraph, NodeIndex};
use crate::reporter::{ExecutionReporter, NoOpReporter, TaskExecutionEvent};
use crate::task::{TaskKey, TaskRef, TaskState};
use crate::types::ExecutorConfig;

/// Runs dependency graphs, each task at most once, independent tasks concurrently
///
/// Scheduling follows an in-degree countdown: every task starts with the
/// number of dependencies it still waits for, tasks at zero are launched,
/// and each completion decrements the counters of its direct dependents.
/// A task therefore starts only after all of its dependencies stored their
/// results in the context.
pub struct Executor {
    config: ExecutorConfig,
    reporter: Mutex<Box<dyn ExecutionReporter>>,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Executor {
    /// Create a new executor with default configuration
    pub fn new() -> Self {
        Self {
            config: ExecutorConfig::default(),
            reporter: Mutex::new(Box::new(NoOpReporter)),
        }
    }

    /// Create a new executor with custom configuration
    pub fn with_config(config: ExecutorConfig) -> DagResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            reporter: Mutex::new(Box::new(NoOpReporter)),
        })
    }

    /// Send execution events to `reporter`
    pub fn with_reporter<R: ExecutionReporter + 'static>(self, reporter: R) -> Self {
        Self {
            config: self.config,
            reporter: Mutex::new(Box::new(reporter)),
        }
    }

    /// Get the current configuration
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run `graph` and return the root task's result
    pub async fn run<V>(
        &self,
        graph: &DependencyGraph<V>,
        context: &ExecutionContext<V>,
    ) -> DagResult<V>
    where
        V: Clone + Send + Sync + 'static,
    {
        self.run_with_cancel(graph, context, &CancelSignal::new()).await
    }

    /// Run `graph`, launching no further tasks once `cancel` is raised
    ///
    /// Tasks already running when the signal is raised are allowed to
    /// finish; the run then fails with [`DagError::Cancelled`] unless a task
    /// failure was recorded first.
    pub async fn run_with_cancel<V>(
        &self,
        graph: &DependencyGraph<V>,
        context: &ExecutionContext<V>,
        cancel: &CancelSignal,
    ) -> DagResult<V>
    where
        V: Clone + Send + Sync + 'static,
    {
        let span = info_span!("run", run_id = %Uuid::new_v4(), root = %graph.root_key());
        self.schedule(graph, context, cancel).instrument(span).await
    }

    async fn schedule<V>(
        &self,
        graph: &DependencyGraph<V>,
        context: &ExecutionContext<V>,
        cancel: &CancelSignal,
    ) -> DagResult<V>
    where
        V: Clone + Send + Sync + 'static,
    {
        let started_at = Instant::now();
        let total_tasks = graph.len();
        let root = graph.root();

        // Seeded entries must not collide with results the run will produce
        for node in graph.nodes() {
            let key = &graph.node(node).key;
            if self.stores_result(graph, node) && context.contains(key) {
                return Err(ContextError::DuplicateWrite(key.clone()).into());
            }
        }

        let limit = self.config.max_concurrent_tasks.resolve();
        let mut states: HashMap<NodeIndex, TaskState> = HashMap::with_capacity(total_tasks);
        let mut remaining: HashMap<NodeIndex, usize> = HashMap::with_capacity(total_tasks);
        let mut eligible: VecDeque<NodeIndex> = VecDeque::new();

        for node in graph.nodes() {
            let pending = graph.node(node).dependencies.len();
            remaining.insert(node, pending);
            if pending == 0 {
                states.insert(node, TaskState::Eligible);
                eligible.push_back(node);
            } else {
                states.insert(node, TaskState::Pending);
            }
        }

        info!(tasks = total_tasks, "Starting run");
        self.report(TaskExecutionEvent::ExecutionStarted {
            root: graph.root_key().clone(),
            total_tasks,
        });

        let mut running = FuturesUnordered::new();
        let mut launched_at: HashMap<NodeIndex, Instant> = HashMap::new();
        let mut failure: Option<DagError> = None;
        let mut root_output: Option<V> = None;
        let mut completed_tasks = 0;
        let mut failed_tasks = 0;

        loop {
            if failure.is_none() && cancel.is_cancelled() {
                warn!("Run cancelled, no further tasks will be launched");
                failure = Some(DagError::Cancelled);
            }

            if failure.is_none() {
                while limit.map_or(true, |max| running.len() < max) {
                    let Some(node) = eligible.pop_front() else {
                        break;
                    };
                    if states.get(&node) != Some(&TaskState::Eligible) {
                        continue;
                    }
                    advance(&mut states, node, TaskState::Running);
                    launched_at.insert(node, Instant::now());

                    let task_node = graph.node(node);
                    debug!(task = %task_node.key, "Launching task");
                    self.report(TaskExecutionEvent::TaskStarted {
                        key: task_node.key.clone(),
                        task_name: task_node.task.name(),
                    });
                    running.push(self.launch(graph, context, node));
                }
            }

            if running.is_empty() {
                break;
            }

            let (node, outcome) = tokio::select! {
                Some(finished) = running.next() => finished,
                _ = cancel.cancelled(), if failure.is_none() => continue,
                else => break,
            };

            let task_node = graph.node(node);
            let key = &task_node.key;
            let duration = launched_at
                .remove(&node)
                .map(|at| at.elapsed())
                .unwrap_or_default();

            match flatten(key, outcome) {
                Ok(output) => {
                    advance(&mut states, node, TaskState::Completed);
                    completed_tasks += 1;
                    debug!(task = %key, ?duration, "Task completed");
                    self.report(TaskExecutionEvent::TaskCompleted {
                        key: key.clone(),
                        task_name: task_node.task.name(),
                        duration,
                    });

                    if node == root {
                        root_output = Some(output);
                    }

                    for dependent in graph.children(node) {
                        let Some(count) = remaining.get_mut(&dependent) else {
                            continue;
                        };
                        *count = count.saturating_sub(1);
                        if *count == 0 {
                            advance(&mut states, dependent, TaskState::Eligible);
                            eligible.push_back(dependent);
                        }
                    }
                }
                Err(err) => {
                    advance(&mut states, node, TaskState::Failed);
                    failed_tasks += 1;
                    error!(task = %key, error = %err, "Task failed");
                    self.report(TaskExecutionEvent::TaskFailed {
                        key: key.clone(),
                        task_name: task_node.task.name(),
                        error: err.to_string(),
                        duration,
                    });
                    // First recorded failure wins
                    if failure.is_none() {
                        failure = Some(DagError::Execution(err));
                    }
                }
            }
        }

        let duration = started_at.elapsed();
        self.report(TaskExecutionEvent::ExecutionFinished {
            total_tasks,
            completed_tasks,
            failed_tasks,
            duration,
        });
        self.finish_reporting();

        if let Some(err) = failure {
            return Err(err);
        }

        match root_output {
            Some(output) => {
                info!(?duration, "Run completed");
                Ok(output)
            }
            None => {
                let mut pending: Vec<TaskKey> = states
                    .iter()
                    .filter(|(_, state)| !state.is_finished())
                    .map(|(node, _)| graph.node(*node).key.clone())
                    .collect();
                pending.sort();
                error!(pending = pending.len(), "Run stalled before the root task completed");
                Err(ExecutionError::Stalled { pending }.into())
            }
        }
    }

    /// Spawn the unit of work for `node`
    fn launch<V>(
        &self,
        graph: &DependencyGraph<V>,
        context: &ExecutionContext<V>,
        node: NodeIndex,
    ) -> impl Future<Output = (NodeIndex, Result<Result<V, ExecutionError>, JoinError>)>
    where
        V: Clone + Send + Sync + 'static,
    {
        let task_node = graph.node(node);
        let unit = run_unit(
            task_node.key.clone(),
            task_node.task.clone(),
            context.clone(),
            self.stores_result(graph, node),
            self.config.task_timeout,
        );
        let handle = tokio::spawn(unit.in_current_span());
        async move { (node, handle.await) }
    }

    fn stores_result<V>(&self, graph: &DependencyGraph<V>, node: NodeIndex) -> bool {
        node != graph.root() || self.config.store_root_result
    }

    fn report(&self, event: TaskExecutionEvent) {
        if let Ok(mut reporter) = self.reporter.lock() {
            reporter.report_event(event);
        }
    }

    fn finish_reporting(&self) {
        if let Ok(mut reporter) = self.reporter.lock() {
            reporter.finish();
        }
    }
}

/// Compute one task and store its result
async fn run_unit<V>(
    key: TaskKey,
    task: TaskRef<V>,
    context: ExecutionContext<V>,
    store: bool,
    timeout: Option<Duration>,
) -> Result<V, ExecutionError>
where
    V: Clone + Send + Sync + 'static,
{
    let computation = task.compute(&context);
    let computed = match timeout {
        Some(duration) => tokio::time::timeout(duration, computation)
            .await
            .map_err(|_| ExecutionError::TaskTimedOut {
                key: key.clone(),
                duration,
            })?,
        None => computation.await,
    };
    let output = computed.map_err(|source| ExecutionError::from_task(key.clone(), source))?;

    if store {
        context
            .put(key.clone(), output.clone())
            .map_err(|source| ExecutionError::Context { key, source })?;
    }
    Ok(output)
}

fn flatten<V>(
    key: &TaskKey,
    outcome: Result<Result<V, ExecutionError>, JoinError>,
) -> Result<V, ExecutionError> {
    match outcome {
        Ok(result) => result,
        Err(join_error) => {
            warn!(task = %key, panicked = join_error.is_panic(), "Task did not run to completion");
            Err(ExecutionError::TaskPanicked { key: key.clone() })
        }
    }
}

fn advance(states: &mut HashMap<NodeIndex, TaskState>, node: NodeIndex, next: TaskState) {
    if let Some(state) = states.get_mut(&node) {
        debug_assert!(
            state.can_transition_to(next),
            "illegal task state transition {state:?} -> {next:?}"
        );
        *state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use crate::error::{BoxError, ContextError};
    use crate::task::{Dependency, FnTask, TaskSpec};
    use crate::types::Limit;

    /// Records task starts and ends in the order they happen
    #[derive(Debug, Default)]
    struct Probe {
        log: Mutex<Vec<String>>,
    }

    impl Probe {
        fn record(&self, entry: String) {
            self.log.lock().unwrap().push(entry);
        }

        fn count(&self, entry: &str) -> usize {
            self.log.lock().unwrap().iter().filter(|e| *e == entry).count()
        }

        fn position(&self, entry: &str) -> usize {
            self.log
                .lock()
                .unwrap()
                .iter()
                .position(|e| e == entry)
                .unwrap_or_else(|| panic!("{entry} was never recorded"))
        }
    }

    fn probed<F>(probe: &Arc<Probe>, key: &str, delay_ms: u64, compute: F) -> Arc<FnTask<i64>>
    where
        F: Fn(&ExecutionContext<i64>) -> Result<i64, BoxError> + Send + Sync + 'static,
    {
        let probe = probe.clone();
        let name = key.to_string();
        let compute = Arc::new(compute);
        FnTask::new(key, move |ctx: ExecutionContext<i64>| {
            let probe = probe.clone();
            let name = name.clone();
            let compute = compute.clone();
            async move {
                probe.record(format!("start:{name}"));
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                let result = compute(&ctx);
                probe.record(format!("end:{name}"));
                result
            }
        })
    }

    /// The sample graph: C = A + B, D = B + C
    fn scoring_graph(probe: &Arc<Probe>, fail_b: bool) -> Arc<FnTask<i64>> {
        let a = probed(probe, "A", 20, |_| Ok(23));
        let b = probed(probe, "B", 5, move |_| {
            if fail_b {
                Err("B exploded".into())
            } else {
                Ok(3)
            }
        });
        let c = probed(probe, "C", 5, |ctx| Ok(ctx.get("A")? + ctx.get("B")?))
            .depends_on(a)
            .depends_on(b.clone());
        probed(probe, "D", 5, |ctx| Ok(ctx.get("B")? + ctx.get("C")?))
            .depends_on(b)
            .depends_on(c)
    }

    #[derive(Debug, Default)]
    struct Leaf23;
    #[derive(Debug, Default)]
    struct Leaf3;
    #[derive(Debug, Default)]
    struct Sum;
    #[derive(Debug, Default)]
    struct Score;

    #[async_trait::async_trait]
    impl TaskSpec for Leaf23 {
        type Output = i64;

        fn key(&self) -> TaskKey {
            "A".into()
        }

        async fn compute(&self, _context: &ExecutionContext<i64>) -> Result<i64, BoxError> {
            Ok(23)
        }
    }

    #[async_trait::async_trait]
    impl TaskSpec for Leaf3 {
        type Output = i64;

        fn key(&self) -> TaskKey {
            "B".into()
        }

        async fn compute(&self, _context: &ExecutionContext<i64>) -> Result<i64, BoxError> {
            Ok(3)
        }
    }

    #[async_trait::async_trait]
    impl TaskSpec for Sum {
        type Output = i64;

        fn key(&self) -> TaskKey {
            "C".into()
        }

        fn dependencies(&self) -> Vec<Dependency<i64>> {
            vec![Dependency::of::<Leaf23>("A"), Dependency::of::<Leaf3>("B")]
        }

        async fn compute(&self, context: &ExecutionContext<i64>) -> Result<i64, BoxError> {
            Ok(context.get("A")? + context.get("B")?)
        }
    }

    #[async_trait::async_trait]
    impl TaskSpec for Score {
        type Output = i64;

        fn key(&self) -> TaskKey {
            "D".into()
        }

        fn dependencies(&self) -> Vec<Dependency<i64>> {
            vec![Dependency::of::<Leaf3>("B"), Dependency::of::<Sum>("C")]
        }

        async fn compute(&self, context: &ExecutionContext<i64>) -> Result<i64, BoxError> {
            Ok(context.get("B")? + context.get("C")?)
        }
    }

    #[derive(Debug)]
    struct Exploding;

    #[async_trait::async_trait]
    impl TaskSpec for Exploding {
        type Output = i64;

        fn key(&self) -> TaskKey {
            "boom".into()
        }

        async fn compute(&self, _context: &ExecutionContext<i64>) -> Result<i64, BoxError> {
            panic!("exploded")
        }
    }

    #[derive(Debug, Default)]
    struct RecordingReporter {
        events: Arc<Mutex<Vec<TaskExecutionEvent>>>,
        finished: Arc<AtomicBool>,
    }

    impl ExecutionReporter for RecordingReporter {
        fn report_event(&mut self, event: TaskExecutionEvent) {
            self.events.lock().unwrap().push(event);
        }

        fn finish(&mut self) {
            self.finished.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_end_to_end_score() {
        let graph = DependencyGraph::build(Arc::new(Score)).unwrap();
        let context = ExecutionContext::new();

        let result = Executor::new().run(&graph, &context).await.unwrap();

        assert_eq!(result, 29);
        let snapshot = context.snapshot();
        assert_eq!(snapshot[&TaskKey::from("A")], 23);
        assert_eq!(snapshot[&TaskKey::from("B")], 3);
        assert_eq!(snapshot[&TaskKey::from("C")], 26);
        assert_eq!(snapshot[&TaskKey::from("D")], 29);
        assert_eq!(snapshot.len(), 4);
    }

    #[tokio::test]
    async fn test_each_task_runs_exactly_once() {
        let probe = Arc::new(Probe::default());
        let graph = DependencyGraph::build(scoring_graph(&probe, false)).unwrap();
        let context = ExecutionContext::new();

        let result = Executor::new().run(&graph, &context).await.unwrap();

        assert_eq!(result, 29);
        for key in ["A", "B", "C", "D"] {
            assert_eq!(probe.count(&format!("start:{key}")), 1, "{key} ran more than once");
        }
    }

    #[tokio::test]
    async fn test_dependencies_complete_before_dependents_start() {
        let probe = Arc::new(Probe::default());
        let graph = DependencyGraph::build(scoring_graph(&probe, false)).unwrap();
        Executor::new()
            .run(&graph, &ExecutionContext::new())
            .await
            .unwrap();

        for key in graph.keys() {
            for dependency in graph.dependencies(key.as_str()).unwrap() {
                assert!(
                    probe.position(&format!("end:{dependency}"))
                        < probe.position(&format!("start:{key}")),
                    "{key} started before {dependency} finished"
                );
            }
        }
    }

    #[tokio::test]
    async fn test_independent_tasks_run_concurrently() {
        let probe = Arc::new(Probe::default());
        let left = probed(&probe, "left", 100, |_| Ok(1));
        let right = probed(&probe, "right", 100, |_| Ok(2));
        let root = probed(&probe, "root", 0, |ctx| Ok(ctx.get("left")? + ctx.get("right")?))
            .depends_on(left)
            .depends_on(right);
        let graph = DependencyGraph::build(root).unwrap();

        let start = Instant::now();
        let result = Executor::new()
            .run(&graph, &ExecutionContext::new())
            .await
            .unwrap();
        let elapsed = start.elapsed();

        assert_eq!(result, 3);
        assert!(elapsed < Duration::from_millis(190), "took {elapsed:?}");
        assert!(probe.position("start:right") < probe.position("end:left"));
    }

    #[tokio::test]
    async fn test_concurrency_limit_serializes_siblings() {
        let probe = Arc::new(Probe::default());
        let left = probed(&probe, "left", 50, |_| Ok(1));
        let right = probed(&probe, "right", 50, |_| Ok(2));
        let root = probed(&probe, "root", 0, |_| Ok(0))
            .depends_on(left)
            .depends_on(right);
        let graph = DependencyGraph::build(root).unwrap();

        let config = ExecutorConfig::new().with_max_concurrent_tasks(Limit::from(1));
        let executor = Executor::with_config(config).unwrap();

        let start = Instant::now();
        executor
            .run(&graph, &ExecutionContext::new())
            .await
            .unwrap();

        assert!(start.elapsed() >= Duration::from_millis(95));
    }

    #[tokio::test]
    async fn test_failure_propagates_with_task_key() {
        let probe = Arc::new(Probe::default());
        let graph = DependencyGraph::build(scoring_graph(&probe, true)).unwrap();
        let context = ExecutionContext::new();

        let err = Executor::new().run(&graph, &context).await.unwrap_err();

        assert_eq!(err.task_key(), Some(&TaskKey::from("B")));
        assert!(matches!(
            err,
            DagError::Execution(ExecutionError::TaskFailed { .. })
        ));
        assert!(err.to_string().contains("B exploded"));
        assert_eq!(probe.count("start:C"), 0);
        assert_eq!(probe.count("start:D"), 0);
        // The in-flight sibling finishes and keeps its result
        assert_eq!(probe.count("end:A"), 1);
        assert_eq!(context.get("A"), Ok(23));
        assert!(!context.contains("B"));
    }

    #[tokio::test]
    async fn test_cycle_prevents_any_execution() {
        let probe = Arc::new(Probe::default());
        let looping = probed(&probe, "A", 0, |_| Ok(1)).depends_on(Dependency::constructor(
            "B",
            {
                let probe = probe.clone();
                move || {
                    probed(&probe, "B", 0, |_| Ok(2)).depends_on(Dependency::constructor(
                        "A",
                        {
                            let probe = probe.clone();
                            move || probed(&probe, "A", 0, |_| Ok(1)) as TaskRef<i64>
                        },
                    )) as TaskRef<i64>
                }
            },
        ));

        let err = DependencyGraph::build(looping).err().unwrap();
        assert!(DagError::from(err).is_cycle());
        assert!(probe.log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_stops_new_launches() {
        let probe = Arc::new(Probe::default());
        let first = probed(&probe, "first", 80, |_| Ok(1));
        let second = probed(&probe, "second", 0, |_| Ok(2)).depends_on(first);
        let graph = DependencyGraph::build(second).unwrap();
        let context = ExecutionContext::new();

        let cancel = CancelSignal::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = Executor::new()
            .run_with_cancel(&graph, &context, &cancel)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(probe.count("end:first"), 1);
        assert_eq!(probe.count("start:second"), 0);
        assert_eq!(context.get("first"), Ok(1));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_runs_nothing() {
        let probe = Arc::new(Probe::default());
        let graph = DependencyGraph::build(probed(&probe, "only", 0, |_| Ok(1))).unwrap();
        let cancel = CancelSignal::new();
        cancel.cancel();

        let err = Executor::new()
            .run_with_cancel(&graph, &ExecutionContext::new(), &cancel)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(probe.count("start:only"), 0);
    }

    #[tokio::test]
    async fn test_task_timeout() {
        let probe = Arc::new(Probe::default());
        let graph = DependencyGraph::build(probed(&probe, "slow", 500, |_| Ok(1))).unwrap();
        let config = ExecutorConfig::new()
            .with_task_timeout(Duration::from_millis(20))
            .unwrap();

        let err = Executor::with_config(config)
            .unwrap()
            .run(&graph, &ExecutionContext::new())
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(err.task_key(), Some(&TaskKey::from("slow")));
        assert_eq!(probe.count("end:slow"), 0);
    }

    #[tokio::test]
    async fn test_panicking_task_fails_the_run() {
        let graph = DependencyGraph::build(Arc::new(Exploding)).unwrap();
        let err = Executor::new()
            .run(&graph, &ExecutionContext::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DagError::Execution(ExecutionError::TaskPanicked { .. })
        ));
        assert_eq!(err.task_key(), Some(&TaskKey::from("boom")));
    }

    #[tokio::test]
    async fn test_reading_unproduced_key_is_a_context_error() {
        let probe = Arc::new(Probe::default());
        let reader = probed(&probe, "reader", 0, |ctx| ctx.get("ghost").map_err(Into::into));
        let graph = DependencyGraph::build(reader).unwrap();

        let err = Executor::new()
            .run(&graph, &ExecutionContext::new())
            .await
            .unwrap_err();

        match err {
            DagError::Execution(ExecutionError::Context { key, source }) => {
                assert_eq!(key.as_str(), "reader");
                assert_eq!(source, ContextError::NotFound("ghost".into()));
            }
            other => panic!("Expected context error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_seeded_inputs_are_visible() {
        let probe = Arc::new(Probe::default());
        let doubled = probed(&probe, "doubled", 0, |ctx| Ok(ctx.get("input")? * 2));
        let graph = DependencyGraph::build(doubled).unwrap();
        let context = ExecutionContext::with_seed([("input", 21)]).unwrap();

        let result = Executor::new().run(&graph, &context).await.unwrap();
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn test_seed_colliding_with_task_key_is_rejected() {
        let probe = Arc::new(Probe::default());
        let graph = DependencyGraph::build(probed(&probe, "taken", 0, |_| Ok(1))).unwrap();
        let context = ExecutionContext::with_seed([("taken", 0)]).unwrap();

        let err = Executor::new().run(&graph, &context).await.unwrap_err();

        assert!(matches!(
            err,
            DagError::Context(ContextError::DuplicateWrite(_))
        ));
        assert_eq!(probe.count("start:taken"), 0);
        assert_eq!(context.get("taken"), Ok(0));
    }

    #[tokio::test]
    async fn test_root_result_storage_is_optional() {
        let graph = DependencyGraph::build(Arc::new(Score)).unwrap();
        let context = ExecutionContext::new();
        let executor =
            Executor::with_config(ExecutorConfig::new().with_store_root_result(false)).unwrap();

        assert_eq!(executor.run(&graph, &context).await.unwrap(), 29);
        assert!(!context.contains("D"));
        assert_eq!(context.len(), 3);
    }

    #[tokio::test]
    async fn test_reporter_receives_lifecycle_events() {
        let reporter = RecordingReporter::default();
        let events = reporter.events.clone();
        let finished = reporter.finished.clone();

        let probe = Arc::new(Probe::default());
        let first = probed(&probe, "first", 0, |_| Ok(1));
        let second = probed(&probe, "second", 0, |ctx| Ok(ctx.get("first")? + 1)).depends_on(first);
        let graph = DependencyGraph::build(second).unwrap();

        let executor = Executor::new().with_reporter(reporter);
        assert_eq!(
            executor
                .run(&graph, &ExecutionContext::new())
                .await
                .unwrap(),
            2
        );

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 6);
        assert_eq!(
            events[0],
            TaskExecutionEvent::ExecutionStarted {
                root: "second".into(),
                total_tasks: 2
            }
        );
        assert!(matches!(
            &events[1],
            TaskExecutionEvent::TaskStarted { key, .. } if key.as_str() == "first"
        ));
        assert!(matches!(
            &events[2],
            TaskExecutionEvent::TaskCompleted { key, .. } if key.as_str() == "first"
        ));
        assert!(matches!(
            &events[3],
            TaskExecutionEvent::TaskStarted { key, .. } if key.as_str() == "second"
        ));
        assert!(matches!(
            &events[4],
            TaskExecutionEvent::TaskCompleted { key, .. } if key.as_str() == "second"
        ));
        assert!(matches!(
            events[5],
            TaskExecutionEvent::ExecutionFinished {
                total_tasks: 2,
                completed_tasks: 2,
                failed_tasks: 0,
                ..
            }
        ));
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_graph_can_be_run_again_with_fresh_context() {
        let graph = DependencyGraph::build(Arc::new(Score)).unwrap();
        let executor = Executor::new();

        assert_eq!(executor.run(&graph, &ExecutionContext::new()).await.unwrap(), 29);
        assert_eq!(executor.run(&graph, &ExecutionContext::new()).await.unwrap(), 29);
    }
}
