//! Dependency graph construction using daggy for DAG storage

use std::collections::HashMap;
use std::sync::Arc;

use daggy::petgraph::visit::EdgeRef;
use daggy::{Dag, Walker};
use tracing::debug;

use crate::error::{GraphError, GraphResult};
use crate::task::{Dependency, TaskKey, TaskRef};

/// Node index in the DAG, re-exported from daggy
pub use daggy::NodeIndex;

/// A node in the dependency graph
pub struct TaskNode<V> {
    /// Key the task was resolved under
    pub key: TaskKey,
    /// The single instance used for this key during the run
    pub task: TaskRef<V>,
    /// Direct dependency keys, in declaration order, without repeats
    pub dependencies: Vec<TaskKey>,
}

/// Validated DAG of every task reachable from a root task
///
/// Edges point from a dependency to the task that depends on it.
pub struct DependencyGraph<V> {
    dag: Dag<TaskNode<V>, ()>,
    index: HashMap<TaskKey, NodeIndex>,
    root: NodeIndex,
}

impl<V> DependencyGraph<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Build the graph from `root` and its transitive dependency declarations
    ///
    /// Every distinct key is instantiated once and shared by all dependents:
    /// the first reference to a key decides which task runs for it, and
    /// later references of either kind reuse that task. Fails on dependency
    /// cycles, on two distinct instances sharing a key, and on constructors
    /// producing a task with a key other than the one they were declared
    /// under.
    pub fn build(root: impl Into<Dependency<V>>) -> GraphResult<Self> {
        let mut builder = GraphBuilder {
            dag: Dag::new(),
            index: HashMap::new(),
            instances: HashMap::new(),
            path: Vec::new(),
        };
        let root = builder.resolve(root.into())?;

        debug!(
            root = %builder.dag[root].key,
            tasks = builder.dag.node_count(),
            "Built dependency graph"
        );

        Ok(Self {
            dag: builder.dag,
            index: builder.index,
            root,
        })
    }
}

impl<V> DependencyGraph<V> {
    /// Key of the root task
    pub fn root_key(&self) -> &TaskKey {
        &self.dag[self.root].key
    }

    /// Number of distinct tasks in the graph
    pub fn len(&self) -> usize {
        self.dag.node_count()
    }

    /// A built graph always holds at least its root
    pub fn is_empty(&self) -> bool {
        self.dag.node_count() == 0
    }

    /// Whether a task with `key` is part of the graph
    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// The task instance resolved for `key`
    pub fn task(&self, key: &str) -> Option<&TaskRef<V>> {
        self.node_by_key(key).map(|node| &node.task)
    }

    /// Direct dependency keys of `key`, in declaration order
    pub fn dependencies(&self, key: &str) -> Option<&[TaskKey]> {
        self.node_by_key(key).map(|node| node.dependencies.as_slice())
    }

    /// Keys of the tasks that directly depend on `key`, sorted
    pub fn dependents(&self, key: &str) -> Vec<TaskKey> {
        let Some(&node) = self.index.get(key) else {
            return Vec::new();
        };
        let mut dependents: Vec<TaskKey> = self
            .children(node)
            .map(|child| self.dag[child].key.clone())
            .collect();
        dependents.sort();
        dependents
    }

    /// All task keys, sorted
    pub fn keys(&self) -> Vec<TaskKey> {
        let mut keys: Vec<TaskKey> = self.index.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// All `(dependency, dependent)` pairs, sorted
    pub fn edges(&self) -> Vec<(TaskKey, TaskKey)> {
        let mut edges: Vec<(TaskKey, TaskKey)> = self
            .dag
            .graph()
            .edge_references()
            .map(|edge| {
                (
                    self.dag[edge.source()].key.clone(),
                    self.dag[edge.target()].key.clone(),
                )
            })
            .collect();
        edges.sort();
        edges
    }

    /// Task keys in an order where every dependency precedes its dependents
    pub fn topological_order(&self) -> Vec<TaskKey> {
        daggy::petgraph::algo::toposort(self.dag.graph(), None)
            .unwrap_or_else(|_| Vec::new())
            .into_iter()
            .map(|node| self.dag[node].key.clone())
            .collect()
    }

    /// Export the graph structure for visualization or debugging
    pub fn export_dot(&self) -> String {
        use std::fmt::Write;

        let mut dot = String::new();
        let _ = writeln!(dot, "digraph DependencyGraph {{");
        let _ = writeln!(dot, "  rankdir=BT;");
        for node in self.dag.graph().node_indices() {
            let shape = if node == self.root { "doublecircle" } else { "box" };
            let _ = writeln!(
                dot,
                "  {} [label=\"{}\" shape={}];",
                node.index(),
                self.dag[node].key,
                shape
            );
        }
        for edge in self.dag.graph().edge_references() {
            let _ = writeln!(dot, "  {} -> {};", edge.source().index(), edge.target().index());
        }
        let _ = writeln!(dot, "}}");
        dot
    }

    pub(crate) fn root(&self) -> NodeIndex {
        self.root
    }

    pub(crate) fn node(&self, node: NodeIndex) -> &TaskNode<V> {
        &self.dag[node]
    }

    pub(crate) fn nodes(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.dag.graph().node_indices()
    }

    /// Tasks depending directly on `node`
    pub(crate) fn children(&self, node: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.dag.children(node).iter(&self.dag).map(|(_, child)| child)
    }

    fn node_by_key(&self, key: &str) -> Option<&TaskNode<V>> {
        self.index.get(key).map(|&node| &self.dag[node])
    }
}

struct GraphBuilder<V> {
    dag: Dag<TaskNode<V>, ()>,
    index: HashMap<TaskKey, NodeIndex>,
    /// First explicit instance referenced under each key
    instances: HashMap<TaskKey, TaskRef<V>>,
    /// Keys currently being expanded, from the root downwards
    path: Vec<TaskKey>,
}

impl<V> GraphBuilder<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn resolve(&mut self, dependency: Dependency<V>) -> GraphResult<NodeIndex> {
        let declared = dependency.key();

        if let Some(position) = self.path.iter().position(|key| *key == declared) {
            let mut members = self.path[position..].to_vec();
            members.push(declared);
            return Err(GraphError::cycle(members));
        }

        let task = match dependency {
            Dependency::Instance(task) => {
                match self.instances.get(&declared) {
                    Some(seen) if !same_instance(seen, &task) => {
                        return Err(GraphError::DuplicateKey { key: declared });
                    }
                    Some(_) => {}
                    None => {
                        self.instances.insert(declared.clone(), task.clone());
                    }
                }
                if let Some(&existing) = self.index.get(&declared) {
                    debug!(task = %declared, "Task deduplicated");
                    return Ok(existing);
                }
                task
            }
            Dependency::Constructor { key, make } => {
                if let Some(&existing) = self.index.get(&key) {
                    debug!(task = %key, "Task deduplicated");
                    return Ok(existing);
                }
                let task = make();
                let actual = task.key();
                if actual != key {
                    return Err(GraphError::KeyMismatch {
                        declared: key,
                        actual,
                    });
                }
                task
            }
        };

        self.insert(declared, task)
    }

    fn insert(&mut self, key: TaskKey, task: TaskRef<V>) -> GraphResult<NodeIndex> {
        let declared = task.dependencies();
        let node = self.dag.add_node(TaskNode {
            key: key.clone(),
            task,
            dependencies: Vec::with_capacity(declared.len()),
        });
        self.index.insert(key.clone(), node);
        debug!(task = %key, node_index = ?node, "Added task to graph");

        self.path.push(key.clone());
        for dependency in declared {
            let parent = self.resolve(dependency)?;
            let parent_key = self.dag[parent].key.clone();
            if self.dag[node].dependencies.contains(&parent_key) {
                continue;
            }
            self.dag.add_edge(parent, node, ()).map_err(|_| {
                GraphError::cycle(vec![key.clone(), parent_key.clone(), key.clone()])
            })?;
            if let Some(weight) = self.dag.node_weight_mut(node) {
                weight.dependencies.push(parent_key);
            }
        }
        self.path.pop();

        Ok(node)
    }
}

/// Compare task instances by allocation, ignoring vtable identity
fn same_instance<V>(a: &TaskRef<V>, b: &TaskRef<V>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}
