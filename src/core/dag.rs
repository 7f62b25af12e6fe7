//! Dependency graph and execution plan.
//!
//! The graph is built from a validated [`Catalog`]. Edges run from a
//! dependency to its dependent, so a task's level is the length of the
//! longest path reaching it from a task with no dependencies.

use crate::core::registry::Catalog;
use crate::error::{Error, Result};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// One batch of tasks that may run concurrently.
///
/// Every dependency of every task here lives in a strictly earlier level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    /// Zero-based position in the plan.
    pub index: usize,
    /// Task names, sorted.
    pub tasks: Vec<String>,
}

impl Level {
    pub fn contains(&self, name: &str) -> bool {
        self.tasks.iter().any(|t| t == name)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Ordered sequence of levels partitioning every task exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecutionPlan {
    levels: Vec<Level>,
}

impl ExecutionPlan {
    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Level> {
        self.levels.iter()
    }

    /// Number of levels.
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Number of tasks across all levels.
    pub fn task_count(&self) -> usize {
        self.levels.iter().map(Level::len).sum()
    }

    pub fn level_of(&self, name: &str) -> Option<usize> {
        self.levels
            .iter()
            .find(|level| level.contains(name))
            .map(|level| level.index)
    }
}

impl<'a> IntoIterator for &'a ExecutionPlan {
    type Item = &'a Level;
    type IntoIter = std::slice::Iter<'a, Level>;

    fn into_iter(self) -> Self::IntoIter {
        self.levels.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Read-only dependency view over a catalog.
///
/// Node indices match catalog positions.
pub struct DependencyGraph {
    catalog: Arc<Catalog>,
    graph: DiGraph<String, ()>,
    node_index: HashMap<String, NodeIndex>,
    /// Level of each node, by node index.
    depths: Vec<usize>,
}

impl DependencyGraph {
    /// Build the graph and validate that it is acyclic.
    ///
    /// # Errors
    /// Returns `Error::Cycle` carrying the names along the first cycle found.
    pub fn from_registry(catalog: Catalog) -> Result<Self> {
        if let Some(path) = find_cycle(&catalog) {
            return Err(Error::Cycle { path });
        }

        let mut graph = DiGraph::with_capacity(catalog.len(), 0);
        let mut node_index = HashMap::with_capacity(catalog.len());
        for task in catalog.tasks() {
            let index = graph.add_node(task.name.clone());
            node_index.insert(task.name.clone(), index);
        }
        for task in catalog.tasks() {
            let to = node_index[&task.name];
            for dep in &task.dependencies {
                let from = node_index.get(dep).copied().ok_or_else(|| {
                    Error::UnknownDependency {
                        task: task.name.clone(),
                        dependency: dep.clone(),
                    }
                })?;
                graph.add_edge(from, to, ());
            }
        }

        let depths = assign_depths(&graph).map_err(|unresolved| Error::Cycle {
            path: unresolved
                .into_iter()
                .map(|index| graph[index].clone())
                .collect(),
        })?;

        Ok(Self {
            catalog: Arc::new(catalog),
            graph,
            node_index,
            depths,
        })
    }

    /// Group tasks into levels, sorted by name within each level.
    ///
    /// Calling this repeatedly yields identical plans.
    pub fn compute_levels(&self) -> ExecutionPlan {
        let count = self.depths.iter().max().map_or(0, |max| max + 1);
        let mut levels: Vec<Level> = (0..count)
            .map(|index| Level {
                index,
                tasks: Vec::new(),
            })
            .collect();
        for index in self.graph.node_indices() {
            levels[self.depths[index.index()]]
                .tasks
                .push(self.graph[index].clone());
        }
        for level in &mut levels {
            level.tasks.sort();
        }
        ExecutionPlan { levels }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Shared handle to the catalog for concurrent workers.
    pub fn shared_catalog(&self) -> Arc<Catalog> {
        Arc::clone(&self.catalog)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.node_index.contains_key(name)
    }

    pub fn task_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn level_of(&self, name: &str) -> Option<usize> {
        self.node_index.get(name).map(|index| self.depths[index.index()])
    }

    /// Direct dependencies of `name`, sorted.
    pub fn dependencies(&self, name: &str) -> Vec<&str> {
        self.neighbors(name, Direction::Incoming)
    }

    /// Tasks that directly depend on `name`, sorted.
    pub fn dependents(&self, name: &str) -> Vec<&str> {
        self.neighbors(name, Direction::Outgoing)
    }

    fn neighbors(&self, name: &str, direction: Direction) -> Vec<&str> {
        let Some(&index) = self.node_index.get(name) else {
            return Vec::new();
        };
        let mut names: Vec<&str> = self
            .graph
            .neighbors_directed(index, direction)
            .map(|n| self.graph[n].as_str())
            .collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("tasks", &self.task_count())
            .field("dependencies", &self.dependency_count())
            .finish()
    }
}

/// Depth-first search with three-color marking, following each task's
/// dependencies in declaration order. A dependency that is still in
/// progress closes a cycle.
///
/// The walk keeps its own stack of `(node, next dependency)` frames so that
/// long dependency chains do not grow the thread stack.
fn find_cycle(catalog: &Catalog) -> Option<Vec<String>> {
    let tasks = catalog.tasks();
    let mut marks = vec![Mark::Unvisited; tasks.len()];
    // Nodes currently in progress, outermost first.
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for root in 0..tasks.len() {
        if marks[root] != Mark::Unvisited {
            continue;
        }
        marks[root] = Mark::InProgress;
        stack.push((root, 0));

        while let Some(frame) = stack.last_mut() {
            let (node, next_dep) = *frame;
            let Some(dep) = tasks[node].dependencies.get(next_dep) else {
                marks[node] = Mark::Done;
                stack.pop();
                continue;
            };
            frame.1 += 1;

            let Some(next) = catalog.position(dep) else {
                continue;
            };
            match marks[next] {
                Mark::InProgress => {
                    let start = stack.iter().position(|&(n, _)| n == next).unwrap_or(0);
                    return Some(
                        stack[start..]
                            .iter()
                            .map(|&(n, _)| tasks[n].name.clone())
                            .collect(),
                    );
                }
                Mark::Unvisited => {
                    marks[next] = Mark::InProgress;
                    stack.push((next, 0));
                }
                Mark::Done => {}
            }
        }
    }
    None
}

/// Longest-path leveling with a work queue: a node is processed only once
/// all of its dependencies have a level. Nodes that never resolve are
/// returned as the error.
fn assign_depths(graph: &DiGraph<String, ()>) -> std::result::Result<Vec<usize>, Vec<NodeIndex>> {
    let mut waiting: Vec<usize> = graph
        .node_indices()
        .map(|n| graph.neighbors_directed(n, Direction::Incoming).count())
        .collect();
    let mut depths = vec![0usize; graph.node_count()];
    let mut queue: VecDeque<NodeIndex> = graph
        .node_indices()
        .filter(|n| waiting[n.index()] == 0)
        .collect();
    let mut resolved = 0;

    while let Some(node) = queue.pop_front() {
        resolved += 1;
        let next_depth = depths[node.index()] + 1;
        for dependent in graph.neighbors_directed(node, Direction::Outgoing) {
            let i = dependent.index();
            depths[i] = depths[i].max(next_depth);
            waiting[i] -= 1;
            if waiting[i] == 0 {
                queue.push_back(dependent);
            }
        }
    }

    if resolved == graph.node_count() {
        Ok(depths)
    } else {
        Err(graph
            .node_indices()
            .filter(|n| waiting[n.index()] > 0)
            .collect())
    }
}
