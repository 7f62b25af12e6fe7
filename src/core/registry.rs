//! Task registry and the immutable catalog it produces.

use std::collections::HashMap;

use crate::core::task::Task;
use crate::core::work::WorkHandle;
use crate::error::{Error, Result};

/// Mutable builder for a [`Catalog`].
///
/// Tasks keep their registration order, which is also the order used
/// when reporting validation errors.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: Vec<Task>,
    index: HashMap<String, usize>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task by name, dependency names and work handle.
    ///
    /// # Errors
    /// Returns `Error::DuplicateTask` if `name` is already registered.
    pub fn register<I, S>(
        &mut self,
        name: impl Into<String>,
        dependencies: I,
        work: WorkHandle,
    ) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.register_task(Task::new(name, dependencies, work))
    }

    /// Register a fully built task (retry policy, timeout).
    pub fn register_task(&mut self, task: Task) -> Result<&mut Self> {
        if self.index.contains_key(&task.name) {
            return Err(Error::DuplicateTask(task.name));
        }
        self.index.insert(task.name.clone(), self.tasks.len());
        self.tasks.push(task);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Freeze the registry into a catalog.
    ///
    /// # Errors
    /// Returns `Error::UnknownDependency` for the first dependency (in
    /// registration order) that names no registered task.
    pub fn build(self) -> Result<Catalog> {
        for task in &self.tasks {
            if let Some(missing) = task
                .dependencies
                .iter()
                .find(|dep| !self.index.contains_key(dep.as_str()))
            {
                return Err(Error::UnknownDependency {
                    task: task.name.clone(),
                    dependency: missing.clone(),
                });
            }
        }
        Ok(Catalog {
            tasks: self.tasks,
            index: self.index,
        })
    }
}

/// Validated, read-only set of tasks. Every dependency name resolves.
#[derive(Debug, Clone)]
pub struct Catalog {
    tasks: Vec<Task>,
    index: HashMap<String, usize>,
}

impl Catalog {
    pub fn get(&self, name: &str) -> Option<&Task> {
        self.index.get(name).map(|&i| &self.tasks[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Tasks in registration order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(|t| t.name.as_str())
    }

    pub(crate) fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
