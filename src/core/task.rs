//! Task data model for the dependency graph.
//!
//! A task is one named unit of ETL work (typically one warehouse table)
//! together with the names of the tasks it depends on. Tasks are built once
//! by the registry and never change during a run.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::work::WorkHandle;

/// How often a failed task is re-invoked before it is terminally failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    /// Pause between attempts.
    #[serde(with = "duration_secs")]
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self::default()
    }

    /// Total number of invocations allowed.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

/// A single named unit of work in the catalog.
#[derive(Clone)]
pub struct Task {
    /// Unique task name.
    pub name: String,
    /// Names of tasks that must finish before this one starts, in
    /// declaration order and without duplicates.
    pub dependencies: Vec<String>,
    /// The capability invoked when the task runs.
    pub work: WorkHandle,
    pub retry: RetryPolicy,
    /// Per-attempt limit; `None` lets the work run for as long as it needs.
    pub timeout: Option<Duration>,
}

impl Task {
    /// Create a task. Repeated dependency names are collapsed.
    pub fn new<I, S>(name: impl Into<String>, dependencies: I, work: WorkHandle) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut deps: Vec<String> = Vec::new();
        for dep in dependencies {
            let dep = dep.into();
            if !deps.contains(&dep) {
                deps.push(dep);
            }
        }
        Self {
            name: name.into(),
            dependencies: deps,
            work,
            retry: RetryPolicy::none(),
            timeout: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn has_dependencies(&self) -> bool {
        !self.dependencies.is_empty()
    }

    pub fn depends_on(&self, name: &str) -> bool {
        self.dependencies.iter().any(|d| d == name)
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
