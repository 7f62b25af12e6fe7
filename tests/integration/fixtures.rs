//! Test fixtures for integration tests.
//!
//! Provides helpers for:
//! - Building graphs from `(name, deps)` tables
//! - Work handles that record when they ran
//! - Catalog files on disk

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;

use warehouse_etl::core::{work_fn, DependencyGraph, TaskRegistry, WorkError, WorkHandle};

/// Warehouse dependency table with short names.
pub const WAREHOUSE: &[(&str, &[&str])] = &[
    ("date", &[]),
    ("customer", &[]),
    ("product", &[]),
    ("seller", &[]),
    ("campaign", &["customer", "product", "seller"]),
    ("sales", &["date", "customer", "product", "seller"]),
    ("inventory", &["sales"]),
    ("cart", &["sales"]),
    ("marketing", &["sales"]),
];

/// Start/finish times of every invocation, keyed by task name.
#[derive(Clone, Default)]
pub struct Recorder {
    spans: Arc<Mutex<HashMap<String, Vec<(Instant, Instant)>>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Work that sleeps for `delay`, records its span, then succeeds or
    /// fails with `error`.
    pub fn work(&self, name: &str, delay: Duration, error: Option<&'static str>) -> WorkHandle {
        let spans = Arc::clone(&self.spans);
        let name = name.to_string();
        work_fn(move || {
            let spans = Arc::clone(&spans);
            let name = name.clone();
            async move {
                let start = Instant::now();
                tokio::time::sleep(delay).await;
                spans
                    .lock()
                    .unwrap()
                    .entry(name)
                    .or_default()
                    .push((start, Instant::now()));
                match error {
                    Some(msg) => Err(WorkError::msg(msg)),
                    None => Ok(()),
                }
            }
        })
    }

    pub fn calls(&self, name: &str) -> usize {
        self.spans
            .lock()
            .unwrap()
            .get(name)
            .map_or(0, Vec::len)
    }

    pub fn span(&self, name: &str) -> Option<(Instant, Instant)> {
        self.spans
            .lock()
            .unwrap()
            .get(name)
            .and_then(|s| s.last().copied())
    }
}

/// Build a graph where every task records into `recorder`; tasks named in
/// `failing` fail with a fixed message.
pub fn recorded_graph(
    table: &[(&str, &[&str])],
    recorder: &Recorder,
    delay: Duration,
    failing: &[&str],
) -> DependencyGraph {
    let mut registry = TaskRegistry::new();
    for (name, deps) in table {
        let error = failing.contains(name).then_some("load failed");
        registry
            .register(*name, deps.iter().copied(), recorder.work(name, delay, error))
            .expect("register");
    }
    DependencyGraph::from_registry(registry.build().expect("build")).expect("graph")
}

/// A catalog file in a temporary directory.
pub struct CatalogDir {
    pub temp_dir: TempDir,
    pub path: PathBuf,
}

impl CatalogDir {
    pub fn new(content: &str) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("pipelines.toml");
        std::fs::write(&path, content).expect("Failed to write catalog");
        Self { temp_dir, path }
    }

    /// Path of a marker file a pipeline command can touch.
    pub fn marker(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }
}
