//! Catalog validation and execution plan tests.

use std::time::Duration;

use warehouse_etl::config::Config;
use warehouse_etl::core::{work_fn, DependencyGraph, TaskRegistry, WorkHandle};
use warehouse_etl::pipelines::{default_catalog, CatalogFile};
use warehouse_etl::Error;

use crate::fixtures::{recorded_graph, Recorder, WAREHOUSE};

fn noop() -> WorkHandle {
    work_fn(|| async { Ok(()) })
}

fn build(table: &[(&str, &[&str])]) -> warehouse_etl::Result<DependencyGraph> {
    let mut registry = TaskRegistry::new();
    for (name, deps) in table {
        registry.register(*name, deps.iter().copied(), noop())?;
    }
    DependencyGraph::from_registry(registry.build()?)
}

#[test]
fn test_warehouse_levels() {
    let graph = build(WAREHOUSE).unwrap();
    let plan = graph.compute_levels();
    let levels: Vec<Vec<&str>> = plan
        .iter()
        .map(|l| l.tasks.iter().map(String::as_str).collect())
        .collect();
    assert_eq!(
        levels,
        vec![
            vec!["customer", "date", "product", "seller"],
            vec!["campaign", "sales"],
            vec!["cart", "inventory", "marketing"],
        ]
    );
}

#[test]
fn test_builtin_catalog_levels() {
    let registry = default_catalog().into_registry(&Config::default()).unwrap();
    let graph = DependencyGraph::from_registry(registry.build().unwrap()).unwrap();
    let plan = graph.compute_levels();

    assert_eq!(plan.len(), 3);
    assert_eq!(plan.task_count(), 9);
    assert_eq!(plan.level_of("dim_date"), Some(0));
    assert_eq!(plan.level_of("fact_campaign_performance"), Some(1));
    assert_eq!(plan.level_of("fact_sales"), Some(1));
    assert_eq!(plan.level_of("fact_inventory"), Some(2));
    assert_eq!(plan.level_of("fact_cart"), Some(2));
    assert_eq!(plan.level_of("fact_marketing_attribution"), Some(2));
}

#[test]
fn test_every_dependency_in_earlier_level() {
    // A wider graph with skipped generations and shared parents.
    let table: &[(&str, &[&str])] = &[
        ("a", &[]),
        ("b", &["a"]),
        ("c", &["b"]),
        ("d", &["a", "c"]),
        ("e", &[]),
        ("f", &["e", "a"]),
        ("g", &["d", "f"]),
        ("h", &["g", "b"]),
    ];
    let graph = build(table).unwrap();
    let plan = graph.compute_levels();

    assert_eq!(plan.task_count(), table.len());
    for (name, deps) in table {
        let level = plan.level_of(name).unwrap();
        for dep in *deps {
            assert!(plan.level_of(dep).unwrap() < level, "{} before {}", dep, name);
        }
        if deps.is_empty() {
            assert_eq!(level, 0);
        } else {
            // Longest path: exactly one more than the deepest dependency.
            let deepest = deps.iter().map(|d| plan.level_of(d).unwrap()).max().unwrap();
            assert_eq!(level, deepest + 1);
        }
    }
    assert_eq!(plan.level_of("h"), Some(5));
}

#[test]
fn test_leveling_is_idempotent_and_order_independent() {
    let forward = build(WAREHOUSE).unwrap();
    let reversed: Vec<(&str, &[&str])> = WAREHOUSE.iter().rev().copied().collect();
    let backward = build(&reversed).unwrap();

    let plan = forward.compute_levels();
    assert_eq!(plan, forward.compute_levels());
    assert_eq!(plan, backward.compute_levels());
}

#[test]
fn test_duplicate_name_rejected() {
    let err = build(&[("date", &[]), ("date", &[])]).unwrap_err();
    assert!(matches!(err, Error::DuplicateTask(ref n) if n == "date"));
}

#[test]
fn test_unknown_dependency_rejected() {
    let err = build(&[("sales", &["date"])]).unwrap_err();
    match err {
        Error::UnknownDependency { task, dependency } => {
            assert_eq!(task, "sales");
            assert_eq!(dependency, "date");
        }
        other => panic!("Expected UnknownDependency, got {other}"),
    }
}

#[test]
fn test_cycle_rejected_before_anything_runs() {
    let recorder = Recorder::new();
    let mut registry = TaskRegistry::new();
    registry
        .register("a", ["b"], recorder.work("a", Duration::ZERO, None))
        .unwrap();
    registry
        .register("b", ["c"], recorder.work("b", Duration::ZERO, None))
        .unwrap();
    registry
        .register("c", ["a"], recorder.work("c", Duration::ZERO, None))
        .unwrap();
    registry
        .register("d", Vec::<String>::new(), recorder.work("d", Duration::ZERO, None))
        .unwrap();

    let err = DependencyGraph::from_registry(registry.build().unwrap()).unwrap_err();
    match &err {
        Error::Cycle { path } => {
            assert_eq!(path.len(), 3);
            assert!(!path.contains(&"d".to_string()));
            for name in ["a", "b", "c"] {
                assert!(path.contains(&name.to_string()));
            }
        }
        other => panic!("Expected Cycle, got {other}"),
    }
    assert!(err.to_string().contains("a -> b -> c -> a"));
    for name in ["a", "b", "c", "d"] {
        assert_eq!(recorder.calls(name), 0);
    }
}

#[test]
fn test_self_dependency_is_cycle() {
    let err = build(&[("a", &["a"])]).unwrap_err();
    match err {
        Error::Cycle { path } => assert_eq!(path, vec!["a"]),
        other => panic!("Expected Cycle, got {other}"),
    }
}

#[test]
fn test_empty_graph_has_empty_plan() {
    let graph = build(&[]).unwrap();
    assert!(graph.compute_levels().is_empty());
}

#[test]
fn test_catalog_file_with_cycle() {
    let content = r#"
[[pipeline]]
name = "stage"
command = "true"
depends_on = ["publish"]

[[pipeline]]
name = "publish"
command = "true"
depends_on = ["stage"]
"#;
    let catalog = CatalogFile::parse(content).unwrap();
    let registry = catalog.into_registry(&Config::default()).unwrap();
    let err = DependencyGraph::from_registry(registry.build().unwrap()).unwrap_err();
    assert!(matches!(err, Error::Cycle { .. }));
}

#[test]
fn test_recorded_graph_has_no_calls_before_run() {
    let recorder = Recorder::new();
    let graph = recorded_graph(WAREHOUSE, &recorder, Duration::ZERO, &[]);
    assert_eq!(graph.task_count(), 9);
    assert_eq!(graph.dependents("sales"), vec!["cart", "inventory", "marketing"]);
    assert_eq!(recorder.calls("sales"), 0);
}
