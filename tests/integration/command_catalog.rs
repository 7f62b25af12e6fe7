//! Runs catalogs of shell-command pipelines loaded from TOML files.

use std::fs;

use warehouse_etl::config::Config;
use warehouse_etl::pipelines::CatalogFile;
use warehouse_etl::{DependencyGraph, Outcome, RunController, RunSummary, Verdict};

use crate::fixtures::CatalogDir;

async fn run_catalog(dir: &CatalogDir) -> RunSummary {
    let catalog = CatalogFile::load(&dir.path).unwrap();
    let registry = catalog.into_registry(&Config::default()).unwrap();
    let graph = DependencyGraph::from_registry(registry.build().unwrap()).unwrap();
    RunController::new(&graph).run(None).await.unwrap()
}

#[tokio::test]
async fn test_commands_run_in_dependency_order() {
    let dir = CatalogDir::new("");
    let root = dir.temp_dir.path().display().to_string();
    let content = format!(
        r#"
[[pipeline]]
name = "dim_date"
command = "touch {root}/dim_date.done"

[[pipeline]]
name = "dim_customer"
command = "touch {root}/dim_customer.done"

[[pipeline]]
name = "fact_sales"
command = "test -f {root}/dim_date.done && test -f {root}/dim_customer.done && touch {root}/fact_sales.done"
depends_on = ["dim_date", "dim_customer"]

[[pipeline]]
name = "fact_cart"
command = "test -f {root}/fact_sales.done && touch {root}/fact_cart.done"
depends_on = ["fact_sales"]
"#
    );
    fs::write(&dir.path, content).unwrap();

    let summary = run_catalog(&dir).await;

    assert_eq!(summary.verdict, Verdict::Success, "{:?}", summary.failures());
    for name in ["dim_date", "dim_customer", "fact_sales", "fact_cart"] {
        assert!(dir.marker(&format!("{name}.done")).exists(), "{name} ran");
    }
}

#[tokio::test]
async fn test_failing_command_does_not_block_dependents() {
    let dir = CatalogDir::new("");
    let root = dir.temp_dir.path().display().to_string();
    let content = format!(
        r#"
[[pipeline]]
name = "fact_sales"
command = "echo 'table not found' >&2; exit 3"

[[pipeline]]
name = "fact_inventory"
command = "touch {root}/fact_inventory.done"
depends_on = ["fact_sales"]
"#
    );
    fs::write(&dir.path, content).unwrap();

    let summary = run_catalog(&dir).await;

    let sales = summary.get("fact_sales").unwrap();
    assert_eq!(sales.outcome, Outcome::Failed);
    let error = sales.error.as_deref().unwrap();
    assert!(error.contains("code 3"), "{error}");
    assert!(error.contains("table not found"), "{error}");

    assert_eq!(summary.get("fact_inventory").unwrap().outcome, Outcome::Succeeded);
    assert!(dir.marker("fact_inventory.done").exists());
    assert_eq!(summary.exit_code(), 1);
}

#[tokio::test]
async fn test_env_and_working_dir_applied() {
    let dir = CatalogDir::new("");
    let root = dir.temp_dir.path().display().to_string();
    let content = format!(
        r#"
[[pipeline]]
name = "dim_seller"
command = "echo $BQ_DATASET > dataset.txt"
working_dir = "{root}"

[pipeline.env]
BQ_DATASET = "ecommerce_dw"
"#
    );
    fs::write(&dir.path, content).unwrap();

    let summary = run_catalog(&dir).await;

    assert!(summary.is_success(), "{:?}", summary.failures());
    let written = fs::read_to_string(dir.marker("dataset.txt")).unwrap();
    assert_eq!(written.trim(), "ecommerce_dw");
}

#[tokio::test]
async fn test_command_timeout_from_catalog() {
    let dir = CatalogDir::new(
        r#"
[[pipeline]]
name = "fact_marketing_attribution"
command = "sleep 5"
timeout_secs = 1
"#,
    );

    let summary = run_catalog(&dir).await;

    let result = summary.get("fact_marketing_attribution").unwrap();
    assert_eq!(result.outcome, Outcome::TimedOut);
    assert_eq!(summary.verdict, Verdict::Failure);
}

#[tokio::test]
async fn test_command_retries_from_catalog() {
    let dir = CatalogDir::new("");
    let root = dir.temp_dir.path().display().to_string();
    // Fails on the first attempt, succeeds once the marker exists.
    let content = format!(
        r#"
[[pipeline]]
name = "fact_campaign_performance"
command = "if [ -f {root}/attempted ]; then exit 0; else touch {root}/attempted; exit 1; fi"
retries = 1
retry_delay_secs = 0
"#
    );
    fs::write(&dir.path, content).unwrap();

    let summary = run_catalog(&dir).await;

    let result = summary.get("fact_campaign_performance").unwrap();
    assert_eq!(result.outcome, Outcome::Succeeded);
    assert_eq!(result.attempts, 2);
}
