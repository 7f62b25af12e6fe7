use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use warehouse_etl::config::Config;
use warehouse_etl::core::DependencyGraph;
use warehouse_etl::orchestration::{events, RunController, Selection};
use warehouse_etl::pipelines::CatalogFile;
use warehouse_etl::{elog, elog_error, report, Result};

/// Warehouse ETL runner - executes pipeline loads in dependency order
#[derive(Parser, Debug)]
#[command(name = "warehouse-etl")]
#[command(version, about, long_about = None)]
#[command(
    after_help = "ENVIRONMENT:\n    WAREHOUSE_ETL_DEBUG=1     Enable debug logging (alternative to --debug)"
)]
pub struct Cli {
    /// Enable debug logging (writes to ~/.warehouse-etl/warehouse-etl.log)
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run pipelines level by level
    Run {
        /// Catalog file (defaults to the configured catalog, then the built-in one)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Pipelines to run (default: all)
        #[arg(long, num_args = 1.., value_name = "NAME")]
        pipelines: Vec<String>,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the execution plan without running anything
    Plan {
        #[arg(long)]
        catalog: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },

    /// List pipelines and their dependencies
    List {
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    warehouse_etl::log::init_with_debug(cli.debug);

    let outcome = match cli.command {
        Command::Run {
            catalog,
            pipelines,
            json,
        } => run_pipelines(catalog, pipelines, json),
        Command::Plan { catalog, json } => run_plan(catalog, json).map(|_| ExitCode::SUCCESS),
        Command::List { catalog } => run_list(catalog).map(|_| ExitCode::SUCCESS),
    };

    outcome.unwrap_or_else(|err| {
        elog_error!("{}", err);
        eprintln!("Error: {}", err);
        ExitCode::from(2)
    })
}

/// `None` when every pipeline should run.
fn parse_selection(pipelines: &[String]) -> Option<Selection> {
    if pipelines.is_empty() || pipelines.iter().any(|p| p == "all") {
        None
    } else {
        Some(pipelines.iter().cloned().collect())
    }
}

fn load_graph(catalog: Option<PathBuf>) -> Result<DependencyGraph> {
    let config = Config::load()?;
    let catalog = CatalogFile::resolve(catalog.as_deref(), &config)?;
    let registry = catalog.into_registry(&config)?;
    DependencyGraph::from_registry(registry.build()?)
}

fn run_pipelines(catalog: Option<PathBuf>, pipelines: Vec<String>, json: bool) -> Result<ExitCode> {
    let graph = load_graph(catalog)?;
    let selection = parse_selection(&pipelines);
    elog!(
        "Run command: {} pipelines in catalog, selection={:?}",
        graph.task_count(),
        selection
    );

    let rt = tokio::runtime::Runtime::new()?;
    let summary = rt.block_on(async {
        let mut controller = RunController::new(&graph);
        if json {
            return controller.run(selection.as_ref()).await;
        }

        let (tx, mut rx) = events::channel();
        let printer = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Some(line) = report::render_event(&event) {
                    println!("{}", line);
                }
            }
        });
        controller = controller.with_events(tx);
        let summary = controller.run(selection.as_ref()).await;
        // Closes the channel so the printer drains and exits.
        drop(controller);
        let _ = printer.await;
        summary
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!();
        print!("{}", report::render_summary(&summary));
    }
    Ok(ExitCode::from(summary.exit_code()))
}

fn run_plan(catalog: Option<PathBuf>, json: bool) -> Result<()> {
    let plan = load_graph(catalog)?.compute_levels();
    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print!("{}", report::render_plan(&plan));
    }
    Ok(())
}

fn run_list(catalog: Option<PathBuf>) -> Result<()> {
    print!("{}", report::render_catalog(&load_graph(catalog)?));
    Ok(())
}
