use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Catalog file not found: {}", .0.display())]
    CatalogNotFound(PathBuf),

    #[error("Task already registered: {0}")]
    DuplicateTask(String),

    #[error("Task {task} depends on unknown task {dependency}")]
    UnknownDependency { task: String, dependency: String },

    #[error("Dependency cycle detected: {}", format_cycle(.path))]
    Cycle { path: Vec<String> },

    #[error("Selected task is not in the catalog: {0}")]
    UnknownSelection(String),

    #[error("Invalid run transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

/// Render a cycle as `a -> b -> a`, closing the loop on the first name.
fn format_cycle(path: &[String]) -> String {
    match path.first() {
        Some(first) => {
            let mut names: Vec<&str> = path.iter().map(String::as_str).collect();
            names.push(first);
            names.join(" -> ")
        }
        None => String::from("<empty>"),
    }
}

pub type Result<T> = std::result::Result<T, Error>;
