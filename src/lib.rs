pub mod config;
pub mod core;
pub mod error;
pub mod log;
pub mod orchestration;
pub mod pipelines;
pub mod report;

pub use crate::core::{DependencyGraph, ExecutionPlan, Level, Task, TaskRegistry};
pub use crate::error::{Error, Result};
pub use crate::orchestration::{Outcome, RunController, RunResult, RunSummary, Verdict};
