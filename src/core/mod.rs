//! Core domain models for the pipeline runner.
//!
//! Tasks, their work handles, the registry that validates them, and the
//! dependency graph that levels them into an execution plan.

pub mod dag;
pub mod registry;
pub mod task;
pub mod work;

pub use dag::{DependencyGraph, ExecutionPlan, Level};
pub use registry::{Catalog, TaskRegistry};
pub use task::{RetryPolicy, Task};
pub use work::{work_fn, Work, WorkError, WorkHandle, WorkResult};
