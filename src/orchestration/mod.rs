//! Orchestration layer for pipeline runs.
//!
//! The executor fans out one level at a time; the controller walks the
//! execution plan, collects results and decides the verdict.

pub mod controller;
pub mod events;
pub mod executor;

pub use controller::{RunController, RunState, RunSummary, Verdict};
pub use events::{EventReceiver, EventSender, RunEvent};
pub use executor::{Executor, Outcome, RunResult, Selection};
