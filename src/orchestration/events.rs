//! Progress events emitted while a run executes.
//!
//! Events let a front end (the CLI progress output) follow a run without
//! polling. Sending never blocks; a dropped receiver is ignored.

use tokio::sync::mpsc;

use crate::orchestration::controller::Verdict;
use crate::orchestration::executor::RunResult;

#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    /// A level with at least one selected task is starting.
    LevelStarted {
        index: usize,
        /// Every task in the level, selected or not.
        tasks: Vec<String>,
    },
    /// A level with no selected task; its tasks are reported as skipped.
    LevelSkipped { index: usize },
    /// A task's work handle is about to be invoked.
    TaskStarted { task: String },
    /// An attempt failed and the retry policy allows another.
    TaskRetrying {
        task: String,
        /// The attempt that just failed, starting at 1.
        attempt: u32,
        error: String,
    },
    /// A task reached a terminal outcome (including skipped).
    TaskFinished(RunResult),
    /// Every task in the level is terminal.
    LevelFinished { index: usize, failed: usize },
    RunFinished(Verdict),
}

pub type EventSender = mpsc::UnboundedSender<RunEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<RunEvent>;

/// Create an event channel for [`RunController::with_events`](crate::orchestration::RunController::with_events).
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

pub(crate) fn emit(tx: Option<&EventSender>, event: RunEvent) {
    if let Some(tx) = tx {
        let _ = tx.send(event);
    }
}
