//! Level executor.
//!
//! Runs every selected task of one level concurrently, each on its own
//! tokio task, and waits for all of them. A failing or panicking task only
//! affects its own [`RunResult`].

use futures::future::join_all;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::dag::Level;
use crate::core::registry::Catalog;
use crate::core::task::Task;
use crate::orchestration::events::{emit, EventSender, RunEvent};
use crate::{elog, elog_debug, elog_error, elog_warn};

/// Names of the tasks a caller wants executed. `None` means all.
pub type Selection = BTreeSet<String>;

/// Terminal outcome of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Succeeded,
    Failed,
    /// The last attempt exceeded the task's timeout.
    TimedOut,
    /// Not selected; the work handle was never invoked.
    Skipped,
}

impl Outcome {
    /// Whether this outcome makes the run fail.
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed | Outcome::TimedOut)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Succeeded => write!(f, "succeeded"),
            Outcome::Failed => write!(f, "failed"),
            Outcome::TimedOut => write!(f, "timed out"),
            Outcome::Skipped => write!(f, "skipped"),
        }
    }
}

/// Outcome record for one task in one run. Never changed once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub task: String,
    pub outcome: Outcome,
    /// Text of the last error, for failed and timed-out tasks.
    pub error: Option<String>,
    /// Wall-clock time across all attempts, including retry delays.
    #[serde(rename = "duration_ms", with = "duration_millis")]
    pub duration: Duration,
    /// Number of times the work handle was invoked.
    pub attempts: u32,
}

impl RunResult {
    pub fn succeeded(task: impl Into<String>, duration: Duration, attempts: u32) -> Self {
        Self {
            task: task.into(),
            outcome: Outcome::Succeeded,
            error: None,
            duration,
            attempts,
        }
    }

    pub fn failed(
        task: impl Into<String>,
        error: impl Into<String>,
        duration: Duration,
        attempts: u32,
    ) -> Self {
        Self {
            task: task.into(),
            outcome: Outcome::Failed,
            error: Some(error.into()),
            duration,
            attempts,
        }
    }

    pub fn timed_out(task: impl Into<String>, limit: Duration, duration: Duration, attempts: u32) -> Self {
        Self {
            task: task.into(),
            outcome: Outcome::TimedOut,
            error: Some(format!("timed out after {:?}", limit)),
            duration,
            attempts,
        }
    }

    pub fn skipped(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            outcome: Outcome::Skipped,
            error: None,
            duration: Duration::ZERO,
            attempts: 0,
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

/// Why a single attempt did not succeed.
enum AttemptFailure {
    Failed(String),
    TimedOut(Duration),
}

impl AttemptFailure {
    fn message(&self) -> String {
        match self {
            AttemptFailure::Failed(msg) => msg.clone(),
            AttemptFailure::TimedOut(limit) => format!("timed out after {:?}", limit),
        }
    }
}

/// Runs the tasks of a level concurrently.
///
/// The catalog is shared read-only with every spawned worker.
#[derive(Debug, Clone)]
pub struct Executor {
    catalog: Arc<Catalog>,
    event_tx: Option<EventSender>,
}

impl Executor {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            event_tx: None,
        }
    }

    pub fn with_events(mut self, event_tx: EventSender) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Run one level and return a result for every task in it, in the
    /// level's order.
    ///
    /// Tasks outside `selection` are reported as skipped without being
    /// invoked. Returns only after every started task is terminal.
    pub async fn run_level(&self, level: &Level, selection: Option<&Selection>) -> Vec<RunResult> {
        let level_start = Instant::now();
        let mut slots: Vec<Option<RunResult>> = vec![None; level.tasks.len()];
        let mut running: Vec<(usize, String)> = Vec::new();
        let mut handles = Vec::new();

        for (slot, name) in level.tasks.iter().enumerate() {
            if selection.is_some_and(|s| !s.contains(name)) {
                elog!("Skipping {} (not in the list of pipelines to run)", name);
                let result = RunResult::skipped(name.as_str());
                emit(self.event_tx.as_ref(), RunEvent::TaskFinished(result.clone()));
                slots[slot] = Some(result);
                continue;
            }

            let Some(task) = self.catalog.get(name).cloned() else {
                elog_error!("Task {} is not in the catalog", name);
                let result = RunResult::failed(name.as_str(), "task not found in catalog", Duration::ZERO, 0);
                emit(self.event_tx.as_ref(), RunEvent::TaskFinished(result.clone()));
                slots[slot] = Some(result);
                continue;
            };

            let events = self.event_tx.clone();
            running.push((slot, name.clone()));
            handles.push(tokio::spawn(run_task(task, events)));
        }

        elog_debug!(
            "Level {}: {} running, {} skipped",
            level.index,
            running.len(),
            level.tasks.len() - running.len()
        );

        let joined = join_all(handles).await;
        for ((slot, name), joined) in running.into_iter().zip(joined) {
            let result = match joined {
                Ok(result) => result,
                // Backstop: run_task catches panics from the work itself.
                Err(err) => {
                    let reason = if err.is_panic() {
                        panic_message(&*err.into_panic())
                    } else {
                        "worker was cancelled".to_string()
                    };
                    elog_error!("Error in {} pipeline: {}", name, reason);
                    let result = RunResult::failed(name, reason, level_start.elapsed(), 1);
                    emit(self.event_tx.as_ref(), RunEvent::TaskFinished(result.clone()));
                    result
                }
            };
            slots[slot] = Some(result);
        }

        slots.into_iter().flatten().collect()
    }
}

/// Invoke a task under its retry policy until it succeeds or runs out of
/// attempts.
async fn run_task(task: Task, events: Option<EventSender>) -> RunResult {
    elog!("Starting {} pipeline...", task.name);
    emit(events.as_ref(), RunEvent::TaskStarted { task: task.name.clone() });

    let started = Instant::now();
    let max_attempts = task.retry.max_attempts();
    let mut attempt = 0;

    let result = loop {
        attempt += 1;
        match run_attempt(&task).await {
            Ok(()) => {
                elog!("Successfully completed {} pipeline", task.name);
                break RunResult::succeeded(task.name.as_str(), started.elapsed(), attempt);
            }
            Err(failure) if attempt < max_attempts => {
                let message = failure.message();
                elog_warn!(
                    "{} attempt {}/{} failed: {}; retrying in {:?}",
                    task.name,
                    attempt,
                    max_attempts,
                    message,
                    task.retry.delay
                );
                emit(
                    events.as_ref(),
                    RunEvent::TaskRetrying {
                        task: task.name.clone(),
                        attempt,
                        error: message,
                    },
                );
                if !task.retry.delay.is_zero() {
                    tokio::time::sleep(task.retry.delay).await;
                }
            }
            Err(failure) => {
                elog_error!("Error in {} pipeline: {}", task.name, failure.message());
                break match failure {
                    AttemptFailure::Failed(msg) => {
                        RunResult::failed(task.name.as_str(), msg, started.elapsed(), attempt)
                    }
                    AttemptFailure::TimedOut(limit) => {
                        RunResult::timed_out(task.name.as_str(), limit, started.elapsed(), attempt)
                    }
                };
            }
        }
    };

    emit(events.as_ref(), RunEvent::TaskFinished(result.clone()));
    result
}

async fn run_attempt(task: &Task) -> std::result::Result<(), AttemptFailure> {
    // run() itself may panic before returning a future.
    let work = AssertUnwindSafe(async { task.work.run().await }).catch_unwind();
    let outcome = match task.timeout {
        Some(limit) => match tokio::time::timeout(limit, work).await {
            Ok(outcome) => outcome,
            Err(_) => return Err(AttemptFailure::TimedOut(limit)),
        },
        None => work.await,
    };
    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(AttemptFailure::Failed(err.to_string())),
        Err(payload) => Err(AttemptFailure::Failed(panic_message(&*payload))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panicked: {}", msg)
    } else {
        "panicked".to_string()
    }
}
