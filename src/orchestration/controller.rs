//! Run controller: drives an execution plan level by level.
//!
//! Levels run strictly in order. A level's failures never stop the run and
//! never skip downstream tasks; dependency order only decides *when* a task
//! may start. The final verdict is computed from the collected results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::dag::DependencyGraph;
use crate::error::{Error, Result};
use crate::orchestration::events::{emit, EventSender, RunEvent};
use crate::orchestration::executor::{Executor, Outcome, RunResult, Selection};
use crate::{elog, elog_debug, elog_error};

/// Controller state.
///
/// Pending -> LevelInProgress(0) -> LevelsRemaining(1) -> LevelInProgress(1)
/// -> ... -> AllLevelsDone. An empty plan goes straight to AllLevelsDone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "level")]
pub enum RunState {
    Pending,
    /// The executor is running this level.
    LevelInProgress(usize),
    /// This level is next.
    LevelsRemaining(usize),
    AllLevelsDone,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Pending => write!(f, "pending"),
            RunState::LevelInProgress(i) => write!(f, "level_in_progress({})", i),
            RunState::LevelsRemaining(i) => write!(f, "levels_remaining({})", i),
            RunState::AllLevelsDone => write!(f, "all_levels_done"),
        }
    }
}

impl RunState {
    pub fn can_transition(&self, target: RunState) -> bool {
        match (*self, target) {
            (RunState::Pending, RunState::LevelInProgress(0)) => true,
            (RunState::Pending, RunState::AllLevelsDone) => true,
            (RunState::LevelInProgress(i), RunState::LevelsRemaining(j)) => j == i + 1,
            (RunState::LevelInProgress(_), RunState::AllLevelsDone) => true,
            (RunState::LevelsRemaining(i), RunState::LevelInProgress(j)) => i == j,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::AllLevelsDone)
    }
}

/// Overall result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Success,
    Failure,
}

impl Verdict {
    /// Success iff no result is failed or timed out.
    pub fn from_results(results: &[RunResult]) -> Self {
        if results.iter().any(|r| r.outcome.is_failure()) {
            Verdict::Failure
        } else {
            Verdict::Success
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Success => write!(f, "success"),
            Verdict::Failure => write!(f, "failure"),
        }
    }
}

/// All results of one invocation plus the verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Selected task names, sorted; `None` when every task was selected.
    pub selection: Option<Vec<String>>,
    /// Results in plan order.
    pub results: Vec<RunResult>,
    pub verdict: Verdict,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.verdict == Verdict::Success
    }

    /// Process exit status: non-zero iff any task failed.
    pub fn exit_code(&self) -> u8 {
        match self.verdict {
            Verdict::Success => 0,
            Verdict::Failure => 1,
        }
    }

    pub fn get(&self, task: &str) -> Option<&RunResult> {
        self.results.iter().find(|r| r.task == task)
    }

    pub fn with_outcome(&self, outcome: Outcome) -> Vec<&RunResult> {
        self.results.iter().filter(|r| r.outcome == outcome).collect()
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.results.iter().filter(|r| r.outcome == outcome).count()
    }

    /// Failed and timed-out results.
    pub fn failures(&self) -> Vec<&RunResult> {
        self.results.iter().filter(|r| r.outcome.is_failure()).collect()
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Drives a [`DependencyGraph`]'s plan through an [`Executor`].
///
/// # Example
///
/// ```ignore
/// let graph = DependencyGraph::from_registry(registry.build()?)?;
/// let mut controller = RunController::new(&graph);
/// let summary = controller.run(None).await?;
/// std::process::exit(summary.exit_code().into());
/// ```
pub struct RunController<'g> {
    graph: &'g DependencyGraph,
    executor: Executor,
    event_tx: Option<EventSender>,
    state: RunState,
}

impl<'g> RunController<'g> {
    pub fn new(graph: &'g DependencyGraph) -> Self {
        Self {
            graph,
            executor: Executor::new(graph.shared_catalog()),
            event_tx: None,
            state: RunState::Pending,
        }
    }

    /// Emit [`RunEvent`]s to `event_tx` during the run.
    pub fn with_events(mut self, event_tx: EventSender) -> Self {
        self.executor = self.executor.with_events(event_tx.clone());
        self.event_tx = Some(event_tx);
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn transition(&mut self, target: RunState) -> Result<()> {
        if !self.state.can_transition(target) {
            return Err(Error::InvalidTransition {
                from: self.state.to_string(),
                to: target.to_string(),
            });
        }
        elog_debug!("Run state {} -> {}", self.state, target);
        self.state = target;
        Ok(())
    }

    /// Execute every level in order and return the summary.
    ///
    /// # Errors
    /// - `Error::UnknownSelection` if `selection` names a task that is not
    ///   in the graph. Nothing runs in that case.
    /// - `Error::InvalidTransition` if this controller already ran.
    pub async fn run(&mut self, selection: Option<&Selection>) -> Result<RunSummary> {
        if self.state != RunState::Pending {
            return Err(Error::InvalidTransition {
                from: self.state.to_string(),
                to: RunState::LevelInProgress(0).to_string(),
            });
        }
        if let Some(selection) = selection {
            if let Some(unknown) = selection.iter().find(|name| !self.graph.contains(name)) {
                return Err(Error::UnknownSelection(unknown.clone()));
            }
        }

        let started_at = Utc::now();
        let plan = self.graph.compute_levels();
        match selection {
            Some(selection) => elog!(
                "Starting pipeline execution for: {}",
                selection.iter().cloned().collect::<Vec<_>>().join(", ")
            ),
            None => elog!("Starting pipeline execution for: all pipelines"),
        }

        let mut results: Vec<RunResult> = Vec::with_capacity(plan.task_count());
        if plan.is_empty() {
            self.transition(RunState::AllLevelsDone)?;
        }

        for level in &plan {
            self.transition(RunState::LevelInProgress(level.index))?;

            let any_selected =
                selection.map_or(true, |s| level.tasks.iter().any(|t| s.contains(t)));
            if any_selected {
                elog!("Starting pipeline group: {}", level.tasks.join(", "));
                emit(
                    self.event_tx.as_ref(),
                    RunEvent::LevelStarted {
                        index: level.index,
                        tasks: level.tasks.clone(),
                    },
                );
            } else {
                elog!("Skipping pipeline group: {}", level.tasks.join(", "));
                emit(
                    self.event_tx.as_ref(),
                    RunEvent::LevelSkipped { index: level.index },
                );
            }

            let level_results = self.executor.run_level(level, selection).await;

            let failed: Vec<&str> = level_results
                .iter()
                .filter(|r| r.outcome.is_failure())
                .map(|r| r.task.as_str())
                .collect();
            for name in &failed {
                elog_error!("Pipeline {} failed, but continuing with other pipelines", name);
            }
            if !failed.is_empty() {
                elog_error!(
                    "One or more pipelines in group [{}] failed",
                    level.tasks.join(", ")
                );
            }
            let failed_count = failed.len();
            if any_selected {
                emit(
                    self.event_tx.as_ref(),
                    RunEvent::LevelFinished {
                        index: level.index,
                        failed: failed_count,
                    },
                );
            }
            results.extend(level_results);

            let next = level.index + 1;
            if next < plan.len() {
                self.transition(RunState::LevelsRemaining(next))?;
            } else {
                self.transition(RunState::AllLevelsDone)?;
            }
        }

        let verdict = Verdict::from_results(&results);
        match verdict {
            Verdict::Success => elog!("All pipelines completed successfully!"),
            Verdict::Failure => elog_error!("One or more pipelines failed"),
        }
        emit(self.event_tx.as_ref(), RunEvent::RunFinished(verdict));

        Ok(RunSummary {
            run_id: Uuid::new_v4(),
            started_at,
            finished_at: Utc::now(),
            selection: selection.map(|s| s.iter().cloned().collect()),
            results,
            verdict,
        })
    }
}
