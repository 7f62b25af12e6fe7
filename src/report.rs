//! Text rendering for plans, catalogs and run summaries.

use std::fmt::Write;
use std::time::Duration;

use crate::core::dag::{DependencyGraph, ExecutionPlan};
use crate::orchestration::{Outcome, RunEvent, RunSummary, Verdict};

pub fn format_outcome(outcome: Outcome) -> String {
    match outcome {
        Outcome::Succeeded => "✓ succeeded".to_string(),
        Outcome::Failed => "✗ failed".to_string(),
        Outcome::TimedOut => "⏱ timed out".to_string(),
        Outcome::Skipped => "- skipped".to_string(),
    }
}

pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else if millis < 60_000 {
        format!("{:.1}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m{:02}s", secs / 60, secs % 60)
    }
}

pub fn render_plan(plan: &ExecutionPlan) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Execution plan: {} levels, {} pipelines",
        plan.len(),
        plan.task_count()
    );
    for level in plan {
        let _ = writeln!(out, "  Level {}: {}", level.index, level.tasks.join(", "));
    }
    out
}

/// One line per pipeline, in catalog order.
pub fn render_catalog(graph: &DependencyGraph) -> String {
    let mut out = String::new();
    for task in graph.catalog().tasks() {
        let level = graph.level_of(&task.name).unwrap_or_default();
        if task.dependencies.is_empty() {
            let _ = writeln!(out, "{} (level {})", task.name, level);
        } else {
            let _ = writeln!(
                out,
                "{} (level {}) <- {}",
                task.name,
                level,
                task.dependencies.join(", ")
            );
        }
    }
    out
}

pub fn render_summary(summary: &RunSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Run {}", summary.run_id);
    let width = summary
        .results
        .iter()
        .map(|r| r.task.len())
        .max()
        .unwrap_or(0);
    for result in &summary.results {
        let _ = write!(
            out,
            "  {:<width$}  {}",
            result.task,
            format_outcome(result.outcome),
            width = width
        );
        if result.outcome != Outcome::Skipped {
            let _ = write!(out, " in {}", format_duration(result.duration));
        }
        if result.attempts > 1 {
            let _ = write!(out, " after {} attempts", result.attempts);
        }
        if let Some(error) = &result.error {
            let _ = write!(out, ": {}", error);
        }
        out.push('\n');
    }
    let _ = writeln!(
        out,
        "{} succeeded, {} failed, {} timed out, {} skipped",
        summary.count(Outcome::Succeeded),
        summary.count(Outcome::Failed),
        summary.count(Outcome::TimedOut),
        summary.count(Outcome::Skipped)
    );
    for (label, outcome) in [("Failed", Outcome::Failed), ("Timed out", Outcome::TimedOut)] {
        let names: Vec<&str> = summary
            .with_outcome(outcome)
            .into_iter()
            .map(|r| r.task.as_str())
            .collect();
        if !names.is_empty() {
            let _ = writeln!(out, "{}: {}", label, names.join(", "));
        }
    }
    match summary.verdict {
        Verdict::Success => out.push_str("All pipelines completed successfully!\n"),
        Verdict::Failure => out.push_str("One or more pipelines failed\n"),
    }
    out
}

/// Progress line for an event, or `None` for events not worth printing.
pub fn render_event(event: &RunEvent) -> Option<String> {
    match event {
        RunEvent::LevelStarted { index, tasks } => {
            Some(format!("Starting pipeline group {}: {}", index, tasks.join(", ")))
        }
        RunEvent::LevelSkipped { index } => Some(format!("Skipping pipeline group {}", index)),
        RunEvent::TaskStarted { task } => Some(format!("  → {}", task)),
        RunEvent::TaskRetrying {
            task,
            attempt,
            error,
        } => Some(format!("  ↻ {} attempt {} failed: {}", task, attempt, error)),
        RunEvent::TaskFinished(result) if result.outcome != Outcome::Skipped => Some(format!(
            "  {} {}",
            format_outcome(result.outcome),
            result.task
        )),
        RunEvent::TaskFinished(_) => None,
        RunEvent::LevelFinished { index, failed } if *failed > 0 => Some(format!(
            "Pipeline group {}: {} failed, continuing",
            index, failed
        )),
        RunEvent::LevelFinished { .. } | RunEvent::RunFinished(_) => None,
    }
}
