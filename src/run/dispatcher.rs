//! Run dispatch: the bounded worker pool.
//!
//! Tasks start in input order as concurrency slots free up ("load N, refill
//! on completion"); a fast task never waits on a slow sibling. Each finished
//! invocation flows through a result channel into the aggregator, and the run
//! only returns once every task has been attempted.

use crate::core::errors::{LocportError, Result};
use crate::core::limits::SlotTracker;
use crate::run::aggregator::{InvocationResult, RunAggregator, RunOutcome};
use crate::run::collector::OutputCollector;
use crate::run::invoke::{ProcessInvoker, ToolInvoker};
use crate::run::task::{ImportTask, ToolSpec};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tracing::{info, warn};
use uuid::Uuid;

/// Configuration for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Maximum number of simultaneously running tool invocations.
    pub concurrency: usize,
    /// How to invoke the external import tool.
    pub tool: ToolSpec,
    /// Optional per-task timeout; `None` waits on the tool indefinitely.
    pub task_timeout: Option<Duration>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            // Sequential by default, matching the original action
            concurrency: 1,
            tool: ToolSpec::xcodebuild(),
            task_timeout: None,
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(LocportError::validation_field(
                "concurrency must be a positive integer",
                "concurrency",
            ));
        }
        if self.tool.program.trim().is_empty() {
            return Err(LocportError::validation_field(
                "tool program must not be blank",
                "tool.program",
            ));
        }
        Ok(())
    }
}

/// Live state of one task during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    Queued,
    Running,
    Finished { exit_code: i32 },
}

/// Everything known about a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub project: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Highest number of invocations observed in flight at once.
    pub peak_in_flight: usize,
    /// Per-task results in completion order.
    pub results: Vec<InvocationResult>,
    pub outcome: RunOutcome,
}

/// Run the configured tool over every task with the configured concurrency.
pub async fn execute_run(
    tasks: Vec<ImportTask>,
    collector: OutputCollector,
    config: RunConfig,
) -> Result<RunReport> {
    config.validate()?;
    let mut invoker = ProcessInvoker::new(config.tool.clone());
    if let Some(timeout) = config.task_timeout {
        invoker = invoker.with_timeout(timeout);
    }
    execute_run_with_invoker(tasks, Arc::new(invoker), collector, config.concurrency).await
}

/// Dispatcher core, generic over the invoker so tests can fake the tool.
pub async fn execute_run_with_invoker(
    tasks: Vec<ImportTask>,
    invoker: Arc<dyn ToolInvoker>,
    collector: OutputCollector,
    concurrency: usize,
) -> Result<RunReport> {
    if tasks.is_empty() {
        return Err(LocportError::validation_field(
            "source path list must not be empty",
            "source_paths",
        ));
    }

    let total = tasks.len();
    let project = tasks[0].project.clone();
    let run_id = Uuid::new_v4().to_string();
    let started_at = Utc::now();

    info!(
        target: "locport.run",
        run_id = %run_id,
        total,
        concurrency,
        "Importing {} localization files into {} project",
        total,
        project
    );

    let semaphore = Arc::new(Semaphore::new(concurrency));
    let tracker = Arc::new(SlotTracker::new(concurrency)?);
    let states: Arc<DashMap<String, TaskState>> = Arc::new(DashMap::new());
    for task in &tasks {
        states.insert(task.id().to_string(), TaskState::Queued);
    }

    // Channel for results, drained in completion order
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut aggregator = RunAggregator::new(total);

    for task in tasks {
        // Blocks until a running sibling releases its permit; starts follow
        // input order because permits are granted in acquire order.
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| LocportError::concurrency("semaphore_acquire", e.to_string()))?;

        let tx = tx.clone();
        let invoker = invoker.clone();
        let collector = collector.clone();
        let tracker = tracker.clone();
        let states = states.clone();

        info!(
            target: "locport.run",
            task = %task.id(),
            in_flight = tracker.in_flight() + 1,
            "Launching task"
        );

        tokio::spawn(async move {
            let task_id = task.id().to_string();
            let result = match tracker.checkout() {
                Ok(_slot) => {
                    states.insert(task_id.clone(), TaskState::Running);
                    invoker.invoke(&task, &collector).await
                }
                Err(e) => InvocationResult {
                    // Record rather than drop, so received == total still holds
                    task_id: task_id.clone(),
                    exit_code: -1,
                    captured_output: Vec::new(),
                    duration_ms: 0,
                    final_error: Some(e.to_string()),
                },
            };
            states.insert(
                task_id,
                TaskState::Finished {
                    exit_code: result.exit_code,
                },
            );
            drop(permit);
            let _ = tx.send(result);
        });
    }
    drop(tx);

    while let Some(result) = rx.recv().await {
        if result.success() {
            info!(
                target: "locport.run",
                task = %result.task_id,
                duration_ms = result.duration_ms,
                "Task completed"
            );
        } else {
            warn!(
                target: "locport.run",
                task = %result.task_id,
                exit_code = result.exit_code,
                error = result.final_error.as_deref().unwrap_or("tool exited non-zero"),
                "Task failed"
            );
        }
        aggregator.record(result)?;
    }

    // Every task must have reached a terminal state
    if let Some(entry) = states
        .iter()
        .find(|e| !matches!(e.value(), TaskState::Finished { .. }))
    {
        return Err(LocportError::internal(format!(
            "task '{}' never reached a terminal state",
            entry.key()
        )));
    }

    let (outcome, results) = aggregator.into_parts()?;
    let finished_at = Utc::now();

    if outcome.overall_success {
        info!(
            target: "locport.run",
            run_id = %run_id,
            total,
            peak_in_flight = tracker.peak_in_flight(),
            "Run succeeded"
        );
    } else {
        let failed: Vec<&str> = outcome.failed_task_ids.iter().map(|s| s.as_str()).collect();
        warn!(
            target: "locport.run",
            run_id = %run_id,
            failed = failed.join(", "),
            "Run failed: {} of {} imports did not succeed",
            outcome.failed_task_ids.len(),
            total
        );
    }

    Ok(RunReport {
        run_id,
        project,
        started_at,
        finished_at,
        peak_in_flight: tracker.peak_in_flight(),
        results,
        outcome,
    })
}
